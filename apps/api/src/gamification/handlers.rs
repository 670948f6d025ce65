use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::gamification::badges::{badge_progress, find_badge, is_eligible, Badge, BadgeStats, BADGES};
use crate::gamification::levels::{level_progress, LevelProgress};
use crate::gamification::rewards::{numeric_metrics, RewardAction};
use crate::gamification::service::award_points;
use crate::state::AppState;
use crate::users::queries::require_user;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AwardRequest {
    pub action: String,
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardResponse {
    pub success: bool,
    pub points_earned: i32,
    pub new_total_points: i32,
    pub leveled_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_level: Option<i32>,
    pub new_badges: Vec<&'static Badge>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BadgeProgressEntry {
    pub badge: &'static Badge,
    pub progress: i32,
    pub eligible: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeTotals {
    pub total_badges: usize,
    pub total_possible: usize,
    pub completion_rate: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementsResponse {
    pub success: bool,
    pub earned: Vec<&'static Badge>,
    pub available: Vec<BadgeProgressEntry>,
    pub level: LevelProgress,
    pub stats: BadgeTotals,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, FromRow)]
struct LeaderboardRow {
    id: Uuid,
    name: String,
    email: String,
    avatar: Option<String>,
    total_points: i32,
    current_streak: i32,
    level: i32,
    badges: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub points: i32,
    pub streak: i32,
    pub level: i32,
    pub badges: Vec<String>,
    pub is_current_user: bool,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub success: bool,
    pub leaderboard: Vec<LeaderboardEntry>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/gamification
///
/// Grants the reward for `action`, recomputes the level and awards any badges
/// the new totals unlock.
pub async fn handle_award(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AwardRequest>,
) -> Result<Json<AwardResponse>, AppError> {
    let action = RewardAction::parse(&req.action)
        .ok_or_else(|| AppError::validation("Invalid action"))?;
    let points = action.points(req.metadata.as_ref());

    let outcome = award_points(
        &state.db,
        user.id,
        points,
        numeric_metrics(req.metadata.as_ref()),
    )
    .await?;

    let leveled_up = outcome.leveled_up();
    Ok(Json(AwardResponse {
        success: true,
        points_earned: outcome.points_earned,
        new_total_points: outcome.new_total_points,
        leveled_up,
        new_level: leveled_up.then_some(outcome.new_level),
        old_level: leveled_up.then_some(outcome.old_level),
        new_badges: outcome.new_badges,
        message: format!("Earned {points} points!"),
    }))
}

/// GET /api/gamification
pub async fn handle_achievements(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<AchievementsResponse>, AppError> {
    let row = require_user(&state.db, user.id).await?;

    let earned: Vec<&'static Badge> = row.badges.iter().filter_map(|id| find_badge(id)).collect();

    let stats = BadgeStats {
        current_streak: row.current_streak,
        total_points: row.total_points,
        level: row.level,
        completed_challenges: row.completed_challenges,
        ..Default::default()
    };

    let available = BADGES
        .iter()
        .filter(|b| !row.badges.iter().any(|owned| owned == b.id))
        .map(|badge| BadgeProgressEntry {
            badge,
            progress: badge_progress(badge, &stats),
            eligible: is_eligible(badge, &stats),
        })
        .collect();

    let totals = BadgeTotals {
        total_badges: earned.len(),
        total_possible: BADGES.len(),
        completion_rate: ((earned.len() as f64 / BADGES.len() as f64) * 100.0).round() as i32,
    };

    Ok(Json(AchievementsResponse {
        success: true,
        earned,
        available,
        level: level_progress(row.total_points),
        stats: totals,
    }))
}

/// GET /api/leaderboard?limit=<n|all>&email=
///
/// Public. `email` only marks the matching row as the current user.
pub async fn handle_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let limit = parse_limit(query.limit.as_deref())?;

    let rows = sqlx::query_as::<_, LeaderboardRow>(
        "SELECT id, name, email, avatar, total_points, current_streak, level, badges
         FROM users ORDER BY total_points DESC, created_at ASC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    let leaderboard = rank_rows(rows, query.email.as_deref());

    Ok(Json(LeaderboardResponse {
        success: true,
        leaderboard,
    }))
}

/// `None` (Postgres `LIMIT NULL`) means every row.
fn parse_limit(raw: Option<&str>) -> Result<Option<i64>, AppError> {
    match raw {
        None | Some("all") => Ok(None),
        Some(n) => n
            .parse::<i64>()
            .ok()
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or_else(|| AppError::validation("limit must be a positive number or 'all'")),
    }
}

fn rank_rows(rows: Vec<LeaderboardRow>, current_email: Option<&str>) -> Vec<LeaderboardEntry> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| LeaderboardEntry {
            rank: idx + 1,
            is_current_user: current_email.is_some_and(|e| e.eq_ignore_ascii_case(&row.email)),
            id: row.id,
            name: row.name,
            email: row.email,
            avatar: row.avatar,
            points: row.total_points,
            streak: row.current_streak,
            level: row.level,
            badges: row.badges,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(email: &str, points: i32) -> LeaderboardRow {
        LeaderboardRow {
            id: Uuid::new_v4(),
            name: email.to_string(),
            email: email.to_string(),
            avatar: None,
            total_points: points,
            current_streak: 0,
            level: 1,
            badges: vec![],
        }
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None).unwrap(), None);
        assert_eq!(parse_limit(Some("all")).unwrap(), None);
        assert_eq!(parse_limit(Some("10")).unwrap(), Some(10));
        assert!(parse_limit(Some("0")).is_err());
        assert!(parse_limit(Some("ten")).is_err());
    }

    #[test]
    fn test_rank_rows_marks_current_user() {
        let ranked = rank_rows(
            vec![row("a@example.com", 300), row("b@example.com", 200)],
            Some("B@example.com"),
        );
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
        assert!(!ranked[0].is_current_user);
        assert!(ranked[1].is_current_user);
    }
}

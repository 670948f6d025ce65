//! Point awards. Every path that grants points (activities, challenge completion,
//! explicit gamification actions) goes through [`award_in`] so level and badge
//! bookkeeping stays in one place.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::gamification::badges::{is_eligible, Badge, BadgeStats, BADGES};
use crate::gamification::levels::calculate_level;
use crate::models::user::UserRow;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardOutcome {
    pub points_earned: i32,
    pub old_level: i32,
    pub new_level: i32,
    pub new_total_points: i32,
    pub new_badges: Vec<&'static Badge>,
}

impl AwardOutcome {
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.old_level
    }
}

/// Computes the result of granting `points` to `user`, including any badges that
/// become eligible and the points those badges carry.
pub fn plan_award(user: &UserRow, points: i32, metrics: HashMap<String, f64>) -> AwardOutcome {
    let base_total = user.total_points.saturating_add(points.max(0));
    let stats = BadgeStats {
        current_streak: user.current_streak,
        total_points: base_total,
        level: calculate_level(base_total),
        completed_challenges: user.completed_challenges,
        metrics,
    };

    let new_badges: Vec<&'static Badge> = BADGES
        .iter()
        .filter(|b| !user.badges.iter().any(|owned| owned == b.id))
        .filter(|b| is_eligible(b, &stats))
        .collect();

    let bonus = new_badges
        .iter()
        .fold(0_i32, |acc, b| acc.saturating_add(b.points));
    let new_total_points = base_total.saturating_add(bonus);

    AwardOutcome {
        points_earned: points,
        old_level: user.level,
        new_level: calculate_level(new_total_points),
        new_total_points,
        new_badges,
    }
}

/// Grants points inside an open transaction. The user row is locked for the update.
pub async fn award_in(
    conn: &mut PgConnection,
    user_id: Uuid,
    points: i32,
    metrics: HashMap<String, f64>,
) -> Result<AwardOutcome, AppError> {
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let outcome = plan_award(&user, points, metrics);

    let mut badges = user.badges.clone();
    badges.extend(outcome.new_badges.iter().map(|b| b.id.to_string()));

    sqlx::query(
        "UPDATE users SET total_points = $2, level = $3, badges = $4, updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .bind(outcome.new_total_points)
    .bind(outcome.new_level)
    .bind(&badges)
    .execute(&mut *conn)
    .await?;

    info!("Awarded {} points to user {user_id}", outcome.points_earned);
    if !outcome.new_badges.is_empty() {
        let ids: Vec<&str> = outcome.new_badges.iter().map(|b| b.id).collect();
        info!("User {user_id} earned badges: {}", ids.join(", "));
    }
    if outcome.leveled_up() {
        info!(
            "User {user_id} leveled up {} -> {}",
            outcome.old_level, outcome.new_level
        );
    }

    Ok(outcome)
}

pub async fn award_points(
    pool: &PgPool,
    user_id: Uuid,
    points: i32,
    metrics: HashMap<String, f64>,
) -> Result<AwardOutcome, AppError> {
    let mut tx = pool.begin().await?;
    let outcome = award_in(&mut tx, user_id, points, metrics).await?;
    tx.commit().await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(points: i32, streak: i32, badges: &[&str]) -> UserRow {
        let mut user = UserRow::fixture();
        user.total_points = points;
        user.level = calculate_level(points);
        user.current_streak = streak;
        user.badges = badges.iter().map(|b| b.to_string()).collect();
        user
    }

    #[test]
    fn test_plan_award_without_badges() {
        let user = user_with(50, 0, &[]);
        let outcome = plan_award(&user, 20, HashMap::new());
        assert_eq!(outcome.new_total_points, 70);
        assert!(outcome.new_badges.is_empty());
        assert!(!outcome.leveled_up());
    }

    #[test]
    fn test_plan_award_adds_badge_points_once() {
        let user = user_with(90, 1, &[]);
        let outcome = plan_award(&user, 20, HashMap::new());
        // streak_1 (10 points) becomes eligible
        assert_eq!(outcome.new_badges.len(), 1);
        assert_eq!(outcome.new_badges[0].id, "streak_1");
        assert_eq!(outcome.new_total_points, 120);
        assert_eq!(outcome.new_level, 2);
        assert!(outcome.leveled_up());

        let owned = user_with(90, 1, &["streak_1"]);
        assert!(plan_award(&owned, 20, HashMap::new()).new_badges.is_empty());
    }

    #[test]
    fn test_plan_award_saturates_near_max_total() {
        let user = user_with(i32::MAX - 5, 1, &[]);
        let outcome = plan_award(&user, i32::MAX, HashMap::new());
        assert_eq!(outcome.new_total_points, i32::MAX);
        assert!(outcome.new_level >= user.level);

        let rich = user_with(100, 0, &[]);
        assert_eq!(plan_award(&rich, -50, HashMap::new()).new_total_points, 100);
    }

    #[test]
    fn test_plan_award_reads_metrics() {
        let user = user_with(0, 0, &[]);
        let mut metrics = HashMap::new();
        metrics.insert("social_interactions".to_string(), 10.0);
        let outcome = plan_award(&user, 3, metrics);
        assert!(outcome.new_badges.iter().any(|b| b.id == "social_10"));
    }
}

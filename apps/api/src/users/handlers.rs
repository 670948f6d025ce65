use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::activity::ActivityRow;
use crate::models::social::FriendshipRow;
use crate::models::user::{
    ActivityLevel, FitnessLevel, HeightUnit, MlData, UserProfile, UserRow, UserStats, UserStatus,
    WeightUnit,
};
use crate::state::AppState;
use crate::users::queries::require_user;

const SEARCH_MIN_CHARS: usize = 2;
const DEFAULT_SEARCH_LIMIT: i64 = 20;
const MAX_SEARCH_LIMIT: i64 = 50;
const RECENT_ACTIVITY_LIMIT: i64 = 50;

// ────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub status: String,
    pub onboarding_completed: bool,
    pub profile: UserProfile,
    pub stats: UserStats,
    pub ml_data: MlData,
}

impl From<&UserRow> for ProfileView {
    fn from(user: &UserRow) -> Self {
        ProfileView {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            status: user.status.clone(),
            onboarding_completed: user.onboarding_completed,
            profile: user.profile(),
            stats: user.stats(),
            ml_data: user.ml_data(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub user: ProfileView,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub height_unit: Option<String>,
    pub weight: Option<f64>,
    pub weight_unit: Option<String>,
    pub activity_level: Option<String>,
    pub primary_goal: Option<String>,
    pub secondary_goals: Option<Vec<String>>,
    pub fitness_level: Option<String>,
    pub goals: Option<Vec<String>>,
    pub preferences: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub onboarding_completed: Option<bool>,
    #[serde(default)]
    pub profile: ProfileFields,
}

/// A profile patch after validation. `None` leaves the column untouched.
#[derive(Debug, Default, PartialEq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub onboarding_completed: Option<bool>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub height: Option<f64>,
    pub height_unit: Option<HeightUnit>,
    pub weight: Option<f64>,
    pub weight_unit: Option<WeightUnit>,
    pub activity_level: Option<ActivityLevel>,
    pub primary_goal: Option<String>,
    pub secondary_goals: Option<Vec<String>>,
    pub fitness_level: Option<FitnessLevel>,
    pub goals: Option<Vec<String>>,
    pub preferences: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: &'static str,
    pub user: ProfileView,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendshipStatusView {
    pub status: String,
    pub friendship_id: Uuid,
    pub is_sender: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub status: String,
    pub stats: UserStats,
    pub friendship_status: Option<FriendshipStatusView>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub users: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct DashboardUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_points: i32,
    pub level: i32,
    pub badges: Vec<String>,
    pub completed_challenges: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMlData {
    pub dropout_risk: Option<f64>,
    pub engagement_level: Option<String>,
    pub last_prediction: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub user: DashboardUser,
    pub stats: DashboardStats,
    pub active_challenges: i64,
    pub weekly_activities: i64,
    pub recent_activities: Vec<ActivityRow>,
    pub ml_data: DashboardMlData,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub success: bool,
    pub data: DashboardData,
}

// ────────────────────────────────────────────────────────────
// Validation helpers
// ────────────────────────────────────────────────────────────

/// Parses a wire enum value through its serde names, 400 on anything else.
fn parse_enum<T: DeserializeOwned>(field: &str, raw: Option<String>) -> Result<Option<T>, AppError> {
    match raw {
        None => Ok(None),
        Some(value) => serde_json::from_value(Value::String(value.clone()))
            .map(Some)
            .map_err(|_| AppError::validation(format!("Invalid {field}: {value}"))),
    }
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl UpdateProfileRequest {
    pub fn into_patch(self) -> Result<ProfilePatch, AppError> {
        let p = self.profile;
        if p.age.is_some_and(|a| !(1..=120).contains(&a)) {
            return Err(AppError::validation("Invalid age"));
        }
        if p.height.is_some_and(|h| !h.is_finite() || h <= 0.0)
            || p.weight.is_some_and(|w| !w.is_finite() || w <= 0.0)
        {
            return Err(AppError::validation("Height and weight must be positive"));
        }

        Ok(ProfilePatch {
            name: non_blank(self.name),
            avatar: non_blank(self.avatar),
            onboarding_completed: self.onboarding_completed,
            age: p.age,
            gender: non_blank(p.gender),
            height: p.height,
            height_unit: parse_enum("heightUnit", p.height_unit)?,
            weight: p.weight,
            weight_unit: parse_enum("weightUnit", p.weight_unit)?,
            activity_level: parse_enum("activityLevel", p.activity_level)?,
            primary_goal: non_blank(p.primary_goal),
            secondary_goals: p.secondary_goals,
            fitness_level: parse_enum("fitnessLevel", p.fitness_level)?,
            goals: p.goals,
            preferences: p.preferences,
        })
    }
}

/// ILIKE pattern matching `q` anywhere, with wildcards in `q` taken literally.
pub fn contains_pattern(q: &str) -> String {
    let mut escaped = String::with_capacity(q.len() + 2);
    escaped.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Friendship state of each user in `friendships` relative to `me`.
pub fn friendship_map(
    me: Uuid,
    friendships: &[FriendshipRow],
) -> HashMap<Uuid, FriendshipStatusView> {
    friendships
        .iter()
        .map(|f| {
            (
                f.other_party(me),
                FriendshipStatusView {
                    status: f.status.clone(),
                    friendship_id: f.id,
                    is_sender: f.requested_by == me,
                },
            )
        })
        .collect()
}

// ────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────

/// GET /api/user/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let row = require_user(&state.db, user.id).await?;
    Ok(Json(ProfileResponse {
        success: true,
        user: ProfileView::from(&row),
    }))
}

/// PATCH /api/user/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let patch = req.into_patch()?;

    let row = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET
             name = COALESCE($2, name),
             avatar = COALESCE($3, avatar),
             onboarding_completed = COALESCE($4, onboarding_completed),
             age = COALESCE($5, age),
             gender = COALESCE($6, gender),
             height = COALESCE($7, height),
             height_unit = COALESCE($8, height_unit),
             weight = COALESCE($9, weight),
             weight_unit = COALESCE($10, weight_unit),
             activity_level = COALESCE($11, activity_level),
             primary_goal = COALESCE($12, primary_goal),
             secondary_goals = COALESCE($13, secondary_goals),
             fitness_level = COALESCE($14, fitness_level),
             goals = COALESCE($15, goals),
             preferences = COALESCE($16, preferences),
             updated_at = NOW()
         WHERE id = $1
         RETURNING *",
    )
    .bind(user.id)
    .bind(patch.name)
    .bind(patch.avatar)
    .bind(patch.onboarding_completed)
    .bind(patch.age)
    .bind(patch.gender)
    .bind(patch.height)
    .bind(patch.height_unit.map(|u| u.as_str()))
    .bind(patch.weight)
    .bind(patch.weight_unit.map(|u| u.as_str()))
    .bind(patch.activity_level.map(|l| l.as_str()))
    .bind(patch.primary_goal)
    .bind(patch.secondary_goals)
    .bind(patch.fitness_level.map(|l| l.as_str()))
    .bind(patch.goals)
    .bind(patch.preferences)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    info!("Profile updated for user {}", user.id);

    Ok(Json(ProfileResponse {
        success: true,
        user: ProfileView::from(&row),
    }))
}

/// PATCH /api/user/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let status: UserStatus = parse_enum("status", req.status)
        .ok()
        .flatten()
        .ok_or_else(|| AppError::validation("Invalid status"))?;

    let row = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .bind(status.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(Json(StatusResponse {
        success: true,
        message: "Status updated successfully",
        user: ProfileView::from(&row),
    }))
}

/// GET /api/users/search?q=&limit=20
pub async fn handle_search(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, AppError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or("");
    if q.chars().count() < SEARCH_MIN_CHARS {
        return Ok(Json(SearchResponse {
            success: true,
            users: vec![],
        }));
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let matches = sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users
         WHERE id <> $1 AND (name ILIKE $2 OR email ILIKE $2)
         ORDER BY name
         LIMIT $3",
    )
    .bind(user.id)
    .bind(contains_pattern(q))
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    let ids: Vec<Uuid> = matches.iter().map(|u| u.id).collect();
    let friendships = sqlx::query_as::<_, FriendshipRow>(
        "SELECT * FROM friendships
         WHERE (user_id = $1 AND friend_id = ANY($2))
            OR (friend_id = $1 AND user_id = ANY($2))",
    )
    .bind(user.id)
    .bind(&ids)
    .fetch_all(&state.db)
    .await?;
    let mut statuses = friendship_map(user.id, &friendships);

    let users = matches
        .iter()
        .map(|u| SearchResult {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            avatar: u.avatar.clone(),
            status: u.status.clone(),
            stats: u.stats(),
            friendship_status: statuses.remove(&u.id),
        })
        .collect();

    Ok(Json(SearchResponse {
        success: true,
        users,
    }))
}

/// GET /api/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let row = require_user(&state.db, user.id).await?;

    let recent_activities = sqlx::query_as::<_, ActivityRow>(
        "SELECT * FROM activities WHERE user_id = $1 ORDER BY completed_at DESC LIMIT $2",
    )
    .bind(user.id)
    .bind(RECENT_ACTIVITY_LIMIT)
    .fetch_all(&state.db)
    .await?;

    let (active_challenges, completed_challenges): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*) FILTER (WHERE status = 'active'),
                COUNT(*) FILTER (WHERE status = 'completed')
         FROM user_challenges WHERE user_id = $1",
    )
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    let weekly_activities: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM activities WHERE user_id = $1 AND completed_at >= $2",
    )
    .bind(user.id)
    .bind(Utc::now() - Duration::days(7))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(DashboardResponse {
        success: true,
        data: DashboardData {
            user: DashboardUser {
                id: row.id,
                name: row.name.clone(),
                email: row.email.clone(),
                avatar: row.avatar.clone(),
            },
            stats: DashboardStats {
                current_streak: row.current_streak,
                longest_streak: row.longest_streak,
                total_points: row.total_points,
                level: row.level,
                badges: row.badges.clone(),
                completed_challenges,
            },
            active_challenges,
            weekly_activities,
            recent_activities,
            ml_data: DashboardMlData {
                dropout_risk: row.dropout_risk,
                engagement_level: row.engagement_level.clone(),
                last_prediction: row.last_prediction,
            },
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(raw: Value) -> UpdateProfileRequest {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_profile_patch_parses_enums() {
        let patch = request(json!({
            "name": "  Sam ",
            "onboardingCompleted": true,
            "profile": {
                "age": 31,
                "heightUnit": "ft",
                "weightUnit": "lbs",
                "activityLevel": "very_active",
                "fitnessLevel": "advanced",
                "goals": ["run a 10k"]
            }
        }))
        .into_patch()
        .unwrap();

        assert_eq!(patch.name.as_deref(), Some("Sam"));
        assert_eq!(patch.onboarding_completed, Some(true));
        assert_eq!(patch.height_unit, Some(HeightUnit::Ft));
        assert_eq!(patch.weight_unit, Some(WeightUnit::Lbs));
        assert_eq!(patch.activity_level, Some(ActivityLevel::VeryActive));
        assert_eq!(patch.fitness_level, Some(FitnessLevel::Advanced));
        assert_eq!(patch.goals, Some(vec!["run a 10k".to_string()]));
        assert!(patch.avatar.is_none());
    }

    #[test]
    fn test_profile_patch_rejects_unknown_enum() {
        let err = request(json!({ "profile": { "weightUnit": "stone" } }))
            .into_patch()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("weightUnit")));
    }

    #[test]
    fn test_profile_patch_rejects_bad_measurements() {
        assert!(request(json!({ "profile": { "age": 0 } })).into_patch().is_err());
        assert!(request(json!({ "profile": { "height": -170.0 } })).into_patch().is_err());
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        let patch = request(json!({ "name": "   " })).into_patch().unwrap();
        assert_eq!(patch, ProfilePatch::default());
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("ann"), "%ann%");
        assert_eq!(contains_pattern("50%_a\\b"), "%50\\%\\_a\\\\b%");
    }

    #[test]
    fn test_friendship_map_is_relative_to_caller() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let third = Uuid::new_v4();
        let now = Utc::now();
        let sent = FriendshipRow {
            id: Uuid::new_v4(),
            user_id: me,
            friend_id: other,
            status: "pending".to_string(),
            requested_by: me,
            created_at: now,
            updated_at: now,
        };
        let received = FriendshipRow {
            id: Uuid::new_v4(),
            user_id: third,
            friend_id: me,
            status: "accepted".to_string(),
            requested_by: third,
            created_at: now,
            updated_at: now,
        };

        let map = friendship_map(me, &[sent.clone(), received]);
        assert_eq!(map.len(), 2);
        assert!(map[&other].is_sender);
        assert_eq!(map[&other].friendship_id, sent.id);
        assert!(!map[&third].is_sender);
        assert_eq!(map[&third].status, "accepted");
    }

    #[test]
    fn test_profile_view_serializes_camel_case() {
        let user = UserRow::fixture();
        let json = serde_json::to_value(ProfileView::from(&user)).unwrap();
        assert_eq!(json["mlData"]["dropoutRisk"], Value::Null);
        assert_eq!(json["stats"]["totalPoints"], 0);
        assert_eq!(json["profile"]["heightUnit"], "cm");
    }
}

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::activities::streak::next_streak;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::gamification::service::award_in;
use crate::models::activity::{checked_duration, ActivityRow, Intensity, MAX_DURATION_MINUTES};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 20;
const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct LogActivityRequest {
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub name: Option<String>,
    pub duration: Option<i32>,
    #[serde(default)]
    pub intensity: Intensity,
    pub calories: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogActivityResponse {
    pub success: bool,
    pub activity: ActivityRow,
    pub points_earned: i32,
    pub current_streak: i32,
}

#[derive(Debug, Deserialize)]
pub struct ListActivitiesQuery {
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesResponse {
    pub success: bool,
    pub activities: Vec<ActivityRow>,
}

/// `floor(duration × multiplier)` where high counts double and moderate 1.5×.
/// Durations beyond one day count as one day.
pub fn activity_points(duration: i32, intensity: Intensity) -> i32 {
    let minutes = duration.clamp(0, MAX_DURATION_MINUTES);
    (f64::from(minutes) * intensity.points_multiplier()).floor() as i32
}

pub fn duration_out_of_range() -> AppError {
    AppError::validation(format!(
        "Duration must be between 1 and {MAX_DURATION_MINUTES} minutes"
    ))
}

/// Advances the user's streak for an activity logged now. Runs inside the
/// caller's transaction and locks the user row.
pub async fn touch_streak(conn: &mut PgConnection, user_id: Uuid) -> Result<i32, AppError> {
    let (current, longest, last_active): (i32, i32, Option<chrono::DateTime<Utc>>) =
        sqlx::query_as(
            "SELECT current_streak, longest_streak, last_active_date FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let streak = next_streak(current, last_active, &Local::now());

    sqlx::query(
        "UPDATE users SET current_streak = $2, longest_streak = $3, last_active_date = NOW(),
                          updated_at = NOW()
         WHERE id = $1",
    )
    .bind(user_id)
    .bind(streak)
    .bind(longest.max(streak))
    .execute(&mut *conn)
    .await?;

    Ok(streak)
}

/// POST /api/activities
pub async fn handle_log_activity(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<LogActivityRequest>,
) -> Result<(StatusCode, Json<LogActivityResponse>), AppError> {
    let activity_type = req.activity_type.as_deref().map(str::trim).unwrap_or("");
    let name = req.name.as_deref().map(str::trim).unwrap_or("");
    if activity_type.is_empty() || name.is_empty() || req.duration.is_none() {
        return Err(AppError::validation("Type, name, and duration are required"));
    }
    let duration = checked_duration(req.duration).ok_or_else(duration_out_of_range)?;

    let mut tx = state.db.begin().await?;

    let activity = sqlx::query_as::<_, ActivityRow>(
        "INSERT INTO activities (id, user_id, activity_type, name, duration, intensity, calories, notes, completed)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(activity_type)
    .bind(name)
    .bind(duration)
    .bind(req.intensity.as_str())
    .bind(req.calories.unwrap_or(0).max(0))
    .bind(req.notes.as_deref().unwrap_or(""))
    .fetch_one(&mut *tx)
    .await?;

    let current_streak = touch_streak(&mut tx, user.id).await?;

    let points = activity_points(duration, req.intensity);
    let outcome = award_in(&mut tx, user.id, points, HashMap::new()).await?;

    tx.commit().await?;

    info!(
        "User {} logged {} ({} min), streak {current_streak}",
        user.id, activity.name, activity.duration
    );

    Ok((
        StatusCode::CREATED,
        Json(LogActivityResponse {
            success: true,
            activity,
            points_earned: outcome.points_earned,
            current_streak,
        }),
    ))
}

/// GET /api/activities?limit=20&type=
pub async fn handle_list_activities(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListActivitiesQuery>,
) -> Result<Json<ActivitiesResponse>, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let activities = sqlx::query_as::<_, ActivityRow>(
        "SELECT * FROM activities
         WHERE user_id = $1 AND ($2::text IS NULL OR activity_type = $2)
         ORDER BY completed_at DESC LIMIT $3",
    )
    .bind(user.id)
    .bind(query.activity_type.as_deref().filter(|t| !t.is_empty()))
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ActivitiesResponse {
        success: true,
        activities,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_points_by_intensity() {
        assert_eq!(activity_points(30, Intensity::High), 60);
        assert_eq!(activity_points(25, Intensity::Moderate), 37);
        assert_eq!(activity_points(25, Intensity::Low), 25);
        assert_eq!(activity_points(-5, Intensity::High), 0);
        assert_eq!(activity_points(2_000_000_000, Intensity::High), 2880);
    }

    #[test]
    fn test_duration_out_of_range_is_bad_request() {
        let err = duration_out_of_range();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("1440")));
    }

    #[test]
    fn test_log_request_defaults_to_moderate() {
        let req: LogActivityRequest =
            serde_json::from_str(r#"{"type":"exercise","name":"Run","duration":20}"#).unwrap();
        assert_eq!(req.intensity, Intensity::Moderate);
        assert_eq!(req.activity_type.as_deref(), Some("exercise"));
    }
}

use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::challenges::progress::local_midnight;
use crate::challenges::queries::activities_since;
use crate::errors::AppError;
use crate::models::activity::{ActivityRow, HYDRATION};
use crate::state::AppState;

pub const ML_PER_GLASS: i32 = 250;
pub const DAILY_GLASS_GOAL: i64 = 8;

#[derive(Debug, Deserialize)]
pub struct LogWaterRequest {
    pub glasses: Option<i32>,
    pub ml: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct LogWaterResponse {
    pub success: bool,
    pub activity: ActivityRow,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterTodayResponse {
    pub success: bool,
    pub total_glasses: i64,
    pub activities: Vec<ActivityRow>,
    pub goal: i64,
}

/// Glasses in `ml`, rounded to the nearest glass and never less than one.
fn glasses_for_ml(ml: i32) -> i32 {
    let per_glass = i64::from(ML_PER_GLASS);
    let rounded = (i64::from(ml) + per_glass / 2) / per_glass;
    i32::try_from(rounded.max(1)).unwrap_or(i32::MAX)
}

/// Resolves a request to `(glasses, ml)`. Either field may be given; the other
/// is derived at 250 ml per glass.
pub fn resolve_amount(req: &LogWaterRequest) -> Result<(i32, i32), AppError> {
    let (glasses, ml) = match (req.glasses, req.ml) {
        (Some(g), Some(ml)) => (g, ml),
        (Some(g), None) => (g, g.saturating_mul(ML_PER_GLASS)),
        (None, Some(ml)) if ml > 0 => (glasses_for_ml(ml), ml),
        (None, Some(ml)) => (0, ml),
        (None, None) => return Err(AppError::validation("Glasses or ml is required")),
    };
    if glasses <= 0 || ml <= 0 {
        return Err(AppError::validation("Water amount must be positive"));
    }
    Ok((glasses, ml))
}

/// POST /api/water
pub async fn handle_log_water(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<LogWaterRequest>,
) -> Result<(StatusCode, Json<LogWaterResponse>), AppError> {
    let (glasses, ml) = resolve_amount(&req)?;

    let activity = sqlx::query_as::<_, ActivityRow>(
        "INSERT INTO activities (id, user_id, activity_type, name, duration, quantity, notes, completed)
         VALUES ($1, $2, $3, 'Water Intake', 0, $4, $5, TRUE)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(HYDRATION)
    .bind(glasses)
    .bind(format!("{glasses} glasses ({ml}ml)"))
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(LogWaterResponse {
            success: true,
            activity,
            message: format!("Logged {glasses} glasses of water"),
        }),
    ))
}

/// GET /api/water
pub async fn handle_water_today(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<WaterTodayResponse>, AppError> {
    let now = Local::now();
    let midnight = local_midnight(&Local, now.date_naive())
        .unwrap_or_else(|| Utc::now() - Duration::hours(24));

    let mut activities = activities_since(&state.db, user.id, midnight, Some(HYDRATION)).await?;
    activities.retain(|a| a.completed_at.with_timezone(&Local).date_naive() == now.date_naive());
    activities.reverse();

    let total_glasses = activities.iter().map(ActivityRow::glasses).sum();

    Ok(Json(WaterTodayResponse {
        success: true,
        total_glasses,
        activities,
        goal: DAILY_GLASS_GOAL,
    }))
}

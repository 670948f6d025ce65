use std::collections::HashMap;

use axum::{extract::State, Json};
use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::activities::handlers::duration_out_of_range;
use crate::auth::AuthUser;
use crate::calories::calc::{
    bmr, calorie_goal, calories_burned, maintenance_calories, met_for, weight_kg,
};
use crate::challenges::progress::local_midnight;
use crate::errors::AppError;
use crate::gamification::rewards::RewardAction;
use crate::gamification::service::{award_in, AwardOutcome};
use crate::models::activity::{checked_duration, ActivityRow, Intensity, EXERCISE};
use crate::models::user::ActivityLevel;
use crate::state::AppState;
use crate::users::queries::require_user;

// ────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CalorieActivity {
    pub name: String,
    pub duration: i32,
    pub calories: i32,
    pub timestamp: DateTime<Utc>,
}

impl From<&ActivityRow> for CalorieActivity {
    fn from(a: &ActivityRow) -> Self {
        CalorieActivity {
            name: a.name.clone(),
            duration: a.duration,
            calories: a.calories_burned,
            timestamp: a.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalorieSummary {
    pub bmr: i32,
    pub activity_calories: i32,
    pub total_burned: i32,
    pub calorie_goal: i32,
    pub maintenance_calories: i32,
    pub activities: Vec<CalorieActivity>,
}

#[derive(Debug, Deserialize)]
pub struct CalorieActivityRequest {
    pub name: Option<String>,
    pub duration: Option<i32>,
    #[serde(default)]
    pub intensity: Intensity,
}

#[derive(Debug, Serialize)]
pub struct CalorieActivityResponse {
    pub success: bool,
    pub activity: CalorieActivity,
    pub gamification: AwardOutcome,
}

fn start_of_today() -> DateTime<Utc> {
    local_midnight(&Local, Local::now().date_naive())
        .unwrap_or_else(|| Utc::now() - Duration::hours(24))
}

// ────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────

/// GET /api/calories
pub async fn handle_calorie_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<CalorieSummary>, AppError> {
    let row = require_user(&state.db, user.id).await?;

    let bmr = bmr(&row);
    let maintenance = maintenance_calories(bmr, ActivityLevel::parse(&row.activity_level));
    let goal = calorie_goal(maintenance, row.primary_goal.as_deref());

    let activities = sqlx::query_as::<_, ActivityRow>(
        "SELECT * FROM activities WHERE user_id = $1 AND completed_at >= $2 ORDER BY completed_at ASC",
    )
    .bind(user.id)
    .bind(start_of_today())
    .fetch_all(&state.db)
    .await?;

    let activity_calories: i32 = activities.iter().map(|a| a.calories_burned).sum();

    Ok(Json(CalorieSummary {
        bmr,
        activity_calories,
        total_burned: bmr + activity_calories,
        calorie_goal: goal,
        maintenance_calories: maintenance,
        activities: activities.iter().map(CalorieActivity::from).collect(),
    }))
}

/// POST /api/calories/activity
///
/// Stores an `exercise` activity with its MET-based burn and grants the
/// `complete_activity` reward in the same transaction.
pub async fn handle_log_calorie_activity(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CalorieActivityRequest>,
) -> Result<Json<CalorieActivityResponse>, AppError> {
    let name = req.name.as_deref().map(str::trim).unwrap_or("");
    if name.is_empty() || req.duration.is_none() {
        return Err(AppError::validation("Activity name and duration are required"));
    }
    let duration = checked_duration(req.duration).ok_or_else(duration_out_of_range)?;

    let mut tx = state.db.begin().await?;
    let row = require_user(&mut *tx, user.id).await?;

    let met = met_for(name);
    let kcal = calories_burned(met, weight_kg(&row), duration, req.intensity);

    let activity = sqlx::query_as::<_, ActivityRow>(
        "INSERT INTO activities (id, user_id, activity_type, name, duration, intensity, calories_burned, met, completed)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(EXERCISE)
    .bind(name)
    .bind(duration)
    .bind(req.intensity.as_str())
    .bind(kcal)
    .bind(met)
    .fetch_one(&mut *tx)
    .await?;

    let metadata = serde_json::json!({ "duration": duration, "caloriesBurned": kcal });
    let points = RewardAction::CompleteActivity.points(Some(&metadata));
    let mut metrics = HashMap::new();
    metrics.insert("total_calories".to_string(), f64::from(kcal));
    let outcome = award_in(&mut tx, user.id, points, metrics).await?;

    tx.commit().await?;

    info!(
        "User {} logged {name} ({duration} min, {kcal} kcal), +{} points",
        user.id, outcome.points_earned
    );

    Ok(Json(CalorieActivityResponse {
        success: true,
        activity: CalorieActivity::from(&activity),
        gamification: outcome,
    }))
}

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::ml::features::{
    build_features, count_social_interactions, load_activity_aggregates,
    load_challenge_aggregates, UserFeatures,
};
use crate::ml::motivation::{fallback_message, MotivationMessage};
use crate::ml::{MlEndpoint, PredictionService};
use crate::state::AppState;
use crate::users::queries::require_user;

#[derive(Debug, Serialize)]
pub struct Predictions {
    pub dropout: Option<Value>,
    pub engagement: Option<Value>,
    pub recommendations: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionsResponse {
    pub success: bool,
    pub predictions: Predictions,
    pub user_features: UserFeatures,
    pub ml_service_available: bool,
}

#[derive(Debug, Serialize)]
pub struct MotivationResponse {
    pub success: bool,
    #[serde(flatten)]
    pub motivation: MotivationMessage,
    pub source: &'static str,
}

/// Calls one endpoint, logging and swallowing failures.
async fn try_call(ml: &dyn PredictionService, endpoint: MlEndpoint, payload: &Value) -> Option<Value> {
    match ml.call(endpoint, payload).await {
        Ok(body) => Some(body),
        Err(e) => {
            warn!("ML endpoint {} unavailable: {e}", endpoint.path());
            None
        }
    }
}

/// POST /api/ml/predictions
///
/// Builds the caller's feature vector, asks the ML service for dropout,
/// engagement and recommendation predictions independently and stores the risk
/// figures on the user.
pub async fn handle_predictions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PredictionsResponse>, AppError> {
    let row = require_user(&state.db, user.id).await?;
    let activity = load_activity_aggregates(&state.db, user.id).await?;
    let challenges = load_challenge_aggregates(&state.db, user.id).await?;
    let social = count_social_interactions(&state.db, user.id).await?;

    let features = build_features(&row, &activity, &challenges, social, Utc::now());
    let payload = serde_json::to_value(&features).map_err(|e| AppError::Internal(e.into()))?;

    let ml = state.ml.as_ref();
    let (dropout, engagement, recommendations) = tokio::join!(
        try_call(ml, MlEndpoint::PredictDropout, &payload),
        try_call(ml, MlEndpoint::PredictEngagement, &payload),
        try_call(ml, MlEndpoint::RecommendChallenge, &payload),
    );

    let ml_service_available = dropout.is_some() || engagement.is_some();
    if ml_service_available {
        let dropout_risk = dropout
            .as_ref()
            .and_then(|d| d.get("dropout_risk"))
            .and_then(Value::as_f64);
        let engagement_level = engagement
            .as_ref()
            .and_then(|e| e.get("engagement_level"))
            .and_then(Value::as_str)
            .map(str::to_string);

        sqlx::query(
            "UPDATE users SET dropout_risk = COALESCE($2, dropout_risk),
                              engagement_level = COALESCE($3, engagement_level),
                              last_prediction = NOW(), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(dropout_risk)
        .bind(engagement_level)
        .execute(&state.db)
        .await?;

        info!("Stored ML predictions for user {}", user.id);
    }

    Ok(Json(PredictionsResponse {
        success: true,
        predictions: Predictions {
            dropout,
            engagement,
            recommendations,
        },
        user_features: features,
        ml_service_available,
    }))
}

/// POST /api/ml/motivation
pub async fn handle_motivation(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MotivationResponse>, AppError> {
    let row = require_user(&state.db, user.id).await?;

    let profile = json!({
        "user_id": row.id.to_string(),
        "days_active": row.current_streak,
        "meditation_streak": row.current_streak,
        "challenge_completion_rate": row.completed_challenges,
        "preferred_tone": row.preferred_tone,
    });

    let from_ml = try_call(state.ml.as_ref(), MlEndpoint::GenerateMotivation, &profile)
        .await
        .and_then(|body| serde_json::from_value::<MotivationMessage>(body).ok());

    let (motivation, source) = match from_ml {
        Some(m) => (m, "ml"),
        None => (
            fallback_message(&row.name, row.current_streak, row.dropout_risk),
            "rule-based",
        ),
    };

    Ok(Json(MotivationResponse {
        success: true,
        motivation,
        source,
    }))
}

async fn proxy(state: &AppState, endpoint: MlEndpoint, body: Value) -> Result<Json<Value>, AppError> {
    state
        .ml
        .call(endpoint, &body)
        .await
        .map(Json)
        .map_err(|e| AppError::Upstream(format!("{}: {e}", endpoint.path())))
}

/// POST /api/ml/compare
pub async fn handle_compare(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    proxy(&state, MlEndpoint::PredictCompare, body).await
}

/// POST /api/ml/dropout-quantum
pub async fn handle_dropout_quantum(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    proxy(&state, MlEndpoint::PredictDropoutQuantum, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::testing::StubPredictionService;

    #[tokio::test]
    async fn test_try_call_swallows_failures() {
        let ml = StubPredictionService::offline();
        assert!(try_call(&ml, MlEndpoint::PredictDropout, &json!({})).await.is_none());
    }

    #[tokio::test]
    async fn test_try_call_returns_body() {
        let ml = StubPredictionService::offline()
            .with(MlEndpoint::PredictDropout, json!({ "dropout_risk": 0.2 }));
        let body = try_call(&ml, MlEndpoint::PredictDropout, &json!({})).await.unwrap();
        assert_eq!(body["dropout_risk"], 0.2);
    }
}

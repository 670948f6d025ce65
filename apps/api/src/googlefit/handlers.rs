use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::googlefit::client::{FitDataKind, GoogleFitClient, GoogleFitError};
use crate::googlefit::summary::{summarize, AggregateResponse, FitSummary};
use crate::googlefit::tokens::{
    clear_connection, find_connection, save_tokens, touch_last_sync, valid_access_token, TokenError,
};
use crate::models::googlefit::GoogleFitDataRow;
use crate::state::AppState;

const STATE_PURPOSE: &str = "google_fit";
const CACHE_TTL_MINUTES: i64 = 60;
const DEFAULT_DAYS: i64 = 7;
const MAX_DAYS: i64 = 90;

// ────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VitalsSyncRequest {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitDataResponse {
    pub success: bool,
    pub data_type: &'static str,
    pub data: Value,
    pub cached: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct VitalsSyncResponse {
    pub success: bool,
    pub vitals: FitVitals,
    pub source: &'static str,
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FitVitals {
    pub heart_rate: Option<i64>,
    pub resting_heart_rate: Option<i64>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub body_fat: Option<f64>,
}

/// Combines heart-rate and body summaries into one vitals snapshot.
pub fn merge_vitals(heart: &FitSummary, body: &FitSummary) -> FitVitals {
    let mut vitals = FitVitals::default();
    if let FitSummary::HeartRate {
        heart_rate,
        resting_heart_rate,
        ..
    } = heart
    {
        vitals.heart_rate = *heart_rate;
        vitals.resting_heart_rate = *resting_heart_rate;
    }
    if let FitSummary::Body {
        weight,
        height,
        body_fat,
        ..
    } = body
    {
        vitals.weight = *weight;
        vitals.height = *height;
        vitals.body_fat = *body_fat;
    }
    vitals
}

/// Front-end page the OAuth callback lands on, with `outcome` as its query.
pub fn insights_redirect(public_base_url: &str, outcome: &str) -> String {
    format!(
        "{}/dashboard/insights?{outcome}",
        public_base_url.trim_end_matches('/')
    )
}

fn window_days(days: Option<i64>) -> i64 {
    days.filter(|d| *d > 0).unwrap_or(DEFAULT_DAYS).min(MAX_DAYS)
}

fn require_client(state: &AppState) -> Result<&GoogleFitClient, AppError> {
    state
        .google_fit
        .as_ref()
        .ok_or_else(|| AppError::NotConfigured("Google Fit not configured".to_string()))
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Database(e) => AppError::Database(e),
            TokenError::GoogleFit(e) if e.needs_reauth() => AppError::validation(
                "Google Fit authorization expired or missing. Please reconnect.",
            ),
            TokenError::GoogleFit(e) => AppError::Upstream(e.to_string()),
        }
    }
}

impl From<GoogleFitError> for AppError {
    fn from(e: GoogleFitError) -> Self {
        TokenError::GoogleFit(e).into()
    }
}

async fn fetch_summary(
    state: &AppState,
    client: &GoogleFitClient,
    user_id: Uuid,
    kind: FitDataKind,
    days: i64,
) -> Result<FitSummary, AppError> {
    let token = valid_access_token(&state.db, client, user_id).await?;
    let end = Utc::now();
    let start = end - Duration::days(days);
    let raw = client.aggregate(&token, kind, start, end).await?;
    let parsed: AggregateResponse = serde_json::from_value(raw).unwrap_or_else(|e| {
        warn!("Unexpected Google Fit {} payload: {e}", kind.as_str());
        AggregateResponse::default()
    });
    Ok(summarize(kind, &parsed))
}

// ────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────

/// GET /api/googlefit/connect
pub async fn handle_connect(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Redirect, AppError> {
    let client = require_client(&state)?;
    let signed_state = state
        .sessions
        .issue_state(user.id, STATE_PURPOSE)
        .map_err(|e| AppError::Internal(e.into()))?;
    let url = client.authorize_url(&signed_state)?;
    info!("Redirecting user {} to Google Fit consent", user.id);
    Ok(Redirect::temporary(url.as_str()))
}

/// GET /api/auth/callback/google-fit
///
/// Always answers with a redirect to the insights page; failures travel in
/// the `error` query parameter.
pub async fn handle_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    let base = state.config.public_base_url.clone();
    let outcome = match complete_callback(&state, query).await {
        Ok(user_id) => {
            info!("Google Fit connected for user {user_id}");
            "connected=true".to_string()
        }
        Err(reason) => format!("error={reason}"),
    };
    Redirect::temporary(&insights_redirect(&base, &outcome))
}

async fn complete_callback(state: &AppState, query: CallbackQuery) -> Result<Uuid, &'static str> {
    if let Some(err) = query.error {
        warn!("Google Fit OAuth error: {err}");
        return Err("oauth_error");
    }
    let code = query.code.filter(|c| !c.is_empty()).ok_or("missing_code")?;
    let user_id = query
        .state
        .as_deref()
        .and_then(|s| state.sessions.verify_state(s, STATE_PURPOSE).ok())
        .ok_or("invalid_state")?;
    let client = state.google_fit.as_ref().ok_or("not_configured")?;

    let tokens = client.exchange_code(&code).await.map_err(|e| {
        error!("Google Fit token exchange failed: {e}");
        "token_error"
    })?;

    save_tokens(&state.db, user_id, &tokens).await.map_err(|e| {
        error!("Failed to store Google Fit tokens: {e}");
        "connection_failed"
    })?;

    Ok(user_id)
}

/// POST /api/googlefit/disconnect
pub async fn handle_disconnect(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    if let Some(token) = find_connection(&state.db, user.id)
        .await?
        .and_then(|c| c.access_token)
    {
        if let Some(client) = state.google_fit.as_ref() {
            client.revoke(&token).await;
        }
    }

    clear_connection(&state.db, user.id).await?;
    info!("Google Fit disconnected for user {}", user.id);

    Ok(Json(MessageResponse {
        success: true,
        message: "Google Fit disconnected successfully",
    }))
}

/// GET /api/googlefit/data?type=activity|heart_rate|sleep|body&days=7
pub async fn handle_data(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DataQuery>,
) -> Result<Json<FitDataResponse>, AppError> {
    let kind = match query.data_type.as_deref() {
        None => FitDataKind::Activity,
        Some(raw) => FitDataKind::parse(raw).ok_or_else(|| AppError::validation("Invalid data type"))?,
    };
    let days = window_days(query.days);

    let cached = sqlx::query_as::<_, GoogleFitDataRow>(
        "SELECT * FROM google_fit_data
         WHERE user_id = $1 AND data_type = $2 AND synced_at >= $3
         ORDER BY synced_at DESC LIMIT 1",
    )
    .bind(user.id)
    .bind(kind.as_str())
    .bind(Utc::now() - Duration::minutes(CACHE_TTL_MINUTES))
    .fetch_optional(&state.db)
    .await?;

    if let Some(row) = cached {
        return Ok(Json(FitDataResponse {
            success: true,
            data_type: kind.as_str(),
            data: row.data,
            cached: true,
            synced_at: Some(row.synced_at),
        }));
    }

    let client = require_client(&state)?;
    let summary = fetch_summary(&state, client, user.id, kind, days).await?;
    let data = serde_json::to_value(&summary).map_err(|e| AppError::Internal(e.into()))?;

    let row = sqlx::query_as::<_, GoogleFitDataRow>(
        "INSERT INTO google_fit_data (id, user_id, data_type, date, data, source)
         VALUES ($1, $2, $3, NOW(), $4, 'google_fit')
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(kind.as_str())
    .bind(&data)
    .fetch_one(&state.db)
    .await?;

    touch_last_sync(&state.db, user.id).await?;

    Ok(Json(FitDataResponse {
        success: true,
        data_type: kind.as_str(),
        data,
        cached: false,
        synced_at: Some(row.synced_at),
    }))
}

/// POST /api/googlefit/vitals
pub async fn handle_sync_vitals(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<VitalsSyncRequest>>,
) -> Result<Json<VitalsSyncResponse>, AppError> {
    let client = require_client(&state)?;
    let days = window_days(body.and_then(|Json(b)| b.days));

    let heart = fetch_summary(&state, client, user.id, FitDataKind::HeartRate, days).await?;
    let body = fetch_summary(&state, client, user.id, FitDataKind::Body, days).await?;
    touch_last_sync(&state.db, user.id).await?;

    Ok(Json(VitalsSyncResponse {
        success: true,
        vitals: merge_vitals(&heart, &body),
        source: "google_fit",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insights_redirect() {
        assert_eq!(
            insights_redirect("https://app.example.com/", "connected=true"),
            "https://app.example.com/dashboard/insights?connected=true"
        );
        assert_eq!(
            insights_redirect("http://localhost:3000", "error=missing_code"),
            "http://localhost:3000/dashboard/insights?error=missing_code"
        );
    }

    #[test]
    fn test_window_days() {
        assert_eq!(window_days(None), 7);
        assert_eq!(window_days(Some(0)), 7);
        assert_eq!(window_days(Some(30)), 30);
        assert_eq!(window_days(Some(400)), 90);
    }

    #[test]
    fn test_merge_vitals() {
        let heart = FitSummary::HeartRate {
            heart_rate: Some(72),
            resting_heart_rate: Some(58),
            max_heart_rate: None,
            min_heart_rate: None,
        };
        let body = FitSummary::Body {
            weight: Some(70.5),
            height: Some(175.0),
            body_fat: None,
            bmi: Some(23.0),
        };
        assert_eq!(
            merge_vitals(&heart, &body),
            FitVitals {
                heart_rate: Some(72),
                resting_heart_rate: Some(58),
                weight: Some(70.5),
                height: Some(175.0),
                body_fat: None,
            }
        );
    }

    #[test]
    fn test_reauth_errors_map_to_bad_request() {
        let err: AppError = GoogleFitError::InvalidGrant.into();
        assert!(matches!(err, AppError::Validation(_)));
        let err: AppError = GoogleFitError::Api {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}

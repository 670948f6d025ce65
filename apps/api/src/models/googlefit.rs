use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Stored OAuth tokens for a user's Google Fit link.
/// Tokens are never serialized into API responses.
#[derive(Debug, Clone, FromRow)]
pub struct GoogleFitConnectionRow {
    pub user_id: Uuid,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expiry: Option<DateTime<Utc>>,
    pub is_connected: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GoogleFitDataRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub data_type: String,
    pub date: DateTime<Utc>,
    pub data: Value,
    pub source: String,
    pub synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

//! Stored Google Fit credentials and access-token renewal.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::googlefit::client::{GoogleFitClient, GoogleFitError, TokenResponse};
use crate::models::googlefit::GoogleFitConnectionRow;

/// Tokens are renewed this long before they expire.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

pub fn needs_refresh(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expiry {
        Some(at) => at <= now + Duration::minutes(EXPIRY_MARGIN_MINUTES),
        None => true,
    }
}

pub async fn find_connection(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<GoogleFitConnectionRow>, sqlx::Error> {
    sqlx::query_as::<_, GoogleFitConnectionRow>(
        "SELECT * FROM google_fit_connections WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Stores a freshly exchanged token set and marks the link connected.
/// A missing refresh token keeps the one already stored.
pub async fn save_tokens(
    pool: &PgPool,
    user_id: Uuid,
    tokens: &TokenResponse,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO google_fit_connections
             (user_id, access_token, refresh_token, token_expiry, is_connected, last_sync, scopes, updated_at)
         VALUES ($1, $2, $3, $4, TRUE, $5, $6, $5)
         ON CONFLICT (user_id) DO UPDATE SET
             access_token = EXCLUDED.access_token,
             refresh_token = COALESCE(EXCLUDED.refresh_token, google_fit_connections.refresh_token),
             token_expiry = EXCLUDED.token_expiry,
             is_connected = TRUE,
             last_sync = EXCLUDED.last_sync,
             scopes = CASE WHEN cardinality(EXCLUDED.scopes) > 0
                           THEN EXCLUDED.scopes ELSE google_fit_connections.scopes END,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(user_id)
    .bind(&tokens.access_token)
    .bind(tokens.refresh_token.as_deref())
    .bind(tokens.expires_at(now))
    .bind(now)
    .bind(tokens.scopes())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn clear_connection(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE google_fit_connections
         SET access_token = NULL, refresh_token = NULL, token_expiry = NULL,
             is_connected = FALSE, last_sync = NULL, scopes = '{}', updated_at = NOW()
         WHERE user_id = $1",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn mark_disconnected(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE google_fit_connections SET is_connected = FALSE, updated_at = NOW() WHERE user_id = $1",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn touch_last_sync(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE google_fit_connections SET last_sync = NOW() WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error(transparent)]
    GoogleFit(#[from] GoogleFitError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// An access token valid for at least the next few minutes, refreshing it when
/// needed. A rejected refresh token marks the link disconnected.
pub async fn valid_access_token(
    pool: &PgPool,
    client: &GoogleFitClient,
    user_id: Uuid,
) -> Result<String, TokenError> {
    let conn = find_connection(pool, user_id)
        .await?
        .filter(|c| c.is_connected)
        .ok_or(GoogleFitError::NotConnected)?;

    if let Some(token) = conn
        .access_token
        .as_ref()
        .filter(|_| !needs_refresh(conn.token_expiry, Utc::now()))
    {
        return Ok(token.clone());
    }

    let refresh_token = conn
        .refresh_token
        .as_deref()
        .ok_or(GoogleFitError::NotConnected)?;

    match client.refresh(refresh_token).await {
        Ok(tokens) => {
            save_tokens(pool, user_id, &tokens).await?;
            info!("Refreshed Google Fit token for user {user_id}");
            Ok(tokens.access_token)
        }
        Err(GoogleFitError::InvalidGrant) => {
            warn!("Google Fit refresh token rejected for user {user_id}; marking disconnected");
            mark_disconnected(pool, user_id).await?;
            Err(GoogleFitError::InvalidGrant.into())
        }
        Err(e) => Err(e.into()),
    }
}

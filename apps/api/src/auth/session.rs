//! Session tokens: HS256 JWTs signed with `SESSION_SECRET`.
//!
//! Two token shapes share the same key:
//! - session tokens (`SessionClaims`) presented as `Authorization: Bearer <token>`
//! - short-lived OAuth `state` values (`StateClaims`) that carry the caller id
//!   through a third-party redirect
//!
//! The shapes are disjoint: a state token has no `email`, so it never decodes as a
//! session, and a session has no `purpose`, so it never decodes as a state.

use axum::{async_trait, extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

const OAUTH_STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("token subject is not a valid user id")]
    InvalidSubject,

    #[error("state token issued for '{0}'")]
    WrongPurpose(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateClaims {
    pub sub: String,
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        let id = Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidSubject)?;
        Ok(AuthUser {
            id,
            email: data.claims.email,
        })
    }

    pub fn issue_state(&self, user_id: Uuid, purpose: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = StateClaims {
            sub: user_id.to_string(),
            purpose: purpose.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(OAUTH_STATE_TTL_MINUTES)).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn verify_state(&self, token: &str, purpose: &str) -> Result<Uuid, AuthError> {
        let data = decode::<StateClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        if data.claims.purpose != purpose {
            return Err(AuthError::WrongPurpose(data.claims.purpose));
        }
        Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidSubject)
    }
}

/// The authenticated caller, resolved from the bearer session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized)?;

        state.sessions.verify(token).map_err(|e| {
            debug!("Rejected session token: {e}");
            AppError::Unauthorized
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new("test-secret-value", 24)
    }

    #[test]
    fn test_issue_and_verify_session() {
        let sessions = manager();
        let user_id = Uuid::new_v4();
        let token = sessions.issue(user_id, "runner@example.com").unwrap();
        let user = sessions.verify(&token).unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.email, "runner@example.com");
    }

    #[test]
    fn test_rejects_token_signed_with_other_secret() {
        let token = SessionManager::new("other-secret", 24)
            .issue(Uuid::new_v4(), "a@b.c")
            .unwrap();
        assert!(manager().verify(&token).is_err());
    }

    #[test]
    fn test_rejects_expired_session() {
        let sessions = manager();
        let claims = SessionClaims {
            sub: Uuid::new_v4().to_string(),
            email: "a@b.c".to_string(),
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &sessions.encoding).unwrap();
        assert!(sessions.verify(&token).is_err());
    }

    #[test]
    fn test_state_token_is_not_a_session() {
        let sessions = manager();
        let state = sessions.issue_state(Uuid::new_v4(), "google_fit").unwrap();
        assert!(sessions.verify(&state).is_err());
    }

    #[test]
    fn test_state_purpose_is_checked() {
        let sessions = manager();
        let user_id = Uuid::new_v4();
        let state = sessions.issue_state(user_id, "google_fit").unwrap();
        assert_eq!(sessions.verify_state(&state, "google_fit").unwrap(), user_id);
        assert!(matches!(
            sessions.verify_state(&state, "strava"),
            Err(AuthError::WrongPurpose(_))
        ));
    }

    #[test]
    fn test_session_is_not_a_state() {
        let sessions = manager();
        let token = sessions.issue(Uuid::new_v4(), "a@b.c").unwrap();
        assert!(sessions.verify_state(&token, "google_fit").is_err());
    }
}

//! Account creation and credential sign-in. Both return a bearer session token.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::users::queries::find_user_by_email;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub user: SessionUser,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_signup(req: &SignupRequest) -> Result<(), AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    let email = normalize_email(&req.email);
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("A valid email is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// POST /api/auth/signup
pub async fn handle_signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    validate_signup(&req)?;
    let email = normalize_email(&req.email);

    if find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::validation("An account with this email already exists"));
    }

    // bcrypt is CPU-bound; run it on the blocking pool.
    let password = req.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in signup: {e}")))?
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?;

    let user_id = Uuid::new_v4();
    let name = req.name.trim().to_string();
    sqlx::query("INSERT INTO users (id, email, name, password_hash) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(&email)
        .bind(&name)
        .bind(&password_hash)
        .execute(&state.db)
        .await?;

    info!("Created account {user_id}");

    let token = state
        .sessions
        .issue(user_id, &email)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            success: true,
            token,
            user: SessionUser {
                id: user_id,
                name,
                email,
                avatar: None,
            },
        }),
    ))
}

/// POST /api/auth/signin
pub async fn handle_signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let user = find_user_by_email(&state.db, &normalize_email(&req.email))
        .await?
        .ok_or(AppError::Unauthorized)?;
    let stored_hash = user.password_hash.clone().ok_or(AppError::Unauthorized)?;

    let password = req.password.clone();
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in signin: {e}")))?
        .unwrap_or(false);

    if !valid {
        return Err(AppError::Unauthorized);
    }

    let token = state
        .sessions
        .issue(user.id, &user.email)
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(SessionResponse {
        success: true,
        token,
        user: SessionUser {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar: user.avatar,
        },
    }))
}

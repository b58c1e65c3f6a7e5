//! Registration, password login and token refresh.
//!
//! Passwords are hashed with bcrypt on the blocking pool; tokens come from the
//! shared `TokenIssuer` in `AppState`.

use crate::app_state::AppState;
use crate::domain::Credential;
use crate::error::ApiError;
use crate::handlers::shared_types::MessageResponse;
use crate::session::{Identity, TokenError, TokenPair};
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    // ---
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    // ---
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    // ---
    pub user: Identity,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

const INVALID_LOGIN: &str = "Invalid username or password";

// ============================================================================
// Handlers
// ============================================================================

/// POST /register
///
/// Creates a credential. Usernames and emails are unique across all users.
///
/// # Responses
/// - `201 Created` with `{ "message": ... }`
/// - `400 Bad Request` if a field is blank or the email has no `@`
/// - `409 Conflict` if the username or email is taken
#[tracing::instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    // ---
    let Json(req) = payload?;

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();

    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        tracing::warn!("Registration rejected: missing fields");
        return Err(ApiError::validation("Username, password and email are required"));
    }
    if !email.contains('@') {
        tracing::warn!("Registration rejected: malformed email");
        return Err(ApiError::validation("Email address is not valid"));
    }

    let password = req.password;
    let cost = state.bcrypt_cost();
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(|e| ApiError::Internal(e.into()))?;

    state
        .repository()
        .create_credential(Credential::new(username.clone(), email, password_hash))
        .await?;

    state.metrics().record_registration();
    tracing::info!("Registered user {}", username);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

/// POST /login
///
/// Verifies the password and hands out an access/refresh token pair.
/// Unknown usernames and wrong passwords are indistinguishable to the caller.
#[tracing::instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    // ---
    let Json(req) = payload?;

    let credential = state
        .repository()
        .get_credential_by_username(req.username.trim())
        .await?;

    let Some(credential) = credential else {
        tracing::debug!("Login failed: unknown user");
        state.metrics().record_login(false);
        return Err(ApiError::validation(INVALID_LOGIN));
    };

    let hash = credential.password_hash.clone();
    let password = req.password;
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(|e| ApiError::Internal(e.into()))?;

    if !verified {
        tracing::debug!("Login failed: bad password for {}", credential.username);
        state.metrics().record_login(false);
        return Err(ApiError::validation(INVALID_LOGIN));
    }

    let user = Identity {
        id: credential.id,
        username: credential.username,
        email: credential.email,
    };
    let pair = state
        .tokens()
        .issue_pair(&user)
        .map_err(|e| ApiError::Internal(e.into()))?;

    state.metrics().record_login(true);
    tracing::info!("User {} logged in", user.username);

    Ok(Json(LoginResponse {
        user,
        token: pair.token,
        refresh_token: pair.refresh_token,
    }))
}

/// POST /token
///
/// Exchanges a valid refresh token for a fresh pair with the same identity.
/// Anything wrong with the presented token is a 401.
#[tracing::instrument(skip(state, payload))]
pub async fn refresh_token(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    // ---
    let refresh_token = payload
        .ok()
        .and_then(|Json(req)| req.refresh_token)
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Refresh token is required".to_string()))?;

    let (identity, pair) = state.tokens().refresh(refresh_token.trim()).map_err(|e| match e {
        TokenError::Signing(_) => ApiError::Internal(e.into()),
        other => {
            tracing::debug!("Refresh rejected: {}", other);
            ApiError::Unauthorized("Invalid or expired refresh token".to_string())
        }
    })?;

    tracing::debug!("Refreshed tokens for {}", identity.username);
    Ok(Json(pair))
}

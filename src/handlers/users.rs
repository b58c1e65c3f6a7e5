//! Profile documents: create, read and partial update.

use crate::app_state::AppState;
use crate::domain::{Profile, ProfileUpdate};
use crate::error::ApiError;
use crate::session::AuthenticatedUser;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProfileRequest {
    // ---
    /// Defaults to the caller's id; if given it must match it.
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Defaults to the email carried by the caller's token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Loads a profile or fails with 404.
pub(super) async fn load_profile(state: &AppState, id: Uuid) -> Result<Profile, ApiError> {
    // ---
    state
        .repository()
        .get_profile(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

/// Writes a whole profile document back. A profile that vanished in between is a 404.
pub(super) async fn store_profile(state: &AppState, profile: &Profile) -> Result<(), ApiError> {
    // ---
    if state.repository().save_profile(profile).await? {
        Ok(())
    } else {
        Err(ApiError::not_found("User"))
    }
}

/// POST /users
///
/// Creates the caller's profile with an empty item list.
#[tracing::instrument(skip(state, user, payload))]
pub async fn create_profile(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    payload: Result<Json<CreateProfileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    // ---
    let Json(req) = payload?;

    let id = req.id.unwrap_or(user.0.id);
    user.require_owner(id)?;

    let first_name = req.first_name.trim().to_string();
    let last_name = req.last_name.trim().to_string();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::validation("firstName and lastName are required"));
    }

    let email = req
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .unwrap_or_else(|| user.0.email.clone());

    let profile = Profile::new(id, first_name, last_name, email);
    state.repository().create_profile(&profile).await?;

    tracing::info!("Created profile {}", profile.id);
    Ok((StatusCode::CREATED, Json(profile)))
}

/// GET /users/{id}
#[tracing::instrument(skip(state, user))]
pub async fn get_profile(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Profile>, ApiError> {
    // ---
    user.require_owner(id)?;

    Ok(Json(load_profile(&state, id).await?))
}

/// PUT /users/{id}
///
/// Blank or absent fields keep their stored value.
#[tracing::instrument(skip(state, user, payload))]
pub async fn update_profile(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    // ---
    user.require_owner(id)?;
    let Json(update) = payload?;

    let mut profile = load_profile(&state, id).await?;
    profile.apply_update(update);
    store_profile(&state, &profile).await?;

    tracing::debug!("Updated profile {}", id);
    Ok(Json(profile))
}

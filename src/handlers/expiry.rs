use super::users::load_profile;
use crate::app_state::AppState;
use crate::domain::{expiring_items, ExpiringItem};
use crate::error::ApiError;
use crate::session::AuthenticatedUser;
use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

/// GET /users/{id}/items/expiring
///
/// Items whose warranty runs out within the next week, each annotated with
/// `daysUntilExpiry`. Computed against the server clock on every call.
#[tracing::instrument(skip(state, user))]
pub async fn expiring(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ExpiringItem>>, ApiError> {
    // ---
    user.require_owner(id)?;

    let profile = load_profile(&state, id).await?;
    Ok(Json(expiring_items(&profile.items, chrono::Utc::now())))
}

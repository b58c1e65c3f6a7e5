//! Items embedded in a profile: list, add, edit, delete and bulk sync.
//!
//! Add and edit take `multipart/form-data` so photos and receipts travel with
//! the fields. Every write loads the whole profile, changes it in memory and
//! saves it back.

use super::users::{load_profile, store_profile};
use crate::app_state::AppState;
use crate::domain::{parse_expiry_date, Item, ItemPatch, Profile};
use crate::error::ApiError;
use crate::handlers::shared_types::{DeleteItemResponse, MessageResponse};
use crate::session::AuthenticatedUser;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

// ============================================================================
// Multipart form
// ============================================================================

/// A file part of the item form.
#[derive(Debug)]
struct Upload {
    file_name: String,
    bytes: Bytes,
}

/// Raw item form fields. Everything is optional here; each handler decides
/// what is required.
#[derive(Debug, Default)]
struct ItemForm {
    id: Option<String>,
    name: Option<String>,
    manufacturer: Option<String>,
    warranty_expiry_date: Option<String>,
    notes: Option<String>,
    product_image: Option<Upload>,
    receipt_image: Option<Upload>,
}

async fn read_item_form(mut multipart: Multipart) -> Result<ItemForm, ApiError> {
    // ---
    let mut form = ItemForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "productImage" | "receiptImage" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;

                // An empty file input still submits a part with no content.
                if bytes.is_empty() {
                    continue;
                }

                let slot = if name == "productImage" {
                    &mut form.product_image
                } else {
                    &mut form.receipt_image
                };
                if slot.is_some() {
                    return Err(ApiError::validation(format!(
                        "Only one {name} may be uploaded"
                    )));
                }
                *slot = Some(Upload { file_name, bytes });
            }
            _ => {
                let value = field.text().await?;
                match name.as_str() {
                    "id" | "_id" => form.id = Some(value),
                    "name" => form.name = Some(value),
                    "manufacturer" => form.manufacturer = Some(value),
                    "warrantyExpiryDate" => form.warranty_expiry_date = Some(value),
                    "notes" => form.notes = Some(value),
                    other => tracing::debug!("Ignoring unknown form field {}", other),
                }
            }
        }
    }

    Ok(form)
}

fn non_blank(value: Option<String>) -> Option<String> {
    // ---
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    // ---
    non_blank(value).ok_or_else(|| ApiError::validation(format!("{field} is required")))
}

fn expiry_date(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, ApiError> {
    // ---
    parse_expiry_date(raw)
        .ok_or_else(|| ApiError::validation(format!("warrantyExpiryDate is not a valid date: {raw}")))
}

async fn store_upload(state: &AppState, upload: Option<Upload>) -> Result<Option<String>, ApiError> {
    // ---
    match upload {
        Some(upload) => {
            let path = state
                .attachments()
                .save(&upload.file_name, &upload.bytes)
                .await
                .map_err(ApiError::Internal)?;
            Ok(Some(path))
        }
        None => Ok(None),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /users/{id}/items
#[tracing::instrument(skip(state, user))]
pub async fn list_items(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Item>>, ApiError> {
    // ---
    user.require_owner(id)?;

    Ok(Json(load_profile(&state, id).await?.items))
}

/// POST /users/{id}/items
///
/// Adds an item. `name`, `manufacturer` and `warrantyExpiryDate` are required.
///
/// A client may supply the item `id`. If the profile already holds an item
/// with that id the request is a replay: it is acknowledged with `200 OK`,
/// nothing is written, and uploaded files are discarded.
///
/// # Responses
/// - `201 Created` with the updated profile
/// - `200 OK` with the unchanged profile on replay
/// - `400 Bad Request` on missing or malformed fields
/// - `404 Not Found` if the profile does not exist
#[tracing::instrument(skip(state, user, multipart))]
pub async fn add_item(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
    // ---
    user.require_owner(id)?;
    let form = read_item_form(multipart?).await?;

    let name = required(form.name, "name")?;
    let manufacturer = required(form.manufacturer, "manufacturer")?;
    let warranty_expiry_date = expiry_date(&required(form.warranty_expiry_date, "warrantyExpiryDate")?)?;

    let item_id = match non_blank(form.id) {
        Some(raw) => Uuid::parse_str(&raw)
            .map_err(|_| ApiError::validation(format!("Item id is not a valid UUID: {raw}")))?,
        None => Uuid::new_v4(),
    };

    let mut profile = load_profile(&state, id).await?;

    if profile.item(item_id).is_some() {
        tracing::info!("Item {} already stored, acknowledging replay", item_id);
        return Ok((StatusCode::OK, Json(profile)));
    }

    let item = Item {
        id: item_id,
        name,
        manufacturer,
        warranty_expiry_date,
        product_image: store_upload(&state, form.product_image).await?,
        receipt_image: store_upload(&state, form.receipt_image).await?,
        notes: non_blank(form.notes),
    };

    profile.add_item(item);
    store_profile(&state, &profile).await?;

    state.metrics().record_item_created();
    tracing::info!("Added item {} to profile {}", item_id, id);

    Ok((StatusCode::CREATED, Json(profile)))
}

/// PUT /users/{id}/items/{item_id}
///
/// Partial update. Blank fields leave the stored value alone; a new file
/// replaces the stored path.
#[tracing::instrument(skip(state, user, multipart))]
pub async fn update_item(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Item>, ApiError> {
    // ---
    user.require_owner(id)?;
    let form = read_item_form(multipart?).await?;

    let warranty_expiry_date = match non_blank(form.warranty_expiry_date) {
        Some(raw) => Some(expiry_date(&raw)?),
        None => None,
    };

    let mut profile = load_profile(&state, id).await?;
    if profile.item(item_id).is_none() {
        return Err(ApiError::not_found("Item"));
    }

    let patch = ItemPatch {
        name: form.name,
        manufacturer: form.manufacturer,
        warranty_expiry_date,
        notes: form.notes,
        product_image: store_upload(&state, form.product_image).await?,
        receipt_image: store_upload(&state, form.receipt_image).await?,
    };

    let item = profile
        .update_item(item_id, patch)
        .cloned()
        .ok_or_else(|| ApiError::not_found("Item"))?;
    store_profile(&state, &profile).await?;

    tracing::debug!("Updated item {} in profile {}", item_id, id);
    Ok(Json(item))
}

/// DELETE /users/{id}/items/{item_id}
///
/// Stored image files are left on disk.
#[tracing::instrument(skip(state, user))]
pub async fn delete_item(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<DeleteItemResponse>, ApiError> {
    // ---
    user.require_owner(id)?;

    let mut profile = load_profile(&state, id).await?;
    if profile.remove_item(item_id).is_none() {
        return Err(ApiError::not_found("Item"));
    }
    store_profile(&state, &profile).await?;

    tracing::info!("Deleted item {} from profile {}", item_id, id);
    Ok(Json(DeleteItemResponse {
        message: "Item deleted successfully".to_string(),
        user: profile,
    }))
}

/// POST /users/{id}/sync
///
/// Replaces the stored item list with the one in the body. Last writer wins.
/// Items sent without an id get one minted.
#[tracing::instrument(skip(state, user, payload))]
pub async fn sync_items(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<Vec<Item>>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    // ---
    user.require_owner(id)?;
    let Json(items) = payload?;

    let mut profile = load_profile(&state, id).await?;
    let count = items.len();
    profile.replace_items(items);
    store_profile(&state, &profile).await?;

    state.metrics().record_sync();
    tracing::info!("Synced {} items for profile {}", count, id);

    Ok(Json(MessageResponse::new("Sync successful")))
}

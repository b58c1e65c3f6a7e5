//! Typed HTTP calls against the Garant server.

use super::sync::ItemFields;
use super::{ClientConfig, ClientError, ClientResult};
use crate::domain::{ExpiringItem, Item, Profile, ProfileUpdate};
use crate::error::ErrorResponse;
use crate::handlers::{
    CreateProfileRequest, DeleteItemResponse, LoginRequest, LoginResponse, MessageResponse,
    RefreshRequest, RegisterRequest,
};
use crate::session::TokenPair;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

pub struct ApiClient {
    // ---
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    // ---
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        // ---
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Protocol)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        // ---
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request and turns non-success statuses into `Rejected`,
    /// carrying the server's error message when the body has one.
    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        // ---
        let response = request.send().await.map_err(ClientError::Offline)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|err| err.message)
            .unwrap_or(body);

        tracing::debug!("Request rejected with {}: {}", status, message);
        Err(ClientError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        // ---
        self.send(request)
            .await?
            .json()
            .await
            .map_err(ClientError::Protocol)
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    pub async fn register(&self, username: &str, password: &str, email: &str) -> ClientResult<MessageResponse> {
        // ---
        let body = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
        };
        self.fetch(self.http.post(self.url("/register")).json(&body)).await
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<LoginResponse> {
        // ---
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.fetch(self.http.post(self.url("/login")).json(&body)).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> ClientResult<TokenPair> {
        // ---
        let body = RefreshRequest {
            refresh_token: Some(refresh_token.to_string()),
        };
        self.fetch(self.http.post(self.url("/token")).json(&body)).await
    }

    // ------------------------------------------------------------------------
    // Profiles
    // ------------------------------------------------------------------------

    pub async fn create_profile(&self, token: &str, request: &CreateProfileRequest) -> ClientResult<Profile> {
        // ---
        self.fetch(self.http.post(self.url("/users")).bearer_auth(token).json(request))
            .await
    }

    pub async fn get_profile(&self, token: &str, user_id: Uuid) -> ClientResult<Profile> {
        // ---
        self.fetch(self.http.get(self.url(&format!("/users/{user_id}"))).bearer_auth(token))
            .await
    }

    pub async fn update_profile(&self, token: &str, user_id: Uuid, update: &ProfileUpdate) -> ClientResult<Profile> {
        // ---
        let url = self.url(&format!("/users/{user_id}"));
        self.fetch(self.http.put(url).bearer_auth(token).json(update)).await
    }

    // ------------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------------

    pub async fn list_items(&self, token: &str, user_id: Uuid) -> ClientResult<Vec<Item>> {
        // ---
        let url = self.url(&format!("/users/{user_id}/items"));
        self.fetch(self.http.get(url).bearer_auth(token)).await
    }

    /// Adds an item under a client-chosen id. Returns the status (201 for a
    /// new item, 200 for a replay) and the profile.
    pub async fn add_item(
        &self,
        token: &str,
        user_id: Uuid,
        item_id: Uuid,
        fields: &ItemFields,
    ) -> ClientResult<(StatusCode, Profile)> {
        // ---
        let form = item_form(fields)?.text("id", item_id.to_string());
        let url = self.url(&format!("/users/{user_id}/items"));

        let response = self
            .send(self.http.post(url).bearer_auth(token).multipart(form))
            .await?;
        let status = response.status();
        let profile = response.json().await.map_err(ClientError::Protocol)?;

        Ok((status, profile))
    }

    pub async fn update_item(
        &self,
        token: &str,
        user_id: Uuid,
        item_id: Uuid,
        fields: &ItemFields,
    ) -> ClientResult<Item> {
        // ---
        let form = item_form(fields)?;
        let url = self.url(&format!("/users/{user_id}/items/{item_id}"));
        self.fetch(self.http.put(url).bearer_auth(token).multipart(form))
            .await
    }

    pub async fn delete_item(&self, token: &str, user_id: Uuid, item_id: Uuid) -> ClientResult<DeleteItemResponse> {
        // ---
        let url = self.url(&format!("/users/{user_id}/items/{item_id}"));
        self.fetch(self.http.delete(url).bearer_auth(token)).await
    }

    pub async fn sync_items(&self, token: &str, user_id: Uuid, items: &[Item]) -> ClientResult<MessageResponse> {
        // ---
        let url = self.url(&format!("/users/{user_id}/sync"));
        self.fetch(self.http.post(url).bearer_auth(token).json(items)).await
    }

    pub async fn expiring(&self, token: &str, user_id: Uuid) -> ClientResult<Vec<ExpiringItem>> {
        // ---
        let url = self.url(&format!("/users/{user_id}/items/expiring"));
        self.fetch(self.http.get(url).bearer_auth(token)).await
    }
}

/// Builds the multipart body shared by item create and update. Absent fields
/// are left out, which the server treats as "unchanged".
fn item_form(fields: &ItemFields) -> ClientResult<Form> {
    // ---
    let mut form = Form::new();

    if let Some(name) = &fields.name {
        form = form.text("name", name.clone());
    }
    if let Some(manufacturer) = &fields.manufacturer {
        form = form.text("manufacturer", manufacturer.clone());
    }
    if let Some(date) = &fields.warranty_expiry_date {
        form = form.text("warrantyExpiryDate", date.to_rfc3339());
    }
    if let Some(notes) = &fields.notes {
        form = form.text("notes", notes.clone());
    }
    if let Some(image) = &fields.product_image {
        form = form.part("productImage", Part::bytes(image.bytes()?).file_name(image.file_name.clone()));
    }
    if let Some(image) = &fields.receipt_image {
        form = form.part("receiptImage", Part::bytes(image.bytes()?).file_name(image.file_name.clone()));
    }

    Ok(form)
}

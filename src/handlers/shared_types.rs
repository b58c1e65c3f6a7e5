use crate::domain::Profile;
use serde::{Deserialize, Serialize};

/// Body of responses that only carry a confirmation.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        // ---
        Self {
            message: message.into(),
        }
    }
}

/// Response to an item deletion: a confirmation plus the updated profile.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteItemResponse {
    pub message: String,
    pub user: Profile,
}

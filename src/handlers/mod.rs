// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod auth;
mod expiry;
mod health;
mod items;
mod metrics;
mod root;
mod shared_types;
mod users;

// Core handlers
pub use health::health_check;
pub use metrics::{metrics_handler, track_http_metrics};
pub use root::root_handler;

// Auth handlers
pub use auth::{
    login, refresh_token, register, LoginRequest, LoginResponse, RefreshRequest, RegisterRequest,
};

// Profile handlers
pub use users::{create_profile, get_profile, update_profile, CreateProfileRequest};

// Item handlers
pub use items::{add_item, delete_item, list_items, sync_items, update_item};

// Expiry handlers
pub use expiry::expiring;

pub use shared_types::{DeleteItemResponse, MessageResponse};

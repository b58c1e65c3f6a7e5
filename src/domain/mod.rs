mod expiry;
mod metrics;
mod models;
mod repository;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr};

// Publicly expose the document model and the pure expiry view over it
pub use expiry::{days_until_expiry, expiring_items, ExpiringItem, EXPIRY_WINDOW_DAYS};
pub use models::{parse_expiry_date, Credential, Item, ItemPatch, Profile, ProfileUpdate};

// Publicly expose storage abstractions
pub use repository::{Repository, RepositoryPtr, StoreError, StoreResult};

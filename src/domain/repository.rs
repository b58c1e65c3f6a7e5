use super::models::{Credential, Profile};
use std::sync::Arc;
use uuid::Uuid;

/// Failures surfaced by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique field (username, email, profile id) is already taken.
    #[error("{0} already exists")]
    Conflict(&'static str),

    /// Anything else the backend reports, passed through unchanged.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Abstraction over the credential store and the profile document store.
///
/// Profiles are read and written as whole documents: item mutations load the
/// profile, change the embedded list, and save it back. Concurrent writers to
/// the same profile resolve as last-writer-wins.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    // ---
    /// Insert a credential record. Fails with `Conflict` on duplicate username or email.
    async fn create_credential(&self, credential: Credential) -> StoreResult<()>;

    /// Look up a credential by username.
    async fn get_credential_by_username(&self, username: &str) -> StoreResult<Option<Credential>>;

    /// Insert a new profile document. Fails with `Conflict` if the id is taken.
    async fn create_profile(&self, profile: &Profile) -> StoreResult<()>;

    /// Load a profile document by id.
    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;

    /// Overwrite an existing profile document. Returns `false` if it does not exist.
    async fn save_profile(&self, profile: &Profile) -> StoreResult<bool>;

    /// Cheap round trip used by the full health check.
    async fn ping(&self) -> StoreResult<()>;
}

/// Type alias for any backend that implements Repository.
pub type RepositoryPtr = Arc<dyn Repository>;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{Credential, Profile, Repository, RepositoryPtr, StoreError, StoreResult};

/// Creates an empty in-process store. Contents are lost on restart.
pub fn create_memory_repository() -> RepositoryPtr {
    // ---
    Arc::new(MemoryRepository::default())
}

#[derive(Default)]
pub struct MemoryRepository {
    // ---
    /// Keyed by username.
    credentials: RwLock<HashMap<String, Credential>>,
    profiles: RwLock<HashMap<Uuid, Profile>>,
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    // ---
    async fn create_credential(&self, credential: Credential) -> StoreResult<()> {
        // ---
        let mut credentials = self.credentials.write().await;

        if credentials.contains_key(&credential.username) {
            return Err(StoreError::Conflict("username"));
        }
        if credentials.values().any(|c| c.email == credential.email) {
            return Err(StoreError::Conflict("email"));
        }

        credentials.insert(credential.username.clone(), credential);
        Ok(())
    }

    async fn get_credential_by_username(&self, username: &str) -> StoreResult<Option<Credential>> {
        // ---
        Ok(self.credentials.read().await.get(username).cloned())
    }

    async fn create_profile(&self, profile: &Profile) -> StoreResult<()> {
        // ---
        let mut profiles = self.profiles.write().await;

        if profiles.contains_key(&profile.id) {
            return Err(StoreError::Conflict("profile"));
        }

        profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn get_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        // ---
        Ok(self.profiles.read().await.get(&id).cloned())
    }

    async fn save_profile(&self, profile: &Profile) -> StoreResult<bool> {
        // ---
        let mut profiles = self.profiles.write().await;

        match profiles.get_mut(&profile.id) {
            Some(stored) => {
                *stored = profile.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

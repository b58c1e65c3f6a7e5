//! Application state management.
//!
//! This module defines the shared state structure that gets passed to all
//! Axum handlers via the `State` extractor. The `AppState` contains shared
//! resources like the document store, metrics implementation, token issuer,
//! and attachment storage.
//!
//! The state is cheaply cloneable (using `Arc` internally) so it can be
//! passed to each request handler without copying resources.

use crate::domain::{MetricsPtr, RepositoryPtr};
use crate::infrastructure::AttachmentStore;
use crate::session::TokenIssuer;
use std::sync::Arc;

/// Shared application state passed to all Axum handlers.
///
/// This struct serves as the Dependency Injection container for the application.
///
/// # Design Principles
///
/// - **Dependency Inversion**: Handlers depend on abstractions (Repository trait),
///   not concrete implementations (PostgresRepository, MemoryRepository).
/// - **Immutable After Initialization**: State is built once at startup and
///   never mutated. Each request reads and writes whole profile documents.
/// - **Cheap Cloning**: All heavy resources are wrapped in `Arc`.
///
/// # Fields
///
/// - `metrics`: Metrics implementation for observability (Prometheus or no-op)
/// - `repository`: Credential and profile document storage
/// - `tokens`: Access/refresh token signer and verifier
/// - `attachments`: On-disk storage for product and receipt images
/// - `bcrypt_cost`: Work factor for password hashing
#[derive(Clone)]
pub(crate) struct AppState {
    /// Metrics implementation for recording application events.
    metrics: MetricsPtr,

    /// Repository abstraction for credentials and profile documents.
    repository: RepositoryPtr,

    /// Token issuer; holds the signing keys, so it is shared rather than copied.
    tokens: Arc<TokenIssuer>,

    /// Where uploaded images are written.
    attachments: Arc<AttachmentStore>,

    /// bcrypt work factor used at registration.
    bcrypt_cost: u32,
}

impl AppState {
    // ---

    pub fn new(
        metrics: MetricsPtr,
        repository: RepositoryPtr,
        tokens: Arc<TokenIssuer>,
        attachments: Arc<AttachmentStore>,
        bcrypt_cost: u32,
    ) -> Self {
        // ---
        AppState {
            metrics,
            repository,
            tokens,
            attachments,
            bcrypt_cost,
        }
    }

    /// Get a reference to the metrics implementation.
    pub(crate) fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    /// Get a reference to the repository implementation.
    pub(crate) fn repository(&self) -> &RepositoryPtr {
        // ---
        &self.repository
    }

    /// Get a reference to the token issuer.
    pub(crate) fn tokens(&self) -> &TokenIssuer {
        // ---
        &self.tokens
    }

    /// Get a reference to the attachment store.
    pub(crate) fn attachments(&self) -> &AttachmentStore {
        // ---
        &self.attachments
    }

    /// Get the bcrypt work factor.
    pub(crate) fn bcrypt_cost(&self) -> u32 {
        // ---
        self.bcrypt_cost
    }
}

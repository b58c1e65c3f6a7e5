//! Offline-first client for the Garant API.
//!
//! The client keeps a local copy of the user's items and a queue of changes
//! made while the server was unreachable. Everything is persisted in one JSON
//! file so a restart loses nothing.
//!
//! - [`LocalStore`]: keyed JSON records on disk.
//! - [`ApiClient`]: typed HTTP calls for every server endpoint.
//! - [`Session`]: token lifecycle (restore, silent refresh, login, logout).
//! - [`Reconciler`]: optimistic local edits plus ordered replay.

mod api;
mod session;
mod store;
mod sync;

pub use api::ApiClient;
pub use session::{Session, SessionState, StoredSession};
pub use store::{LocalStore, AUTH_TOKENS_RECORD, ITEMS_RECORD, OUTBOX_RECORD};
pub use sync::{
    CachedItem, FlushReport, InlineImage, ItemFields, Mutation, Outbox, PendingMutation,
    Reconciler, SyncState,
};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never got a response: connection refused, DNS, timeout.
    #[error("server unreachable: {0}")]
    Offline(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A response arrived but could not be read, or the HTTP client could not be built.
    #[error("unexpected response: {0}")]
    Protocol(#[source] reqwest::Error),

    #[error("login required")]
    LoginRequired,

    /// A mutation that cannot be applied, e.g. a new item without a name.
    #[error("invalid mutation: {0}")]
    Invalid(String),

    #[error("local store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("local store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl ClientError {
    // ---
    /// HTTP status of a rejection, if this is one.
    pub fn status(&self) -> Option<u16> {
        // ---
        match self {
            ClientError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Worth retrying later: the server was unreachable or failed on its side.
    pub fn is_transient(&self) -> bool {
        // ---
        match self {
            ClientError::Offline(_) => true,
            ClientError::Rejected { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

// ============================================================================
// Configuration
// ============================================================================

/// Bounded exponential backoff for replaying queued changes.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per change, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // ---
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    // ---
    /// Delay after the given failed attempt (1-based): initial, 2x, 4x, ... capped.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        // ---
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,
    /// File holding tokens, cached items and the outbox.
    pub state_path: PathBuf,
    /// Per-request timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, state_path: impl Into<PathBuf>) -> Self {
        // ---
        Self {
            base_url: base_url.into(),
            state_path: state_path.into(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// The assembled client: one store, one HTTP client, shared by the session
/// and the reconciler.
pub struct GarantClient {
    pub api: Arc<ApiClient>,
    pub store: Arc<LocalStore>,
    pub session: Arc<Session>,
    pub reconciler: Arc<Reconciler>,
}

impl GarantClient {
    /// Opens the local state file and builds the components. Does not touch
    /// the network; call `session.init()` next.
    pub async fn open(config: ClientConfig) -> ClientResult<Self> {
        // ---
        let api = Arc::new(ApiClient::new(&config)?);
        let store = Arc::new(LocalStore::open(&config.state_path).await?);
        let session = Arc::new(Session::new(api.clone(), store.clone()));
        let reconciler = Arc::new(Reconciler::new(
            api.clone(),
            session.clone(),
            store.clone(),
            config.retry,
        ));

        Ok(Self {
            api,
            store,
            session,
            reconciler,
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        // ---
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };

        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(4), Duration::from_millis(500));
        assert_eq!(policy.delay_after(40), Duration::from_millis(500));
    }

    #[test]
    fn only_server_side_failures_are_transient() {
        // ---
        let rejected = |status| ClientError::Rejected {
            status,
            message: String::new(),
        };

        assert!(rejected(503).is_transient());
        assert!(rejected(429).is_transient());
        assert!(!rejected(400).is_transient());
        assert!(!rejected(404).is_transient());
        assert!(!ClientError::LoginRequired.is_transient());
        assert_eq!(rejected(409).status(), Some(409));
    }
}

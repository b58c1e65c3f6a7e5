//! Client-side token lifecycle.

use super::store::{AUTH_TOKENS_RECORD, ITEMS_RECORD, OUTBOX_RECORD};
use super::{ApiClient, ClientError, ClientResult, LocalStore, Outbox};
use crate::session::{peek_claims, Identity};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Tokens are refreshed this many seconds before they actually expire.
const EXPIRY_SKEW_SECS: i64 = 30;

/// What the `authTokens` record holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub user: Identity,
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoginRequired,
    Active(Identity),
}

pub struct Session {
    // ---
    api: Arc<ApiClient>,
    store: Arc<LocalStore>,
    current: Mutex<Option<StoredSession>>,
}

/// True if the token is unreadable or expires within the skew window.
fn is_expired(token: &str) -> bool {
    // ---
    match peek_claims(token) {
        Ok(claims) => claims.exp <= Utc::now().timestamp() + EXPIRY_SKEW_SECS,
        Err(_) => true,
    }
}

impl Session {
    // ---
    pub fn new(api: Arc<ApiClient>, store: Arc<LocalStore>) -> Self {
        // ---
        Self {
            api,
            store,
            current: Mutex::new(None),
        }
    }

    /// Restores the persisted session, refreshing a stale access token.
    ///
    /// Tokens are discarded only when the server rejects the refresh; if it is
    /// unreachable they are kept for the next attempt.
    pub async fn init(&self) -> ClientResult<SessionState> {
        // ---
        let Some(stored) = self.store.get::<StoredSession>(AUTH_TOKENS_RECORD).await? else {
            tracing::debug!("No stored session");
            return Ok(SessionState::LoginRequired);
        };

        if !is_expired(&stored.token) {
            let user = stored.user.clone();
            *self.current.lock().await = Some(stored);
            return Ok(SessionState::Active(user));
        }

        let mut current = self.current.lock().await;
        match self.refresh_locked(&mut current, stored).await {
            Ok(session) => Ok(SessionState::Active(session.user)),
            Err(e) => {
                tracing::info!("Stored session could not be refreshed: {}", e);
                *current = None;
                Ok(SessionState::LoginRequired)
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Identity> {
        // ---
        let response = self.api.login(username, password).await?;
        let session = StoredSession {
            user: response.user,
            token: response.token,
            refresh_token: response.refresh_token,
        };

        // The cache and outbox stay only if this user recorded them.
        let owner = self
            .store
            .get::<Outbox>(OUTBOX_RECORD)
            .await?
            .and_then(|outbox| outbox.owner);
        if owner != Some(session.user.id) {
            if let Some(previous) = owner {
                tracing::info!("Discarding local items of previous user {}", previous);
            }
            self.store.delete_many(&[ITEMS_RECORD, OUTBOX_RECORD]).await?;
        }

        self.store.put(AUTH_TOKENS_RECORD, &session).await?;
        let user = session.user.clone();
        *self.current.lock().await = Some(session);

        tracing::info!("Logged in as {}", user.username);
        Ok(user)
    }

    /// Forgets the tokens and everything cached for this user, including
    /// changes that were never replayed.
    pub async fn logout(&self) -> ClientResult<()> {
        // ---
        *self.current.lock().await = None;
        self.store
            .delete_many(&[AUTH_TOKENS_RECORD, ITEMS_RECORD, OUTBOX_RECORD])
            .await
    }

    pub async fn state(&self) -> SessionState {
        // ---
        match self.current.lock().await.as_ref() {
            Some(session) => SessionState::Active(session.user.clone()),
            None => SessionState::LoginRequired,
        }
    }

    pub async fn user_id(&self) -> ClientResult<Uuid> {
        // ---
        self.current
            .lock()
            .await
            .as_ref()
            .map(|session| session.user.id)
            .ok_or(ClientError::LoginRequired)
    }

    /// A usable access token, refreshing it first if it is about to expire.
    pub async fn access_token(&self) -> ClientResult<String> {
        // ---
        let mut current = self.current.lock().await;
        let session = current.clone().ok_or(ClientError::LoginRequired)?;

        if !is_expired(&session.token) {
            return Ok(session.token);
        }

        Ok(self.refresh_locked(&mut current, session).await?.token)
    }

    /// Exchanges the refresh token. A rejection ends the session; being
    /// offline leaves it as it was.
    async fn refresh_locked(
        &self,
        current: &mut Option<StoredSession>,
        stale: StoredSession,
    ) -> ClientResult<StoredSession> {
        // ---
        match self.api.refresh(&stale.refresh_token).await {
            Ok(pair) => {
                let session = StoredSession {
                    user: stale.user,
                    token: pair.token,
                    refresh_token: pair.refresh_token,
                };
                self.store.put(AUTH_TOKENS_RECORD, &session).await?;
                *current = Some(session.clone());
                tracing::debug!("Access token refreshed");
                Ok(session)
            }
            Err(e @ ClientError::Rejected { .. }) => {
                tracing::warn!("Refresh token rejected, login required: {}", e);
                *current = None;
                self.store.delete(AUTH_TOKENS_RECORD).await?;
                Err(ClientError::LoginRequired)
            }
            Err(e) => {
                *current = Some(stale);
                Err(e)
            }
        }
    }
}

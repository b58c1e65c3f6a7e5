//! A small keyed record store persisted as one JSON document.

use super::ClientResult;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Access/refresh tokens and the identity they belong to.
pub const AUTH_TOKENS_RECORD: &str = "authTokens";
/// Cached item list, each tagged synced or pending.
pub const ITEMS_RECORD: &str = "items";
/// Queued changes awaiting replay.
pub const OUTBOX_RECORD: &str = "outbox";

pub struct LocalStore {
    // ---
    path: PathBuf,
    records: Mutex<Map<String, Value>>,
}

impl LocalStore {
    // ---
    /// Loads the document at `path`. A missing file is an empty store.
    pub async fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        // ---
        let path = path.as_ref().to_path_buf();

        let records = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Map::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("Opened local store {} ({} records)", path.display(), records.len());

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> ClientResult<Option<T>> {
        // ---
        let records = self.records.lock().await;
        match records.get(id) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub async fn put<T: Serialize>(&self, id: &str, value: &T) -> ClientResult<()> {
        // ---
        self.put_many(vec![(id, serde_json::to_value(value)?)]).await
    }

    /// Replaces several records with a single write, so they change together
    /// or not at all.
    pub async fn put_many(&self, entries: Vec<(&str, Value)>) -> ClientResult<()> {
        // ---
        let mut staged = self.records.lock().await;
        let mut records = staged.clone();
        for (id, value) in entries {
            records.insert(id.to_string(), value);
        }

        self.persist(&records).await?;
        *staged = records;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        // ---
        self.delete_many(&[id]).await
    }

    pub async fn delete_many(&self, ids: &[&str]) -> ClientResult<()> {
        // ---
        let mut staged = self.records.lock().await;
        let mut records = staged.clone();
        let removed = ids.iter().filter(|id| records.remove(**id).is_some()).count();
        if removed == 0 {
            return Ok(());
        }

        self.persist(&records).await?;
        *staged = records;
        Ok(())
    }

    /// Writes the whole document to a sibling temp file, then renames it over
    /// the real one so readers never see a half-written file.
    async fn persist(&self, records: &Map<String, Value>) -> ClientResult<()> {
        // ---
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(records)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

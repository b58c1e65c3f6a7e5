//! Offline edits and their replay.
//!
//! Every change the user makes is applied to the local item cache right away
//! and appended to the outbox with a sequence number. A flush replays the
//! outbox in order; each change the server confirms is removed and its item
//! is marked synced. New items carry a client-minted id, so replaying a create
//! the server already applied is harmless.

use super::store::{ITEMS_RECORD, OUTBOX_RECORD};
use super::{ApiClient, ClientError, ClientResult, LocalStore, RetryPolicy, Session};
use crate::domain::{Item, ItemPatch};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

// ============================================================================
// Cache and outbox records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Matches what the server last returned.
    Synced,
    /// Carries local changes the server has not confirmed yet.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedItem {
    #[serde(flatten)]
    pub item: Item,
    pub sync_state: SyncState,
}

impl CachedItem {
    pub fn synced(item: Item) -> Self {
        // ---
        Self {
            item,
            sync_state: SyncState::Synced,
        }
    }
}

/// An image staged with the change it belongs to, base64-encoded so the
/// outbox stays plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub file_name: String,
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(file_name: impl Into<String>, bytes: &[u8]) -> Self {
        // ---
        Self {
            file_name: file_name.into(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn bytes(&self) -> ClientResult<Vec<u8>> {
        // ---
        STANDARD
            .decode(&self.data)
            .map_err(|e| ClientError::Invalid(format!("image {} is not valid base64: {e}", self.file_name)))
    }
}

/// Item fields carried by a create or update. `None` means "not sent".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFields {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub warranty_expiry_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub product_image: Option<InlineImage>,
    pub receipt_image: Option<InlineImage>,
}

impl ItemFields {
    // ---
    fn patch(&self) -> ItemPatch {
        // ---
        ItemPatch {
            name: self.name.clone(),
            manufacturer: self.manufacturer.clone(),
            warranty_expiry_date: self.warranty_expiry_date,
            notes: self.notes.clone(),
            product_image: None,
            receipt_image: None,
        }
    }

    /// The item as the cache shows it before the server has seen it. Image
    /// paths stay empty until the upload is confirmed.
    fn new_item(&self, id: Uuid) -> ClientResult<Item> {
        // ---
        let required = |value: &Option<String>, field: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ClientError::Invalid(format!("{field} is required")))
        };

        Ok(Item {
            id,
            name: required(&self.name, "name")?,
            manufacturer: required(&self.manufacturer, "manufacturer")?,
            warranty_expiry_date: self
                .warranty_expiry_date
                .ok_or_else(|| ClientError::Invalid("warrantyExpiryDate is required".to_string()))?,
            product_image: None,
            receipt_image: None,
            notes: self.notes.clone().filter(|n| !n.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Mutation {
    Create { item_id: Uuid, fields: ItemFields },
    Update { item_id: Uuid, fields: ItemFields },
    Delete { item_id: Uuid },
}

impl Mutation {
    // ---
    /// A create under a freshly minted id.
    pub fn create(fields: ItemFields) -> Self {
        // ---
        Mutation::Create {
            item_id: Uuid::new_v4(),
            fields,
        }
    }

    pub fn item_id(&self) -> Uuid {
        // ---
        match self {
            Mutation::Create { item_id, .. }
            | Mutation::Update { item_id, .. }
            | Mutation::Delete { item_id } => *item_id,
        }
    }

    fn kind(&self) -> &'static str {
        // ---
        match self {
            Mutation::Create { .. } => "create",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMutation {
    pub seq: u64,
    pub recorded_at: DateTime<Utc>,
    pub mutation: Mutation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outbox {
    /// User whose changes these are. The item cache belongs to the same user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Uuid>,
    /// Last sequence number handed out. Never reused, even after entries drain.
    pub last_seq: u64,
    pub entries: Vec<PendingMutation>,
}

impl Outbox {
    // ---
    fn push(&mut self, mutation: Mutation) -> u64 {
        // ---
        self.last_seq += 1;
        self.entries.push(PendingMutation {
            seq: self.last_seq,
            recorded_at: Utc::now(),
            mutation,
        });
        self.last_seq
    }

    fn remove(&mut self, seq: u64) {
        // ---
        self.entries.retain(|entry| entry.seq != seq);
    }

    fn touches(&self, item_id: Uuid) -> bool {
        // ---
        self.entries.iter().any(|entry| entry.mutation.item_id() == item_id)
    }
}

/// Outcome of one flush pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Changes the server confirmed.
    pub replayed: usize,
    /// Changes the server refused outright; they are gone from the outbox.
    pub dropped: usize,
    /// Changes still queued after the pass.
    pub remaining: usize,
    /// The pass stopped early because the server stayed unreachable.
    pub interrupted: bool,
}

/// Applies a change to the cached list and tags the item pending.
fn apply_mutation(items: &mut Vec<CachedItem>, mutation: &Mutation) -> ClientResult<()> {
    // ---
    match mutation {
        Mutation::Create { item_id, fields } => {
            match items.iter_mut().find(|cached| cached.item.id == *item_id) {
                Some(cached) => {
                    cached.item.apply(fields.patch());
                    cached.sync_state = SyncState::Pending;
                }
                None => items.push(CachedItem {
                    item: fields.new_item(*item_id)?,
                    sync_state: SyncState::Pending,
                }),
            }
        }
        Mutation::Update { item_id, fields } => {
            match items.iter_mut().find(|cached| cached.item.id == *item_id) {
                Some(cached) => {
                    cached.item.apply(fields.patch());
                    cached.sync_state = SyncState::Pending;
                }
                None => tracing::debug!("Update for item {} not in cache", item_id),
            }
        }
        Mutation::Delete { item_id } => items.retain(|cached| cached.item.id != *item_id),
    }
    Ok(())
}

/// Re-applies queued changes for one item (or all items) on top of server state.
fn overlay<'a>(items: &mut Vec<CachedItem>, entries: impl Iterator<Item = &'a PendingMutation>) {
    // ---
    for entry in entries {
        if let Err(e) = apply_mutation(items, &entry.mutation) {
            tracing::warn!("Queued change #{} no longer applies: {}", entry.seq, e);
        }
    }
}

/// Queued changes may only be replayed by the user who recorded them.
fn check_owner(outbox: &Outbox, user_id: Uuid) -> ClientResult<()> {
    // ---
    match outbox.owner {
        Some(owner) if owner != user_id => Err(ClientError::Invalid(format!(
            "queued changes belong to user {owner}"
        ))),
        _ => Ok(()),
    }
}

enum Outcome {
    /// Accepted by the server, with the item as the server now stores it.
    Confirmed(Option<Item>),
    /// Refused by the server and discarded.
    Dropped,
}

// ============================================================================
// Reconciler
// ============================================================================

pub struct Reconciler {
    // ---
    api: Arc<ApiClient>,
    session: Arc<Session>,
    store: Arc<LocalStore>,
    retry: RetryPolicy,
    /// Held across read-modify-write of the cache and outbox records.
    local: Mutex<()>,
    /// Held for a whole flush pass; network calls happen under this one only.
    flush: Mutex<()>,
}

impl Reconciler {
    // ---
    pub fn new(
        api: Arc<ApiClient>,
        session: Arc<Session>,
        store: Arc<LocalStore>,
        retry: RetryPolicy,
    ) -> Self {
        // ---
        Self {
            api,
            session,
            store,
            retry,
            local: Mutex::new(()),
            flush: Mutex::new(()),
        }
    }

    pub async fn cached_items(&self) -> ClientResult<Vec<CachedItem>> {
        // ---
        Ok(self.store.get(ITEMS_RECORD).await?.unwrap_or_default())
    }

    pub async fn outbox(&self) -> ClientResult<Outbox> {
        // ---
        Ok(self.store.get(OUTBOX_RECORD).await?.unwrap_or_default())
    }

    /// Applies the change to the cache and queues it. Returns its sequence number.
    ///
    /// # Errors
    /// `Invalid` if a create lacks a required field; nothing is queued then.
    /// `LoginRequired` without a session.
    pub async fn record_pending(&self, mutation: Mutation) -> ClientResult<u64> {
        // ---
        let _local = self.local.lock().await;

        let mut items = self.cached_items().await?;
        apply_mutation(&mut items, &mutation)?;

        let user_id = self.session.user_id().await?;
        let mut outbox = self.outbox().await?;
        check_owner(&outbox, user_id)?;
        outbox.owner = Some(user_id);

        let kind = mutation.kind();
        let item_id = mutation.item_id();
        let seq = outbox.push(mutation);

        self.save_local(&items, &outbox).await?;

        tracing::debug!("Queued {} of item {} as #{}", kind, item_id, seq);
        Ok(seq)
    }

    /// Queues the change and immediately tries to deliver everything pending.
    /// The change stays queued if delivery fails.
    pub async fn submit(&self, mutation: Mutation) -> ClientResult<FlushReport> {
        // ---
        self.record_pending(mutation).await?;
        self.flush_pending().await
    }

    /// Replays the outbox in sequence order.
    ///
    /// - Confirmed: entry removed, item marked synced.
    /// - Unreachable or 5xx: retried with backoff; once attempts run out the
    ///   pass stops and the rest stays queued in order.
    /// - 404 on a delete: the item is already gone, counted as confirmed.
    /// - Other 4xx: entry dropped and logged, the pass continues.
    ///
    /// # Errors
    /// `LoginRequired` without a session, or a 401/403 from the server, which
    /// says nothing about the change itself. Local I/O errors.
    pub async fn flush_pending(&self) -> ClientResult<FlushReport> {
        // ---
        let _flush = self.flush.lock().await;
        let user_id = self.session.user_id().await?;
        check_owner(&self.outbox().await?, user_id)?;
        let mut report = FlushReport::default();

        // Only a flush removes entries and flushes are serialized, so the
        // head of the outbox cannot change under us.
        while let Some(entry) = self.outbox().await?.entries.first().cloned() {
            match self.replay(user_id, &entry.mutation).await {
                Ok(confirmed) => {
                    self.settle(&entry, Outcome::Confirmed(confirmed)).await?;
                    report.replayed += 1;
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        "Giving up on change #{} for now after {} attempts: {}",
                        entry.seq,
                        self.retry.max_attempts,
                        e
                    );
                    report.interrupted = true;
                    break;
                }
                Err(ClientError::Rejected { status, message }) if status != 401 && status != 403 => {
                    tracing::warn!(
                        "Dropping {} of item {} (#{}): rejected with {}: {}",
                        entry.mutation.kind(),
                        entry.mutation.item_id(),
                        entry.seq,
                        status,
                        message
                    );
                    self.settle(&entry, Outcome::Dropped).await?;
                    report.dropped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        report.remaining = self.outbox().await?.entries.len();
        if report.replayed > 0 || report.dropped > 0 {
            tracing::info!(
                "Flush: {} replayed, {} dropped, {} remaining",
                report.replayed,
                report.dropped,
                report.remaining
            );
        }
        Ok(report)
    }

    /// Fetches the item list. On success the cache becomes the server list
    /// with queued changes re-applied on top; on any failure the cached list
    /// is returned.
    pub async fn load_items(&self) -> ClientResult<Vec<CachedItem>> {
        // ---
        let (user_id, server_items) = match self.fetch_items().await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::info!("Serving cached items: {}", e);
                return self.cached_items().await;
            }
        };

        let _local = self.local.lock().await;
        let mut outbox = self.outbox().await?;
        if outbox.owner != Some(user_id) {
            if !outbox.entries.is_empty() {
                tracing::warn!(
                    "Discarding {} queued changes recorded by another user",
                    outbox.entries.len()
                );
            }
            outbox = Outbox {
                owner: Some(user_id),
                ..Outbox::default()
            };
        }

        let mut items: Vec<CachedItem> = server_items.into_iter().map(CachedItem::synced).collect();
        overlay(&mut items, outbox.entries.iter());

        self.save_local(&items, &outbox).await?;
        Ok(items)
    }

    /// Flushes every time `online` flips from false to true (and once at
    /// start if already online). Returns when the sender is dropped.
    pub async fn run_on_reconnect(&self, mut online: watch::Receiver<bool>) {
        // ---
        let mut was_online = *online.borrow_and_update();
        if was_online {
            self.flush_logged().await;
        }

        while online.changed().await.is_ok() {
            let now_online = *online.borrow_and_update();
            if now_online && !was_online {
                tracing::info!("Back online, replaying queued changes");
                self.flush_logged().await;
            }
            was_online = now_online;
        }

        tracing::debug!("Connectivity watch closed");
    }

    async fn flush_logged(&self) {
        // ---
        if let Err(e) = self.flush_pending().await {
            tracing::warn!("Flush failed: {}", e);
        }
    }

    async fn fetch_items(&self) -> ClientResult<(Uuid, Vec<Item>)> {
        // ---
        let user_id = self.session.user_id().await?;
        let token = self.session.access_token().await?;
        Ok((user_id, self.api.list_items(&token, user_id).await?))
    }

    /// Cache and outbox are written together so a pending item never lacks
    /// its queued change.
    async fn save_local(&self, items: &[CachedItem], outbox: &Outbox) -> ClientResult<()> {
        // ---
        self.store
            .put_many(vec![
                (ITEMS_RECORD, serde_json::to_value(items)?),
                (OUTBOX_RECORD, serde_json::to_value(outbox)?),
            ])
            .await
    }

    /// One change, retried while the failure is transient and attempts remain.
    async fn replay(&self, user_id: Uuid, mutation: &Mutation) -> ClientResult<Option<Item>> {
        // ---
        let mut attempt = 1;
        loop {
            match self.replay_once(user_id, mutation).await {
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::debug!("Attempt {} failed ({}), retrying in {:?}", attempt, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn replay_once(&self, user_id: Uuid, mutation: &Mutation) -> ClientResult<Option<Item>> {
        // ---
        let token = self.session.access_token().await?;

        match mutation {
            Mutation::Create { item_id, fields } => {
                let (status, profile) = self.api.add_item(&token, user_id, *item_id, fields).await?;
                if status == StatusCode::OK {
                    tracing::debug!("Server already had item {}", item_id);
                }
                Ok(profile.item(*item_id).cloned())
            }
            Mutation::Update { item_id, fields } => Ok(Some(
                self.api.update_item(&token, user_id, *item_id, fields).await?,
            )),
            Mutation::Delete { item_id } => match self.api.delete_item(&token, user_id, *item_id).await {
                Ok(_) => Ok(None),
                Err(ClientError::Rejected { status: 404, .. }) => {
                    tracing::debug!("Item {} already gone on the server", item_id);
                    Ok(None)
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Removes a finished entry and brings the cached item up to date.
    async fn settle(&self, entry: &PendingMutation, outcome: Outcome) -> ClientResult<()> {
        // ---
        let _local = self.local.lock().await;

        let mut outbox = self.outbox().await?;
        outbox.remove(entry.seq);

        let mut items = self.cached_items().await?;
        let item_id = entry.mutation.item_id();

        match outcome {
            Outcome::Confirmed(Some(item)) => {
                // A later queued delete may already have removed it locally.
                if let Some(cached) = items.iter_mut().find(|cached| cached.item.id == item_id) {
                    *cached = CachedItem::synced(item);
                    overlay(
                        &mut items,
                        outbox.entries.iter().filter(|e| e.mutation.item_id() == item_id),
                    );
                }
            }
            Outcome::Confirmed(None) => {}
            Outcome::Dropped => {
                // A create the server refused never existed there.
                if matches!(entry.mutation, Mutation::Create { .. }) && !outbox.touches(item_id) {
                    items.retain(|cached| cached.item.id != item_id);
                }
            }
        }

        self.save_local(&items, &outbox).await
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn fields(name: &str) -> ItemFields {
        // ---
        ItemFields {
            name: Some(name.to_string()),
            manufacturer: Some("Miele".to_string()),
            warranty_expiry_date: Some(Utc.with_ymd_and_hms(2027, 5, 1, 0, 0, 0).unwrap()),
            ..ItemFields::default()
        }
    }

    #[test]
    fn mutations_apply_optimistically() {
        // ---
        let mut items = Vec::new();
        let create = Mutation::create(fields("Washer"));
        let id = create.item_id();

        apply_mutation(&mut items, &create).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sync_state, SyncState::Pending);

        items[0].sync_state = SyncState::Synced;
        let update = Mutation::Update {
            item_id: id,
            fields: ItemFields {
                name: Some(" ".to_string()),
                notes: Some("drum replaced".to_string()),
                ..ItemFields::default()
            },
        };
        apply_mutation(&mut items, &update).unwrap();
        assert_eq!(items[0].item.name, "Washer");
        assert_eq!(items[0].item.notes.as_deref(), Some("drum replaced"));
        assert_eq!(items[0].sync_state, SyncState::Pending);

        apply_mutation(&mut items, &Mutation::Delete { item_id: id }).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn create_without_required_fields_is_refused() {
        // ---
        let mut items = Vec::new();
        let incomplete = Mutation::create(ItemFields {
            name: Some("Dryer".to_string()),
            ..ItemFields::default()
        });

        assert!(matches!(
            apply_mutation(&mut items, &incomplete),
            Err(ClientError::Invalid(_))
        ));
        assert!(items.is_empty());
    }

    #[test]
    fn outbox_sequence_numbers_keep_increasing() {
        // ---
        let mut outbox = Outbox::default();
        let first = outbox.push(Mutation::Delete { item_id: Uuid::new_v4() });
        let second = outbox.push(Mutation::Delete { item_id: Uuid::new_v4() });
        outbox.remove(first);
        outbox.remove(second);
        let third = outbox.push(Mutation::Delete { item_id: Uuid::new_v4() });

        assert_eq!((first, second, third), (1, 2, 3));
        assert_eq!(outbox.entries.len(), 1);
    }

    #[test]
    fn outbox_is_replayable_only_by_its_owner() {
        // ---
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        assert!(check_owner(&Outbox::default(), bob).is_ok());

        let owned = Outbox {
            owner: Some(alice),
            ..Outbox::default()
        };
        assert!(check_owner(&owned, alice).is_ok());
        assert!(matches!(check_owner(&owned, bob), Err(ClientError::Invalid(_))));
    }

    #[test]
    fn inline_images_round_trip_through_the_outbox_format() {
        // ---
        let image = InlineImage::from_bytes("receipt.pdf", b"%PDF-1.7");
        let mutation = Mutation::Create {
            item_id: Uuid::new_v4(),
            fields: ItemFields {
                receipt_image: Some(image.clone()),
                ..fields("Oven")
            },
        };

        let json = serde_json::to_value(&mutation).unwrap();
        assert_eq!(json["kind"], "create");

        let back: Mutation = serde_json::from_value(json).unwrap();
        assert_eq!(back, mutation);
        assert_eq!(image.bytes().unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn cached_items_serialize_flat() {
        // ---
        let item = fields("Fridge").new_item(Uuid::new_v4()).unwrap();
        let json = serde_json::to_value(CachedItem::synced(item)).unwrap();

        assert_eq!(json["name"], "Fridge");
        assert_eq!(json["syncState"], "synced");
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A login credential. Created at registration and never updated.
#[derive(Debug, Clone)]
pub struct Credential {
    // ---
    /// Identifier minted at registration; profiles and tokens share it.
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    // ---
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        // ---
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

/// A warranty-tracked purchase, embedded in its owner's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    // ---
    /// Minted on the server when a client sends an item without one.
    #[serde(alias = "_id", default = "Uuid::new_v4")]
    pub id: Uuid,

    pub name: String,

    #[serde(default)]
    pub manufacturer: String,

    #[serde(with = "expiry_date_format")]
    pub warranty_expiry_date: DateTime<Utc>,

    /// Relative path of the stored product photo.
    #[serde(default)]
    pub product_image: Option<String>,

    /// Relative path of the stored receipt scan.
    #[serde(default)]
    pub receipt_image: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial item update. `None` and blank strings both mean "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub warranty_expiry_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub product_image: Option<String>,
    pub receipt_image: Option<String>,
}

impl Item {
    // ---
    /// Overwrite only the fields the patch actually carries.
    pub fn apply(&mut self, patch: ItemPatch) {
        // ---
        if let Some(name) = non_blank(patch.name) {
            self.name = name;
        }
        if let Some(manufacturer) = non_blank(patch.manufacturer) {
            self.manufacturer = manufacturer;
        }
        if let Some(date) = patch.warranty_expiry_date {
            self.warranty_expiry_date = date;
        }
        if let Some(notes) = non_blank(patch.notes) {
            self.notes = Some(notes);
        }
        if let Some(path) = non_blank(patch.product_image) {
            self.product_image = Some(path);
        }
        if let Some(path) = non_blank(patch.receipt_image) {
            self.receipt_image = Some(path);
        }
    }
}

/// Per-user document holding identity fields and the embedded item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    // ---
    #[serde(alias = "_id")]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

/// Profile fields a client may change. Blank or absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Profile {
    // ---
    pub fn new(id: Uuid, first_name: String, last_name: String, email: String) -> Self {
        // ---
        Self {
            id,
            first_name,
            last_name,
            email,
            items: Vec::new(),
        }
    }

    pub fn item(&self, item_id: Uuid) -> Option<&Item> {
        // ---
        self.items.iter().find(|item| item.id == item_id)
    }

    /// Append an item. Returns `false` and leaves the list alone if the id is already present.
    pub fn add_item(&mut self, item: Item) -> bool {
        // ---
        if self.item(item.id).is_some() {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn update_item(&mut self, item_id: Uuid, patch: ItemPatch) -> Option<&Item> {
        // ---
        let item = self.items.iter_mut().find(|item| item.id == item_id)?;
        item.apply(patch);
        Some(item)
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Option<Item> {
        // ---
        let index = self.items.iter().position(|item| item.id == item_id)?;
        Some(self.items.remove(index))
    }

    /// Full overwrite of the item list. No merge, no conflict detection.
    pub fn replace_items(&mut self, items: Vec<Item>) {
        // ---
        self.items = items;
    }

    pub fn apply_update(&mut self, update: ProfileUpdate) {
        // ---
        if let Some(first_name) = non_blank(update.first_name) {
            self.first_name = first_name;
        }
        if let Some(last_name) = non_blank(update.last_name) {
            self.last_name = last_name;
        }
        if let Some(email) = non_blank(update.email) {
            self.email = email;
        }
    }
}

/// Parse a warranty expiry date.
///
/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates, the latter being
/// what an HTML date input submits. Plain dates resolve to midnight UTC.
pub fn parse_expiry_date(raw: &str) -> Option<DateTime<Utc>> {
    // ---
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

mod expiry_date_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        date.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_expiry_date(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid warrantyExpiryDate: {raw}"))
        })
    }
}

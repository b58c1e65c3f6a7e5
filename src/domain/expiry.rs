//! Read-only "expiring soon" view over a profile's items.
//!
//! Nothing here is stored: every call recomputes against the caller's clock.

use super::models::Item;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Items expiring within this many days are reported.
pub const EXPIRY_WINDOW_DAYS: i64 = 7;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// An item annotated with the number of days left on its warranty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiringItem {
    #[serde(flatten)]
    pub item: Item,
    pub days_until_expiry: i64,
}

/// `ceil((expiry - now) / 1 day)`, counted in whole milliseconds.
pub fn days_until_expiry(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    // ---
    let millis = (expiry - now).num_milliseconds();
    let days = millis / MILLIS_PER_DAY;

    // Integer division truncates toward zero, which is already the ceiling for
    // negative values.
    if millis % MILLIS_PER_DAY > 0 {
        days + 1
    } else {
        days
    }
}

/// Items with `0 < daysUntilExpiry <= 7`, in stored order.
pub fn expiring_items(items: &[Item], now: DateTime<Utc>) -> Vec<ExpiringItem> {
    // ---
    items
        .iter()
        .map(|item| ExpiringItem {
            days_until_expiry: days_until_expiry(item.warranty_expiry_date, now),
            item: item.clone(),
        })
        .filter(|e| e.days_until_expiry > 0 && e.days_until_expiry <= EXPIRY_WINDOW_DAYS)
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn item_expiring_at(name: &str, at: DateTime<Utc>) -> Item {
        // ---
        Item {
            id: Uuid::new_v4(),
            name: name.to_string(),
            manufacturer: "Acme".to_string(),
            warranty_expiry_date: at,
            product_image: None,
            receipt_image: None,
            notes: None,
        }
    }

    #[test]
    fn partial_days_round_up() {
        // ---
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 10, 30, 0).unwrap();

        assert_eq!(days_until_expiry(now + Duration::days(3), now), 3);
        assert_eq!(days_until_expiry(now + Duration::hours(49), now), 3);
        assert_eq!(days_until_expiry(now + Duration::milliseconds(1), now), 1);
        assert_eq!(days_until_expiry(now, now), 0);
        assert_eq!(days_until_expiry(now - Duration::hours(12), now), 0);
        assert_eq!(days_until_expiry(now - Duration::hours(36), now), -1);
    }

    #[test]
    fn only_items_within_the_window_are_returned() {
        // ---
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let soon = item_expiring_at("Kettle", now + Duration::days(3));
        let later = item_expiring_at("Laptop", now + Duration::days(10));

        let expiring = expiring_items(&[soon.clone(), later], now);

        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].item, soon);
        assert_eq!(expiring[0].days_until_expiry, 3);
    }

    #[test]
    fn window_bounds_are_exclusive_of_zero_and_inclusive_of_seven() {
        // ---
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
        let items = vec![
            item_expiring_at("expired", now - Duration::days(1)),
            item_expiring_at("today", now),
            item_expiring_at("seven", now + Duration::days(7)),
            item_expiring_at("just over seven", now + Duration::days(7) + Duration::seconds(1)),
        ];

        let names: Vec<_> = expiring_items(&items, now)
            .into_iter()
            .map(|e| e.item.name)
            .collect();

        assert_eq!(names, vec!["seven".to_string()]);
    }

    #[test]
    fn expiring_item_serializes_flat() {
        // ---
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
        let item = item_expiring_at("Kettle", now + Duration::days(2));

        let value = serde_json::to_value(&expiring_items(&[item.clone()], now)[0]).unwrap();

        assert_eq!(value["name"], "Kettle");
        assert_eq!(value["daysUntilExpiry"], 2);
        assert_eq!(value["id"], serde_json::json!(item.id));
    }
}

use metrics::{counter, histogram};
use std::time::Instant;

/// Increment a counter for completed registrations.
pub fn increment_registrations() {
    counter!("registrations_total").increment(1);
}

/// Increment the login counter, labelled by outcome.
pub fn increment_logins(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("logins_total", "outcome" => outcome).increment(1);
}

/// Increment a counter for created items.
pub fn increment_items_created() {
    counter!("items_created_total").increment(1);
}

/// Increment a counter for bulk item syncs.
pub fn increment_syncs() {
    counter!("item_syncs_total").increment(1);
}

/// Track HTTP request latency using a histogram.
pub fn track_http_request(start: Instant, path: &str, method: &str, status: u16) {
    let elapsed = start.elapsed();
    histogram!(
        "http_request_duration_seconds",
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(elapsed);
}

//! Prometheus metrics implementation.
//!
//! This module provides a concrete implementation of the `Metrics` trait using
//! the Prometheus metrics format. It delegates to utility functions in sibling
//! modules (`counters.rs`, `recorder.rs`) which handle the actual metrics
//! collection via the global `metrics` crate registry.

use crate::domain::Metrics;
use std::time::Instant;

/// Prometheus-based metrics implementation.
///
/// This struct is empty because we use the global metrics registry pattern via
/// the `metrics` crate. The global PrometheusHandle stored in `recorder.rs`
/// manages collection and rendering.
pub struct PrometheusMetrics {
    // Empty - uses global metrics registry pattern
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        tracing::info!("Creating Prometheus metrics");
        PrometheusMetrics {}
    }
}

impl Metrics for PrometheusMetrics {
    fn render(&self) -> String {
        super::render_metrics()
    }

    fn record_registration(&self) {
        tracing::debug!("Recording registration event");
        super::increment_registrations();
    }

    fn record_login(&self, success: bool) {
        tracing::debug!("Recording login attempt (success: {})", success);
        super::increment_logins(success);
    }

    fn record_item_created(&self) {
        tracing::debug!("Recording item created event");
        super::increment_items_created();
    }

    fn record_sync(&self) {
        super::increment_syncs();
    }

    fn record_http_request(&self, start: Instant, path: &str, method: &str, status: u16) {
        super::track_http_request(start, path, method, status);
    }
}

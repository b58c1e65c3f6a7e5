use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus recorder globally and store the handle.
///
/// Calling it again after a successful install is a no-op, since the
/// process-wide recorder can only be installed once. Concurrent callers wait
/// for the first install to finish.
pub fn init_metrics() -> Result<()> {
    // ---
    HANDLE.get_or_try_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .context("failed to install Prometheus recorder")
    })?;

    Ok(())
}

/// Render the current metrics in Prometheus text format.
pub fn render_metrics() -> String {
    // ---
    HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Call once at startup, before any metric is recorded. Fails if a recorder
/// is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Subscribers accepted (counter).
pub const SSE_SUBSCRIBERS_TOTAL: &str = "sse_subscribers_total";
/// Subscribers removed (counter, labels: reason).
pub const SSE_DISCONNECTIONS_TOTAL: &str = "sse_disconnections_total";
/// Currently registered subscribers (gauge).
pub const SSE_SUBSCRIBERS_ACTIVE: &str = "sse_subscribers_active";
/// Broadcasts dispatched (counter).
pub const SSE_BROADCASTS_TOTAL: &str = "sse_broadcasts_total";
/// Frames written successfully during broadcasts (counter).
pub const SSE_FRAMES_DELIVERED_TOTAL: &str = "sse_frames_delivered_total";
/// Failed broadcast writes (counter, labels: error).
pub const SSE_DELIVERY_FAILURES_TOTAL: &str = "sse_delivery_failures_total";
/// Heartbeat comments written (counter).
pub const SSE_HEARTBEATS_TOTAL: &str = "sse_heartbeats_total";

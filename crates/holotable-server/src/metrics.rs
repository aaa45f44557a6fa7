//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Returns the handle that renders `/metrics`. Fails if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text from a recorder handle.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Live WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Frames a socket's queue refused during broadcast (counter).
pub const WS_BROADCAST_DROPS_TOTAL: &str = "ws_broadcast_drops_total";
/// Socket lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Events that reached a handler chain (counter, labels: `message_type`).
pub const BUS_EVENTS_TOTAL: &str = "bus_events_total";
/// Events discarded before any handler ran (counter, labels: reason).
pub const BUS_EVENTS_DROPPED_TOTAL: &str = "bus_events_dropped_total";
/// Failed or timed-out handlers (counter, labels: `message_type`, `error_type`).
pub const BUS_HANDLER_ERRORS_TOTAL: &str = "bus_handler_errors_total";
/// Handler chain run time (histogram, labels: `message_type`).
pub const BUS_HANDLER_DURATION_SECONDS: &str = "bus_handler_duration_seconds";
/// Failed history writes (counter).
pub const BUS_HISTORY_ERRORS_TOTAL: &str = "bus_history_errors_total";

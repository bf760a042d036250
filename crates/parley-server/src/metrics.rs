//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Call once at startup, before anything is recorded. The handle renders
/// the `/metrics` endpoint.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "parley_connections_total";
/// Connections closed (counter).
pub const DISCONNECTIONS_TOTAL: &str = "parley_disconnections_total";
/// Live connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "parley_connections_active";
/// Connection lifetime in seconds (histogram).
pub const CONNECTION_DURATION_SECONDS: &str = "parley_connection_duration_seconds";
/// Messages appended to the log (counter).
pub const MESSAGES_TOTAL: &str = "parley_messages_total";
/// Client events rejected as unknown or malformed (counter).
pub const INVALID_EVENTS_TOTAL: &str = "parley_invalid_events_total";
/// Outbound frames dropped (counter).
pub const SEND_DROPS_TOTAL: &str = "parley_send_drops_total";

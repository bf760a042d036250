//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"` while the hub is running, `"stopping"` once it has gone.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Live connections known to the hub.
    pub connections: usize,
}

/// Build a health response for a running hub.
pub fn health_check(start_time: Instant, connections: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
    }
}

/// Build a health response for a hub that no longer answers.
pub fn stopping(start_time: Instant) -> HealthResponse {
    HealthResponse {
        status: "stopping",
        uptime_secs: start_time.elapsed().as_secs(),
        connections: 0,
    }
}

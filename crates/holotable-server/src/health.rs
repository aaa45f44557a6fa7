//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server runs.
    pub status: String,
    /// Seconds since start.
    pub uptime_secs: u64,
    /// Live sockets.
    pub connections: usize,
    /// Groups with at least one socket.
    pub groups: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, groups: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        groups,
    }
}

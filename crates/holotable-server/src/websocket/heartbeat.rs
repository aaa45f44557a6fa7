//! Periodic group heartbeat: pulse logging and optional connection-count announcements.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::registry::GroupRegistry;
use crate::config::ServerConfig;

/// Heartbeat behaviour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between ticks.
    pub interval: Duration,
    /// 0 silent, 1 log a pulse, 2 also log every group's size.
    pub show_pulse: u8,
    /// Send each group its own connection count.
    pub announce: bool,
}

impl HeartbeatConfig {
    /// Heartbeat section of the server configuration.
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            interval: config.heartbeat_interval(),
            show_pulse: config.show_pulse,
            announce: config.heartbeat_announce,
        }
    }
}

/// Text sent to a group when announcements are on.
pub fn announcement(group: &str, connections: usize) -> String {
    format!("{connections} connections in group {group}")
}

/// Run one heartbeat tick. Returns the number of groups announced to.
pub fn tick(registry: &GroupRegistry, config: &HeartbeatConfig) -> usize {
    if config.show_pulse >= 1 {
        info!(
            connections = registry.connection_count(),
            groups = registry.group_count(),
            "pulse"
        );
    }
    if config.show_pulse < 2 && !config.announce {
        return 0;
    }
    let mut announced = 0;
    for (group, size) in registry.group_sizes() {
        if config.show_pulse >= 2 {
            info!(group, connections = size, "group pulse");
        }
        if config.announce {
            let _ = registry.broadcast(&group, &announcement(&group, size));
            announced += 1;
        }
    }
    announced
}

/// Tick every `config.interval` until `cancel` fires. Returns the tick count.
///
/// The first tick happens one interval after start.
pub async fn run_heartbeat(
    registry: Arc<GroupRegistry>,
    config: HeartbeatConfig,
    cancel: CancellationToken,
) -> u64 {
    let mut check_interval = time::interval(config.interval);
    let _ = check_interval.tick().await;
    let mut ticks = 0;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                let _ = tick(&registry, &config);
                ticks += 1;
            }
            () = cancel.cancelled() => {
                info!(ticks, "heartbeat stopped");
                return ticks;
            }
        }
    }
}

//! Settings type definitions.
//!
//! Field names are camelCase in JSON. Every section is `#[serde(default)]`,
//! so a partial file only needs the keys it changes.

use holotable_core::LogFormat;
use serde::{Deserialize, Serialize};

/// Root settings for the Holotable server.
///
/// ```json
/// {
///   "server": { "port": 9000, "showPulse": 2 },
///   "storage": { "dbPath": "/var/lib/holotable/sessions.db" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HolotableSettings {
    /// Network and heartbeat settings.
    pub server: ServerSettings,
    /// Persistence settings.
    pub storage: StorageSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

/// Network and heartbeat settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Seconds between heartbeat ticks.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat verbosity: 0 silent, 1 pulse, 2 pulse plus per-group counts.
    pub show_pulse: u8,
    /// Send the per-group connection count to every socket on each tick.
    pub heartbeat_announce: bool,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            heartbeat_interval_secs: 30,
            show_pulse: 1,
            heartbeat_announce: false,
            max_message_size: 64 * 1024,
        }
    }
}

/// Persistence settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// `SQLite` database file.
    pub db_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: "holotable.db".to_string(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
    /// Line format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

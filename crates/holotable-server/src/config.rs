//! Server configuration.

use std::time::Duration;

use holotable_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for the Holotable server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Seconds between group heartbeat ticks.
    pub heartbeat_interval_secs: u64,
    /// Heartbeat log verbosity: 0 silent, 1 pulse, 2 pulse plus group counts.
    pub show_pulse: u8,
    /// Send each group its connection count on every heartbeat tick.
    pub heartbeat_announce: bool,
    /// Seconds between WebSocket Ping frames.
    pub ping_interval_secs: u64,
    /// Seconds without a Pong before a client is dropped.
    pub pong_timeout_secs: u64,
    /// Per-connection outbound queue length.
    pub outbound_buffer: usize,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Inbound text starting with this is answered with a greeting.
    pub greeting_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            heartbeat_interval_secs: 30,
            show_pulse: 1,
            heartbeat_announce: false,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            outbound_buffer: 256,
            max_message_size: 64 * 1024,
            greeting_prefix: "Hello".into(),
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings; fields settings do not cover keep their defaults.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            heartbeat_interval_secs: settings.heartbeat_interval_secs,
            show_pulse: settings.show_pulse,
            heartbeat_announce: settings.heartbeat_announce,
            max_message_size: settings.max_message_size,
            ..Self::default()
        }
    }

    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Heartbeat tick period. Never zero.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Ping period. Never zero.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    /// Pong deadline.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_loopback_on_any_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn default_heartbeat_is_quiet() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(cfg.show_pulse, 1);
        assert!(!cfg.heartbeat_announce);
    }

    #[test]
    fn default_greeting_prefix() {
        assert_eq!(ServerConfig::default().greeting_prefix, "Hello");
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let cfg = ServerConfig {
            heartbeat_interval_secs: 0,
            ping_interval_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(1));
        assert_eq!(cfg.ping_interval(), Duration::from_secs(1));
    }

    #[test]
    fn from_settings_copies_shared_fields() {
        let settings = ServerSettings {
            host: "0.0.0.0".into(),
            port: 9000,
            heartbeat_interval_secs: 5,
            show_pulse: 2,
            heartbeat_announce: true,
            max_message_size: 1024,
        };
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9000");
        assert_eq!(cfg.heartbeat_interval_secs, 5);
        assert_eq!(cfg.show_pulse, 2);
        assert!(cfg.heartbeat_announce);
        assert_eq!(cfg.max_message_size, 1024);
        assert_eq!(cfg.pong_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = ServerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: ServerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.outbound_buffer, cfg.outbound_buffer);
        assert_eq!(back.greeting_prefix, cfg.greeting_prefix);
    }
}

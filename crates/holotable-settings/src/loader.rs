//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HolotableSettings::default()`]
//! 2. If `~/.holotable/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use holotable_core::LogFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::HolotableSettings;

/// Resolve the path to the settings file (`~/.holotable/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".holotable").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HolotableSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a value that fails
/// validation is an error.
pub fn load_settings_from_path(path: &Path) -> Result<HolotableSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<HolotableSettings> {
    let defaults = serde_json::to_value(HolotableSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

fn validate(settings: &HolotableSettings) -> Result<()> {
    if settings.server.heartbeat_interval_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "server.heartbeatIntervalSecs must be at least 1".to_string(),
        ));
    }
    if settings.storage.db_path.trim().is_empty() {
        return Err(SettingsError::InvalidValue(
            "storage.dbPath must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored.
pub fn apply_env_overrides(settings: &mut HolotableSettings) {
    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = read_env_string("HOLOTABLE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_env_u16("HOLOTABLE_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_env_u64("HEARTBEAT_INTERVAL", 1, 86_400) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = read_env_u8("SHOW_PULSE", 0, 2) {
        settings.server.show_pulse = v;
    }

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("HOLOTABLE_DB_PATH") {
        settings.storage.db_path = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("HOLOTABLE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_string("HOLOTABLE_LOG_FORMAT") {
        match v.parse::<LogFormat>() {
            Ok(format) => settings.logging.format = format,
            Err(e) => tracing::warn!(key = "HOLOTABLE_LOG_FORMAT", error = %e, "ignoring"),
        }
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u8` within a range.
pub fn parse_u8_range(val: &str, min: u8, max: u8) -> Option<u8> {
    let n: u8 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u8(name: &str, min: u8, max: u8) -> Option<u8> {
    let val = std::env::var(name).ok()?;
    let result = parse_u8_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u8 env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8000, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9000}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9000);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, HolotableSettings::default());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"showPulse": 2, "heartbeatAnnounce": true}, "logging": {"format": "json"}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.show_pulse, 2);
        assert!(settings.server.heartbeat_announce);
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn invalid_json_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert!(matches!(load_file_layer(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn wrong_type_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": "eighty"}}"#).unwrap();
        assert!(matches!(load_file_layer(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn zero_heartbeat_fails_validation() {
        let mut settings = HolotableSettings::default();
        settings.server.heartbeat_interval_secs = 0;
        assert!(matches!(
            validate(&settings),
            Err(SettingsError::InvalidValue(msg)) if msg.contains("heartbeat")
        ));
    }

    #[test]
    fn empty_db_path_fails_validation() {
        let mut settings = HolotableSettings::default();
        settings.storage.db_path = "  ".to_string();
        assert!(validate(&settings).is_err());
        assert!(validate(&HolotableSettings::default()).is_ok());
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_pulse_level() {
        assert_eq!(parse_u8_range("0", 0, 2), Some(0));
        assert_eq!(parse_u8_range("2", 0, 2), Some(2));
        assert_eq!(parse_u8_range("3", 0, 2), None);
        assert_eq!(parse_u8_range("loud", 0, 2), None);
    }

    #[test]
    fn parse_port_range() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
    }

    #[test]
    fn parse_interval_trims_whitespace() {
        assert_eq!(parse_u64_range(" 15 ", 1, 86_400), Some(15));
        assert_eq!(parse_u64_range("", 1, 86_400), None);
    }
}

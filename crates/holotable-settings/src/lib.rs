//! # holotable-settings
//!
//! Settings for the Holotable server, loaded from three layers (in priority
//! order):
//! 1. **Compiled defaults**: [`HolotableSettings::default()`]
//! 2. **User file**: `~/.holotable/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `HOLOTABLE_*`, `HEARTBEAT_INTERVAL` and
//!    `SHOW_PULSE` (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::{HolotableSettings, LoggingSettings, ServerSettings, StorageSettings};

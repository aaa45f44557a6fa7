//! # holotable-store
//!
//! Durable session state: destiny points, characters and the append-only
//! history log, keyed by group name.
//!
//! - **[`SessionStore`]**: the persistence port used by message handlers
//! - **[`SqliteStore`]**: its `SQLite` implementation over an `r2d2` pool
//! - **[`sqlite`]**: pool setup, embedded migrations, table repositories

#![deny(unsafe_code)]

pub mod errors;
pub mod models;
pub mod port;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use models::{Character, GroupSnapshot, HistoryEntry, HistoryEvent, Point, Upsert};
pub use port::SessionStore;
pub use sqlite::connection::{ConnectionConfig, ConnectionPool};
pub use store::SqliteStore;

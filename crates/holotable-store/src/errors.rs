//! Error types for the session store.
//!
//! [`StoreError`] separates infrastructure failures (`SQLite`, pool, schema)
//! from domain conditions (a point or character that does not exist), so
//! handlers can tell a bad request from a broken database.

use holotable_core::{MessageError, PointId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// No destiny point with this id in the group.
    #[error("no destiny point {point_id} in group {group}")]
    PointNotFound {
        /// Group searched.
        group: String,
        /// Missing id.
        point_id: PointId,
    },

    /// No character with this name in the group.
    #[error("no character {char_name} in group {group}")]
    CharacterNotFound {
        /// Group searched.
        group: String,
        /// Missing name.
        char_name: String,
    },

    /// A stored or incoming value failed domain validation.
    #[error(transparent)]
    Message(#[from] MessageError),
}

impl StoreError {
    /// Whether the error is a missing-entity condition rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PointNotFound { .. } | Self::CharacterNotFound { .. }
        )
    }
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

//! Handler and bus error types.

use std::time::Duration;

use holotable_core::{MessageError, MessageType};
use holotable_store::StoreError;
use thiserror::Error;

/// Failure inside one mutation handler or the history sink.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The event is well formed but cannot be applied.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Payload validation failed.
    #[error(transparent)]
    Message(#[from] MessageError),

    /// The blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl HandlerError {
    /// Whether the handler failed because the targeted point or character does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(e) if e.is_not_found() => "not_found",
            Self::Store(_) => "store",
            Self::InvalidRequest(_) | Self::Message(_) => "invalid_request",
            Self::Task(_) => "task",
        }
    }
}

/// A handler chain that did not complete. The event was neither recorded nor broadcast.
#[derive(Debug, Error)]
pub enum BusError {
    /// A handler returned an error.
    #[error("{message_type} handler #{index} failed: {source}")]
    Handler {
        /// Type the chain was running for.
        message_type: MessageType,
        /// Position of the failing handler in the chain.
        index: usize,
        /// Cause.
        #[source]
        source: HandlerError,
    },

    /// A handler exceeded the bus timeout.
    #[error("{message_type} handler #{index} timed out after {timeout:?}")]
    Timeout {
        /// Type the chain was running for.
        message_type: MessageType,
        /// Position of the slow handler in the chain.
        index: usize,
        /// Limit that was exceeded.
        timeout: Duration,
    },

    /// The final event could not be serialized for broadcast.
    #[error("failed to encode {message_type} for broadcast: {source}")]
    Encode {
        /// Type of the final event.
        message_type: MessageType,
        /// Cause.
        #[source]
        source: MessageError,
    },
}

impl BusError {
    /// The underlying handler error, if a handler failed.
    pub fn handler_error(&self) -> Option<&HandlerError> {
        match self {
            Self::Handler { source, .. } => Some(source),
            _ => None,
        }
    }
}

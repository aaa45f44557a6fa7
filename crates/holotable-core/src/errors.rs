//! Error types for decoding and validating wire events.

use thiserror::Error;

use crate::messages::MessageType;

/// Errors raised while decoding a wire payload or validating its fields.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The payload is valid JSON but not an object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// The payload carries no `message_type` string.
    #[error("payload is missing the `message_type` discriminator")]
    MissingDiscriminator,

    /// The discriminator does not name a known variant.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The discriminator is known but the payload does not match its schema.
    #[error("malformed {message_type} payload: {source}")]
    Malformed {
        /// Variant the payload claimed to be.
        message_type: MessageType,
        /// Underlying decode failure.
        source: serde_json::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// `trait_name` does not name a character trait.
    #[error("unknown character trait: {0}")]
    UnknownTrait(String),

    /// The value cannot be stored in the named trait.
    #[error("invalid value {value:?} for trait {trait_name}")]
    InvalidTraitValue {
        /// Trait being written.
        trait_name: String,
        /// Offending value, rendered as text.
        value: String,
    },
}

/// Convenience type alias for message results.
pub type Result<T> = std::result::Result<T, MessageError>;

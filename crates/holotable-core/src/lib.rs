//! # holotable-core
//!
//! Shared domain types for the Holotable session server.
//!
//! - **[`messages`]**: the closed set of wire events (`message_type` discriminator,
//!   group, author, server timestamp) and their typed payloads
//! - **[`character`]**: character trait record, trait names, and trait values
//! - **[`dice`]**: stateless narrative dice resolver
//! - **[`logging`]**: `tracing` subscriber setup shared by all binaries

#![deny(unsafe_code)]

pub mod character;
pub mod dice;
pub mod errors;
pub mod logging;
pub mod messages;

pub use character::{CharacterTrait, CharacterTraits, TraitValue};
pub use dice::{DicePool, DieKind, RollOutcome};
pub use errors::{MessageError, Result};
pub use logging::LogFormat;
pub use messages::{
    CharacterCreate, CharacterDelete, CharacterUpdate, Event, EventBody, MessageType, PointAdd,
    PointId, PointRemove, PointSwitch, RollRequest, RollResult,
};

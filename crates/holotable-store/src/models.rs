//! Persisted entity types.

use holotable_core::{CharacterTraits, Event, MessageType, PointId};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// A destiny point in a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// Owning group.
    pub group_name: String,
    /// Group-local id.
    pub point_id: PointId,
    /// Current side.
    pub is_light: bool,
}

/// A character record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Owning group.
    pub group_name: String,
    /// Name, unique within the group.
    pub char_name: String,
    /// Trait columns.
    #[serde(flatten)]
    pub traits: CharacterTraits,
}

impl Character {
    /// Parsed `status_flags`.
    pub fn status_list(&self) -> Vec<&str> {
        self.traits.status_list()
    }
}

/// Whether an upsert inserted a new record or overwrote an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    /// No record existed.
    Created,
    /// An existing record was overwritten in place.
    Updated,
}

/// One row of the append-only history log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Time-ordered unique id.
    pub id: String,
    /// Owning group.
    pub group_name: String,
    /// When the row was recorded (RFC 3339).
    pub created_at: String,
    /// Discriminator of the stored event.
    pub event_type: String,
    /// Wire JSON of the final event.
    pub event_data: String,
}

impl HistoryEvent {
    /// Discriminator as a typed value.
    pub fn message_type(&self) -> Result<MessageType> {
        Ok(self.event_type.parse::<MessageType>()?)
    }

    /// Decode the stored payload back into a typed event.
    pub fn decode(&self) -> Result<Event> {
        Ok(Event::from_json(&self.event_data)?)
    }

    /// One-line display form, or `None` if the payload no longer decodes.
    pub fn describe(&self) -> Option<String> {
        self.decode().ok().map(|event| event.describe())
    }
}

/// A history row plus its display line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The stored row.
    #[serde(flatten)]
    pub event: HistoryEvent,
    /// Display line, absent for rows that fail to decode.
    pub description: Option<String>,
}

impl From<HistoryEvent> for HistoryEntry {
    fn from(event: HistoryEvent) -> Self {
        let description = event.describe();
        Self { event, description }
    }
}

/// Current state of one group, as served to page clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    /// Group name.
    pub group_name: String,
    /// Live destiny points, by id.
    pub points: Vec<Point>,
    /// History, oldest first.
    pub history: Vec<HistoryEntry>,
    /// Live characters, by name.
    pub characters: Vec<Character>,
}

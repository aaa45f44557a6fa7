//! The persistence port consumed by message handlers and the state endpoint.
//!
//! Methods are synchronous; async callers run them on a blocking thread.

use holotable_core::{CharacterTrait, CharacterTraits, Event, PointId, TraitValue};

use crate::errors::Result;
use crate::models::{Character, GroupSnapshot, HistoryEntry, HistoryEvent, Point, Upsert};

/// Durable session state for every group.
///
/// Update and delete operations on a missing key fail with a not-found
/// [`StoreError`](crate::StoreError).
pub trait SessionStore: Send + Sync {
    /// Live points of a group, ordered by id.
    fn get_points(&self, group: &str) -> Result<Vec<Point>>;

    /// Create a point with the next group-local id.
    fn add_point(&self, group: &str, is_light: bool) -> Result<Point>;

    /// Set the side of an existing point.
    fn set_point_state(&self, group: &str, point_id: PointId, is_light: bool) -> Result<Point>;

    /// Remove an existing point.
    fn remove_point(&self, group: &str, point_id: PointId) -> Result<()>;

    /// Live characters of a group, ordered by name.
    fn get_characters(&self, group: &str) -> Result<Vec<Character>>;

    /// Create a character, or overwrite the traits of the existing one.
    fn upsert_character(
        &self,
        group: &str,
        char_name: &str,
        traits: &CharacterTraits,
    ) -> Result<Upsert>;

    /// Change one trait of an existing character.
    fn update_character_trait(
        &self,
        group: &str,
        char_name: &str,
        name: CharacterTrait,
        value: &TraitValue,
    ) -> Result<Character>;

    /// Delete an existing character.
    fn delete_character(&self, group: &str, char_name: &str) -> Result<()>;

    /// Record an event in the group's history.
    fn append_history(&self, event: &Event) -> Result<HistoryEvent>;

    /// History of a group, newest first.
    fn get_history(&self, group: &str) -> Result<Vec<HistoryEvent>>;

    /// Points, oldest-first history and characters of a group.
    fn snapshot(&self, group: &str) -> Result<GroupSnapshot> {
        let history = self.get_history(group)?;
        Ok(GroupSnapshot {
            group_name: group.to_owned(),
            points: self.get_points(group)?,
            history: history.into_iter().rev().map(HistoryEntry::from).collect(),
            characters: self.get_characters(group)?,
        })
    }
}

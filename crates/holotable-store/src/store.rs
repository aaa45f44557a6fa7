//! `SQLite` implementation of [`SessionStore`].
//!
//! Every write runs inside a single transaction, so a failed lookup leaves
//! no partial state behind.

use holotable_core::{CharacterTrait, CharacterTraits, Event, PointId, TraitValue};
use rusqlite::{Transaction, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{Result, StoreError};
use crate::models::{Character, HistoryEvent, Point, Upsert};
use crate::port::SessionStore;
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::{CharacterRepo, HistoryRepo, PointRepo};

/// Session store backed by an `r2d2` pool of `SQLite` connections.
#[derive(Clone)]
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl SqliteStore {
    /// Wrap an existing pool. The schema must already be migrated.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open (or create) a database file and apply pending migrations.
    pub fn open(path: &str, config: &ConnectionConfig) -> Result<Self> {
        let pool = connection::new_file(path, config)?;
        Self::migrated(pool)
    }

    /// Fresh in-memory database with the schema applied.
    pub fn in_memory() -> Result<Self> {
        let pool = connection::new_in_memory(&ConnectionConfig::default())?;
        Self::migrated(pool)
    }

    fn migrated(pool: ConnectionPool) -> Result<Self> {
        {
            let conn = pool.get()?;
            let _ = run_migrations(&conn)?;
        }
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }
}

/// Read-then-write transactions take the write lock up front so concurrent
/// writers wait on `busy_timeout` instead of failing on lock upgrade.
fn begin_write(conn: &PooledConnection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

impl SessionStore for SqliteStore {
    fn get_points(&self, group: &str) -> Result<Vec<Point>> {
        let conn = self.conn()?;
        PointRepo::list(&conn, group)
    }

    fn add_point(&self, group: &str, is_light: bool) -> Result<Point> {
        let conn = self.conn()?;
        let tx = begin_write(&conn)?;
        let point = Point {
            group_name: group.to_owned(),
            point_id: PointRepo::next_id(&tx, group)?,
            is_light,
        };
        PointRepo::insert(&tx, &point)?;
        tx.commit()?;
        debug!(group, point_id = point.point_id, is_light, "destiny point added");
        Ok(point)
    }

    fn set_point_state(&self, group: &str, point_id: PointId, is_light: bool) -> Result<Point> {
        let conn = self.conn()?;
        if !PointRepo::set_light(&conn, group, point_id, is_light)? {
            return Err(StoreError::PointNotFound {
                group: group.to_owned(),
                point_id,
            });
        }
        Ok(Point {
            group_name: group.to_owned(),
            point_id,
            is_light,
        })
    }

    fn remove_point(&self, group: &str, point_id: PointId) -> Result<()> {
        let conn = self.conn()?;
        if !PointRepo::delete(&conn, group, point_id)? {
            return Err(StoreError::PointNotFound {
                group: group.to_owned(),
                point_id,
            });
        }
        Ok(())
    }

    fn get_characters(&self, group: &str) -> Result<Vec<Character>> {
        let conn = self.conn()?;
        CharacterRepo::list(&conn, group)
    }

    fn upsert_character(
        &self,
        group: &str,
        char_name: &str,
        traits: &CharacterTraits,
    ) -> Result<Upsert> {
        let conn = self.conn()?;
        let tx = begin_write(&conn)?;
        let outcome = if CharacterRepo::replace_traits(&tx, group, char_name, traits)? {
            Upsert::Updated
        } else {
            CharacterRepo::insert(
                &tx,
                &Character {
                    group_name: group.to_owned(),
                    char_name: char_name.to_owned(),
                    traits: traits.clone(),
                },
            )?;
            Upsert::Created
        };
        tx.commit()?;
        debug!(group, char_name, ?outcome, "character upserted");
        Ok(outcome)
    }

    fn update_character_trait(
        &self,
        group: &str,
        char_name: &str,
        name: CharacterTrait,
        value: &TraitValue,
    ) -> Result<Character> {
        let value = name.coerce(value)?;
        let conn = self.conn()?;
        let tx = begin_write(&conn)?;
        if !CharacterRepo::set_trait(&tx, group, char_name, name, &value)? {
            return Err(StoreError::CharacterNotFound {
                group: group.to_owned(),
                char_name: char_name.to_owned(),
            });
        }
        let character = CharacterRepo::get(&tx, group, char_name)?.ok_or_else(|| {
            StoreError::CharacterNotFound {
                group: group.to_owned(),
                char_name: char_name.to_owned(),
            }
        })?;
        tx.commit()?;
        Ok(character)
    }

    fn delete_character(&self, group: &str, char_name: &str) -> Result<()> {
        let conn = self.conn()?;
        if !CharacterRepo::delete(&conn, group, char_name)? {
            return Err(StoreError::CharacterNotFound {
                group: group.to_owned(),
                char_name: char_name.to_owned(),
            });
        }
        Ok(())
    }

    fn append_history(&self, event: &Event) -> Result<HistoryEvent> {
        let row = HistoryEvent {
            id: format!("hist_{}", Uuid::now_v7()),
            group_name: event.group_name.clone(),
            created_at: holotable_core::messages::now_timestamp(),
            event_type: event.message_type().to_string(),
            event_data: event.to_wire()?,
        };
        let conn = self.conn()?;
        HistoryRepo::insert(&conn, &row)?;
        Ok(row)
    }

    fn get_history(&self, group: &str) -> Result<Vec<HistoryEvent>> {
        let conn = self.conn()?;
        HistoryRepo::list_newest_first(&conn, group)
    }
}

//! History repository. Insert and read only; the schema rejects updates
//! and deletes.

use rusqlite::{Connection, params};

use crate::errors::Result;
use crate::models::HistoryEvent;

/// History repository. Stateless, every method takes `&Connection`.
pub struct HistoryRepo;

impl HistoryRepo {
    /// Append one row.
    pub fn insert(conn: &Connection, event: &HistoryEvent) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO history_events (id, group_name, created_at, event_type, event_data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id,
                event.group_name,
                event.created_at,
                event.event_type,
                event.event_data
            ],
        )?;
        Ok(())
    }

    /// All rows of a group, newest first.
    pub fn list_newest_first(conn: &Connection, group: &str) -> Result<Vec<HistoryEvent>> {
        let mut stmt = conn.prepare(
            "SELECT id, group_name, created_at, event_type, event_data FROM history_events
             WHERE group_name = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![group], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of rows in a group.
    pub fn count(conn: &Connection, group: &str) -> Result<i64> {
        let n = conn.query_row(
            "SELECT COUNT(*) FROM history_events WHERE group_name = ?1",
            params![group],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEvent> {
        Ok(HistoryEvent {
            id: row.get(0)?,
            group_name: row.get(1)?,
            created_at: row.get(2)?,
            event_type: row.get(3)?,
            event_data: row.get(4)?,
        })
    }
}

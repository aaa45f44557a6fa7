//! Destiny point repository.

use holotable_core::PointId;
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::models::Point;

/// Destiny point repository. Stateless, every method takes `&Connection`.
pub struct PointRepo;

impl PointRepo {
    /// All points of a group, ordered by id.
    pub fn list(conn: &Connection, group: &str) -> Result<Vec<Point>> {
        let mut stmt = conn.prepare(
            "SELECT group_name, point_id, is_light FROM destiny_points
             WHERE group_name = ?1 ORDER BY point_id",
        )?;
        let rows = stmt
            .query_map(params![group], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// One point, if present.
    pub fn get(conn: &Connection, group: &str, point_id: PointId) -> Result<Option<Point>> {
        let row = conn
            .query_row(
                "SELECT group_name, point_id, is_light FROM destiny_points
                 WHERE group_name = ?1 AND point_id = ?2",
                params![group, point_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Number of live points in a group.
    pub fn count(conn: &Connection, group: &str) -> Result<i64> {
        let n = conn.query_row(
            "SELECT COUNT(*) FROM destiny_points WHERE group_name = ?1",
            params![group],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Highest live id in a group, or 0.
    pub fn max_id(conn: &Connection, group: &str) -> Result<PointId> {
        let n = conn.query_row(
            "SELECT COALESCE(MAX(point_id), 0) FROM destiny_points WHERE group_name = ?1",
            params![group],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Id for the next point: live count + 1, or max + 1 if that id is still taken.
    pub fn next_id(conn: &Connection, group: &str) -> Result<PointId> {
        let candidate = Self::count(conn, group)? + 1;
        if Self::get(conn, group, candidate)?.is_none() {
            return Ok(candidate);
        }
        Ok(Self::max_id(conn, group)? + 1)
    }

    /// Insert a point.
    pub fn insert(conn: &Connection, point: &Point) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO destiny_points (group_name, point_id, is_light) VALUES (?1, ?2, ?3)",
            params![point.group_name, point.point_id, point.is_light],
        )?;
        Ok(())
    }

    /// Set a point's side. Returns whether a row changed.
    pub fn set_light(conn: &Connection, group: &str, point_id: PointId, is_light: bool) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE destiny_points SET is_light = ?3 WHERE group_name = ?1 AND point_id = ?2",
            params![group, point_id, is_light],
        )?;
        Ok(changed > 0)
    }

    /// Delete a point. Returns whether a row was removed.
    pub fn delete(conn: &Connection, group: &str, point_id: PointId) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM destiny_points WHERE group_name = ?1 AND point_id = ?2",
            params![group, point_id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Point> {
        Ok(Point {
            group_name: row.get(0)?,
            point_id: row.get(1)?,
            is_light: row.get(2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn
    }

    fn point(group: &str, point_id: PointId, is_light: bool) -> Point {
        Point {
            group_name: group.into(),
            point_id,
            is_light,
        }
    }

    #[test]
    fn next_id_starts_at_one() {
        let conn = setup();
        assert_eq!(PointRepo::next_id(&conn, "rebels").unwrap(), 1);
    }

    #[test]
    fn next_id_is_count_plus_one() {
        let conn = setup();
        PointRepo::insert(&conn, &point("rebels", 1, true)).unwrap();
        PointRepo::insert(&conn, &point("rebels", 2, false)).unwrap();
        assert_eq!(PointRepo::next_id(&conn, "rebels").unwrap(), 3);
    }

    #[test]
    fn next_id_skips_taken_slot() {
        let conn = setup();
        PointRepo::insert(&conn, &point("rebels", 2, true)).unwrap();
        PointRepo::insert(&conn, &point("rebels", 3, true)).unwrap();
        // count + 1 = 3 is taken
        assert_eq!(PointRepo::next_id(&conn, "rebels").unwrap(), 4);
    }

    #[test]
    fn groups_are_independent() {
        let conn = setup();
        PointRepo::insert(&conn, &point("rebels", 1, true)).unwrap();
        PointRepo::insert(&conn, &point("empire", 1, false)).unwrap();
        assert_eq!(PointRepo::count(&conn, "rebels").unwrap(), 1);
        assert_eq!(PointRepo::list(&conn, "empire").unwrap(), vec![point("empire", 1, false)]);
    }

    #[test]
    fn set_light_and_delete_report_missing_rows() {
        let conn = setup();
        assert!(!PointRepo::set_light(&conn, "rebels", 1, true).unwrap());
        assert!(!PointRepo::delete(&conn, "rebels", 1).unwrap());

        PointRepo::insert(&conn, &point("rebels", 1, true)).unwrap();
        assert!(PointRepo::set_light(&conn, "rebels", 1, false).unwrap());
        assert_eq!(PointRepo::get(&conn, "rebels", 1).unwrap(), Some(point("rebels", 1, false)));
        assert!(PointRepo::delete(&conn, "rebels", 1).unwrap());
        assert_eq!(PointRepo::get(&conn, "rebels", 1).unwrap(), None);
    }
}

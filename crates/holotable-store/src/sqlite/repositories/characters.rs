//! Character repository.
//!
//! Trait columns are addressed by [`CharacterTrait::as_str`], which is a
//! closed whitelist, so single-column updates can splice the column name into
//! SQL safely.

use holotable_core::{CharacterTrait, CharacterTraits, TraitValue};
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::models::Character;

const COLUMNS: &str = "group_name, char_name, wound_limit, wound_current, strain_limit, \
     strain_current, defense_melee, defense_ranged, soak, status_flags, image_url, \
     initiative_triumph, initiative_success, initiative_advantage";

/// Character repository. Stateless, every method takes `&Connection`.
pub struct CharacterRepo;

impl CharacterRepo {
    /// All characters of a group, ordered by name.
    pub fn list(conn: &Connection, group: &str) -> Result<Vec<Character>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM characters WHERE group_name = ?1 ORDER BY char_name"
        ))?;
        let rows = stmt
            .query_map(params![group], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// One character, if present.
    pub fn get(conn: &Connection, group: &str, char_name: &str) -> Result<Option<Character>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM characters WHERE group_name = ?1 AND char_name = ?2"),
                params![group, char_name],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert a new character.
    pub fn insert(conn: &Connection, character: &Character) -> Result<()> {
        let t = &character.traits;
        let _ = conn.execute(
            &format!(
                "INSERT INTO characters ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                character.group_name,
                character.char_name,
                t.wound_limit,
                t.wound_current,
                t.strain_limit,
                t.strain_current,
                t.defense_melee,
                t.defense_ranged,
                t.soak,
                t.status_flags,
                t.image_url,
                t.initiative_triumph,
                t.initiative_success,
                t.initiative_advantage,
            ],
        )?;
        Ok(())
    }

    /// Overwrite every trait of an existing character. Returns whether a row changed.
    pub fn replace_traits(
        conn: &Connection,
        group: &str,
        char_name: &str,
        t: &CharacterTraits,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE characters SET
               wound_limit = ?3, wound_current = ?4, strain_limit = ?5, strain_current = ?6,
               defense_melee = ?7, defense_ranged = ?8, soak = ?9, status_flags = ?10,
               image_url = ?11, initiative_triumph = ?12, initiative_success = ?13,
               initiative_advantage = ?14
             WHERE group_name = ?1 AND char_name = ?2",
            params![
                group,
                char_name,
                t.wound_limit,
                t.wound_current,
                t.strain_limit,
                t.strain_current,
                t.defense_melee,
                t.defense_ranged,
                t.soak,
                t.status_flags,
                t.image_url,
                t.initiative_triumph,
                t.initiative_success,
                t.initiative_advantage,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Write one trait column. `value` must already be coerced to the
    /// trait's kind. Returns whether a row changed.
    pub fn set_trait(
        conn: &Connection,
        group: &str,
        char_name: &str,
        name: CharacterTrait,
        value: &TraitValue,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE characters SET {} = ?3 WHERE group_name = ?1 AND char_name = ?2",
            name.as_str()
        );
        let changed = match value {
            TraitValue::Integer(n) => conn.execute(&sql, params![group, char_name, n])?,
            TraitValue::Text(s) => conn.execute(&sql, params![group, char_name, s])?,
        };
        Ok(changed > 0)
    }

    /// Delete a character. Returns whether a row was removed.
    pub fn delete(conn: &Connection, group: &str, char_name: &str) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM characters WHERE group_name = ?1 AND char_name = ?2",
            params![group, char_name],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Character> {
        Ok(Character {
            group_name: row.get(0)?,
            char_name: row.get(1)?,
            traits: CharacterTraits {
                wound_limit: row.get(2)?,
                wound_current: row.get(3)?,
                strain_limit: row.get(4)?,
                strain_current: row.get(5)?,
                defense_melee: row.get(6)?,
                defense_ranged: row.get(7)?,
                soak: row.get(8)?,
                status_flags: row.get(9)?,
                image_url: row.get(10)?,
                initiative_triumph: row.get(11)?,
                initiative_success: row.get(12)?,
                initiative_advantage: row.get(13)?,
            },
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

    fn kira(soak: i64) -> Character {
        Character {
            group_name: "rebels".into(),
            char_name: "Kira".into(),
            traits: CharacterTraits {
                wound_limit: 14,
                soak,
                status_flags: "prone".into(),
                ..CharacterTraits::default()
            },
        }
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let conn = setup();
        CharacterRepo::insert(&conn, &kira(3)).unwrap();
        assert_eq!(CharacterRepo::get(&conn, "rebels", "Kira").unwrap(), Some(kira(3)));
        assert_eq!(CharacterRepo::get(&conn, "empire", "Kira").unwrap(), None);
    }

    #[test]
    fn duplicate_insert_violates_primary_key() {
        let conn = setup();
        CharacterRepo::insert(&conn, &kira(3)).unwrap();
        assert!(CharacterRepo::insert(&conn, &kira(4)).is_err());
    }

    #[test]
    fn replace_traits_overwrites_all_columns() {
        let conn = setup();
        CharacterRepo::insert(&conn, &kira(3)).unwrap();
        let fresh = CharacterTraits {
            soak: 5,
            ..CharacterTraits::default()
        };
        assert!(CharacterRepo::replace_traits(&conn, "rebels", "Kira", &fresh).unwrap());
        let stored = CharacterRepo::get(&conn, "rebels", "Kira").unwrap().unwrap();
        assert_eq!(stored.traits, fresh);
    }

    #[test]
    fn set_trait_integer_and_text() {
        let conn = setup();
        CharacterRepo::insert(&conn, &kira(3)).unwrap();
        assert!(CharacterRepo::set_trait(
            &conn,
            "rebels",
            "Kira",
            CharacterTrait::WoundCurrent,
            &TraitValue::Integer(6)
        )
        .unwrap());
        assert!(CharacterRepo::set_trait(
            &conn,
            "rebels",
            "Kira",
            CharacterTrait::ImageUrl,
            &TraitValue::Text("kira.png".into())
        )
        .unwrap());
        let stored = CharacterRepo::get(&conn, "rebels", "Kira").unwrap().unwrap();
        assert_eq!(stored.traits.wound_current, 6);
        assert_eq!(stored.traits.image_url, "kira.png");
        assert_eq!(stored.traits.soak, 3);
    }

    #[test]
    fn missing_rows_report_false() {
        let conn = setup();
        assert!(!CharacterRepo::set_trait(
            &conn,
            "rebels",
            "Nobody",
            CharacterTrait::Soak,
            &TraitValue::Integer(1)
        )
        .unwrap());
        assert!(!CharacterRepo::delete(&conn, "rebels", "Nobody").unwrap());
    }

    #[test]
    fn list_is_sorted_by_name() {
        let conn = setup();
        let mut zed = kira(1);
        zed.char_name = "Zed".into();
        CharacterRepo::insert(&conn, &zed).unwrap();
        CharacterRepo::insert(&conn, &kira(2)).unwrap();
        let names: Vec<_> = CharacterRepo::list(&conn, "rebels")
            .unwrap()
            .into_iter()
            .map(|c| c.char_name)
            .collect();
        assert_eq!(names, vec!["Kira", "Zed"]);
    }
}

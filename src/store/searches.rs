//! Saved JQL searches.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;

use super::{fmt_ts, parse_ts, Database, StoreResult};

/// A named JQL query kept for reuse.
#[derive(Debug, Clone, Serialize)]
pub struct SavedSearch {
    pub id: i64,
    pub name: String,
    pub jql_query: String,
    pub description: String,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Save a search under a name, replacing the query if the name exists.
    pub fn save_search(
        &self,
        name: &str,
        jql: &str,
        description: Option<&str>,
    ) -> StoreResult<SavedSearch> {
        let tx = self.conn().unchecked_transaction()?;
        let now = fmt_ts(Utc::now());

        let existing: Option<i64> = tx
            .query_row("SELECT id FROM saved_searches WHERE name = ?", [name], |r| {
                r.get(0)
            })
            .optional()?;

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE saved_searches
                     SET jql_query = ?, description = COALESCE(?, description), updated_at = ?
                     WHERE id = ?",
                    params![jql, description, now, id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO saved_searches
                        (name, jql_query, description, is_favorite, created_at, updated_at)
                     VALUES (?, ?, ?, 0, ?, ?)",
                    params![name, jql, description.unwrap_or_default(), now, now],
                )?;
                tx.last_insert_rowid()
            }
        };
        tx.commit()?;

        info!(name, "Saved search");
        Ok(self
            .get_search(name)?
            .unwrap_or(SavedSearch {
                id,
                name: name.to_string(),
                jql_query: jql.to_string(),
                description: description.unwrap_or_default().to_string(),
                is_favorite: false,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }))
    }

    /// Get one saved search by name.
    pub fn get_search(&self, name: &str) -> StoreResult<Option<SavedSearch>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, name, jql_query, description, is_favorite, created_at, updated_at
                 FROM saved_searches WHERE name = ?",
                [name],
                search_from_row,
            )
            .optional()?)
    }

    /// List saved searches, favorites first, most recently updated next.
    pub fn list_searches(&self) -> StoreResult<Vec<SavedSearch>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, jql_query, description, is_favorite, created_at, updated_at
             FROM saved_searches ORDER BY is_favorite DESC, updated_at DESC",
        )?;
        let rows = stmt.query_map([], search_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Delete a saved search by name. Returns whether a row was removed.
    pub fn delete_search(&self, name: &str) -> StoreResult<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM saved_searches WHERE name = ?", [name])?;
        Ok(deleted > 0)
    }

    /// Set or clear the favorite flag. Returns whether the search exists.
    pub fn set_search_favorite(&self, name: &str, favorite: bool) -> StoreResult<bool> {
        let updated = self.conn().execute(
            "UPDATE saved_searches SET is_favorite = ?, updated_at = ? WHERE name = ?",
            params![favorite, fmt_ts(Utc::now()), name],
        )?;
        Ok(updated > 0)
    }
}

fn search_from_row(row: &Row) -> rusqlite::Result<SavedSearch> {
    let created: String = row.get(5)?;
    let updated: String = row.get(6)?;
    Ok(SavedSearch {
        id: row.get(0)?,
        name: row.get(1)?,
        jql_query: row.get(2)?,
        description: row.get(3)?,
        is_favorite: row.get(4)?,
        created_at: parse_ts(&created).map_err(|e| conversion_err(5, e))?,
        updated_at: parse_ts(&updated).map_err(|e| conversion_err(6, e))?,
    })
}

fn conversion_err(idx: usize, e: super::StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_get_search() {
        let db = Database::in_memory().unwrap();
        db.save_search("mine", "assignee = currentUser()", Some("my open work"))
            .unwrap();

        let search = db.get_search("mine").unwrap().unwrap();
        assert_eq!(search.jql_query, "assignee = currentUser()");
        assert_eq!(search.description, "my open work");
        assert!(!search.is_favorite);
    }

    #[test]
    fn test_save_search_upserts_by_name() {
        let db = Database::in_memory().unwrap();
        let first = db.save_search("mine", "status = Open", None).unwrap();
        let second = db.save_search("mine", "status = Done", None).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.jql_query, "status = Done");
        assert_eq!(db.list_searches().unwrap().len(), 1);
    }

    #[test]
    fn test_favorites_sort_first() {
        let db = Database::in_memory().unwrap();
        db.save_search("plain", "a = 1", None).unwrap();
        db.save_search("starred", "b = 2", None).unwrap();
        assert!(db.set_search_favorite("starred", true).unwrap());

        let list = db.list_searches().unwrap();
        assert_eq!(list[0].name, "starred");
        assert!(list[0].is_favorite);
    }

    #[test]
    fn test_delete_search() {
        let db = Database::in_memory().unwrap();
        db.save_search("gone", "x = 1", None).unwrap();
        assert!(db.delete_search("gone").unwrap());
        assert!(!db.delete_search("gone").unwrap());
        assert!(db.get_search("gone").unwrap().is_none());
    }

    #[test]
    fn test_favorite_missing_search() {
        let db = Database::in_memory().unwrap();
        assert!(!db.set_search_favorite("nope", true).unwrap());
    }
}

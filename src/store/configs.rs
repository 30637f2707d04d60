//! Connection configuration storage.
//!
//! At most one configuration is active at a time: every write that activates
//! a row deactivates all others inside the same transaction.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::{fmt_ts, parse_ts, Database, StoreResult};

/// A stored Jira connection configuration.
#[derive(Debug, Clone, Serialize)]
pub struct JiraConfiguration {
    pub id: i64,
    pub name: String,
    pub jira_url: String,
    pub email: String,
    /// Never serialized by default; use [`JiraConfiguration::to_json`] with
    /// `include_token` when the caller explicitly asked for it.
    #[serde(skip_serializing)]
    pub api_token: String,
    pub project_key: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JiraConfiguration {
    /// JSON view, optionally including the API token.
    pub fn to_json(&self, include_token: bool) -> Value {
        let mut value = json!({
            "id": self.id,
            "name": self.name,
            "jira_url": self.jira_url,
            "email": self.email,
            "project_key": self.project_key,
            "is_active": self.is_active,
            "created_at": fmt_ts(self.created_at),
            "updated_at": fmt_ts(self.updated_at),
        });
        if include_token {
            value["api_token"] = Value::String(self.api_token.clone());
        }
        value
    }
}

/// Fields for a new configuration.
#[derive(Debug, Clone)]
pub struct NewConfiguration {
    pub name: String,
    pub jira_url: String,
    pub email: String,
    pub api_token: String,
    pub project_key: Option<String>,
    pub is_active: bool,
}

/// Partial update of a configuration; `None` leaves the field alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationUpdate {
    pub name: Option<String>,
    pub jira_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
    pub project_key: Option<String>,
    pub is_active: Option<bool>,
}

impl Database {
    /// Create a configuration. Creating it active deactivates all others.
    pub fn create_configuration(
        &self,
        new: &NewConfiguration,
    ) -> StoreResult<JiraConfiguration> {
        let tx = self.conn().unchecked_transaction()?;

        if new.is_active {
            tx.execute("UPDATE jira_configurations SET is_active = 0", [])?;
        }

        let now = Utc::now();
        tx.execute(
            "INSERT INTO jira_configurations
                (name, jira_url, email, api_token, project_key, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                new.name,
                new.jira_url,
                new.email,
                new.api_token,
                new.project_key.clone().unwrap_or_default(),
                new.is_active,
                fmt_ts(now),
                fmt_ts(now),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(config = %new.name, id, "Created Jira configuration");
        Ok(JiraConfiguration {
            id,
            name: new.name.clone(),
            jira_url: new.jira_url.clone(),
            email: new.email.clone(),
            api_token: new.api_token.clone(),
            project_key: new.project_key.clone().unwrap_or_default(),
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        })
    }

    /// List all configurations, newest first.
    pub fn list_configurations(&self) -> StoreResult<Vec<JiraConfiguration>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, jira_url, email, api_token, project_key, is_active,
                    created_at, updated_at
             FROM jira_configurations ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], config_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Get one configuration by ID.
    pub fn get_configuration(&self, id: i64) -> StoreResult<Option<JiraConfiguration>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, name, jira_url, email, api_token, project_key, is_active,
                        created_at, updated_at
                 FROM jira_configurations WHERE id = ?",
                [id],
                config_from_row,
            )
            .optional()?)
    }

    /// Apply a partial update. Activating here also deactivates all others.
    ///
    /// Returns `None` when the configuration does not exist.
    pub fn update_configuration(
        &self,
        id: i64,
        update: &ConfigurationUpdate,
    ) -> StoreResult<Option<JiraConfiguration>> {
        let tx = self.conn().unchecked_transaction()?;

        let existing = tx
            .query_row(
                "SELECT id, name, jira_url, email, api_token, project_key, is_active,
                        created_at, updated_at
                 FROM jira_configurations WHERE id = ?",
                [id],
                config_from_row,
            )
            .optional()?;
        let Some(mut config) = existing else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            config.name = name.clone();
        }
        if let Some(url) = &update.jira_url {
            config.jira_url = url.clone();
        }
        if let Some(email) = &update.email {
            config.email = email.clone();
        }
        if let Some(token) = &update.api_token {
            config.api_token = token.clone();
        }
        if let Some(key) = &update.project_key {
            config.project_key = key.clone();
        }
        if let Some(active) = update.is_active {
            if active {
                tx.execute(
                    "UPDATE jira_configurations SET is_active = 0 WHERE id != ?",
                    [id],
                )?;
            }
            config.is_active = active;
        }
        config.updated_at = Utc::now();

        tx.execute(
            "UPDATE jira_configurations
             SET name = ?, jira_url = ?, email = ?, api_token = ?, project_key = ?,
                 is_active = ?, updated_at = ?
             WHERE id = ?",
            params![
                config.name,
                config.jira_url,
                config.email,
                config.api_token,
                config.project_key,
                config.is_active,
                fmt_ts(config.updated_at),
                id,
            ],
        )?;
        tx.commit()?;

        info!(config = %config.name, id, "Updated Jira configuration");
        Ok(Some(config))
    }

    /// Delete a configuration. Returns whether a row was removed.
    pub fn delete_configuration(&self, id: i64) -> StoreResult<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM jira_configurations WHERE id = ?", [id])?;
        Ok(deleted > 0)
    }

    /// Activate one configuration, deactivating all others.
    ///
    /// Returns the activated row, or `None` when it does not exist.
    pub fn activate_configuration(&self, id: i64) -> StoreResult<Option<JiraConfiguration>> {
        let tx = self.conn().unchecked_transaction()?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM jira_configurations WHERE id = ?",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }

        tx.execute("UPDATE jira_configurations SET is_active = 0", [])?;
        tx.execute(
            "UPDATE jira_configurations SET is_active = 1, updated_at = ? WHERE id = ?",
            params![fmt_ts(Utc::now()), id],
        )?;
        tx.commit()?;

        info!(id, "Activated Jira configuration");
        self.get_configuration(id)
    }

    /// Get the single active configuration, if any.
    pub fn active_configuration(&self) -> StoreResult<Option<JiraConfiguration>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, name, jira_url, email, api_token, project_key, is_active,
                        created_at, updated_at
                 FROM jira_configurations WHERE is_active = 1 LIMIT 1",
                [],
                config_from_row,
            )
            .optional()?)
    }
}

fn config_from_row(row: &Row) -> rusqlite::Result<JiraConfiguration> {
    let created: String = row.get(7)?;
    let updated: String = row.get(8)?;
    Ok(JiraConfiguration {
        id: row.get(0)?,
        name: row.get(1)?,
        jira_url: row.get(2)?,
        email: row.get(3)?,
        api_token: row.get(4)?,
        project_key: row.get(5)?,
        is_active: row.get(6)?,
        created_at: parse_ts(&created).map_err(|e| conversion_err(7, e))?,
        updated_at: parse_ts(&updated).map_err(|e| conversion_err(8, e))?,
    })
}

fn conversion_err(idx: usize, e: super::StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_config(name: &str, active: bool) -> NewConfiguration {
        NewConfiguration {
            name: name.to_string(),
            jira_url: "company.atlassian.net".to_string(),
            email: "user@example.com".to_string(),
            api_token: "token".to_string(),
            project_key: Some("PROJ".to_string()),
            is_active: active,
        }
    }

    fn active_count(db: &Database) -> i64 {
        db.conn()
            .query_row(
                "SELECT COUNT(*) FROM jira_configurations WHERE is_active = 1",
                [],
                |r| r.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_create_and_get_configuration() {
        let db = Database::in_memory().unwrap();
        let created = db.create_configuration(&new_config("prod", true)).unwrap();

        let fetched = db.get_configuration(created.id).unwrap().unwrap();
        assert_eq!(fetched.name, "prod");
        assert_eq!(fetched.project_key, "PROJ");
        assert!(fetched.is_active);
    }

    #[test]
    fn test_create_active_deactivates_others() {
        let db = Database::in_memory().unwrap();
        let first = db.create_configuration(&new_config("first", true)).unwrap();
        let second = db.create_configuration(&new_config("second", true)).unwrap();

        assert_eq!(active_count(&db), 1);
        assert!(!db.get_configuration(first.id).unwrap().unwrap().is_active);
        assert!(db.get_configuration(second.id).unwrap().unwrap().is_active);
    }

    #[test]
    fn test_activate_leaves_exactly_one_active() {
        let db = Database::in_memory().unwrap();
        let a = db.create_configuration(&new_config("a", true)).unwrap();
        let b = db.create_configuration(&new_config("b", false)).unwrap();
        let c = db.create_configuration(&new_config("c", false)).unwrap();

        let activated = db.activate_configuration(b.id).unwrap().unwrap();
        assert!(activated.is_active);
        assert_eq!(active_count(&db), 1);
        assert!(!db.get_configuration(a.id).unwrap().unwrap().is_active);
        assert!(!db.get_configuration(c.id).unwrap().unwrap().is_active);

        let active = db.active_configuration().unwrap().unwrap();
        assert_eq!(active.id, b.id);
    }

    #[test]
    fn test_activate_missing_configuration() {
        let db = Database::in_memory().unwrap();
        assert!(db.activate_configuration(99).unwrap().is_none());
    }

    #[test]
    fn test_update_partial_fields() {
        let db = Database::in_memory().unwrap();
        let created = db.create_configuration(&new_config("prod", false)).unwrap();

        let update = ConfigurationUpdate {
            email: Some("new@example.com".to_string()),
            ..Default::default()
        };
        let updated = db
            .update_configuration(created.id, &update)
            .unwrap()
            .unwrap();

        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.name, "prod");
        assert_eq!(updated.api_token, "token");
    }

    #[test]
    fn test_update_activation_enforces_invariant() {
        let db = Database::in_memory().unwrap();
        let a = db.create_configuration(&new_config("a", true)).unwrap();
        let b = db.create_configuration(&new_config("b", false)).unwrap();

        let update = ConfigurationUpdate {
            is_active: Some(true),
            ..Default::default()
        };
        db.update_configuration(b.id, &update).unwrap().unwrap();

        assert_eq!(active_count(&db), 1);
        assert!(!db.get_configuration(a.id).unwrap().unwrap().is_active);
    }

    #[test]
    fn test_delete_configuration() {
        let db = Database::in_memory().unwrap();
        let created = db.create_configuration(&new_config("gone", false)).unwrap();

        assert!(db.delete_configuration(created.id).unwrap());
        assert!(!db.delete_configuration(created.id).unwrap());
        assert!(db.get_configuration(created.id).unwrap().is_none());
    }

    #[test]
    fn test_no_active_configuration() {
        let db = Database::in_memory().unwrap();
        db.create_configuration(&new_config("idle", false)).unwrap();
        assert!(db.active_configuration().unwrap().is_none());
    }

    #[test]
    fn test_to_json_hides_token_by_default() {
        let db = Database::in_memory().unwrap();
        let config = db.create_configuration(&new_config("prod", false)).unwrap();

        let without = config.to_json(false);
        assert!(without.get("api_token").is_none());

        let with = config.to_json(true);
        assert_eq!(with["api_token"], "token");
    }
}

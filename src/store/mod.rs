//! Local SQLite store.
//!
//! Holds the relational cache (projects, issues), connection configurations,
//! the activity log, and saved searches. One connection per process; callers
//! are single synchronous units of work and the last committed write wins.

mod activity;
mod configs;
mod searches;
mod sync;

pub use configs::{ConfigurationUpdate, JiraConfiguration, NewConfiguration};

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;

/// Errors from the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem error while locating or creating the database.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not determine where to put the database.
    #[error("Could not determine data directory")]
    NoDataDir,

    /// A stored timestamp did not parse.
    #[error("Invalid stored timestamp '{0}'")]
    BadTimestamp(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.run_migrations()?;
        Ok(db)
    }

    /// The default database path under the platform data directory.
    pub fn default_path() -> StoreResult<PathBuf> {
        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
            .ok_or(StoreError::NoDataDir)?;
        Ok(data_dir.join("projecthub").join("cache.db"))
    }

    /// Run idempotent schema migrations.
    fn run_migrations(&self) -> StoreResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get a reference to the connection.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Schema for all tables. Business keys carry the UNIQUE constraints.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    project_key TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    lead TEXT NOT NULL DEFAULT '',
    project_type TEXT NOT NULL DEFAULT '',
    cached_at TEXT NOT NULL,
    raw_data TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS cached_issues (
    id INTEGER PRIMARY KEY,
    issue_key TEXT NOT NULL UNIQUE,
    project_key TEXT NOT NULL DEFAULT '',
    summary TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT '',
    priority TEXT NOT NULL DEFAULT '',
    issue_type TEXT NOT NULL DEFAULT '',
    assignee TEXT,
    reporter TEXT,
    created_date TEXT,
    updated_date TEXT,
    cached_at TEXT NOT NULL,
    raw_data TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_cached_issues_project
    ON cached_issues(project_key);

CREATE TABLE IF NOT EXISTS jira_configurations (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    jira_url TEXT NOT NULL,
    email TEXT NOT NULL,
    api_token TEXT NOT NULL,
    project_key TEXT NOT NULL DEFAULT '',
    is_active INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS activity_logs (
    id INTEGER PRIMARY KEY,
    action TEXT NOT NULL,
    resource_type TEXT,
    resource_id TEXT,
    details TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_activity_logs_created
    ON activity_logs(created_at);

CREATE TABLE IF NOT EXISTS saved_searches (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    jql_query TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    is_favorite INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Format a timestamp for storage.
///
/// RFC 3339 UTC with microseconds and a `Z` suffix; uniform formatting keeps
/// lexicographic and chronological order identical, which the purge relies
/// on.
pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub(crate) fn parse_ts(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::BadTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_database_migrates() {
        let db = Database::in_memory().unwrap();
        // All tables exist after migration.
        for table in [
            "projects",
            "cached_issues",
            "jira_configurations",
            "activity_logs",
            "saved_searches",
        ] {
            let count: i64 = db
                .conn()
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let db = Database::in_memory().unwrap();
        db.run_migrations().unwrap();
        db.run_migrations().unwrap();
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");
        let _db = Database::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_timestamp_round_trip() {
        let now = Utc::now();
        let parsed = parse_ts(&fmt_ts(now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_timestamp_order_is_lexicographic() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::seconds(90);
        assert!(fmt_ts(earlier) < fmt_ts(later));
    }

    #[test]
    fn test_parse_ts_rejects_garbage() {
        assert!(matches!(
            parse_ts("not-a-date"),
            Err(StoreError::BadTimestamp(_))
        ));
    }
}

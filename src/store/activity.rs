//! Activity log: one row per user-visible operation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::{fmt_ts, parse_ts, Database, StoreResult};

/// One recorded activity.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Database {
    /// Record one activity row.
    pub fn record_activity(
        &self,
        action: &str,
        resource_type: Option<&str>,
        resource_id: Option<&str>,
        details: Option<&Value>,
    ) -> StoreResult<()> {
        self.conn().execute(
            "INSERT INTO activity_logs (action, resource_type, resource_id, details, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                action,
                resource_type,
                resource_id,
                details.map(Value::to_string),
                fmt_ts(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Record an activity, logging instead of failing.
    ///
    /// Activity is decoration around the real operation; a full disk or a
    /// locked database must not break the command that triggered it.
    pub fn record_activity_best_effort(
        &self,
        action: &str,
        resource_type: Option<&str>,
        resource_id: Option<&str>,
    ) {
        if let Err(e) = self.record_activity(action, resource_type, resource_id, None) {
            warn!(action, error = %e, "Error recording activity");
        }
    }

    /// The most recent activity rows, newest first.
    pub fn recent_activity(&self, limit: u32) -> StoreResult<Vec<ActivityEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, action, resource_type, resource_id, details, created_at
             FROM activity_logs ORDER BY created_at DESC, id DESC LIMIT ?",
        )?;
        let rows = stmt.query_map([limit], activity_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn activity_from_row(row: &Row) -> rusqlite::Result<ActivityEntry> {
    let created: String = row.get(5)?;
    Ok(ActivityEntry {
        id: row.get(0)?,
        action: row.get(1)?,
        resource_type: row.get(2)?,
        resource_id: row.get(3)?,
        details: row.get(4)?,
        created_at: parse_ts(&created).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_list_activity() {
        let db = Database::in_memory().unwrap();
        db.record_activity("view_issue", Some("issue"), Some("PROJ-1"), None)
            .unwrap();
        db.record_activity(
            "search",
            None,
            None,
            Some(&json!({"jql": "project = PROJ"})),
        )
        .unwrap();

        let entries = db.recent_activity(10).unwrap();
        assert_eq!(entries.len(), 2);
        // Newest first.
        assert_eq!(entries[0].action, "search");
        assert!(entries[0].details.as_deref().unwrap().contains("PROJ"));
        assert_eq!(entries[1].resource_id.as_deref(), Some("PROJ-1"));
    }

    #[test]
    fn test_recent_activity_honors_limit() {
        let db = Database::in_memory().unwrap();
        for i in 0..5 {
            db.record_activity("view_issue", Some("issue"), Some(&format!("PROJ-{}", i)), None)
                .unwrap();
        }
        assert_eq!(db.recent_activity(3).unwrap().len(), 3);
    }
}

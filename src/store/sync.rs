//! Cache synchronizer: idempotent upserts of fetched Jira entities.
//!
//! Entities are keyed by their business key (project key, issue key). An
//! upsert merges non-empty incoming fields over the existing row via an
//! explicit per-field coalesce rule, so a sparse payload never wipes data a
//! fuller fetch already stored. The raw payload column always mirrors the
//! latest fetch and the cache timestamp advances on every upsert.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::api::types::nested_str;

use super::{fmt_ts, parse_ts, Database, StoreResult};

/// A locally cached project.
#[derive(Debug, Clone, Serialize)]
pub struct CachedProject {
    pub id: i64,
    pub project_key: String,
    pub name: String,
    pub description: String,
    pub lead: String,
    pub project_type: String,
    pub cached_at: DateTime<Utc>,
    /// Full JSON payload from the latest fetch. Not serialized in listings.
    #[serde(skip_serializing)]
    pub raw_data: String,
}

/// A locally cached issue.
#[derive(Debug, Clone, Serialize)]
pub struct CachedIssue {
    pub id: i64,
    pub issue_key: String,
    pub project_key: String,
    pub summary: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub issue_type: String,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
    pub updated_date: Option<DateTime<Utc>>,
    pub cached_at: DateTime<Utc>,
    /// Full JSON payload from the latest fetch. Not serialized in listings.
    #[serde(skip_serializing)]
    pub raw_data: String,
}

impl Database {
    /// Cache or update a project from its raw payload.
    ///
    /// Returns `Ok(None)` when the payload has no `key`; that is a
    /// warn-and-skip, not an error.
    pub fn cache_project(&self, payload: &Value) -> StoreResult<Option<CachedProject>> {
        let Some(key) = nested_str(payload, &["key"]) else {
            warn!("Project payload missing 'key' field");
            return Ok(None);
        };

        let tx = self.conn().unchecked_transaction()?;

        let existing = tx
            .query_row(
                "SELECT id, project_key, name, description, lead, project_type, cached_at, raw_data
                 FROM projects WHERE project_key = ?",
                [key],
                project_from_row,
            )
            .optional()?;

        let now = Utc::now();
        let raw = payload.to_string();
        let merged = match existing {
            Some(prev) => {
                let project = CachedProject {
                    id: prev.id,
                    project_key: prev.project_key,
                    name: merge_field(nested_str(payload, &["name"]), &prev.name),
                    description: merge_field(
                        nested_str(payload, &["description"]),
                        &prev.description,
                    ),
                    lead: merge_field(nested_str(payload, &["lead", "displayName"]), &prev.lead),
                    project_type: merge_field(
                        nested_str(payload, &["projectTypeKey"]),
                        &prev.project_type,
                    ),
                    cached_at: now,
                    raw_data: raw,
                };
                tx.execute(
                    "UPDATE projects
                     SET name = ?, description = ?, lead = ?, project_type = ?,
                         cached_at = ?, raw_data = ?
                     WHERE id = ?",
                    params![
                        project.name,
                        project.description,
                        project.lead,
                        project.project_type,
                        fmt_ts(project.cached_at),
                        project.raw_data,
                        project.id,
                    ],
                )?;
                info!(project_key = %project.project_key, "Updated project cache");
                project
            }
            None => {
                let project = CachedProject {
                    id: 0,
                    project_key: key.to_string(),
                    name: field_or_empty(payload, &["name"]),
                    description: field_or_empty(payload, &["description"]),
                    lead: field_or_empty(payload, &["lead", "displayName"]),
                    project_type: field_or_empty(payload, &["projectTypeKey"]),
                    cached_at: now,
                    raw_data: raw,
                };
                tx.execute(
                    "INSERT INTO projects
                        (project_key, name, description, lead, project_type, cached_at, raw_data)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params![
                        project.project_key,
                        project.name,
                        project.description,
                        project.lead,
                        project.project_type,
                        fmt_ts(project.cached_at),
                        project.raw_data,
                    ],
                )?;
                let id = tx.last_insert_rowid();
                info!(project_key = %project.project_key, "Created project cache");
                CachedProject { id, ..project }
            }
        };

        tx.commit()?;
        Ok(Some(merged))
    }

    /// Cache or update an issue from its raw payload.
    ///
    /// The project key derives from `fields.project.key`, falling back to the
    /// issue-key prefix. Unparseable dates are logged and leave the existing
    /// value untouched.
    pub fn cache_issue(&self, payload: &Value) -> StoreResult<Option<CachedIssue>> {
        let Some(key) = nested_str(payload, &["key"]) else {
            warn!("Issue payload missing 'key' field");
            return Ok(None);
        };

        let created = parse_issue_date(nested_str(payload, &["fields", "created"]), key, "created");
        let updated = parse_issue_date(nested_str(payload, &["fields", "updated"]), key, "updated");
        let project_key = nested_str(payload, &["fields", "project", "key"])
            .or_else(|| key.split_once('-').map(|(prefix, _)| prefix));

        let tx = self.conn().unchecked_transaction()?;

        let existing = tx
            .query_row(
                "SELECT id, issue_key, project_key, summary, description, status, priority,
                        issue_type, assignee, reporter, created_date, updated_date, cached_at,
                        raw_data
                 FROM cached_issues WHERE issue_key = ?",
                [key],
                issue_from_row,
            )
            .optional()?;

        let now = Utc::now();
        let raw = payload.to_string();
        let merged = match existing {
            Some(prev) => {
                let issue = CachedIssue {
                    id: prev.id,
                    issue_key: prev.issue_key,
                    project_key: merge_field(project_key, &prev.project_key),
                    summary: merge_field(nested_str(payload, &["fields", "summary"]), &prev.summary),
                    description: merge_field(
                        nested_str(payload, &["fields", "description"]),
                        &prev.description,
                    ),
                    status: merge_field(
                        nested_str(payload, &["fields", "status", "name"]),
                        &prev.status,
                    ),
                    priority: merge_field(
                        nested_str(payload, &["fields", "priority", "name"]),
                        &prev.priority,
                    ),
                    issue_type: merge_field(
                        nested_str(payload, &["fields", "issuetype", "name"]),
                        &prev.issue_type,
                    ),
                    assignee: merge_opt(
                        nested_str(payload, &["fields", "assignee", "displayName"]),
                        prev.assignee,
                    ),
                    reporter: merge_opt(
                        nested_str(payload, &["fields", "reporter", "displayName"]),
                        prev.reporter,
                    ),
                    created_date: created.or(prev.created_date),
                    updated_date: updated.or(prev.updated_date),
                    cached_at: now,
                    raw_data: raw,
                };
                tx.execute(
                    "UPDATE cached_issues
                     SET project_key = ?, summary = ?, description = ?, status = ?,
                         priority = ?, issue_type = ?, assignee = ?, reporter = ?,
                         created_date = ?, updated_date = ?, cached_at = ?, raw_data = ?
                     WHERE id = ?",
                    params![
                        issue.project_key,
                        issue.summary,
                        issue.description,
                        issue.status,
                        issue.priority,
                        issue.issue_type,
                        issue.assignee,
                        issue.reporter,
                        issue.created_date.map(fmt_ts),
                        issue.updated_date.map(fmt_ts),
                        fmt_ts(issue.cached_at),
                        issue.raw_data,
                        issue.id,
                    ],
                )?;
                info!(issue_key = %issue.issue_key, "Updated issue cache");
                issue
            }
            None => {
                let issue = CachedIssue {
                    id: 0,
                    issue_key: key.to_string(),
                    project_key: project_key.unwrap_or_default().to_string(),
                    summary: field_or_empty(payload, &["fields", "summary"]),
                    description: field_or_empty(payload, &["fields", "description"]),
                    status: field_or_empty(payload, &["fields", "status", "name"]),
                    priority: field_or_empty(payload, &["fields", "priority", "name"]),
                    issue_type: field_or_empty(payload, &["fields", "issuetype", "name"]),
                    assignee: nested_str(payload, &["fields", "assignee", "displayName"])
                        .map(String::from),
                    reporter: nested_str(payload, &["fields", "reporter", "displayName"])
                        .map(String::from),
                    created_date: created,
                    updated_date: updated,
                    cached_at: now,
                    raw_data: raw,
                };
                tx.execute(
                    "INSERT INTO cached_issues
                        (issue_key, project_key, summary, description, status, priority,
                         issue_type, assignee, reporter, created_date, updated_date,
                         cached_at, raw_data)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        issue.issue_key,
                        issue.project_key,
                        issue.summary,
                        issue.description,
                        issue.status,
                        issue.priority,
                        issue.issue_type,
                        issue.assignee,
                        issue.reporter,
                        issue.created_date.map(fmt_ts),
                        issue.updated_date.map(fmt_ts),
                        fmt_ts(issue.cached_at),
                        issue.raw_data,
                    ],
                )?;
                let id = tx.last_insert_rowid();
                info!(issue_key = %issue.issue_key, "Created issue cache");
                CachedIssue { id, ..issue }
            }
        };

        tx.commit()?;
        Ok(Some(merged))
    }

    /// Cache a batch of issues, returning the count persisted.
    ///
    /// Each issue commits independently; a failure is logged, rolled back for
    /// that issue only, and does not abort the batch.
    pub fn cache_issues(&self, payloads: &[Value]) -> usize {
        let mut cached = 0;
        for payload in payloads {
            match self.cache_issue(payload) {
                Ok(Some(_)) => cached += 1,
                Ok(None) => {}
                Err(e) => error!(error = %e, "Error caching issue"),
            }
        }
        cached
    }

    /// Get a cached project by key.
    pub fn cached_project(&self, project_key: &str) -> StoreResult<Option<CachedProject>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, project_key, name, description, lead, project_type, cached_at, raw_data
                 FROM projects WHERE project_key = ?",
                [project_key],
                project_from_row,
            )
            .optional()?)
    }

    /// Get a cached issue by key.
    pub fn cached_issue(&self, issue_key: &str) -> StoreResult<Option<CachedIssue>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, issue_key, project_key, summary, description, status, priority,
                        issue_type, assignee, reporter, created_date, updated_date, cached_at,
                        raw_data
                 FROM cached_issues WHERE issue_key = ?",
                [issue_key],
                issue_from_row,
            )
            .optional()?)
    }

    /// List cached issues, newest-updated first.
    pub fn cached_issues(
        &self,
        project_key: Option<&str>,
        limit: u32,
    ) -> StoreResult<Vec<CachedIssue>> {
        let conn = self.conn();
        let mut out = Vec::new();

        match project_key.filter(|k| !k.is_empty()) {
            Some(key) => {
                let mut stmt = conn.prepare(
                    "SELECT id, issue_key, project_key, summary, description, status, priority,
                            issue_type, assignee, reporter, created_date, updated_date, cached_at,
                            raw_data
                     FROM cached_issues WHERE project_key = ?
                     ORDER BY updated_date DESC LIMIT ?",
                )?;
                let rows = stmt.query_map(params![key, limit], issue_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, issue_key, project_key, summary, description, status, priority,
                            issue_type, assignee, reporter, created_date, updated_date, cached_at,
                            raw_data
                     FROM cached_issues ORDER BY updated_date DESC LIMIT ?",
                )?;
                let rows = stmt.query_map(params![limit], issue_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }

        Ok(out)
    }

    /// Delete cache entries older than the retention window, across both
    /// entity types. Returns the total deleted; a window of zero days clears
    /// everything.
    pub fn purge_older_than(&self, days: i64) -> StoreResult<usize> {
        let cutoff = fmt_ts(Utc::now() - Duration::days(days));

        let tx = self.conn().unchecked_transaction()?;
        let projects = tx.execute("DELETE FROM projects WHERE cached_at <= ?", [&cutoff])?;
        let issues = tx.execute("DELETE FROM cached_issues WHERE cached_at <= ?", [&cutoff])?;
        tx.commit()?;

        info!(projects, issues, "Cleared old cache entries");
        Ok(projects + issues)
    }
}

/// Per-field coalesce: keep the existing value unless the incoming one is
/// present and non-empty.
fn merge_field(incoming: Option<&str>, existing: &str) -> String {
    match incoming {
        Some(value) => value.to_string(),
        None => existing.to_string(),
    }
}

/// Coalesce for nullable columns.
fn merge_opt(incoming: Option<&str>, existing: Option<String>) -> Option<String> {
    incoming.map(String::from).or(existing)
}

fn field_or_empty(payload: &Value, path: &[&str]) -> String {
    nested_str(payload, path).unwrap_or_default().to_string()
}

/// Parse an issue date defensively.
///
/// Jira emits RFC 3339 as well as `+0000`-style offsets. Failure logs a
/// warning and yields `None` so the upsert leaves the stored value alone.
fn parse_issue_date(raw: Option<&str>, issue_key: &str, field: &str) -> Option<DateTime<Utc>> {
    let raw = raw?;
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| warn!(issue_key, field, raw, error = %e, "Error parsing date"))
        .ok()
}

fn project_from_row(row: &Row) -> rusqlite::Result<CachedProject> {
    Ok(CachedProject {
        id: row.get(0)?,
        project_key: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        lead: row.get(4)?,
        project_type: row.get(5)?,
        cached_at: required_ts(row, 6)?,
        raw_data: row.get(7)?,
    })
}

fn issue_from_row(row: &Row) -> rusqlite::Result<CachedIssue> {
    Ok(CachedIssue {
        id: row.get(0)?,
        issue_key: row.get(1)?,
        project_key: row.get(2)?,
        summary: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        priority: row.get(6)?,
        issue_type: row.get(7)?,
        assignee: row.get(8)?,
        reporter: row.get(9)?,
        created_date: optional_ts(row, 10)?,
        updated_date: optional_ts(row, 11)?,
        cached_at: required_ts(row, 12)?,
        raw_data: row.get(13)?,
    })
}

fn required_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_ts(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn optional_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    Ok(s.and_then(|s| parse_ts(&s).ok()))
}

//! Fetch-and-cache commands: status, projects, issues, search, attachments.

use std::path::PathBuf;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::types::{nested_str, ConnectionStatus};
use crate::api::JiraClient;
use crate::error::{AppError, Result};
use crate::store::Database;

use super::{active_client, print_json, CatalogAction};

/// Test the active connection and report who we are.
pub async fn status(db: &Database) -> Result<()> {
    let client = active_client(db)?;
    let status = client.test_connection().await;
    db.record_activity_best_effort("test_connection", None, None);

    if status.success {
        println!("{}", status.message);
        println!(
            "  user:  {}",
            status.user.as_deref().unwrap_or("Unknown")
        );
        println!(
            "  email: {}",
            status.email.as_deref().unwrap_or("Unknown")
        );
        println!("  url:   {}", client.base_url());
        Ok(())
    } else {
        Err(connection_error(status))
    }
}

/// Carry the normalized failure out of a failed connection test.
pub(super) fn connection_error(status: ConnectionStatus) -> AppError {
    match status.error {
        Some(failure) => AppError::Api(failure),
        None => AppError::other(status.message),
    }
}

/// Fetch all projects, cache each, and list them.
pub async fn projects(db: &Database, json: bool) -> Result<()> {
    let client = active_client(db)?;
    let projects = client.get_projects().await?;

    let mut cached = 0;
    for payload in &projects {
        match db.cache_project(payload) {
            Ok(Some(_)) => cached += 1,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Error caching project"),
        }
    }
    info!(cached, "Cached projects");
    db.record_activity_best_effort("list_projects", Some("project"), None);

    if json {
        return print_json(&projects);
    }
    println!("{:<12} {:<30} {:<12} NAME", "KEY", "LEAD", "TYPE");
    for project in &projects {
        println!("{}", project_line(project));
    }
    println!("({} projects, {} cached)", projects.len(), cached);
    Ok(())
}

/// Fetch and cache one project, then show its details.
///
/// A fetch failure other than 404 falls back to the cached copy when one
/// exists.
pub async fn project(db: &Database, key: &str, json: bool) -> Result<()> {
    let client = active_client(db)?;
    let (payload, from_cache) = match client.get_project(key).await {
        Ok(payload) => {
            if let Err(e) = db.cache_project(&payload) {
                warn!(project_key = key, error = %e, "Error caching project");
            }
            (payload, false)
        }
        Err(failure) if failure.is_not_found() => return Err(failure.into()),
        Err(failure) => match db.cached_project(key)? {
            Some(cached) => {
                warn!(project_key = key, error = %failure, "Serving cached project after fetch failure");
                let payload = serde_json::from_str(&cached.raw_data)
                    .map_err(|_| AppError::Api(failure))?;
                (payload, true)
            }
            None => return Err(failure.into()),
        },
    };
    db.record_activity_best_effort("view_project", Some("project"), Some(key));
    if from_cache {
        // stderr, so --json output stays parseable
        eprintln!("(offline: showing cached copy)");
    }

    if json {
        return print_json(&payload);
    }
    println!("{}  {}", key, nested_str(&payload, &["name"]).unwrap_or(""));
    if let Some(lead) = nested_str(&payload, &["lead", "displayName"]) {
        println!("  lead: {}", lead);
    }
    if let Some(kind) = nested_str(&payload, &["projectTypeKey"]) {
        println!("  type: {}", kind);
    }
    if let Some(description) = nested_str(&payload, &["description"]) {
        println!("\n{}", description);
    }
    Ok(())
}

/// Fetch issues (board-backed or JQL), cache them, and list them.
pub async fn issues(
    db: &Database,
    project_key: Option<&str>,
    jql: Option<&str>,
    max_results: u32,
    json: bool,
) -> Result<()> {
    let client = active_client(db)?;
    let page = client.get_issues(project_key, max_results, jql).await?;

    let cached = db.cache_issues(&page.issues);
    info!(cached, "Cached issues");

    // Keep the project row fresh alongside its issues.
    if let Some(key) = project_key {
        match client.get_project(key).await {
            Ok(payload) => {
                if let Err(e) = db.cache_project(&payload) {
                    warn!(project_key = key, error = %e, "Error caching project");
                }
            }
            Err(failure) => warn!(project_key = key, error = %failure, "Error fetching project"),
        }
    }
    db.record_activity_best_effort("list_issues", Some("project"), project_key);

    render_issue_page(&page.issues, page.total, json)
}

/// Fetch and cache one issue, with its comments.
///
/// A fetch failure other than 404 falls back to the cached copy when one
/// exists; cached views carry no comments.
pub async fn issue(db: &Database, key: &str, json: bool) -> Result<()> {
    let client = active_client(db)?;
    let (payload, comments) = match client.get_issue(key).await {
        Ok(payload) => {
            if let Err(e) = db.cache_issue(&payload) {
                warn!(issue_key = key, error = %e, "Error caching issue");
            }
            let comments = client.get_issue_comments(key).await;
            (payload, comments)
        }
        Err(failure) if failure.is_not_found() => return Err(failure.into()),
        Err(failure) => match db.cached_issue(key)? {
            Some(cached) => {
                warn!(issue_key = key, error = %failure, "Serving cached issue after fetch failure");
                let payload = serde_json::from_str(&cached.raw_data)
                    .map_err(|_| AppError::Api(failure))?;
                eprintln!("(offline: showing cached copy)");
                (payload, Vec::new())
            }
            None => return Err(failure.into()),
        },
    };
    db.record_activity_best_effort("view_issue", Some("issue"), Some(key));

    if json {
        return print_json(&json!({"issue": payload, "comments": comments}));
    }

    println!(
        "{}  {}",
        key,
        nested_str(&payload, &["fields", "summary"]).unwrap_or("")
    );
    for (label, path) in [
        ("status", &["fields", "status", "name"][..]),
        ("priority", &["fields", "priority", "name"][..]),
        ("type", &["fields", "issuetype", "name"][..]),
        ("assignee", &["fields", "assignee", "displayName"][..]),
        ("reporter", &["fields", "reporter", "displayName"][..]),
    ] {
        if let Some(value) = nested_str(&payload, path) {
            println!("  {:<9} {}", format!("{}:", label), value);
        }
    }
    if let Some(description) = nested_str(&payload, &["fields", "description"]) {
        println!("\n{}", description);
    }
    if !comments.is_empty() {
        println!("\nComments ({}):", comments.len());
        for comment in &comments {
            let author = nested_str(comment, &["author", "displayName"]).unwrap_or("unknown");
            let body = nested_str(comment, &["body"]).unwrap_or("");
            println!("  - {}: {}", author, body);
        }
    }
    Ok(())
}

/// Search with explicit JQL, cache the results, optionally save the query.
pub async fn search(
    db: &Database,
    jql: &str,
    max_results: u32,
    save_as: Option<&str>,
    json: bool,
) -> Result<()> {
    let client = active_client(db)?;
    let page = client.search_issues(jql, max_results).await?;

    let cached = db.cache_issues(&page.issues);
    info!(cached, "Cached issues from search");

    if let Some(name) = save_as {
        db.save_search(name, jql, None)?;
        info!(name, "Saved search");
    }
    if let Err(e) = db.record_activity("search", None, None, Some(&json!({"jql": jql}))) {
        warn!(error = %e, "Error recording activity");
    }

    render_issue_page(&page.issues, page.total, json)
}

/// Download an attachment: metadata fetch, then an authenticated byte fetch.
pub async fn attachment(db: &Database, attachment_id: &str, output: Option<PathBuf>) -> Result<()> {
    let client = active_client(db)?;
    let meta_value = client.get_attachment(attachment_id).await?;
    let meta = JiraClient::parse_attachment_meta(&meta_value);

    let Some(content_url) = meta.content.as_deref() else {
        return Err(AppError::other("Attachment content URL not found"));
    };

    let Some(content) = client.download_attachment(content_url).await else {
        return Err(AppError::other("Failed to download attachment"));
    };

    let path = output.unwrap_or_else(|| {
        PathBuf::from(meta.filename.as_deref().unwrap_or("download"))
    });
    std::fs::write(&path, &content.bytes)?;
    db.record_activity_best_effort("download_attachment", Some("attachment"), Some(attachment_id));

    println!(
        "Saved {} byte(s) to {} ({})",
        content.bytes.len(),
        path.display(),
        content.content_type
    );
    Ok(())
}

/// List one of the instance metadata catalogs.
pub async fn catalog(db: &Database, action: CatalogAction) -> Result<()> {
    let client = active_client(db)?;

    match action {
        CatalogAction::Statuses { json } => {
            render_names(&client.get_statuses().await?, json)
        }
        CatalogAction::Priorities { json } => {
            render_names(&client.get_priorities().await?, json)
        }
        CatalogAction::Types { json } => {
            render_names(&client.get_issue_types().await?, json)
        }
        CatalogAction::Users { project, json } => {
            let users = client.get_assignable_users(&project).await?;
            if json {
                return print_json(&users);
            }
            for user in &users {
                println!(
                    "{:<30} {}",
                    nested_str(user, &["displayName"]).unwrap_or("?"),
                    nested_str(user, &["emailAddress"]).unwrap_or(""),
                );
            }
            println!("({} user(s))", users.len());
            Ok(())
        }
    }
}

fn render_names(entries: &[Value], json: bool) -> Result<()> {
    if json {
        return print_json(&entries);
    }
    for entry in entries {
        println!(
            "{:<30} {}",
            nested_str(entry, &["name"]).unwrap_or("?"),
            nested_str(entry, &["description"]).unwrap_or(""),
        );
    }
    println!("({} entr(ies))", entries.len());
    Ok(())
}

fn render_issue_page(issues: &[Value], total: u64, json: bool) -> Result<()> {
    if json {
        return print_json(&issues);
    }
    println!("{:<14} {:<14} SUMMARY", "KEY", "STATUS");
    for issue in issues {
        println!("{}", issue_line(issue));
    }
    println!("({} shown, {} total)", issues.len(), total);
    Ok(())
}

fn issue_line(issue: &Value) -> String {
    format!(
        "{:<14} {:<14} {}",
        nested_str(issue, &["key"]).unwrap_or("?"),
        nested_str(issue, &["fields", "status", "name"]).unwrap_or("-"),
        nested_str(issue, &["fields", "summary"]).unwrap_or(""),
    )
}

fn project_line(project: &Value) -> String {
    format!(
        "{:<12} {:<30} {:<12} {}",
        nested_str(project, &["key"]).unwrap_or("?"),
        nested_str(project, &["lead", "displayName"]).unwrap_or("-"),
        nested_str(project, &["projectTypeKey"]).unwrap_or("-"),
        nested_str(project, &["name"]).unwrap_or(""),
    )
}

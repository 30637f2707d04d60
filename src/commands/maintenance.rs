//! Offline commands: cache inspection and purge, saved searches, activity.

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::store::Database;

use super::{print_json, CacheAction, SearchesAction};

pub fn cache(db: &Database, action: CacheAction, max_default: u32) -> Result<()> {
    match action {
        CacheAction::List { project, max, json } => {
            let issues = db.cached_issues(project.as_deref(), max.unwrap_or(max_default))?;

            if json {
                return print_json(&issues);
            }
            println!("{:<14} {:<14} {:<20} SUMMARY", "KEY", "STATUS", "UPDATED");
            for issue in &issues {
                println!(
                    "{:<14} {:<14} {:<20} {}",
                    issue.issue_key,
                    issue.status,
                    short_ts(issue.updated_date),
                    issue.summary,
                );
            }
            println!("({} cached issue(s))", issues.len());
            Ok(())
        }
        CacheAction::Purge { days } => {
            if days < 0 {
                return Err(AppError::other("--days must be zero or positive"));
            }
            let removed = db.purge_older_than(days)?;
            db.record_activity_best_effort("purge_cache", None, None);
            println!("Removed {} cache entr(ies) older than {} day(s)", removed, days);
            Ok(())
        }
    }
}

pub fn searches(db: &Database, action: SearchesAction) -> Result<()> {
    match action {
        SearchesAction::List { json } => {
            let searches = db.list_searches()?;

            if json {
                return print_json(&searches);
            }
            if searches.is_empty() {
                println!("No saved searches. Use 'projecthub search <jql> --save <name>'.");
                return Ok(());
            }
            println!("{:<4} {:<20} JQL", "FAV", "NAME");
            for search in &searches {
                println!(
                    "{:<4} {:<20} {}",
                    if search.is_favorite { "*" } else { "" },
                    search.name,
                    search.jql_query,
                );
            }
            Ok(())
        }
        SearchesAction::Remove { name } => {
            if !db.delete_search(&name)? {
                return Err(AppError::other(format!("Saved search '{}' not found", name)));
            }
            println!("Removed saved search '{}'", name);
            Ok(())
        }
        SearchesAction::Favorite { name, unset } => {
            if !db.set_search_favorite(&name, !unset)? {
                return Err(AppError::other(format!("Saved search '{}' not found", name)));
            }
            println!(
                "{} '{}' {} favorites",
                if unset { "Removed" } else { "Added" },
                name,
                if unset { "from" } else { "to" },
            );
            Ok(())
        }
    }
}

pub fn activity(db: &Database, limit: u32) -> Result<()> {
    let entries = db.recent_activity(limit)?;

    if entries.is_empty() {
        println!("No recorded activity.");
        return Ok(());
    }
    println!("{:<20} {:<22} {:<14} DETAILS", "WHEN", "ACTION", "RESOURCE");
    for entry in &entries {
        println!(
            "{:<20} {:<22} {:<14} {}",
            short_ts(Some(entry.created_at)),
            entry.action,
            entry.resource_id.as_deref().unwrap_or("-"),
            entry.details.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

fn short_ts(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_short_ts_formats_minutes() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();
        assert_eq!(short_ts(Some(ts)), "2024-01-15 10:30");
    }

    #[test]
    fn test_short_ts_missing() {
        assert_eq!(short_ts(None), "-");
    }
}

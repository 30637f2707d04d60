//! Command orchestration.
//!
//! Each subcommand is one unit of work: call the API client, write through
//! the cache synchronizer, render human or JSON output.

mod browse;
mod maintenance;
mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::api::JiraClient;
use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::store::Database;

/// A command-line companion for Jira with a local SQLite cache.
#[derive(Debug, Parser)]
#[command(name = "projecthub", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Test the active Jira connection.
    Status,

    /// Fetch all projects, cache them, and list them.
    Projects {
        /// Print raw JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Fetch and cache one project.
    Project {
        /// The project key (e.g. "PROJ").
        key: String,
        #[arg(long)]
        json: bool,
    },

    /// Fetch issues, preferring board-backed queries, and cache them.
    Issues {
        /// Filter by project key.
        #[arg(long)]
        project: Option<String>,
        /// Explicit JQL query; disables the board-backed path.
        #[arg(long)]
        jql: Option<String>,
        /// Maximum number of results.
        #[arg(long)]
        max: Option<u32>,
        #[arg(long)]
        json: bool,
    },

    /// Fetch and cache one issue, with its comments.
    Issue {
        /// The issue key (e.g. "PROJ-123").
        key: String,
        #[arg(long)]
        json: bool,
    },

    /// Search issues with JQL and cache the results.
    Search {
        /// The JQL query.
        jql: String,
        /// Maximum number of results.
        #[arg(long)]
        max: Option<u32>,
        /// Save the query under this name for reuse.
        #[arg(long)]
        save: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Download an attachment by ID.
    Attachment {
        /// The attachment ID.
        id: String,
        /// Destination path; defaults to the attachment's file name.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List instance metadata: statuses, priorities, issue types, users.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Manage Jira connection configurations.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect or purge the local cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage saved JQL searches.
    Searches {
        #[command(subcommand)]
        action: SearchesAction,
    },

    /// Show recent activity.
    Activity {
        /// Number of rows to show.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Debug, Subcommand)]
pub enum CatalogAction {
    /// List all issue statuses.
    Statuses {
        #[arg(long)]
        json: bool,
    },
    /// List all priorities.
    Priorities {
        #[arg(long)]
        json: bool,
    },
    /// List all issue types.
    Types {
        #[arg(long)]
        json: bool,
    },
    /// List users assignable to issues in a project.
    Users {
        /// The project key.
        project: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Add a new configuration.
    Add {
        /// Friendly name for this configuration.
        name: String,
        /// Jira instance URL or bare host (e.g. "company.atlassian.net").
        #[arg(long)]
        url: String,
        /// Email for authentication.
        #[arg(long)]
        email: String,
        /// API token for authentication.
        #[arg(long)]
        token: String,
        /// Default project key.
        #[arg(long)]
        project: Option<String>,
        /// Make this the active configuration.
        #[arg(long)]
        activate: bool,
    },
    /// List all configurations.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one configuration.
    Show {
        id: i64,
        /// Include the API token in the output.
        #[arg(long)]
        reveal: bool,
    },
    /// Update fields of a configuration.
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        project: Option<String>,
        /// Make this the active configuration.
        #[arg(long)]
        activate: bool,
        /// Deactivate this configuration.
        #[arg(long, conflicts_with = "activate")]
        deactivate: bool,
    },
    /// Remove a configuration.
    Remove { id: i64 },
    /// Activate a configuration, deactivating all others.
    Activate { id: i64 },
    /// Test credentials without saving them.
    Test {
        #[arg(long)]
        url: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        token: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// List locally cached issues without hitting the API.
    List {
        /// Filter by project key.
        #[arg(long)]
        project: Option<String>,
        /// Maximum number of rows.
        #[arg(long)]
        max: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Delete cache entries older than the retention window.
    Purge {
        /// Retention window in days; 0 clears everything.
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum SearchesAction {
    /// List saved searches.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Remove a saved search.
    Remove { name: String },
    /// Mark or unmark a saved search as a favorite.
    Favorite {
        name: String,
        /// Clear the favorite flag instead of setting it.
        #[arg(long)]
        unset: bool,
    },
}

/// Run the parsed command against the configured store.
pub async fn run(cli: Cli, settings: &Settings) -> Result<()> {
    let db = open_database(settings)?;
    let max_default = settings.default_max_results;

    match cli.command {
        Command::Status => browse::status(&db).await,
        Command::Projects { json } => browse::projects(&db, json).await,
        Command::Project { key, json } => browse::project(&db, &key, json).await,
        Command::Issues {
            project,
            jql,
            max,
            json,
        } => {
            browse::issues(
                &db,
                project.as_deref(),
                jql.as_deref(),
                max.unwrap_or(max_default),
                json,
            )
            .await
        }
        Command::Issue { key, json } => browse::issue(&db, &key, json).await,
        Command::Search {
            jql,
            max,
            save,
            json,
        } => browse::search(&db, &jql, max.unwrap_or(max_default), save.as_deref(), json).await,
        Command::Attachment { id, output } => browse::attachment(&db, &id, output).await,
        Command::Catalog { action } => browse::catalog(&db, action).await,
        Command::Config { action } => settings::run(&db, action).await,
        Command::Cache { action } => maintenance::cache(&db, action, max_default),
        Command::Searches { action } => maintenance::searches(&db, action),
        Command::Activity { limit } => maintenance::activity(&db, limit),
    }
}

/// Open the store at the configured or default location.
fn open_database(settings: &Settings) -> Result<Database> {
    let path = match &settings.database_path {
        Some(path) => path.clone(),
        None => Database::default_path()?,
    };
    Ok(Database::open(&path)?)
}

/// Build a client from the active configuration.
///
/// No active configuration is the "not configured" condition; the caller
/// gets pointed at `config add`.
fn active_client(db: &Database) -> Result<JiraClient> {
    let config = db.active_configuration()?.ok_or(AppError::NotConfigured)?;
    Ok(JiraClient::new(
        &config.jira_url,
        &config.email,
        &config.api_token,
    )?)
}

/// Print a value as pretty JSON on stdout.
fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::other(format!("failed to render JSON: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

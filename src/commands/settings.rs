//! Connection configuration commands.

use tracing::info;

use crate::api::JiraClient;
use crate::error::{AppError, Result};
use crate::store::{ConfigurationUpdate, Database, JiraConfiguration, NewConfiguration};

use super::{print_json, ConfigAction};

pub async fn run(db: &Database, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Add {
            name,
            url,
            email,
            token,
            project,
            activate,
        } => add(db, name, url, email, token, project, activate),
        ConfigAction::List { json } => list(db, json),
        ConfigAction::Show { id, reveal } => show(db, id, reveal),
        ConfigAction::Update {
            id,
            name,
            url,
            email,
            token,
            project,
            activate,
            deactivate,
        } => update(
            db, id, name, url, email, token, project, activate, deactivate,
        ),
        ConfigAction::Remove { id } => remove(db, id),
        ConfigAction::Activate { id } => activate_config(db, id),
        ConfigAction::Test { url, email, token } => test(&url, &email, &token).await,
    }
}

fn add(
    db: &Database,
    name: String,
    url: String,
    email: String,
    token: String,
    project: Option<String>,
    activate: bool,
) -> Result<()> {
    // First configuration becomes active even without --activate, so a
    // fresh install is usable right after `config add`.
    let is_active = activate || db.list_configurations()?.is_empty();

    let created = db.create_configuration(&NewConfiguration {
        name,
        jira_url: url,
        email,
        api_token: token,
        project_key: project,
        is_active,
    })?;
    db.record_activity_best_effort(
        "create_configuration",
        Some("configuration"),
        Some(&created.id.to_string()),
    );

    println!(
        "Added configuration {} (id {}){}",
        created.name,
        created.id,
        if created.is_active { " [active]" } else { "" }
    );
    Ok(())
}

fn list(db: &Database, json: bool) -> Result<()> {
    let configs = db.list_configurations()?;

    if json {
        let views: Vec<_> = configs.iter().map(|c| c.to_json(false)).collect();
        return print_json(&views);
    }
    if configs.is_empty() {
        println!("No configurations. Run 'projecthub config add' to create one.");
        return Ok(());
    }
    println!("{:<6} {:<20} {:<35} {:<8} NAME", "ID", "EMAIL", "URL", "ACTIVE");
    for config in &configs {
        println!(
            "{:<6} {:<20} {:<35} {:<8} {}",
            config.id,
            config.email,
            config.jira_url,
            if config.is_active { "yes" } else { "no" },
            config.name,
        );
    }
    Ok(())
}

fn show(db: &Database, id: i64, reveal: bool) -> Result<()> {
    let config = require_config(db, id)?;
    print_json(&config.to_json(reveal))
}

#[allow(clippy::too_many_arguments)]
fn update(
    db: &Database,
    id: i64,
    name: Option<String>,
    url: Option<String>,
    email: Option<String>,
    token: Option<String>,
    project: Option<String>,
    activate: bool,
    deactivate: bool,
) -> Result<()> {
    let is_active = match (activate, deactivate) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let update = ConfigurationUpdate {
        name,
        jira_url: url,
        email,
        api_token: token,
        project_key: project,
        is_active,
    };

    let Some(updated) = db.update_configuration(id, &update)? else {
        return Err(missing(id));
    };
    db.record_activity_best_effort(
        "update_configuration",
        Some("configuration"),
        Some(&id.to_string()),
    );

    println!("Updated configuration {} (id {})", updated.name, updated.id);
    Ok(())
}

fn remove(db: &Database, id: i64) -> Result<()> {
    let config = require_config(db, id)?;
    if config.is_active {
        info!(id, "Removing the active configuration");
    }

    db.delete_configuration(id)?;
    db.record_activity_best_effort(
        "delete_configuration",
        Some("configuration"),
        Some(&id.to_string()),
    );

    println!("Removed configuration {} (id {})", config.name, id);
    Ok(())
}

fn activate_config(db: &Database, id: i64) -> Result<()> {
    let Some(activated) = db.activate_configuration(id)? else {
        return Err(missing(id));
    };
    db.record_activity_best_effort(
        "activate_configuration",
        Some("configuration"),
        Some(&id.to_string()),
    );

    println!("Activated configuration {} (id {})", activated.name, id);
    Ok(())
}

/// Check credentials without writing anything to the store.
async fn test(url: &str, email: &str, token: &str) -> Result<()> {
    let client = JiraClient::new(url, email, token)?;
    let status = client.test_connection().await;

    if status.success {
        println!("{}", status.message);
        if let Some(user) = status.user.as_deref() {
            println!("  user: {}", user);
        }
        Ok(())
    } else {
        Err(super::browse::connection_error(status))
    }
}

fn require_config(db: &Database, id: i64) -> Result<JiraConfiguration> {
    db.get_configuration(id)?.ok_or_else(|| missing(id))
}

fn missing(id: i64) -> AppError {
    AppError::other(format!("Configuration {} not found", id))
}

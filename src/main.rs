//! projecthub - a Jira companion CLI with a local SQLite cache.
//!
//! Fetches projects and issues from Jira Cloud, writes everything it sees
//! through to a local cache, and offers offline access to the cached rows.

mod api;
mod commands;
mod config;
mod error;
mod logging;
mod store;

use clap::Parser;

use config::Settings;

#[tokio::main]
async fn main() {
    let cli = commands::Cli::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&settings) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = commands::run(cli, &settings).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

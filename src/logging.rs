//! Logging configuration using the tracing ecosystem.
//!
//! Logs go to stderr by default so command output on stdout stays clean for
//! piping. With `log_to_file` set, a daily-rotated file in the local data
//! directory is used instead.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::config::Settings;

/// Default log filter if neither RUST_LOG nor the settings provide one.
const DEFAULT_LOG_FILTER: &str = "projecthub=info,warn";

/// Initialize the logging system.
///
/// Filter resolution order: `RUST_LOG`, then the settings file, then the
/// built-in default.
pub fn init(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            settings
                .log_filter
                .as_deref()
                .unwrap_or(DEFAULT_LOG_FILTER),
        )
    });

    if settings.log_to_file {
        let log_dir = log_directory()?;
        std::fs::create_dir_all(&log_dir)?;
        let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "projecthub.log");

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true),
            )
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .try_init()?;
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "projecthub starting");
    Ok(())
}

/// The directory where log files are stored when file logging is enabled.
pub fn log_directory() -> anyhow::Result<PathBuf> {
    let base_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;
    Ok(base_dir.join("projecthub").join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_has_expected_structure() {
        let dir = log_directory().unwrap();
        assert!(dir.ends_with("projecthub/logs"));
    }
}

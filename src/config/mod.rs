//! Application configuration.
//!
//! Settings come from an optional TOML file under the platform config
//! directory, with environment variables taking precedence. Jira credentials
//! are not configured here; they live in the connection-configuration table
//! of the local store.

mod settings;

pub use settings::Settings;

use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not determine the platform config directory.
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// Failed to read the settings file.
    #[error("Failed to read settings file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The settings file is not valid TOML.
    #[error("Failed to parse settings file: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

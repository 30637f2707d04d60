//! Centralized error types.
//!
//! Command handlers return [`AppError`]; `main` renders the user-facing
//! message and exits non-zero. API failures stay data all the way up.

use thiserror::Error;

use crate::api::ApiFailure;
use crate::config::ConfigError;
use crate::store::StoreError;

/// The main application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration-related errors.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Local store errors.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Normalized API failures.
    #[error("{0}")]
    Api(#[from] ApiFailure),

    /// IO errors (file system, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No active Jira connection configuration.
    #[error("Jira not configured")]
    NotConfigured,

    /// Generic errors with a message.
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Create a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        AppError::Other(msg.into())
    }

    /// Get a user-friendly message for display.
    ///
    /// Store internals are logged, not shown; the user gets a generic
    /// failure line.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Config(e) => format!("Configuration error: {}", e),
            AppError::Store(_) => {
                "A local database operation failed. See logs for details.".to_string()
            }
            AppError::Api(failure) => match &failure.details {
                Some(details) => format!("{} ({})", failure.error, details),
                None => failure.error.clone(),
            },
            AppError::Io(_) => "A file operation failed. Please check permissions.".to_string(),
            AppError::NotConfigured => {
                "Jira not configured. Run 'projecthub config add' to create a configuration."
                    .to_string()
            }
            AppError::Other(msg) => msg.clone(),
        }
    }
}

/// Result type for application operations.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_from_api_failure() {
        let failure = ApiFailure::http(404, "issue PROJ-1");
        let err: AppError = failure.into();
        assert!(matches!(err, AppError::Api(_)));
        assert!(err.user_message().contains("Resource not found"));
        assert!(err.user_message().contains("PROJ-1"));
    }

    #[test]
    fn test_store_errors_are_generic_to_users() {
        let err = AppError::Store(StoreError::NoDataDir);
        assert!(err.user_message().contains("local database"));
        assert!(!err.user_message().contains("data directory"));
    }

    #[test]
    fn test_not_configured_suggests_config_add() {
        let err = AppError::NotConfigured;
        assert!(err.user_message().contains("config add"));
    }

    #[test]
    fn test_other_error_passes_through() {
        let err = AppError::other("something went wrong");
        assert_eq!(err.user_message(), "something went wrong");
    }
}

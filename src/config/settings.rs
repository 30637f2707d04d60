//! Application-wide settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};

/// Environment variable overriding the database location.
const ENV_DATABASE: &str = "PROJECTHUB_DB";
/// Environment variable overriding the log filter.
const ENV_LOG_FILTER: &str = "PROJECTHUB_LOG";
/// Environment variable switching logging to a rotating file.
const ENV_LOG_FILE: &str = "PROJECTHUB_LOG_FILE";

/// Application-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the SQLite cache lives; `None` means the platform default.
    pub database_path: Option<PathBuf>,
    /// Log filter directive; `None` falls back to the built-in default.
    pub log_filter: Option<String>,
    /// Log to a daily-rotated file instead of stderr.
    pub log_to_file: bool,
    /// Default maximum result count for listings.
    pub default_max_results: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            log_filter: None,
            log_to_file: false,
            default_max_results: 50,
        }
    }
}

impl Settings {
    /// Load settings: file first (when present), then environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = match Self::settings_file_path() {
            Ok(path) if path.exists() => {
                let raw = std::fs::read_to_string(&path)?;
                Self::from_toml_str(&raw)?
            }
            _ => Self::default(),
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Parse settings from TOML text. Missing fields keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// The settings file path under the platform config directory.
    pub fn settings_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("projecthub").join("config.toml"))
    }

    fn apply_env(&mut self) {
        if let Ok(db) = std::env::var(ENV_DATABASE) {
            if !db.is_empty() {
                self.database_path = Some(PathBuf::from(db));
            }
        }
        if let Ok(filter) = std::env::var(ENV_LOG_FILTER) {
            if !filter.is_empty() {
                self.log_filter = Some(filter);
            }
        }
        if let Ok(flag) = std::env::var(ENV_LOG_FILE) {
            self.log_to_file = flag == "1" || flag.eq_ignore_ascii_case("true");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.database_path.is_none());
        assert!(!settings.log_to_file);
        assert_eq!(settings.default_max_results, 50);
    }

    #[test]
    fn test_from_toml_str_partial() {
        let settings = Settings::from_toml_str("default_max_results = 25\n").unwrap();
        assert_eq!(settings.default_max_results, 25);
        assert!(settings.database_path.is_none());
    }

    #[test]
    fn test_from_toml_str_full() {
        let settings = Settings::from_toml_str(
            r#"
database_path = "/tmp/hub.db"
log_filter = "projecthub=debug"
log_to_file = true
default_max_results = 10
"#,
        )
        .unwrap();
        assert_eq!(settings.database_path.unwrap(), PathBuf::from("/tmp/hub.db"));
        assert_eq!(settings.log_filter.as_deref(), Some("projecthub=debug"));
        assert!(settings.log_to_file);
    }

    #[test]
    fn test_from_toml_str_invalid() {
        assert!(Settings::from_toml_str("not = [valid").is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides_database_path() {
        std::env::set_var(ENV_DATABASE, "/tmp/override.db");
        let mut settings = Settings::default();
        settings.apply_env();
        std::env::remove_var(ENV_DATABASE);

        assert_eq!(
            settings.database_path.unwrap(),
            PathBuf::from("/tmp/override.db")
        );
    }

    #[test]
    #[serial]
    fn test_env_log_file_flag() {
        std::env::set_var(ENV_LOG_FILE, "true");
        let mut settings = Settings::default();
        settings.apply_env();
        std::env::remove_var(ENV_LOG_FILE);

        assert!(settings.log_to_file);
    }

    #[test]
    #[serial]
    fn test_empty_env_values_are_ignored() {
        std::env::set_var(ENV_DATABASE, "");
        let mut settings = Settings::default();
        settings.apply_env();
        std::env::remove_var(ENV_DATABASE);

        assert!(settings.database_path.is_none());
    }

    #[test]
    fn test_settings_file_path_structure() {
        let path = Settings::settings_file_path().unwrap();
        assert!(path.ends_with("projecthub/config.toml"));
    }
}

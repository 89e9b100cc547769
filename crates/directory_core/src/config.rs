//! Runtime configuration read from environment variables.

use crate::logging::{default_log_level, normalize_level, normalize_log_dir};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "DIRECTORY_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "DIRECTORY_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "DIRECTORY_LOG_DIR";
pub const DEFAULT_DB_PATH: &str = "directory.sqlite3";

/// Configuration errors. Each variant carries the offending variable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    BlankValue(&'static str),
    InvalidValue { var: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankValue(var) => write!(f, "{var} is set but blank"),
            Self::InvalidValue { var, reason } => write!(f, "invalid {var}: {reason}"),
        }
    }
}

impl Error for ConfigError {}

/// Directory runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// Normalized log level (`trace|debug|info|warn|error`).
    pub log_level: &'static str,
    /// File logging directory; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl DirectoryConfig {
    /// Reads configuration through `lookup`, falling back to defaults for
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(DB_PATH_VAR) {
            let trimmed = path.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::BlankValue(DB_PATH_VAR));
            }
            config.database_path = PathBuf::from(trimmed);
        }

        if let Some(level) = lookup(LOG_LEVEL_VAR) {
            config.log_level = normalize_level(&level).map_err(|reason| {
                ConfigError::InvalidValue {
                    var: LOG_LEVEL_VAR,
                    reason,
                }
            })?;
        }

        if let Some(dir) = lookup(LOG_DIR_VAR) {
            if !dir.trim().is_empty() {
                let dir = normalize_log_dir(&dir).map_err(|reason| ConfigError::InvalidValue {
                    var: LOG_DIR_VAR,
                    reason,
                })?;
                config.log_dir = Some(dir);
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, DirectoryConfig, DB_PATH_VAR, DEFAULT_DB_PATH, LOG_DIR_VAR, LOG_LEVEL_VAR,
    };
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = DirectoryConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.log_dir, None);
        assert!(matches!(config.log_level, "debug" | "info"));
    }

    #[test]
    fn values_are_read_and_normalized() {
        let config = DirectoryConfig::from_lookup(lookup_from(&[
            (DB_PATH_VAR, " /var/lib/directory.sqlite3 "),
            (LOG_LEVEL_VAR, "WARNING"),
            (LOG_DIR_VAR, "/var/log/directory"),
        ]))
        .unwrap();
        assert_eq!(
            config.database_path,
            PathBuf::from("/var/lib/directory.sqlite3")
        );
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/directory")));
    }

    #[test]
    fn blank_log_dir_disables_file_logging() {
        let config = DirectoryConfig::from_lookup(lookup_from(&[(LOG_DIR_VAR, "  ")])).unwrap();
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = DirectoryConfig::from_lookup(lookup_from(&[(DB_PATH_VAR, "")])).unwrap_err();
        assert_eq!(err, ConfigError::BlankValue(DB_PATH_VAR));

        let err =
            DirectoryConfig::from_lookup(lookup_from(&[(LOG_LEVEL_VAR, "loud")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == LOG_LEVEL_VAR));

        let err =
            DirectoryConfig::from_lookup(lookup_from(&[(LOG_DIR_VAR, "logs")])).unwrap_err();
        assert!(err.to_string().contains(LOG_DIR_VAR));
    }
}

//! Storage start-up configuration loaded from TOML.
//!
//! Every key is optional:
//!
//! ```toml
//! database_path = "data/records.sqlite3"  # absent: private in-memory database
//! do_not_cache = false                    # true: expose the database store directly
//! log_level = "info"                      # default depends on build mode
//! log_dir = "logs"                        # absent: no file logging
//! ```

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub database_path: Option<PathBuf>,
    pub do_not_cache: bool,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            do_not_cache: false,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Reads and parses the config file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<StorageConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<StorageConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::{parse_config, StorageConfig};
    use crate::logging::default_log_level;
    use std::path::PathBuf;

    #[test]
    fn empty_document_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, StorageConfig::default());
        assert_eq!(config.log_level, default_log_level());
        assert!(!config.do_not_cache);
    }

    #[test]
    fn keys_override_defaults() {
        let config = parse_config(
            r#"
            database_path = "/var/lib/docstore/records.sqlite3"
            do_not_cache = true
            log_level = "warn"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/var/lib/docstore/records.sqlite3"))
        );
        assert!(config.do_not_cache);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse_config("cache = false").unwrap_err();
        assert!(err.to_string().starts_with("invalid config"));
    }
}

//! Runtime configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe storage, logging, validation and paging settings.
//! - Provide compiled defaults for every key.
//!
//! # Invariants
//! - Missing sections and keys fall back to defaults.
//! - Page size bounds are normalized so `default_page_size <= max_page_size`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Top-level configuration, stored in `pcms.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub content: ContentRules,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file path. `None` keeps data in memory for the process lifetime.
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`. Defaults per build mode.
    pub level: String,
    /// Absolute directory for rolling log files. `None` disables file logging.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            directory: None,
        }
    }
}

/// Bounds enforced by the content validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentRules {
    pub title_max_chars: usize,
    pub slug_max_chars: usize,
    pub body_max_bytes: usize,
}

impl Default for ContentRules {
    fn default() -> Self {
        Self {
            title_max_chars: 200,
            slug_max_chars: 96,
            body_max_bytes: 256 * 1024,
        }
    }
}

/// Paging limits applied by the query gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl QueryConfig {
    /// Returns `(default, max)` with both at least 1 and default <= max.
    pub fn normalized(&self) -> (u32, u32) {
        let max = self.max_page_size.max(1);
        let default = self.default_page_size.clamp(1, max);
        (default, max)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}

/// Reads and parses a TOML config file.
pub fn load_config(path: impl AsRef<Path>) -> Result<CmsConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses TOML text into a config, filling defaults.
pub fn parse_config(text: &str) -> Result<CmsConfig, toml::de::Error> {
    toml::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::{load_config, parse_config, CmsConfig, ConfigError, QueryConfig};
    use std::path::PathBuf;

    #[test]
    fn empty_text_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, CmsConfig::default());
        assert_eq!(config.content.title_max_chars, 200);
        assert_eq!(config.query.default_page_size, 20);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = parse_config(
            r#"
            [storage]
            database_path = "/var/lib/pcms/content.sqlite3"

            [content]
            title_max_chars = 80
            "#,
        )
        .unwrap();
        assert_eq!(
            config.storage.database_path,
            Some(PathBuf::from("/var/lib/pcms/content.sqlite3"))
        );
        assert_eq!(config.content.title_max_chars, 80);
        assert_eq!(config.content.slug_max_chars, 96);
        assert_eq!(config.query.max_page_size, 100);
    }

    #[test]
    fn normalized_page_sizes_are_ordered() {
        let query = QueryConfig {
            default_page_size: 500,
            max_page_size: 0,
        };
        assert_eq!(query.normalized(), (1, 1));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

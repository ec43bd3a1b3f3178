//! Explicit configuration for storage and logging.
//!
//! # Responsibility
//! - Describe where the registry database lives and how connections behave.
//! - Describe log level and log directory for the file logger.
//!
//! # Invariants
//! - Configuration is passed by value into `open_db`/`init_logging`; there is
//!   no process-wide connection string.
//! - `validate()` runs before any connection is opened.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Where the registry database is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreTarget {
    /// SQLite database file. Parent directory must exist.
    File { path: PathBuf },
    /// Private in-memory database, dropped with its connection.
    Memory,
}

/// Connection settings for the registry store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub target: StoreTarget,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_enforce_foreign_keys")]
    pub enforce_foreign_keys: bool,
}

impl StoreConfig {
    /// File-backed store with default connection behavior.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_target(StoreTarget::File { path: path.into() })
    }

    /// In-memory store with default connection behavior.
    pub fn in_memory() -> Self {
        Self::with_target(StoreTarget::Memory)
    }

    fn with_target(target: StoreTarget) -> Self {
        Self {
            target,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            enforce_foreign_keys: true,
        }
    }

    /// Replaces the connection target.
    pub fn set_target(&mut self, target: StoreTarget) {
        self.target = target;
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Checks the configuration without touching the database.
    ///
    /// # Errors
    /// - `EmptyPath` when a file target has an empty path.
    /// - `MissingParentDirectory` when the file's directory does not exist.
    /// - `ZeroBusyTimeout` when `busy_timeout_ms` is 0.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let StoreTarget::File { path } = &self.target {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyPath);
            }
            let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
            if let Some(dir) = parent {
                if !dir.is_dir() {
                    return Err(ConfigError::MissingParentDirectory(dir.to_path_buf()));
                }
            }
        }

        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::ZeroBusyTimeout);
        }

        Ok(())
    }
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

fn default_enforce_foreign_keys() -> bool {
    true
}

/// Log verbosity accepted by `init_logging`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parses a case-insensitive level name; `warning` is accepted for `warn`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(ConfigError::UnsupportedLogLevel(other.to_string())),
        }
    }

    /// `debug` for debug builds, `info` otherwise.
    pub fn build_default() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Info
        }
    }
}

/// File logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    pub level: LogLevel,
    pub log_dir: PathBuf,
}

impl LogSettings {
    /// Builds settings from raw strings, as received from an embedding app.
    ///
    /// # Errors
    /// - Unsupported level name.
    /// - Empty or relative log directory.
    pub fn parse(level: &str, log_dir: &str) -> Result<Self, ConfigError> {
        let level = LogLevel::parse(level)?;
        let trimmed = log_dir.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyLogDir);
        }
        let path = Path::new(trimmed);
        if !path.is_absolute() {
            return Err(ConfigError::RelativeLogDir(path.to_path_buf()));
        }
        Ok(Self {
            level,
            log_dir: path.to_path_buf(),
        })
    }
}

/// Configuration failures. Fatal: nothing is opened when one is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyPath,
    MissingParentDirectory(PathBuf),
    ZeroBusyTimeout,
    UnsupportedLogLevel(String),
    EmptyLogDir,
    RelativeLogDir(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "database path cannot be empty"),
            Self::MissingParentDirectory(dir) => {
                write!(f, "database directory `{}` does not exist", dir.display())
            }
            Self::ZeroBusyTimeout => write!(f, "busy timeout must be greater than zero"),
            Self::UnsupportedLogLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::EmptyLogDir => write!(f, "log_dir cannot be empty"),
            Self::RelativeLogDir(dir) => write!(
                f,
                "log_dir must be an absolute path, got `{}`",
                dir.display()
            ),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{ConfigError, LogLevel, LogSettings, StoreConfig, StoreTarget};
    use std::path::PathBuf;

    #[test]
    fn set_target_replaces_previous_target() {
        let mut config = StoreConfig::in_memory();
        config.set_target(StoreTarget::File {
            path: PathBuf::from("registry.db"),
        });
        assert_eq!(
            config.target,
            StoreTarget::File {
                path: PathBuf::from("registry.db")
            }
        );
    }

    #[test]
    fn validate_rejects_empty_path_and_zero_timeout() {
        let empty = StoreConfig::file("");
        assert_eq!(empty.validate(), Err(ConfigError::EmptyPath));

        let mut no_timeout = StoreConfig::in_memory();
        no_timeout.busy_timeout_ms = 0;
        assert_eq!(no_timeout.validate(), Err(ConfigError::ZeroBusyTimeout));
    }

    #[test]
    fn validate_rejects_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let orphan = dir.path().join("missing").join("registry.db");
        let err = StoreConfig::file(&orphan).validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingParentDirectory(_)));
    }

    #[test]
    fn validate_accepts_bare_file_name_and_memory() {
        StoreConfig::file("registry.db").validate().unwrap();
        StoreConfig::in_memory().validate().unwrap();
    }

    #[test]
    fn store_config_deserializes_with_defaults() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"target":{"kind":"file","path":"/tmp/registry.db"}}"#)
                .unwrap();
        assert_eq!(config.busy_timeout_ms, 5_000);
        assert!(config.enforce_foreign_keys);
        assert_eq!(
            config.target,
            StoreTarget::File {
                path: PathBuf::from("/tmp/registry.db")
            }
        );
    }

    #[test]
    fn log_level_parse_accepts_aliases() {
        assert_eq!(LogLevel::parse(" WARNING ").unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::parse("Info").unwrap(), LogLevel::Info);
        assert!(matches!(
            LogLevel::parse("verbose"),
            Err(ConfigError::UnsupportedLogLevel(_))
        ));
    }

    #[test]
    fn log_settings_reject_relative_dir() {
        let err = LogSettings::parse("info", "logs/dev").unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }
}

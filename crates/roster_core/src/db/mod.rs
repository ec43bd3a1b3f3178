//! SQLite storage bootstrap, statement execution and schema migration.
//!
//! # Responsibility
//! - Open and configure SQLite connections from an explicit `StoreConfig`.
//! - Run category-checked statements on behalf of repositories.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No statement reaches SQLite before its category check passes.

use crate::config::ConfigError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod executor;
pub mod migrations;
mod open;

pub use executor::{SqlExecutor, StatementCategory};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Config(ConfigError),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Statement text carries an operation keyword its category forbids.
    InvalidStatement {
        category: StatementCategory,
        token: String,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "invalid store configuration: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidStatement { category, token } => write!(
                f,
                "invalid {} statement: `{token}` is not allowed",
                category.as_str()
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
            Self::InvalidStatement { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<ConfigError> for DbError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

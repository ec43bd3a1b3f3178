//! Repository layer contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define row-level data access contracts for each registry table.
//! - Keep SQL details out of service orchestration.
//!
//! # Invariants
//! - Lookups report absence as `Ok(None)`, never as an error.
//! - Precondition misses (wrong id state, still-referenced rows) return
//!   `Ok(false)` and leave the store untouched.
//! - All SQL runs through `SqlExecutor` category checks.

use crate::db::migrations::latest_version;
use crate::db::{DbError, SqlExecutor};
use crate::model::ValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod address_repo;
pub mod person_repo;
pub mod phone_repo;
pub mod phone_type_repo;
pub mod sequence;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for registry persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(ValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted row cannot be turned into a valid model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "registry repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "registry repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "registry repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted registry data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

pub(crate) const PERSON_TABLE: (&str, &[&str]) =
    ("person", &["id", "name", "national_id", "address_id"]);
pub(crate) const ADDRESS_TABLE: (&str, &[&str]) = (
    "address",
    &[
        "id",
        "street",
        "number",
        "postal_code",
        "district",
        "city",
        "state",
    ],
);
pub(crate) const PHONE_TABLE: (&str, &[&str]) =
    ("phone", &["id", "number", "area_code", "type_id"]);
pub(crate) const PHONE_TYPE_TABLE: (&str, &[&str]) = ("phone_type", &["id", "description"]);
pub(crate) const PERSON_PHONE_TABLE: (&str, &[&str]) =
    ("person_phone", &["person_id", "phone_id"]);

/// Verifies the connection is migrated and carries the given tables/columns.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[(&'static str, &'static [&'static str])],
) -> RepoResult<()> {
    let exec = SqlExecutor::new(conn);
    let expected_version = latest_version();
    let actual_version = exec
        .query_first("PRAGMA user_version;", [], |row| {
            row.get::<_, u32>(0).map_err(RepoError::from)
        })?
        .unwrap_or(0);
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &(table, columns) in tables {
        if !table_exists(&exec, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        let present = table_columns(&exec, table)?;
        if let Some(&column) = columns
            .iter()
            .find(|column| !present.iter().any(|name| name.as_str() == **column))
        {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }

    Ok(())
}

fn table_exists(exec: &SqlExecutor<'_>, table: &str) -> RepoResult<bool> {
    let exists = exec.query_first(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get::<_, i64>(0).map_err(RepoError::from),
    )?;
    Ok(exists == Some(1))
}

fn table_columns(exec: &SqlExecutor<'_>, table: &str) -> RepoResult<Vec<String>> {
    exec.query_rows(&format!("PRAGMA table_info({table});"), [], |row| {
        row.get::<_, String>(1).map_err(RepoError::from)
    })
}

//! Surrogate key assignment by `MAX(id) + 1`.
//!
//! The read and the following insert are separate statements. Two writers on
//! separate connections can read the same maximum and collide on the primary
//! key; person writes avoid this by running inside an IMMEDIATE transaction,
//! standalone address/phone/phone type writes do not.

use super::{RepoError, RepoResult};
use crate::db::SqlExecutor;
use crate::model::RowId;
use rusqlite::Connection;

/// Registry tables that own a surrogate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Person,
    Address,
    Phone,
    PhoneType,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Address => "address",
            Self::Phone => "phone",
            Self::PhoneType => "phone_type",
        }
    }

    fn max_id_sql(self) -> &'static str {
        match self {
            Self::Person => "SELECT MAX(id) FROM person;",
            Self::Address => "SELECT MAX(id) FROM address;",
            Self::Phone => "SELECT MAX(id) FROM phone;",
            Self::PhoneType => "SELECT MAX(id) FROM phone_type;",
        }
    }
}

/// Returns the next free id for `table`: current maximum plus one, or 1 when
/// the table is empty.
pub fn next_id(conn: &Connection, table: Table) -> RepoResult<RowId> {
    let current = SqlExecutor::new(conn).query_first(table.max_id_sql(), [], |row| {
        row.get::<_, Option<RowId>>(0).map_err(RepoError::from)
    })?;
    Ok(current.flatten().unwrap_or(0) + 1)
}

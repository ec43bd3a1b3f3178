//! Phone type repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Row-level CRUD over `phone_type`.
//! - Description lookups used to reuse existing types when saving phones.
//!
//! # Invariants
//! - `find_by_description` is an exact match; fuzzy lookup is
//!   `find_containing`, which treats `%`, `_` and `\` in its input literally.

use super::sequence::{next_id, Table};
use super::{ensure_connection_ready, RepoError, RepoResult, PHONE_TYPE_TABLE};
use crate::db::SqlExecutor;
use crate::model::phone::PhoneType;
use crate::model::RowId;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, Connection, Row};

static LIKE_WILDCARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\\%_]").expect("valid like wildcard regex"));

/// Repository interface for phone type rows.
pub trait PhoneTypeRepository {
    /// All phone types ordered by id.
    fn find_all(&self) -> RepoResult<Vec<PhoneType>>;
    fn insert(&self, phone_type: &mut PhoneType) -> RepoResult<bool>;
    fn delete(&self, phone_type: &PhoneType) -> RepoResult<bool>;
    /// First type whose description equals `description`.
    fn find_by_description(&self, description: &str) -> RepoResult<Option<PhoneType>>;
    /// Types whose description contains `fragment`, ASCII case-insensitive.
    fn find_containing(&self, fragment: &str) -> RepoResult<Vec<PhoneType>>;
    fn find_by_id(&self, id: RowId) -> RepoResult<Option<PhoneType>>;
}

/// SQLite-backed phone type repository.
pub struct SqlitePhoneTypeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePhoneTypeRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[PHONE_TYPE_TABLE])?;
        Ok(Self { conn })
    }

    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn exec(&self) -> SqlExecutor<'conn> {
        SqlExecutor::new(self.conn)
    }
}

impl PhoneTypeRepository for SqlitePhoneTypeRepository<'_> {
    fn find_all(&self) -> RepoResult<Vec<PhoneType>> {
        self.exec().query_rows(
            "SELECT id, description FROM phone_type ORDER BY id ASC;",
            [],
            parse_phone_type_row,
        )
    }

    fn insert(&self, phone_type: &mut PhoneType) -> RepoResult<bool> {
        if phone_type.is_persisted() {
            return Ok(false);
        }

        let id = next_id(self.conn, Table::PhoneType)?;
        let inserted = self.exec().insert(
            "INSERT INTO phone_type (id, description) VALUES (?1, ?2);",
            params![id, phone_type.description.as_str()],
        )?;
        if inserted {
            phone_type.id = id;
        }
        Ok(inserted)
    }

    fn delete(&self, phone_type: &PhoneType) -> RepoResult<bool> {
        if !phone_type.is_persisted() {
            return Ok(false);
        }
        let deleted = self
            .exec()
            .delete("DELETE FROM phone_type WHERE id = ?1;", [phone_type.id])?;
        Ok(deleted)
    }

    fn find_by_description(&self, description: &str) -> RepoResult<Option<PhoneType>> {
        if description.trim().is_empty() {
            return Ok(None);
        }
        self.exec().query_first(
            "SELECT id, description
             FROM phone_type
             WHERE description = ?1
             ORDER BY id ASC
             LIMIT 1;",
            [description],
            parse_phone_type_row,
        )
    }

    fn find_containing(&self, fragment: &str) -> RepoResult<Vec<PhoneType>> {
        if fragment.trim().is_empty() {
            return Ok(Vec::new());
        }
        let escaped = LIKE_WILDCARD_RE.replace_all(fragment, r"\$0");
        self.exec().query_rows(
            "SELECT id, description
             FROM phone_type
             WHERE description LIKE '%' || ?1 || '%' ESCAPE '\\'
             ORDER BY id ASC;",
            [&*escaped],
            parse_phone_type_row,
        )
    }

    fn find_by_id(&self, id: RowId) -> RepoResult<Option<PhoneType>> {
        if id <= 0 {
            return Ok(None);
        }
        self.exec().query_first(
            "SELECT id, description FROM phone_type WHERE id = ?1;",
            [id],
            parse_phone_type_row,
        )
    }
}

fn parse_phone_type_row(row: &Row<'_>) -> RepoResult<PhoneType> {
    let phone_type = PhoneType {
        id: row.get("id")?,
        description: row.get("description")?,
    };
    if phone_type.id <= 0 {
        return Err(RepoError::InvalidData(format!(
            "invalid id `{}` in phone_type.id",
            phone_type.id
        )));
    }
    Ok(phone_type)
}

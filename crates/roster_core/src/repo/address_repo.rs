//! Address repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Row-level CRUD over `address`.
//! - Refuse to delete an address some person still points at.
//!
//! # Invariants
//! - Only street and number change after insert; postal code, district, city
//!   and state are fixed once the row exists.
//! - The reference check is a query against `person`, never a cached count.

use super::person_repo::{PersonRepository, SqlitePersonRepository};
use super::sequence::{next_id, Table};
use super::{ensure_connection_ready, RepoError, RepoResult, ADDRESS_TABLE, PERSON_TABLE};
use crate::db::SqlExecutor;
use crate::model::address::Address;
use crate::model::RowId;
use log::debug;
use rusqlite::{params, Connection, Row};

const ADDRESS_SELECT_SQL: &str = "SELECT
    id,
    street,
    number,
    postal_code,
    district,
    city,
    state
FROM address";

/// Repository interface for address rows.
pub trait AddressRepository {
    /// Inserts an unsaved address and assigns its id.
    fn insert(&self, address: &mut Address) -> RepoResult<bool>;
    /// Updates street and number of a saved address.
    fn update(&self, address: &Address) -> RepoResult<bool>;
    /// Deletes a saved address nobody references.
    fn delete(&self, address: &Address) -> RepoResult<bool>;
    /// First address (lowest id) with the given postal code.
    fn find_by_postal_code(&self, postal_code: i32) -> RepoResult<Option<Address>>;
    /// Address row equal to `(number, postal_code)`, lowest id first.
    fn find_by_number_and_postal_code(
        &self,
        number: i32,
        postal_code: i32,
    ) -> RepoResult<Option<Address>>;
    fn find_by_id(&self, id: RowId) -> RepoResult<Option<Address>>;
}

/// SQLite-backed address repository.
pub struct SqliteAddressRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAddressRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[ADDRESS_TABLE, PERSON_TABLE])?;
        Ok(Self { conn })
    }

    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn exec(&self) -> SqlExecutor<'conn> {
        SqlExecutor::new(self.conn)
    }

    fn find_one(&self, filter: &str, params: impl rusqlite::Params) -> RepoResult<Option<Address>> {
        self.exec().query_first(
            &format!("{ADDRESS_SELECT_SQL} {filter} ORDER BY id ASC LIMIT 1;"),
            params,
            parse_address_row,
        )
    }
}

impl AddressRepository for SqliteAddressRepository<'_> {
    fn insert(&self, address: &mut Address) -> RepoResult<bool> {
        if address.is_persisted() {
            debug!(
                "event=address_insert module=address_repo status=skip reason=already_persisted id={}",
                address.id
            );
            return Ok(false);
        }

        let id = next_id(self.conn, Table::Address)?;
        let inserted = self.exec().insert(
            "INSERT INTO address (
                id,
                street,
                number,
                postal_code,
                district,
                city,
                state
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id,
                address.street.as_str(),
                address.number,
                address.postal_code,
                address.district.as_str(),
                address.city.as_str(),
                address.state.as_str(),
            ],
        )?;

        if inserted {
            address.id = id;
        }
        Ok(inserted)
    }

    fn update(&self, address: &Address) -> RepoResult<bool> {
        if !address.is_persisted() {
            return Ok(false);
        }

        let updated = self.exec().update(
            "UPDATE address
             SET
                street = ?1,
                number = ?2
             WHERE id = ?3;",
            params![address.street.as_str(), address.number, address.id],
        )?;
        Ok(updated)
    }

    fn delete(&self, address: &Address) -> RepoResult<bool> {
        if !address.is_persisted() {
            return Ok(false);
        }

        if SqlitePersonRepository::new_unchecked(self.conn).has_address_link(address)? {
            debug!(
                "event=address_delete module=address_repo status=skip reason=still_referenced id={}",
                address.id
            );
            return Ok(false);
        }

        let deleted = self
            .exec()
            .delete("DELETE FROM address WHERE id = ?1;", [address.id])?;
        Ok(deleted)
    }

    fn find_by_postal_code(&self, postal_code: i32) -> RepoResult<Option<Address>> {
        self.find_one("WHERE postal_code = ?1", [postal_code])
    }

    fn find_by_number_and_postal_code(
        &self,
        number: i32,
        postal_code: i32,
    ) -> RepoResult<Option<Address>> {
        self.find_one(
            "WHERE number = ?1 AND postal_code = ?2",
            params![number, postal_code],
        )
    }

    fn find_by_id(&self, id: RowId) -> RepoResult<Option<Address>> {
        if id <= 0 {
            return Ok(None);
        }
        self.find_one("WHERE id = ?1", [id])
    }
}

fn parse_address_row(row: &Row<'_>) -> RepoResult<Address> {
    let address = Address {
        id: row.get("id")?,
        street: row.get("street")?,
        number: row.get("number")?,
        postal_code: row.get("postal_code")?,
        district: row.get("district")?,
        city: row.get("city")?,
        state: row.get("state")?,
    };
    if address.id <= 0 {
        return Err(RepoError::InvalidData(format!(
            "invalid id `{}` in address.id",
            address.id
        )));
    }
    Ok(address)
}

//! Phone repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Row-level CRUD over `phone`, resolving each phone's type by description.
//! - Own the `person_phone` association rows.
//!
//! # Invariants
//! - A phone row is deleted only while no association row points at it.
//! - Writes never store a phone whose type has no row.

use super::phone_type_repo::{PhoneTypeRepository, SqlitePhoneTypeRepository};
use super::sequence::{next_id, Table};
use super::{
    ensure_connection_ready, RepoError, RepoResult, PERSON_PHONE_TABLE, PHONE_TABLE,
    PHONE_TYPE_TABLE,
};
use crate::db::SqlExecutor;
use crate::model::person::Person;
use crate::model::phone::{Phone, PhoneType};
use crate::model::{RowId, UNSAVED_ID};
use log::debug;
use rusqlite::{params, Connection, Row};

const PHONE_SELECT_SQL: &str = "SELECT
    p.id AS id,
    p.area_code AS area_code,
    p.number AS number,
    t.id AS type_id,
    t.description AS type_description
FROM phone p
INNER JOIN phone_type t ON t.id = p.type_id";

/// Repository interface for phones and their person links.
pub trait PhoneRepository {
    /// Resolves the phone type, then inserts an unsaved phone.
    fn insert(&self, phone: &mut Phone) -> RepoResult<bool>;
    /// Resolves the phone type, then rewrites number, area code and type.
    fn update(&self, phone: &mut Phone) -> RepoResult<bool>;
    /// Deletes a saved phone no person links to.
    fn delete(&self, phone: &Phone) -> RepoResult<bool>;
    /// Links `phone` to a saved person, inserting the phone first if needed.
    fn link_to_person(&self, phone: &mut Phone, person: &Person) -> RepoResult<bool>;
    fn unlink_from_person(&self, phone: &Phone, person: &Person) -> RepoResult<bool>;
    fn find_by_id(&self, id: RowId) -> RepoResult<Option<Phone>>;
    fn find_by_area_and_number(&self, area_code: i32, number: i64) -> RepoResult<Option<Phone>>;
    /// Phones linked to `person`, ordered by id.
    fn find_all_for_person(&self, person: &Person) -> RepoResult<Vec<Phone>>;
}

/// SQLite-backed phone repository.
pub struct SqlitePhoneRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePhoneRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[PHONE_TYPE_TABLE, PHONE_TABLE, PERSON_PHONE_TABLE])?;
        Ok(Self { conn })
    }

    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn exec(&self) -> SqlExecutor<'conn> {
        SqlExecutor::new(self.conn)
    }

    /// Swaps the phone's type for the stored type with the same description,
    /// or stores the supplied type when none exists yet.
    fn resolve_phone_type(&self, phone: &mut Phone) -> RepoResult<()> {
        let types = SqlitePhoneTypeRepository::new_unchecked(self.conn);
        if let Some(existing) = types.find_by_description(&phone.phone_type.description)? {
            phone.phone_type = existing;
            return Ok(());
        }

        // A carried id belongs to a type stored under another description.
        phone.phone_type.id = UNSAVED_ID;
        types.insert(&mut phone.phone_type)?;
        debug!(
            "event=phone_type_insert module=phone_repo status=ok type_id={}",
            phone.phone_type.id
        );
        Ok(())
    }

    fn has_link(&self, phone: &Phone) -> RepoResult<bool> {
        let linked = self.exec().query_first(
            "SELECT EXISTS(
                SELECT 1
                FROM person_phone
                WHERE phone_id = ?1
            );",
            [phone.id],
            |row| row.get::<_, i64>(0).map_err(RepoError::from),
        )?;
        Ok(linked == Some(1))
    }

    fn find_one(&self, filter: &str, params: impl rusqlite::Params) -> RepoResult<Option<Phone>> {
        self.exec().query_first(
            &format!("{PHONE_SELECT_SQL} {filter} ORDER BY p.id ASC LIMIT 1;"),
            params,
            parse_phone_row,
        )
    }
}

impl PhoneRepository for SqlitePhoneRepository<'_> {
    fn insert(&self, phone: &mut Phone) -> RepoResult<bool> {
        if phone.is_persisted() {
            return Ok(false);
        }
        phone.validate()?;
        self.resolve_phone_type(phone)?;

        let id = next_id(self.conn, Table::Phone)?;
        let inserted = self.exec().insert(
            "INSERT INTO phone (id, number, area_code, type_id) VALUES (?1, ?2, ?3, ?4);",
            params![id, phone.number, phone.area_code, phone.phone_type.id],
        )?;
        if inserted {
            phone.id = id;
        }
        Ok(inserted)
    }

    fn update(&self, phone: &mut Phone) -> RepoResult<bool> {
        if !phone.is_persisted() {
            return Ok(false);
        }
        phone.validate()?;
        self.resolve_phone_type(phone)?;

        let updated = self.exec().update(
            "UPDATE phone
             SET
                number = ?1,
                area_code = ?2,
                type_id = ?3
             WHERE id = ?4;",
            params![phone.number, phone.area_code, phone.phone_type.id, phone.id],
        )?;
        Ok(updated)
    }

    fn delete(&self, phone: &Phone) -> RepoResult<bool> {
        if !phone.is_persisted() {
            return Ok(false);
        }
        if self.has_link(phone)? {
            debug!(
                "event=phone_delete module=phone_repo status=skip reason=still_linked id={}",
                phone.id
            );
            return Ok(false);
        }

        let deleted = self
            .exec()
            .delete("DELETE FROM phone WHERE id = ?1;", [phone.id])?;
        Ok(deleted)
    }

    fn link_to_person(&self, phone: &mut Phone, person: &Person) -> RepoResult<bool> {
        if !person.is_persisted() {
            return Ok(false);
        }
        if !phone.is_persisted() && !self.insert(phone)? {
            return Ok(false);
        }

        let linked = self.exec().insert(
            "INSERT OR IGNORE INTO person_phone (person_id, phone_id) VALUES (?1, ?2);",
            params![person.id, phone.id],
        )?;
        Ok(linked)
    }

    fn unlink_from_person(&self, phone: &Phone, person: &Person) -> RepoResult<bool> {
        if !person.is_persisted() || !phone.is_persisted() {
            return Ok(false);
        }

        let unlinked = self.exec().delete(
            "DELETE FROM person_phone WHERE person_id = ?1 AND phone_id = ?2;",
            params![person.id, phone.id],
        )?;
        Ok(unlinked)
    }

    fn find_by_id(&self, id: RowId) -> RepoResult<Option<Phone>> {
        if id <= 0 {
            return Ok(None);
        }
        self.find_one("WHERE p.id = ?1", [id])
    }

    fn find_by_area_and_number(&self, area_code: i32, number: i64) -> RepoResult<Option<Phone>> {
        self.find_one(
            "WHERE p.area_code = ?1 AND p.number = ?2",
            params![area_code, number],
        )
    }

    fn find_all_for_person(&self, person: &Person) -> RepoResult<Vec<Phone>> {
        if !person.is_persisted() {
            return Ok(Vec::new());
        }
        self.exec().query_rows(
            &format!(
                "{PHONE_SELECT_SQL}
                 WHERE EXISTS (
                    SELECT 1
                    FROM person_phone pp
                    WHERE pp.phone_id = p.id
                      AND pp.person_id = ?1
                 )
                 ORDER BY p.id ASC;"
            ),
            [person.id],
            parse_phone_row,
        )
    }
}

fn parse_phone_row(row: &Row<'_>) -> RepoResult<Phone> {
    let phone = Phone {
        id: row.get("id")?,
        area_code: row.get("area_code")?,
        number: row.get("number")?,
        phone_type: PhoneType {
            id: row.get("type_id")?,
            description: row.get("type_description")?,
        },
    };
    if phone.id <= 0 {
        return Err(RepoError::InvalidData(format!(
            "invalid id `{}` in phone.id",
            phone.id
        )));
    }
    Ok(phone)
}

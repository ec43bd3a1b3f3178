//! Person repository: reconciles a person graph against normalized rows.
//!
//! # Responsibility
//! - Load a person with its address and linked phones.
//! - Insert/update/delete a person together with the address and phone rows it
//!   references, issuing only the writes needed to match the declared graph.
//!
//! # Invariants
//! - At most one person row per national id (checked before insert).
//! - A person's new address is stored and the person row repointed before the
//!   previous address is considered for deletion.
//! - Address and phone rows are deleted only when no person references them.
//! - Each top-level write runs in one IMMEDIATE transaction; the in-memory
//!   person is updated only after commit.
//! - Cleanup of stale phones/addresses and the lookup of previous state are
//!   best-effort: failures are logged at `warn` and the operation continues.

use super::address_repo::{AddressRepository, SqliteAddressRepository};
use super::phone_repo::{PhoneRepository, SqlitePhoneRepository};
use super::sequence::{next_id, Table};
use super::{
    ensure_connection_ready, RepoError, RepoResult, ADDRESS_TABLE, PERSON_PHONE_TABLE,
    PERSON_TABLE, PHONE_TABLE, PHONE_TYPE_TABLE,
};
use crate::db::SqlExecutor;
use crate::model::address::Address;
use crate::model::person::Person;
use crate::model::phone::Phone;
use crate::model::{RowId, UNSAVED_ID};
use log::{debug, info, warn};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;

const PERSON_SELECT_SQL: &str = "SELECT
    id,
    name,
    national_id,
    address_id
FROM person";

/// Repository interface for the person aggregate.
pub trait PersonRepository {
    /// Loads a person by national id with address and phones.
    fn find_by_national_id(&self, national_id: i64) -> RepoResult<Option<Person>>;
    /// Loads a person by surrogate id with address and phones.
    fn find_by_id(&self, id: RowId) -> RepoResult<Option<Person>>;
    /// Stores a new person, its address and phone links.
    fn insert(&self, person: &mut Person) -> RepoResult<bool>;
    /// Reconciles a stored person's name, address and phones.
    fn update(&self, person: &mut Person) -> RepoResult<bool>;
    /// Removes a person and every address/phone row left unreferenced.
    fn delete(&self, person: &Person) -> RepoResult<bool>;
    /// Whether any person row points at `address`.
    fn has_address_link(&self, address: &Address) -> RepoResult<bool>;
}

/// SQLite-backed person repository.
pub struct SqlitePersonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersonRepository<'conn> {
    /// Creates repository from a migrated connection carrying every registry
    /// table.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                PERSON_TABLE,
                ADDRESS_TABLE,
                PHONE_TYPE_TABLE,
                PHONE_TABLE,
                PERSON_PHONE_TABLE,
            ],
        )?;
        Ok(Self { conn })
    }

    pub(crate) fn new_unchecked(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn begin(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl PersonRepository for SqlitePersonRepository<'_> {
    fn find_by_national_id(&self, national_id: i64) -> RepoResult<Option<Person>> {
        load_person_by_national_id(self.conn, national_id)
    }

    fn find_by_id(&self, id: RowId) -> RepoResult<Option<Person>> {
        if id <= 0 {
            return Ok(None);
        }
        load_person(self.conn, "WHERE id = ?1", id)
    }

    fn insert(&self, person: &mut Person) -> RepoResult<bool> {
        if person.is_persisted() {
            debug!(
                "event=person_insert module=person_repo status=skip reason=already_persisted id={}",
                person.id
            );
            return Ok(false);
        }
        person.validate()?;

        let tx = self.begin()?;
        let mut draft = person.clone();
        if !insert_person(&tx, &mut draft)? {
            return Ok(false);
        }
        tx.commit()?;

        *person = draft;
        info!(
            "event=person_insert module=person_repo status=ok id={} phones={}",
            person.id,
            person.phones.len()
        );
        Ok(true)
    }

    fn update(&self, person: &mut Person) -> RepoResult<bool> {
        if !person.is_persisted() {
            return Ok(false);
        }
        person.validate()?;

        let tx = self.begin()?;
        let mut draft = person.clone();
        if !update_person(&tx, &mut draft)? {
            return Ok(false);
        }
        tx.commit()?;

        *person = draft;
        info!(
            "event=person_update module=person_repo status=ok id={} phones={}",
            person.id,
            person.phones.len()
        );
        Ok(true)
    }

    fn delete(&self, person: &Person) -> RepoResult<bool> {
        if !person.is_persisted() {
            return Ok(false);
        }

        let tx = self.begin()?;
        if !delete_person(&tx, person.id)? {
            return Ok(false);
        }
        tx.commit()?;

        info!(
            "event=person_delete module=person_repo status=ok id={}",
            person.id
        );
        Ok(true)
    }

    fn has_address_link(&self, address: &Address) -> RepoResult<bool> {
        if !address.is_persisted() {
            return Ok(false);
        }
        let linked = SqlExecutor::new(self.conn).query_first(
            "SELECT EXISTS(
                SELECT 1
                FROM person
                WHERE address_id = ?1
            );",
            [address.id],
            |row| row.get::<_, i64>(0).map_err(RepoError::from),
        )?;
        Ok(linked == Some(1))
    }
}

fn insert_person(conn: &Connection, person: &mut Person) -> RepoResult<bool> {
    if national_id_taken(conn, person.national_id)? {
        info!(
            "event=person_insert module=person_repo status=skip reason=duplicate_national_id"
        );
        return Ok(false);
    }

    // Nothing is persisted for a new national id, so there is no stale address.
    reconcile_address(conn, person)?;

    let id = next_id(conn, Table::Person)?;
    let inserted = SqlExecutor::new(conn).insert(
        "INSERT INTO person (id, name, national_id, address_id) VALUES (?1, ?2, ?3, ?4);",
        params![
            id,
            person.name.as_str(),
            person.national_id,
            person.address.as_ref().map(|address| address.id),
        ],
    )?;
    if !inserted {
        return Ok(false);
    }
    person.id = id;

    reconcile_phones(conn, person)?;
    Ok(true)
}

fn update_person(conn: &Connection, person: &mut Person) -> RepoResult<bool> {
    let stored_national_id = SqlExecutor::new(conn).query_first(
        "SELECT national_id FROM person WHERE id = ?1;",
        [person.id],
        |row| row.get::<_, i64>(0).map_err(RepoError::from),
    )?;
    match stored_national_id {
        None => {
            debug!(
                "event=person_update module=person_repo status=skip reason=not_found id={}",
                person.id
            );
            return Ok(false);
        }
        Some(stored) if stored != person.national_id => {
            info!(
                "event=person_update module=person_repo status=skip reason=national_id_immutable id={}",
                person.id
            );
            return Ok(false);
        }
        Some(_) => {}
    }

    let previous_address = reconcile_address(conn, person)?;

    let updated = SqlExecutor::new(conn).update(
        "UPDATE person
         SET
            name = ?1,
            address_id = ?2
         WHERE id = ?3;",
        params![
            person.name.as_str(),
            person.address.as_ref().map(|address| address.id),
            person.id,
        ],
    )?;
    if !updated {
        return Ok(false);
    }

    reconcile_phones(conn, person)?;

    if let Some(previous) = previous_address {
        release_address(conn, &previous);
    }
    Ok(true)
}

fn delete_person(conn: &Connection, id: RowId) -> RepoResult<bool> {
    let Some(stored) = load_person(conn, "WHERE id = ?1", id)? else {
        debug!(
            "event=person_delete module=person_repo status=skip reason=not_found id={}",
            id
        );
        return Ok(false);
    };

    let phones = SqlitePhoneRepository::new_unchecked(conn);
    for phone in &stored.phones {
        release_phone(&phones, phone, &stored);
    }

    let deleted = SqlExecutor::new(conn).delete("DELETE FROM person WHERE id = ?1;", [id])?;
    if !deleted {
        return Ok(false);
    }

    if let Some(address) = &stored.address {
        release_address(conn, address);
    }
    Ok(true)
}

/// Stores the person's declared address and returns the previously stored
/// address when the person moved away from it.
///
/// The returned address is still referenced by the person row until the
/// caller repoints it; it must only be released afterwards.
fn reconcile_address(conn: &Connection, person: &mut Person) -> RepoResult<Option<Address>> {
    let previous = match load_person_by_national_id(conn, person.national_id) {
        Ok(stored) => stored.and_then(|stored| stored.address),
        Err(err) => {
            warn!(
                "event=address_reconcile module=person_repo status=suppressed stage=load_previous error={}",
                err
            );
            None
        }
    };

    let Some(mut declared) = person.address.take() else {
        return Ok(previous);
    };

    let mut stale = None;
    if let Some(previous) = previous {
        if previous == declared {
            declared = previous;
        } else {
            stale = Some(previous);
        }
    }

    let addresses = SqliteAddressRepository::new_unchecked(conn);
    if !declared.is_persisted() {
        if let Some(existing) =
            addresses.find_by_number_and_postal_code(declared.number, declared.postal_code)?
        {
            declared = existing;
        }
    }

    if declared.is_persisted() {
        addresses.update(&declared)?;
    } else {
        addresses.insert(&mut declared)?;
    }

    person.address = Some(declared);
    Ok(stale)
}

/// Makes the stored phone links of `person` match its declared phone set.
fn reconcile_phones(conn: &Connection, person: &mut Person) -> RepoResult<()> {
    let phones = SqlitePhoneRepository::new_unchecked(conn);
    let stored = phones.find_all_for_person(person)?;

    for phone in stored
        .iter()
        .filter(|phone| !person.phones.contains(*phone))
    {
        release_phone(&phones, phone, person);
    }

    let declared: Vec<Phone> = person.phones.drain().collect();
    let mut reconciled = HashSet::with_capacity(declared.len());
    for mut phone in declared {
        match stored.iter().find(|linked| **linked == phone) {
            Some(linked) => {
                phone.id = linked.id;
                if linked.phone_type.description != phone.phone_type.description {
                    phones.update(&mut phone)?;
                } else {
                    phone.phone_type = linked.phone_type.clone();
                }
            }
            None => {
                match phones.find_by_area_and_number(phone.area_code, phone.number)? {
                    Some(existing) => {
                        phone.id = existing.id;
                        phones.update(&mut phone)?;
                    }
                    None => {
                        phone.id = UNSAVED_ID;
                        phones.insert(&mut phone)?;
                    }
                }
                phones.link_to_person(&mut phone, person)?;
            }
        }
        reconciled.insert(phone);
    }

    person.phones = reconciled;
    Ok(())
}

fn release_phone(phones: &SqlitePhoneRepository<'_>, phone: &Phone, person: &Person) {
    let released = phones
        .unlink_from_person(phone, person)
        .and_then(|_| phones.delete(phone));
    if let Err(err) = released {
        warn!(
            "event=phone_release module=person_repo status=suppressed person_id={} phone_id={} error={}",
            person.id, phone.id, err
        );
    }
}

fn release_address(conn: &Connection, address: &Address) {
    if let Err(err) = SqliteAddressRepository::new_unchecked(conn).delete(address) {
        warn!(
            "event=address_release module=person_repo status=suppressed address_id={} error={}",
            address.id, err
        );
    }
}

fn national_id_taken(conn: &Connection, national_id: i64) -> RepoResult<bool> {
    let taken = SqlExecutor::new(conn).query_first(
        "SELECT EXISTS(
            SELECT 1
            FROM person
            WHERE national_id = ?1
        );",
        [national_id],
        |row| row.get::<_, i64>(0).map_err(RepoError::from),
    )?;
    Ok(taken == Some(1))
}

fn load_person_by_national_id(conn: &Connection, national_id: i64) -> RepoResult<Option<Person>> {
    if national_id <= 0 {
        return Ok(None);
    }
    load_person(conn, "WHERE national_id = ?1", national_id)
}

fn load_person(conn: &Connection, filter: &str, key: i64) -> RepoResult<Option<Person>> {
    let row = SqlExecutor::new(conn).query_first(
        &format!("{PERSON_SELECT_SQL} {filter} ORDER BY id ASC LIMIT 1;"),
        [key],
        parse_person_row,
    )?;
    let Some((mut person, address_id)) = row else {
        return Ok(None);
    };

    if let Some(address_id) = address_id {
        person.address =
            SqliteAddressRepository::new_unchecked(conn).find_by_id(address_id)?;
    }
    person.phones = SqlitePhoneRepository::new_unchecked(conn)
        .find_all_for_person(&person)?
        .into_iter()
        .collect();
    Ok(Some(person))
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<(Person, Option<RowId>)> {
    let mut person = Person::new(row.get::<_, String>("name")?, row.get("national_id")?);
    person.id = row.get("id")?;
    if person.id <= 0 {
        return Err(RepoError::InvalidData(format!(
            "invalid id `{}` in person.id",
            person.id
        )));
    }
    Ok((person, row.get("address_id")?))
}

use roster_core::db::open_db_in_memory;
use roster_core::{
    Address, Person, PersonRepository, Phone, PhoneType, RepoError, SqlitePersonRepository,
    ValidationError,
};
use rusqlite::Connection;
use std::collections::HashSet;

fn address(number: i32, street: &str) -> Address {
    Address::new(street, number, 74000, "Centro", "Goiania", "GO")
}

fn phone(number: i64, description: &str) -> Phone {
    Phone::new(62, number, PhoneType::new(description))
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn insert_then_find_round_trips_graph() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut person = Person::new("Ana", 111)
        .with_address(address(10, "Main St"))
        .with_phone(phone(1, "mobile"))
        .with_phone(phone(2, "home"));
    let declared_phones: HashSet<Phone> = person.phones.clone();
    assert!(repo.insert(&mut person).unwrap());
    assert!(person.is_persisted());

    let stored = repo.find_by_national_id(111).unwrap().unwrap();
    assert_eq!(stored.id, person.id);
    assert_eq!(stored.name, "Ana");
    assert_eq!(stored.address, Some(address(10, "Main St")));
    assert_eq!(stored.phones, declared_phones);
    assert!(stored.phones.iter().all(Phone::is_persisted));
    assert_eq!(stored.address.unwrap().street, "Main St");

    assert_eq!(repo.find_by_id(person.id).unwrap().unwrap().national_id, 111);
    assert!(repo.find_by_national_id(0).unwrap().is_none());
    assert!(repo.find_by_national_id(222).unwrap().is_none());
}

#[test]
fn insert_without_address_or_phones_stores_bare_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut person = Person::new("Ana", 111);
    assert!(repo.insert(&mut person).unwrap());

    let stored = repo.find_by_national_id(111).unwrap().unwrap();
    assert!(stored.address.is_none());
    assert!(stored.phones.is_empty());
}

#[test]
fn insert_rejects_duplicate_national_id_and_leaves_store_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let mut first = Person::new("Ana", 111).with_address(address(10, "Main St"));
    repo.insert(&mut first).unwrap();

    let mut duplicate = Person::new("Bia", 111)
        .with_address(address(99, "Other St"))
        .with_phone(phone(5, "work"));
    assert!(!repo.insert(&mut duplicate).unwrap());
    assert!(!duplicate.is_persisted());

    assert_eq!(count(&conn, "person"), 1);
    assert_eq!(count(&conn, "address"), 1);
    assert_eq!(count(&conn, "phone"), 0);
    assert_eq!(count(&conn, "phone_type"), 0);
    assert_eq!(repo.find_by_national_id(111).unwrap().unwrap().name, "Ana");
}

#[test]
fn insert_validates_before_touching_store() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut blank = Person::new("", 111).with_address(address(10, "Main St"));
    assert!(matches!(
        repo.insert(&mut blank).unwrap_err(),
        RepoError::Validation(ValidationError::BlankPersonName)
    ));
    assert_eq!(count(&conn, "address"), 0);

    let mut saved = Person::new("Ana", 111);
    saved.id = 7;
    assert!(!repo.insert(&mut saved).unwrap());
    assert_eq!(count(&conn, "person"), 0);
}

#[test]
fn equal_addresses_share_one_row_until_last_person_leaves() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111).with_address(address(10, "Main St"));
    let mut bia = Person::new("Bia", 222).with_address(address(10, "Main Street, rear"));
    repo.insert(&mut ana).unwrap();
    repo.insert(&mut bia).unwrap();

    assert_eq!(count(&conn, "address"), 1);
    let shared_id = ana.address.as_ref().unwrap().id;
    assert_eq!(bia.address.as_ref().unwrap().id, shared_id);

    assert!(repo.delete(&ana).unwrap());
    assert_eq!(count(&conn, "address"), 1);

    assert!(repo.delete(&bia).unwrap());
    assert_eq!(count(&conn, "address"), 0);
    assert_eq!(count(&conn, "person"), 0);
}

#[test]
fn equal_phones_share_one_row_until_unlinked_everywhere() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111).with_phone(phone(1, "mobile"));
    let mut bia = Person::new("Bia", 222).with_phone(phone(1, "mobile"));
    repo.insert(&mut ana).unwrap();
    repo.insert(&mut bia).unwrap();
    assert_eq!(count(&conn, "phone"), 1);
    assert_eq!(count(&conn, "person_phone"), 2);

    ana.phones.clear();
    assert!(repo.update(&mut ana).unwrap());
    assert_eq!(count(&conn, "phone"), 1);
    assert_eq!(count(&conn, "person_phone"), 1);
    assert!(repo.find_by_national_id(111).unwrap().unwrap().phones.is_empty());

    bia.phones.clear();
    assert!(repo.update(&mut bia).unwrap());
    assert_eq!(count(&conn, "phone"), 0);
    assert_eq!(count(&conn, "person_phone"), 0);
    assert_eq!(count(&conn, "phone_type"), 1);
}

#[test]
fn update_to_unequal_address_repoints_and_deletes_unreferenced_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111).with_address(address(10, "Main St"));
    repo.insert(&mut ana).unwrap();
    let old_id = ana.address.as_ref().unwrap().id;

    ana.address = Some(address(20, "Main St"));
    assert!(repo.update(&mut ana).unwrap());
    let new_id = ana.address.as_ref().unwrap().id;
    assert_ne!(new_id, old_id);

    let address_id: i64 = conn
        .query_row(
            "SELECT address_id FROM person WHERE id = ?1;",
            [ana.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(address_id, new_id);
    assert_eq!(count(&conn, "address"), 1);
}

#[test]
fn update_keeps_old_address_while_another_person_references_it() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111).with_address(address(10, "Main St"));
    let mut bia = Person::new("Bia", 222).with_address(address(10, "Main St"));
    repo.insert(&mut ana).unwrap();
    repo.insert(&mut bia).unwrap();

    ana.address = Some(address(20, "Main St"));
    repo.update(&mut ana).unwrap();

    assert_eq!(count(&conn, "address"), 2);
    let bia_stored = repo.find_by_national_id(222).unwrap().unwrap();
    assert_eq!(bia_stored.address.unwrap().number, 10);
}

#[test]
fn update_clearing_address_releases_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111).with_address(address(10, "Main St"));
    repo.insert(&mut ana).unwrap();

    ana.address = None;
    assert!(repo.update(&mut ana).unwrap());
    assert_eq!(count(&conn, "address"), 0);
    assert!(repo.find_by_id(ana.id).unwrap().unwrap().address.is_none());
}

#[test]
fn update_with_equal_address_keeps_persisted_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111).with_address(address(10, "Main St"));
    repo.insert(&mut ana).unwrap();
    let address_id = ana.address.as_ref().unwrap().id;

    ana.name = "Ana Maria".to_string();
    ana.address = Some(address(10, "Renamed St"));
    assert!(repo.update(&mut ana).unwrap());

    let stored = repo.find_by_id(ana.id).unwrap().unwrap();
    assert_eq!(stored.name, "Ana Maria");
    let stored_address = stored.address.unwrap();
    assert_eq!(stored_address.id, address_id);
    assert_eq!(stored_address.street, "Main St");
    assert_eq!(count(&conn, "address"), 1);
}

#[test]
fn update_editing_own_address_number_keeps_row() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111).with_address(address(10, "Main St"));
    repo.insert(&mut ana).unwrap();
    let address_id = ana.address.as_ref().unwrap().id;

    ana.address.as_mut().unwrap().number = 20;
    assert!(repo.update(&mut ana).unwrap());

    let stored_address = repo.find_by_id(ana.id).unwrap().unwrap().address.unwrap();
    assert_eq!(stored_address.id, address_id);
    assert_eq!(stored_address.number, 20);
    assert_eq!(count(&conn, "address"), 1);
}

#[test]
fn failed_phone_cleanup_is_suppressed_and_update_commits() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111).with_phone(phone(1, "mobile"));
    repo.insert(&mut ana).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER keep_phone BEFORE DELETE ON phone
         BEGIN
            SELECT RAISE(ABORT, 'phone rows are locked');
         END;",
    )
    .unwrap();

    ana.name = "Ana Maria".to_string();
    ana.phones.clear();
    assert!(repo.update(&mut ana).unwrap());

    assert_eq!(count(&conn, "person_phone"), 0);
    assert_eq!(count(&conn, "phone"), 1);
    let stored = repo.find_by_national_id(111).unwrap().unwrap();
    assert_eq!(stored.name, "Ana Maria");
    assert!(stored.phones.is_empty());
}

#[test]
fn failed_address_cleanup_is_suppressed_and_update_commits() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111).with_address(address(10, "Main St"));
    repo.insert(&mut ana).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER keep_address BEFORE DELETE ON address
         BEGIN
            SELECT RAISE(ABORT, 'address rows are locked');
         END;",
    )
    .unwrap();

    ana.address = None;
    assert!(repo.update(&mut ana).unwrap());

    assert_eq!(count(&conn, "address"), 1);
    assert!(repo.find_by_id(ana.id).unwrap().unwrap().address.is_none());
}

#[test]
fn update_adds_and_removes_phones() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111)
        .with_phone(phone(1, "mobile"))
        .with_phone(phone(2, "home"));
    repo.insert(&mut ana).unwrap();

    ana.phones.remove(&phone(1, "mobile"));
    ana.phones.insert(phone(3, "work"));
    assert!(repo.update(&mut ana).unwrap());

    let stored = repo.find_by_national_id(111).unwrap().unwrap();
    let numbers: HashSet<i64> = stored.phones.iter().map(|phone| phone.number).collect();
    assert_eq!(numbers, HashSet::from([2, 3]));
    assert_eq!(count(&conn, "phone"), 2);
    assert!(ana.phones.iter().all(Phone::is_persisted));
}

#[test]
fn update_applies_phone_type_change() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111).with_phone(phone(1, "mobile"));
    repo.insert(&mut ana).unwrap();

    ana.phones = HashSet::from([phone(1, "work")]);
    assert!(repo.update(&mut ana).unwrap());

    let stored = repo.find_by_national_id(111).unwrap().unwrap();
    let stored_phone = stored.phones.iter().next().unwrap();
    assert_eq!(stored_phone.phone_type.description, "work");
    assert_eq!(count(&conn, "phone"), 1);
}

#[test]
fn update_rejects_unknown_person_and_national_id_change() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut unsaved = Person::new("Ana", 111);
    assert!(!repo.update(&mut unsaved).unwrap());

    let mut ghost = Person::new("Ghost", 111);
    ghost.id = 50;
    assert!(!repo.update(&mut ghost).unwrap());

    let mut ana = Person::new("Ana", 111);
    repo.insert(&mut ana).unwrap();
    let mut renumbered = ana.clone();
    renumbered.national_id = 999;
    assert!(!repo.update(&mut renumbered).unwrap());
    assert!(repo.find_by_national_id(999).unwrap().is_none());
}

#[test]
fn delete_removes_unreferenced_rows_and_keeps_shared_ones() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111)
        .with_address(address(10, "Main St"))
        .with_phone(phone(1, "mobile"))
        .with_phone(phone(2, "home"));
    let mut bia = Person::new("Bia", 222)
        .with_address(address(20, "Main St"))
        .with_phone(phone(2, "home"));
    repo.insert(&mut ana).unwrap();
    repo.insert(&mut bia).unwrap();
    assert_eq!(count(&conn, "phone"), 2);

    assert!(repo.delete(&ana).unwrap());

    assert!(repo.find_by_national_id(111).unwrap().is_none());
    assert_eq!(count(&conn, "address"), 1);
    assert_eq!(count(&conn, "phone"), 1);
    let bia_stored = repo.find_by_national_id(222).unwrap().unwrap();
    assert_eq!(bia_stored.phones.len(), 1);
    assert_eq!(bia_stored.address.unwrap().number, 20);

    assert!(!repo.delete(&ana).unwrap());
    assert!(!repo.delete(&Person::new("Nobody", 333)).unwrap());
}

#[test]
fn delete_uses_persisted_state_not_declared_graph() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut ana = Person::new("Ana", 111)
        .with_address(address(10, "Main St"))
        .with_phone(phone(1, "mobile"));
    repo.insert(&mut ana).unwrap();

    let mut stripped = ana.clone();
    stripped.address = None;
    stripped.phones.clear();
    assert!(repo.delete(&stripped).unwrap());

    assert_eq!(count(&conn, "address"), 0);
    assert_eq!(count(&conn, "phone"), 0);
    assert_eq!(count(&conn, "person_phone"), 0);
}

#[test]
fn graph_deserialized_from_json_is_stored_as_new() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut person: Person = serde_json::from_str(
        r#"{
            "name": "Ana",
            "national_id": 111,
            "address": {
                "street": "Main St",
                "number": 10,
                "postal_code": 74000,
                "district": "Centro",
                "city": "Goiania",
                "state": "GO"
            },
            "phones": [
                {"area_code": 62, "number": 1, "phone_type": {"description": "mobile"}}
            ]
        }"#,
    )
    .unwrap();
    assert!(!person.is_persisted());
    assert!(repo.insert(&mut person).unwrap());

    let stored = repo.find_by_national_id(111).unwrap().unwrap();
    assert_eq!(stored.phones.len(), 1);
    assert!(stored.address.unwrap().is_persisted());
}

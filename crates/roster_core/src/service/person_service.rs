//! Person use-case service.
//!
//! # Responsibility
//! - Provide register/update/remove entry points for the person aggregate.
//! - Read every written person back from the store.
//!
//! # Invariants
//! - Returned persons always reflect committed state.
//! - A `false` from the repository is explained as a typed error, never
//!   returned as success.

use crate::model::person::Person;
use crate::model::RowId;
use crate::repo::person_repo::PersonRepository;
use crate::repo::{RepoError, RepoResult};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for person use-cases.
#[derive(Debug)]
pub enum PersonServiceError {
    /// Another person is already registered under this national id.
    DuplicateNationalId(i64),
    /// No person is registered under this national id.
    PersonNotFound(i64),
    /// No person row carries this surrogate id.
    PersonIdNotFound(RowId),
    /// Update tried to change the national id of a stored person.
    NationalIdChanged { id: RowId, national_id: i64 },
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for PersonServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateNationalId(national_id) => {
                write!(f, "national id already registered: {national_id}")
            }
            Self::PersonNotFound(national_id) => write!(f, "person not found: {national_id}"),
            Self::PersonIdNotFound(id) => write!(f, "person id not found: {id}"),
            Self::NationalIdChanged { id, national_id } => write!(
                f,
                "person {id} cannot change national id to {national_id}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent person state: {details}"),
        }
    }
}

impl Error for PersonServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for PersonServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Person service facade over repository implementations.
pub struct PersonService<R: PersonRepository> {
    repo: R,
}

impl<R: PersonRepository> PersonService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Stores a new person graph and returns the persisted graph.
    pub fn register(&self, mut person: Person) -> Result<Person, PersonServiceError> {
        if person.is_persisted() {
            return Err(PersonServiceError::InconsistentState(
                "register called with a persisted person",
            ));
        }
        if !self.repo.insert(&mut person)? {
            if self.repo.find_by_national_id(person.national_id)?.is_some() {
                return Err(PersonServiceError::DuplicateNationalId(person.national_id));
            }
            return Err(PersonServiceError::InconsistentState(
                "insert rejected without a conflicting person",
            ));
        }

        self.read_back(person.id, "registered person not found in read-back")
    }

    /// Reconciles a stored person with the given graph.
    ///
    /// # Contract
    /// - `person.id` must identify a stored person.
    /// - The national id is immutable once stored.
    pub fn update(&self, mut person: Person) -> Result<Person, PersonServiceError> {
        let Some(stored) = self.repo.find_by_id(person.id)? else {
            return Err(PersonServiceError::PersonIdNotFound(person.id));
        };
        if stored.national_id != person.national_id {
            return Err(PersonServiceError::NationalIdChanged {
                id: person.id,
                national_id: person.national_id,
            });
        }
        if !self.repo.update(&mut person)? {
            return Err(PersonServiceError::InconsistentState(
                "update rejected for a stored person",
            ));
        }

        self.read_back(person.id, "updated person not found in read-back")
    }

    /// Removes the person registered under `national_id` and returns the
    /// graph as it was stored.
    pub fn remove(&self, national_id: i64) -> Result<Person, PersonServiceError> {
        let Some(stored) = self.repo.find_by_national_id(national_id)? else {
            return Err(PersonServiceError::PersonNotFound(national_id));
        };
        if !self.repo.delete(&stored)? {
            return Err(PersonServiceError::InconsistentState(
                "delete rejected for a stored person",
            ));
        }
        Ok(stored)
    }

    /// Gets one person by national id.
    pub fn find_by_national_id(&self, national_id: i64) -> RepoResult<Option<Person>> {
        self.repo.find_by_national_id(national_id)
    }

    /// Gets one person by surrogate id.
    pub fn find_by_id(&self, id: RowId) -> RepoResult<Option<Person>> {
        self.repo.find_by_id(id)
    }

    fn read_back(&self, id: RowId, details: &'static str) -> Result<Person, PersonServiceError> {
        self.repo
            .find_by_id(id)?
            .ok_or(PersonServiceError::InconsistentState(details))
    }
}

#[cfg(test)]
mod tests {
    use super::{PersonService, PersonServiceError};
    use crate::db::open_db_in_memory;
    use crate::model::address::Address;
    use crate::model::person::Person;
    use crate::model::phone::{Phone, PhoneType};
    use crate::repo::person_repo::SqlitePersonRepository;

    fn sample(national_id: i64) -> Person {
        Person::new("Ana", national_id)
            .with_address(Address::new("Main St", 10, 74000, "Centro", "Goiania", "GO"))
            .with_phone(Phone::new(62, 999_000_111, PhoneType::new("mobile")))
    }

    #[test]
    fn register_returns_read_back_graph() {
        let conn = open_db_in_memory().unwrap();
        let service = PersonService::new(SqlitePersonRepository::try_new(&conn).unwrap());

        let stored = service.register(sample(42)).unwrap();
        assert!(stored.is_persisted());
        assert!(stored.address.as_ref().unwrap().is_persisted());
        assert_eq!(stored.phones.len(), 1);
        assert!(stored.phones.iter().all(|phone| phone.is_persisted()));
    }

    #[test]
    fn register_reports_duplicate_national_id() {
        let conn = open_db_in_memory().unwrap();
        let service = PersonService::new(SqlitePersonRepository::try_new(&conn).unwrap());
        service.register(sample(42)).unwrap();

        let err = service.register(Person::new("Bia", 42)).unwrap_err();
        assert!(matches!(err, PersonServiceError::DuplicateNationalId(42)));
    }

    #[test]
    fn update_rejects_missing_person_and_national_id_change() {
        let conn = open_db_in_memory().unwrap();
        let service = PersonService::new(SqlitePersonRepository::try_new(&conn).unwrap());

        let mut ghost = Person::new("Ghost", 7);
        ghost.id = 99;
        assert!(matches!(
            service.update(ghost).unwrap_err(),
            PersonServiceError::PersonIdNotFound(99)
        ));

        let mut stored = service.register(sample(42)).unwrap();
        stored.national_id = 43;
        assert!(matches!(
            service.update(stored).unwrap_err(),
            PersonServiceError::NationalIdChanged { national_id: 43, .. }
        ));
    }

    #[test]
    fn remove_returns_stored_graph_and_clears_lookup() {
        let conn = open_db_in_memory().unwrap();
        let service = PersonService::new(SqlitePersonRepository::try_new(&conn).unwrap());
        service.register(sample(42)).unwrap();

        let removed = service.remove(42).unwrap();
        assert_eq!(removed.name, "Ana");
        assert!(service.find_by_national_id(42).unwrap().is_none());
        assert!(matches!(
            service.remove(42).unwrap_err(),
            PersonServiceError::PersonNotFound(42)
        ));
    }
}

//! Core domain logic for the person registry.
//! Reconciles person/address/phone graphs against a normalized SQLite store.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, LogLevel, LogSettings, StoreConfig, StoreTarget};
pub use db::{open_db, open_db_in_memory, DbError, SqlExecutor, StatementCategory};
pub use logging::{init_logging, logging_status};
pub use model::address::Address;
pub use model::person::Person;
pub use model::phone::{Phone, PhoneType};
pub use model::{RowId, ValidationError, UNSAVED_ID};
pub use repo::address_repo::{AddressRepository, SqliteAddressRepository};
pub use repo::person_repo::{PersonRepository, SqlitePersonRepository};
pub use repo::phone_repo::{PhoneRepository, SqlitePhoneRepository};
pub use repo::phone_type_repo::{PhoneTypeRepository, SqlitePhoneTypeRepository};
pub use repo::{RepoError, RepoResult};
pub use service::person_service::{PersonService, PersonServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

//! Person aggregate: the root of the reconciled object graph.

use super::address::Address;
use super::phone::Phone;
use super::{RowId, ValidationError, UNSAVED_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Registered person with an owned address and phone set.
///
/// `national_id` is the business key: the store holds at most one person per
/// national id. The phone set has natural-key semantics, so two phones with
/// the same area code and number collapse into one member.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub id: RowId,
    pub name: String,
    pub national_id: i64,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub phones: HashSet<Phone>,
}

impl Person {
    pub fn new(name: impl Into<String>, national_id: i64) -> Self {
        Self {
            id: UNSAVED_ID,
            name: name.into(),
            national_id,
            address: None,
            phones: HashSet::new(),
        }
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Adds a phone; an equal phone already in the set is kept.
    pub fn with_phone(mut self, phone: Phone) -> Self {
        self.phones.insert(phone);
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// # Errors
    /// - Blank name, non-positive national id, or an invalid phone.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankPersonName);
        }
        if self.national_id <= 0 {
            return Err(ValidationError::NonPositiveNationalId(self.national_id));
        }
        for phone in &self.phones {
            phone.validate()?;
        }
        Ok(())
    }
}

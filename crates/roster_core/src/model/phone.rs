//! Phone and phone type values.

use super::{RowId, ValidationError, UNSAVED_ID};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Phone category such as `mobile` or `landline`, shared by many phones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneType {
    #[serde(default)]
    pub id: RowId,
    pub description: String,
}

impl PhoneType {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: UNSAVED_ID,
            description: description.into(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }
}

/// Phone row, possibly linked to several persons.
///
/// Equality is `(area_code, number)`; id and type are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phone {
    #[serde(default)]
    pub id: RowId,
    pub area_code: i32,
    pub number: i64,
    pub phone_type: PhoneType,
}

impl Phone {
    pub fn new(area_code: i32, number: i64, phone_type: PhoneType) -> Self {
        Self {
            id: UNSAVED_ID,
            area_code,
            number,
            phone_type,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    /// # Errors
    /// - `BlankPhoneTypeDescription` when the type cannot be resolved by name.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.phone_type.description.trim().is_empty() {
            return Err(ValidationError::BlankPhoneTypeDescription);
        }
        Ok(())
    }
}

impl PartialEq for Phone {
    fn eq(&self, other: &Self) -> bool {
        self.area_code == other.area_code && self.number == other.number
    }
}

impl Eq for Phone {}

impl Hash for Phone {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.area_code.hash(state);
        self.number.hash(state);
    }
}

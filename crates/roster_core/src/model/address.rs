//! Address value shared between persons.

use super::{RowId, UNSAVED_ID};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Postal address row.
///
/// Two addresses with the same house number and postal code are the same
/// address for reconciliation, whatever their id, street or locality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub id: RowId,
    pub street: String,
    pub number: i32,
    pub postal_code: i32,
    pub district: String,
    pub city: String,
    pub state: String,
}

impl Address {
    pub fn new(
        street: impl Into<String>,
        number: i32,
        postal_code: i32,
        district: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            id: UNSAVED_ID,
            street: street.into(),
            number,
            postal_code,
            district: district.into(),
            city: city.into(),
            state: state.into(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number && self.postal_code == other.postal_code
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.number.hash(state);
        self.postal_code.hash(state);
    }
}

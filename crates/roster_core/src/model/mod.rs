//! Registry domain model.
//!
//! # Responsibility
//! - Define the person/address/phone object graph used by reconciliation.
//! - Define natural-key equality used to diff declared and persisted state.
//!
//! # Invariants
//! - Surrogate id `0` means "not persisted yet".
//! - `Address` equality is `(number, postal_code)`; `Phone` equality is
//!   `(area_code, number)`. Ids never take part in equality.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod address;
pub mod person;
pub mod phone;

/// Surrogate integer key shared by every registry table.
pub type RowId = i64;

/// Surrogate id carried by unsaved values.
pub const UNSAVED_ID: RowId = 0;

/// Model checks applied on write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    BlankPersonName,
    NonPositiveNationalId(i64),
    BlankPhoneTypeDescription,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankPersonName => write!(f, "person name cannot be blank"),
            Self::NonPositiveNationalId(value) => {
                write!(f, "national id must be positive, got {value}")
            }
            Self::BlankPhoneTypeDescription => {
                write!(f, "phone type description cannot be blank")
            }
        }
    }
}

impl Error for ValidationError {}

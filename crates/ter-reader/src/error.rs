//! Error taxonomy for indexing and reconciliation.
//!
//! Index-build errors are returned synchronously from
//! [`crate::StreamingReader::start_read`]; every other variant is carried as
//! the terminal [`crate::ReadResult`] of a stream.

use std::fmt;

/// Errors raised while indexing or reconciling a fragmented table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// A required field is absent on the given row.
    FieldNotFound { row: usize, field: String },
    /// A logical-key or fragment-key cell is not a valid unsigned integer.
    KeyParseError {
        row: usize,
        field: &'static str,
        raw: String,
    },
    /// No member row supplies a value inside the field's enum domain.
    NoMatchingValue(String),
    /// A non-empty date cell is not an 8-digit `YYYYMMDD` calendar date.
    DateFormatError { field: String, raw: String },
    /// A logical group with no member rows reached the merger.
    EmptyGroup,
    /// A key listed in the index has no group entry.
    GroupMissing(u64),
    /// A reconciled value does not fit the record slot of its field.
    SlotMismatch(String),
}

impl ReaderError {
    /// `true` for the variants that can only come from a corrupt index or
    /// schema, as opposed to bad source data.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            ReaderError::EmptyGroup | ReaderError::GroupMissing(_) | ReaderError::SlotMismatch(_)
        )
    }
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::FieldNotFound { row, field } => {
                write!(f, "field '{field}' not found on row {row}")
            }
            ReaderError::KeyParseError { row, field, raw } => {
                write!(
                    f,
                    "row {row}: cannot parse '{field}' as unsigned integer from value '{raw}'"
                )
            }
            ReaderError::NoMatchingValue(field) => {
                write!(f, "can not find a suitable value for '{field}'")
            }
            ReaderError::DateFormatError { field, raw } => {
                write!(f, "field '{field}': invalid date '{raw}' (expected YYYYMMDD)")
            }
            ReaderError::EmptyGroup => write!(f, "logical group has no member rows"),
            ReaderError::GroupMissing(key) => {
                write!(f, "key '{key}' not present in group index")
            }
            ReaderError::SlotMismatch(field) => {
                write!(f, "reconciled value for '{field}' does not match its record slot")
            }
        }
    }
}

impl std::error::Error for ReaderError {}

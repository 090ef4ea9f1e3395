//! Tabular source boundary.
//!
//! This module defines **only** the read capability the reader consumes plus
//! a small in-memory implementation. Decoding of concrete file formats and
//! character-set conversion live outside this crate (see `ter-csv`).

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ReaderError;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A field lookup failed for the given row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNotFound {
    pub row: usize,
    pub field: String,
}

impl FieldNotFound {
    pub fn new(row: usize, field: &str) -> Self {
        Self {
            row,
            field: field.to_string(),
        }
    }
}

impl fmt::Display for FieldNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}' not found on row {}", self.field, self.row)
    }
}

impl std::error::Error for FieldNotFound {}

impl From<FieldNotFound> for ReaderError {
    fn from(e: FieldNotFound) -> Self {
        ReaderError::FieldNotFound {
            row: e.row,
            field: e.field,
        }
    }
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Read-only access to physical rows by position and field name.
///
/// Implementations must be `Send + Sync`: the streaming producer runs on a
/// separate task and holds the source behind an `Arc`. Lookups must be free
/// of side effects.
pub trait TabularSource: Send + Sync {
    /// Number of physical rows.
    fn record_count(&self) -> usize;

    /// Raw text of `field` on physical row `row`.
    fn field_value(&self, row: usize, field: &str) -> Result<String, FieldNotFound>;
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// Rows held as field-name maps. Handy for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    rows: Vec<BTreeMap<String, String>>,
}

impl MemoryTable {
    pub fn new(rows: Vec<BTreeMap<String, String>>) -> Self {
        Self { rows }
    }

    /// Build from `(field, value)` pairs per row.
    pub fn from_pairs(rows: &[&[(&str, &str)]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>()
            })
            .collect();
        Self { rows }
    }

    pub fn push_row(&mut self, row: BTreeMap<String, String>) {
        self.rows.push(row);
    }
}

impl TabularSource for MemoryTable {
    fn record_count(&self) -> usize {
        self.rows.len()
    }

    fn field_value(&self, row: usize, field: &str) -> Result<String, FieldNotFound> {
        self.rows
            .get(row)
            .and_then(|r| r.get(field))
            .cloned()
            .ok_or_else(|| FieldNotFound::new(row, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_table_returns_values() {
        let t = MemoryTable::from_pairs(&[&[("NUMBER", "1"), ("ROW_ID", "2")]]);
        assert_eq!(t.record_count(), 1);
        assert_eq!(t.field_value(0, "NUMBER").unwrap(), "1");
        assert_eq!(t.field_value(0, "ROW_ID").unwrap(), "2");
    }

    #[test]
    fn missing_field_is_field_not_found() {
        let t = MemoryTable::from_pairs(&[&[("NUMBER", "1")]]);
        let err = t.field_value(0, "KD").unwrap_err();
        assert_eq!(err, FieldNotFound::new(0, "KD"));
        assert_eq!(err.to_string(), "field 'KD' not found on row 0");
    }

    #[test]
    fn out_of_range_row_is_field_not_found() {
        let t = MemoryTable::default();
        assert!(t.field_value(5, "NUMBER").is_err());
    }

    #[test]
    fn converts_into_reader_error() {
        let e: ReaderError = FieldNotFound::new(4, "TU").into();
        assert_eq!(
            e,
            ReaderError::FieldNotFound {
                row: 4,
                field: "TU".to_string()
            }
        );
    }
}

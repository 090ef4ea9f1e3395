//! Scenario: First bad logical record halts the stream
//!
//! # Invariants under test
//!
//! 1. A record that fails reconciliation is reported once, carrying its key
//!    and error, and is the last item of the stream.
//! 2. Keys after the failing one are never processed.
//! 3. Records before the failing one are still delivered.
//! 4. Index-time failures (bad key text, missing key column) are returned
//!    from `start_read` before any stream exists.

use std::collections::BTreeMap;
use std::sync::Arc;

use ter_reader::{MemoryTable, ReaderError, ReaderState, StreamingReader, SCHEMA};

fn row(cells: &[(&str, &str)]) -> BTreeMap<String, String> {
    let mut r: BTreeMap<String, String> = SCHEMA
        .iter()
        .map(|f| (f.name.to_string(), String::new()))
        .collect();
    r.insert("TERROR".to_string(), "1".to_string());
    r.insert("TU".to_string(), "1".to_string());
    r.insert("KD".to_string(), "04".to_string());
    for (k, v) in cells {
        r.insert(k.to_string(), v.to_string());
    }
    r
}

#[tokio::test]
async fn enum_without_match_halts_before_next_key() {
    let rows = vec![
        row(&[("NUMBER", "2"), ("ROW_ID", "1")]),
        row(&[("NUMBER", "1"), ("ROW_ID", "1"), ("TERROR", "not_support")]),
    ];
    let mut reader = StreamingReader::new(Arc::new(MemoryTable::new(rows)));
    let (items, state) = reader.start_read(5).unwrap().collect().await;

    assert_eq!(items.len(), 1, "second key must never be processed");
    assert_eq!(items[0].logical_key, 1);
    assert!(items[0].record().is_none());
    assert_eq!(
        items[0].error(),
        Some(&ReaderError::NoMatchingValue("TERROR".to_string()))
    );
    assert_eq!(state, ReaderState::Failed);
    assert_eq!(reader.state(), ReaderState::Failed);
}

#[tokio::test]
async fn records_before_failure_are_delivered() {
    let rows = vec![
        row(&[("NUMBER", "1"), ("ROW_ID", "1")]),
        row(&[("NUMBER", "2"), ("ROW_ID", "1"), ("GR", "2020-08-21")]),
        row(&[("NUMBER", "3"), ("ROW_ID", "1")]),
    ];
    let mut reader = StreamingReader::new(Arc::new(MemoryTable::new(rows)));
    let (items, state) = reader.start_read(1).unwrap().collect().await;

    assert_eq!(items.len(), 2);
    assert!(items[0].record().is_some());
    assert_eq!(items[0].logical_key, 1);
    assert_eq!(items[1].logical_key, 2);
    assert_eq!(
        items[1].error(),
        Some(&ReaderError::DateFormatError {
            field: "GR".to_string(),
            raw: "2020-08-21".to_string()
        })
    );
    assert_eq!(state, ReaderState::Failed);
}

#[tokio::test]
async fn each_enum_field_reports_its_own_name() {
    for field in ["TERROR", "TU", "KD"] {
        let rows = vec![row(&[("NUMBER", "1"), ("ROW_ID", "1"), (field, "not_support")])];
        let mut reader = StreamingReader::new(Arc::new(MemoryTable::new(rows)));
        let (items, _) = reader.start_read(5).unwrap().collect().await;
        assert_eq!(
            items[0].error().map(|e| e.to_string()),
            Some(format!("can not find a suitable value for '{field}'"))
        );
    }
}

#[tokio::test]
async fn missing_column_in_later_field_halts() {
    let mut bad = row(&[("NUMBER", "1"), ("ROW_ID", "1")]);
    bad.remove("FOUNDER");
    let mut reader = StreamingReader::new(Arc::new(MemoryTable::new(vec![bad])));
    let (items, state) = reader.start_read(5).unwrap().collect().await;

    assert_eq!(
        items[0].error(),
        Some(&ReaderError::FieldNotFound {
            row: 0,
            field: "FOUNDER".to_string()
        })
    );
    assert_eq!(state, ReaderState::Failed);
}

#[tokio::test]
async fn bad_number_fails_synchronously() {
    let rows = vec![
        row(&[("NUMBER", "1"), ("ROW_ID", "1")]),
        row(&[("NUMBER", "two"), ("ROW_ID", "1")]),
    ];
    let mut reader = StreamingReader::new(Arc::new(MemoryTable::new(rows)));
    match reader.start_read(5) {
        Err(ReaderError::KeyParseError { row, field, raw }) => {
            assert_eq!(row, 1);
            assert_eq!(field, "NUMBER");
            assert_eq!(raw, "two");
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("expected index failure"),
    }
    assert!(reader.index().is_none());
}

#[tokio::test]
async fn negative_row_id_fails_synchronously() {
    let rows = vec![row(&[("NUMBER", "1"), ("ROW_ID", "-1")])];
    let mut reader = StreamingReader::new(Arc::new(MemoryTable::new(rows)));
    let err = reader.start_read(5).err().expect("index failure");
    assert!(err.to_string().contains("ROW_ID"));
}

#[tokio::test]
async fn missing_key_column_fails_synchronously() {
    let mut r = row(&[("NUMBER", "1")]);
    r.remove("ROW_ID");
    let mut reader = StreamingReader::new(Arc::new(MemoryTable::new(vec![r])));
    let err = reader.start_read(5).err().expect("index failure");
    assert_eq!(
        err,
        ReaderError::FieldNotFound {
            row: 0,
            field: "ROW_ID".to_string()
        }
    );
}

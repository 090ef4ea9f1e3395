//! Group index: physical row positions grouped by logical key.
//!
//! One scan over the source builds the index. Keys come out ascending and
//! unique; members of each group are ordered by fragment key with a stable
//! sort, so rows sharing a fragment key keep their scan order.

use std::collections::HashMap;

use tracing::debug;

use crate::error::ReaderError;
use crate::schema::{FRAGMENT_KEY_FIELD, LOGICAL_KEY_FIELD};
use crate::source::TabularSource;

/// Reference to one physical row and its parsed fragment key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalRow {
    pub position: usize,
    pub fragment_key: u64,
}

/// All physical rows sharing one logical key, in fragment order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalGroup {
    pub logical_key: u64,
    pub members: Vec<PhysicalRow>,
}

impl LogicalGroup {
    pub fn first(&self) -> Option<&PhysicalRow> {
        self.members.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupIndex {
    groups: HashMap<u64, LogicalGroup>,
    ordered_keys: Vec<u64>,
}

impl GroupIndex {
    /// Scan `source` once and build a fresh index.
    pub fn build(source: &dyn TabularSource) -> Result<Self, ReaderError> {
        let mut groups: HashMap<u64, LogicalGroup> = HashMap::new();
        let mut ordered_keys: Vec<u64> = Vec::new();

        for position in 0..source.record_count() {
            let logical_key = read_key(source, position, LOGICAL_KEY_FIELD)?;
            let fragment_key = read_key(source, position, FRAGMENT_KEY_FIELD)?;

            let group = groups.entry(logical_key).or_insert_with(|| {
                ordered_keys.push(logical_key);
                LogicalGroup {
                    logical_key,
                    members: Vec::new(),
                }
            });
            group.members.push(PhysicalRow {
                position,
                fragment_key,
            });
        }

        ordered_keys.sort_unstable();
        for group in groups.values_mut() {
            // sort_by_key is stable: equal fragment keys keep scan order.
            group.members.sort_by_key(|m| m.fragment_key);
        }

        debug!(
            rows = source.record_count(),
            groups = ordered_keys.len(),
            "group index built"
        );

        Ok(Self {
            groups,
            ordered_keys,
        })
    }

    /// Build in place unless the index already holds at least one group.
    ///
    /// On error `self` is left untouched.
    pub fn ensure_built(&mut self, source: &dyn TabularSource) -> Result<(), ReaderError> {
        if !self.groups.is_empty() {
            return Ok(());
        }
        *self = Self::build(source)?;
        Ok(())
    }

    pub fn ordered_keys(&self) -> &[u64] {
        &self.ordered_keys
    }

    pub fn group(&self, logical_key: u64) -> Option<&LogicalGroup> {
        self.groups.get(&logical_key)
    }

    /// Groups in ascending key order. Keys without a group are skipped.
    pub fn iter(&self) -> impl Iterator<Item = &LogicalGroup> + '_ {
        self.ordered_keys.iter().filter_map(|k| self.groups.get(k))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Assemble an index without validation. Only used to exercise the
    /// integrity checks in the merger and reader.
    #[cfg(test)]
    pub(crate) fn from_parts(groups: Vec<LogicalGroup>, ordered_keys: Vec<u64>) -> Self {
        Self {
            groups: groups.into_iter().map(|g| (g.logical_key, g)).collect(),
            ordered_keys,
        }
    }
}

fn read_key(
    source: &dyn TabularSource,
    row: usize,
    field: &'static str,
) -> Result<u64, ReaderError> {
    let raw = source.field_value(row, field)?;
    parse_key(&raw).ok_or(ReaderError::KeyParseError { row, field, raw })
}

/// Strict base-10 parse: ASCII digits only, no sign, no whitespace.
fn parse_key(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryTable;

    fn keyed(rows: &[(&str, &str)]) -> MemoryTable {
        let rows: Vec<Vec<(&str, &str)>> = rows
            .iter()
            .map(|(n, r)| vec![("NUMBER", *n), ("ROW_ID", *r)])
            .collect();
        let refs: Vec<&[(&str, &str)]> = rows.iter().map(|r| r.as_slice()).collect();
        MemoryTable::from_pairs(&refs)
    }

    fn row(position: usize, fragment_key: u64) -> PhysicalRow {
        PhysicalRow {
            position,
            fragment_key,
        }
    }

    #[test]
    fn groups_and_orders_by_fragment_key() {
        let src = keyed(&[
            ("1", "2"),
            ("2", "5"),
            ("2", "7"),
            ("2", "6"),
            ("1", "1"),
            ("1", "4"),
            ("1", "3"),
        ]);
        let idx = GroupIndex::build(&src).unwrap();

        assert_eq!(idx.ordered_keys(), &[1, 2]);
        assert_eq!(
            idx.group(1).unwrap().members,
            vec![row(4, 1), row(0, 2), row(6, 3), row(5, 4)]
        );
        assert_eq!(
            idx.group(2).unwrap().members,
            vec![row(1, 5), row(3, 6), row(2, 7)]
        );
    }

    #[test]
    fn ties_keep_scan_order() {
        let src = keyed(&[("9", "1"), ("9", "0"), ("9", "1"), ("9", "1")]);
        let idx = GroupIndex::build(&src).unwrap();
        assert_eq!(
            idx.group(9).unwrap().members,
            vec![row(1, 0), row(0, 1), row(2, 1), row(3, 1)]
        );
    }

    #[test]
    fn keys_sorted_numerically_not_lexically() {
        let src = keyed(&[("10", "1"), ("9", "1"), ("100", "1"), ("9", "2")]);
        let idx = GroupIndex::build(&src).unwrap();
        assert_eq!(idx.ordered_keys(), &[9, 10, 100]);
        let keys: Vec<u64> = idx.iter().map(|g| g.logical_key).collect();
        assert_eq!(keys, vec![9, 10, 100]);
    }

    #[test]
    fn every_position_indexed_exactly_once() {
        let src = keyed(&[("3", "1"), ("1", "1"), ("3", "2"), ("2", "1"), ("1", "0")]);
        let idx = GroupIndex::build(&src).unwrap();
        let mut positions: Vec<usize> = idx
            .iter()
            .flat_map(|g| g.members.iter().map(|m| m.position))
            .collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn missing_key_field_fails() {
        let src = MemoryTable::from_pairs(&[&[("NUMBER", "1")]]);
        let err = GroupIndex::build(&src).unwrap_err();
        assert_eq!(
            err,
            ReaderError::FieldNotFound {
                row: 0,
                field: "ROW_ID".to_string()
            }
        );
    }

    #[test]
    fn negative_fragment_key_fails_to_parse() {
        let src = keyed(&[("1", "-1")]);
        let err = GroupIndex::build(&src).unwrap_err();
        assert_eq!(
            err,
            ReaderError::KeyParseError {
                row: 0,
                field: "ROW_ID",
                raw: "-1".to_string()
            }
        );
    }

    #[test]
    fn non_numeric_logical_key_fails_to_parse() {
        let src = keyed(&[("1", "1"), ("abc", "1")]);
        let err = GroupIndex::build(&src).unwrap_err();
        assert!(matches!(
            err,
            ReaderError::KeyParseError {
                row: 1,
                field: "NUMBER",
                ..
            }
        ));
    }

    #[test]
    fn parse_key_rejects_sign_and_whitespace() {
        assert_eq!(parse_key("42"), Some(42));
        assert_eq!(parse_key("+42"), None);
        assert_eq!(parse_key(" 42"), None);
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("18446744073709551616"), None);
    }

    #[test]
    fn ensure_built_is_noop_when_populated() {
        let src = keyed(&[("1", "1"), ("2", "1")]);
        let mut idx = GroupIndex::build(&src).unwrap();
        let before = idx.clone();

        let other = keyed(&[("7", "1")]);
        idx.ensure_built(&other).unwrap();
        assert_eq!(idx, before);
    }

    #[test]
    fn ensure_built_leaves_index_untouched_on_error() {
        let mut idx = GroupIndex::default();
        let bad = keyed(&[("1", "x")]);
        assert!(idx.ensure_built(&bad).is_err());
        assert!(idx.is_empty());
        assert!(idx.ordered_keys().is_empty());
    }

    #[test]
    fn empty_source_builds_empty_index() {
        let idx = GroupIndex::build(&MemoryTable::default()).unwrap();
        assert!(idx.is_empty());
        assert_eq!(idx.len(), 0);
    }
}

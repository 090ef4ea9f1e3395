//! Per-field reconciliation over one logical group.
//!
//! Members are always visited in their stored (fragment) order. Lookup
//! failures propagate immediately; no later member is tried.

use chrono::NaiveDate;
use tracing::trace;

use crate::error::ReaderError;
use crate::index::{LogicalGroup, PhysicalRow};
use crate::schema::FieldKind;
use crate::source::TabularSource;

/// Fixed storage width of the source's free-text columns.
pub const TEXT_STORAGE_WIDTH: usize = 254;

/// A fragment of exactly this many characters is assumed to have been cut
/// mid-word by the source writer; the next fragment is joined with a space.
pub const WRAP_REPAIR_LEN: usize = TEXT_STORAGE_WIDTH - 1;

/// `chrono` pattern for date cells (`20200821`).
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Reconciled value of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Date(Option<NaiveDate>),
}

/// Compute the single logical value of `field_name` for `group`.
pub fn reconcile(
    kind: FieldKind,
    field_name: &str,
    group: &LogicalGroup,
    source: &dyn TabularSource,
) -> Result<FieldValue, ReaderError> {
    trace!(
        field = field_name,
        kind = kind.as_str(),
        key = group.logical_key,
        "reconcile"
    );
    match kind {
        FieldKind::Static => reconcile_static(field_name, group, source).map(FieldValue::Text),
        FieldKind::Enum(domain) => {
            reconcile_enum(field_name, domain, group, source).map(FieldValue::Text)
        }
        FieldKind::Text => reconcile_text(field_name, group, source).map(FieldValue::Text),
        FieldKind::Date => reconcile_date(field_name, group, source).map(FieldValue::Date),
    }
}

fn first_member(group: &LogicalGroup) -> Result<&PhysicalRow, ReaderError> {
    group.first().ok_or(ReaderError::EmptyGroup)
}

fn fetch(
    source: &dyn TabularSource,
    member: &PhysicalRow,
    field_name: &str,
) -> Result<String, ReaderError> {
    Ok(source.field_value(member.position, field_name)?)
}

/// Value of the first member only.
pub fn reconcile_static(
    field_name: &str,
    group: &LogicalGroup,
    source: &dyn TabularSource,
) -> Result<String, ReaderError> {
    fetch(source, first_member(group)?, field_name)
}

/// First member value that belongs to `domain`.
pub fn reconcile_enum(
    field_name: &str,
    domain: &[&str],
    group: &LogicalGroup,
    source: &dyn TabularSource,
) -> Result<String, ReaderError> {
    for member in &group.members {
        let val = fetch(source, member, field_name)?;
        if domain.contains(&val.as_str()) {
            return Ok(val);
        }
    }

    Err(ReaderError::NoMatchingValue(field_name.to_string()))
}

/// Ordered concatenation of member values with duplicate-fragment
/// suppression and wrap repair.
pub fn reconcile_text(
    field_name: &str,
    group: &LogicalGroup,
    source: &dyn TabularSource,
) -> Result<String, ReaderError> {
    let mut text = String::new();
    let mut last_appended_len: usize = 0;

    for member in &group.members {
        let val = fetch(source, member, field_name)?;
        if val.is_empty() || text.contains(val.as_str()) {
            continue;
        }

        if last_appended_len == WRAP_REPAIR_LEN {
            text.push(' ');
        }
        text.push_str(&val);

        // Raw fragment length, not the accumulated total.
        last_appended_len = val.chars().count();
    }

    Ok(text)
}

/// Optional date from the first member. Empty cell means no date.
pub fn reconcile_date(
    field_name: &str,
    group: &LogicalGroup,
    source: &dyn TabularSource,
) -> Result<Option<NaiveDate>, ReaderError> {
    let val = fetch(source, first_member(group)?, field_name)?;
    if val.is_empty() {
        return Ok(None);
    }
    parse_date(&val)
        .map(Some)
        .ok_or_else(|| ReaderError::DateFormatError {
            field: field_name.to_string(),
            raw: val,
        })
}

/// Parse an 8-digit zero-padded `YYYYMMDD` date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

//! Compiled-in logical-record schema.
//!
//! Every field of [`crate::LogicalRecord`] appears here exactly once, in
//! record order, tagged with the reconciliation kind the merger applies to it
//! and the typed setter that stores the reconciled value.

use std::fmt;

use chrono::NaiveDate;

use crate::error::ReaderError;
use crate::merge::LogicalRecord;
use crate::reconcile::FieldValue;

/// Source column carrying the logical-record identifier.
pub const LOGICAL_KEY_FIELD: &str = "NUMBER";
/// Source column carrying the fragment-ordering identifier.
pub const FRAGMENT_KEY_FIELD: &str = "ROW_ID";

pub const TERROR_DOMAIN: &[&str] = &["0", "1"];
pub const TU_DOMAIN: &[&str] = &["1", "2", "3"];
pub const KD_DOMAIN: &[&str] = &["0", "01", "02", "03", "04"];

/// How a field's single logical value is derived from a group of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Value of the first member only.
    Static,
    /// First member value inside the closed domain.
    Enum(&'static [&'static str]),
    /// Ordered, deduplicated concatenation across members.
    Text,
    /// Optional `YYYYMMDD` date from the first member only.
    Date,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Static => "static",
            FieldKind::Enum(_) => "enum",
            FieldKind::Text => "text",
            FieldKind::Date => "date",
        }
    }
}

/// Where a reconciled value lands in [`LogicalRecord`].
#[derive(Clone, Copy)]
pub enum FieldSlot {
    Text(fn(&mut LogicalRecord, String)),
    Date(fn(&mut LogicalRecord, Option<NaiveDate>)),
}

impl fmt::Debug for FieldSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSlot::Text(_) => f.write_str("FieldSlot::Text"),
            FieldSlot::Date(_) => f.write_str("FieldSlot::Date"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub slot: FieldSlot,
}

impl FieldSpec {
    /// Write `value` into its slot on `record`.
    ///
    /// A value whose type does not match the slot is an error, never a
    /// silent drop.
    pub fn store(
        &self,
        record: &mut LogicalRecord,
        value: FieldValue,
    ) -> Result<(), ReaderError> {
        match (self.slot, value) {
            (FieldSlot::Text(set), FieldValue::Text(v)) => set(record, v),
            (FieldSlot::Date(set), FieldValue::Date(v)) => set(record, v),
            _ => return Err(ReaderError::SlotMismatch(self.name.to_string())),
        }
        Ok(())
    }
}

const fn text(
    name: &'static str,
    kind: FieldKind,
    set: fn(&mut LogicalRecord, String),
) -> FieldSpec {
    assert!(
        !matches!(kind, FieldKind::Date),
        "date fields must use a date slot"
    );
    FieldSpec {
        name,
        kind,
        slot: FieldSlot::Text(set),
    }
}

const fn date(name: &'static str, set: fn(&mut LogicalRecord, Option<NaiveDate>)) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Date,
        slot: FieldSlot::Date(set),
    }
}

/// Record schema in merge order.
pub const SCHEMA: &[FieldSpec] = &[
    text("NUMBER", FieldKind::Static, |r, v| r.number = v),
    text("TERROR", FieldKind::Enum(TERROR_DOMAIN), |r, v| r.terror = v),
    text("TU", FieldKind::Enum(TU_DOMAIN), |r, v| r.tu = v),
    text("NAMEU", FieldKind::Text, |r, v| r.nameu = v),
    text("DESCRIPT", FieldKind::Text, |r, v| r.descript = v),
    text("KODCR", FieldKind::Static, |r, v| r.kodcr = v),
    text("KODCN", FieldKind::Static, |r, v| r.kodcn = v),
    text("AMR", FieldKind::Text, |r, v| r.amr = v),
    text("ADRESS", FieldKind::Text, |r, v| r.address = v),
    text("KD", FieldKind::Enum(KD_DOMAIN), |r, v| r.kd = v),
    text("SD", FieldKind::Static, |r, v| r.sd = v),
    text("RG", FieldKind::Static, |r, v| r.rg = v),
    text("ND", FieldKind::Static, |r, v| r.nd = v),
    text("VD", FieldKind::Static, |r, v| r.vd = v),
    date("GR", |r, v| r.gr = v),
    text("YR", FieldKind::Static, |r, v| r.yr = v),
    text("MR", FieldKind::Text, |r, v| r.mr = v),
    date("CB_DATE", |r, v| r.cb_date = v),
    date("CE_DATE", |r, v| r.ce_date = v),
    text("DIRECTOR", FieldKind::Text, |r, v| r.director = v),
    text("FOUNDER", FieldKind::Text, |r, v| r.founder = v),
    text("ROW_ID", FieldKind::Static, |r, v| r.row_id = v),
    text("TERRTYPE", FieldKind::Text, |r, v| r.terrtype = v),
];

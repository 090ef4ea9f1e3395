//! Record merger: one logical group in, one reconciled record out.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ReaderError;
use crate::index::LogicalGroup;
use crate::reconcile::reconcile;
use crate::schema::{FieldSpec, SCHEMA};
use crate::source::TabularSource;

// ---------------------------------------------------------------------------
// LogicalRecord
// ---------------------------------------------------------------------------

/// Reconciled record for one logical key.
///
/// Serializes with the source column names. Dates serialize as `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalRecord {
    #[serde(rename = "NUMBER")]
    pub number: String,
    #[serde(rename = "TERROR")]
    pub terror: String,
    #[serde(rename = "TU")]
    pub tu: String,
    #[serde(rename = "NAMEU")]
    pub nameu: String,
    #[serde(rename = "DESCRIPT")]
    pub descript: String,
    #[serde(rename = "KODCR")]
    pub kodcr: String,
    #[serde(rename = "KODCN")]
    pub kodcn: String,
    #[serde(rename = "AMR")]
    pub amr: String,
    /// Source column is spelled `ADRESS`.
    #[serde(rename = "ADRESS")]
    pub address: String,
    #[serde(rename = "KD")]
    pub kd: String,
    #[serde(rename = "SD")]
    pub sd: String,
    #[serde(rename = "RG")]
    pub rg: String,
    #[serde(rename = "ND")]
    pub nd: String,
    #[serde(rename = "VD")]
    pub vd: String,
    #[serde(rename = "GR")]
    pub gr: Option<NaiveDate>,
    #[serde(rename = "YR")]
    pub yr: String,
    #[serde(rename = "MR")]
    pub mr: String,
    #[serde(rename = "CB_DATE")]
    pub cb_date: Option<NaiveDate>,
    #[serde(rename = "CE_DATE")]
    pub ce_date: Option<NaiveDate>,
    #[serde(rename = "DIRECTOR")]
    pub director: String,
    #[serde(rename = "FOUNDER")]
    pub founder: String,
    #[serde(rename = "ROW_ID")]
    pub row_id: String,
    #[serde(rename = "TERRTYPE")]
    pub terrtype: String,
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Reconcile every schema field of `group` into one record.
///
/// Fields are processed in schema order and the first failure wins; no
/// partial record is returned.
pub fn merge(
    group: &LogicalGroup,
    source: &dyn TabularSource,
) -> Result<LogicalRecord, ReaderError> {
    if group.members.is_empty() {
        return Err(ReaderError::EmptyGroup);
    }

    merge_fields(SCHEMA, group, source)
}

fn merge_fields(
    schema: &[FieldSpec],
    group: &LogicalGroup,
    source: &dyn TabularSource,
) -> Result<LogicalRecord, ReaderError> {
    let mut record = LogicalRecord::default();
    for spec in schema {
        let value = reconcile(spec.kind, spec.name, group, source)?;
        spec.store(&mut record, value)?;
    }
    Ok(record)
}

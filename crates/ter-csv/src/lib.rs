//! ter-csv
//!
//! CSV-backed [`TabularSource`]. The whole file is decoded up front; field
//! lookups afterwards are pure reads.
//!
//! ## Column contract
//!
//! - The first record is the header. Names are matched exactly
//!   (`NUMBER`, `ROW_ID`, `NAMEU`, ...).
//! - Every data row must have as many cells as the header.
//! - A field is "not found" only when its header is absent; an empty cell is
//!   an empty value.
//! - Input must be UTF-8. Legacy code pages are converted before this layer.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use ter_reader::{FieldNotFound, TabularSource};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Trim surrounding whitespace from headers and cells.
    pub trim: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            trim: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CsvTableError {
    /// Open/read failure or malformed CSV.
    Io(String),
    /// The header names the same column twice.
    DuplicateHeader(String),
    /// A data row has a different cell count than the header.
    RaggedRow {
        line: u64,
        expected: usize,
        got: usize,
    },
}

impl fmt::Display for CsvTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvTableError::Io(msg) => write!(f, "csv io error: {msg}"),
            CsvTableError::DuplicateHeader(col) => {
                write!(f, "csv header names column '{col}' more than once")
            }
            CsvTableError::RaggedRow {
                line,
                expected,
                got,
            } => write!(
                f,
                "csv line {line}: expected {expected} cells, found {got}"
            ),
        }
    }
}

impl std::error::Error for CsvTableError {}

impl From<csv::Error> for CsvTableError {
    fn from(e: csv::Error) -> Self {
        if let csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } = e.kind()
        {
            return CsvTableError::RaggedRow {
                line: pos.as_ref().map(|p| p.line()).unwrap_or(0),
                expected: *expected_len as usize,
                got: *len as usize,
            };
        }
        CsvTableError::Io(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct CsvTable {
    columns: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn from_path(path: &Path, opts: &CsvOptions) -> Result<Self, CsvTableError> {
        let file = File::open(path)
            .map_err(|e| CsvTableError::Io(format!("open '{}': {e}", path.display())))?;
        let table = Self::from_reader(file, opts)?;
        debug!(
            path = %path.display(),
            rows = table.rows.len(),
            columns = table.columns.len(),
            "csv table loaded"
        );
        Ok(table)
    }

    /// Parse CSV text held in memory.
    pub fn from_text(src: &str, opts: &CsvOptions) -> Result<Self, CsvTableError> {
        Self::from_reader(src.as_bytes(), opts)
    }

    pub fn from_reader<R: Read>(reader: R, opts: &CsvOptions) -> Result<Self, CsvTableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(opts.delimiter)
            .has_headers(true)
            .flexible(false)
            .trim(if opts.trim {
                csv::Trim::All
            } else {
                csv::Trim::None
            })
            .from_reader(reader);

        let mut columns: HashMap<String, usize> = HashMap::new();
        for (i, name) in rdr.headers()?.iter().enumerate() {
            let name = name.trim_start_matches('\u{feff}').to_string();
            if columns.insert(name.clone(), i).is_some() {
                return Err(CsvTableError::DuplicateHeader(name));
            }
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { columns, rows })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }
}

impl TabularSource for CsvTable {
    fn record_count(&self) -> usize {
        self.rows.len()
    }

    fn field_value(&self, row: usize, field: &str) -> Result<String, FieldNotFound> {
        let col = self
            .columns
            .get(field)
            .ok_or_else(|| FieldNotFound::new(row, field))?;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(*col))
            .cloned()
            .ok_or_else(|| FieldNotFound::new(row, field))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

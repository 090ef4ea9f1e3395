//! ter-reader
//!
//! Reconciles a table whose logical records are split across several
//! physical rows into one record per logical key, and streams the results.
//!
//! - rows sharing `NUMBER` form one logical group, ordered by `ROW_ID`
//! - each schema field is reconciled by its kind (static, enum, text, date)
//! - records are emitted in ascending key order; the first bad record ends
//!   the stream
//!
//! No file decoding here. Callers supply a [`TabularSource`].

pub mod error;
pub mod index;
pub mod merge;
pub mod reconcile;
pub mod schema;
pub mod source;
pub mod stream;

pub use error::ReaderError;
pub use index::{GroupIndex, LogicalGroup, PhysicalRow};
pub use merge::{merge, LogicalRecord};
pub use reconcile::{reconcile, FieldValue, TEXT_STORAGE_WIDTH, WRAP_REPAIR_LEN};
pub use schema::{FieldKind, FieldSlot, FieldSpec, FRAGMENT_KEY_FIELD, LOGICAL_KEY_FIELD, SCHEMA};
pub use source::{FieldNotFound, MemoryTable, TabularSource};
pub use stream::{ReadResult, ReadStream, ReaderState, StreamingReader};

pub use tokio_util::sync::CancellationToken;

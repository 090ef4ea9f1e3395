//! Streaming reader: index once, then emit one result per logical key.
//!
//! A producer task walks the index in ascending key order and sends each
//! reconciled record through a bounded channel. The first per-record error is
//! sent as the final item and the stream closes. Cancellation is polled once
//! per key and also interrupts a producer blocked on a full channel.
//!
//! State machine:
//!
//! ```text
//! Idle -> Indexed -> Streaming -> Completed | Cancelled | Failed
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ReaderError;
use crate::index::GroupIndex;
use crate::merge::{merge, LogicalRecord};
use crate::source::TabularSource;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Indexed,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl ReaderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderState::Idle => "idle",
            ReaderState::Indexed => "indexed",
            ReaderState::Streaming => "streaming",
            ReaderState::Completed => "completed",
            ReaderState::Cancelled => "cancelled",
            ReaderState::Failed => "failed",
        }
    }
}

/// One item of the stream: a record, or the error that ended the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    pub logical_key: u64,
    outcome: Result<LogicalRecord, ReaderError>,
}

impl ReadResult {
    fn ok(logical_key: u64, record: LogicalRecord) -> Self {
        Self {
            logical_key,
            outcome: Ok(record),
        }
    }

    fn failed(logical_key: u64, error: ReaderError) -> Self {
        Self {
            logical_key,
            outcome: Err(error),
        }
    }

    pub fn record(&self) -> Option<&LogicalRecord> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ReaderError> {
        self.outcome.as_ref().err()
    }

    pub fn is_err(&self) -> bool {
        self.outcome.is_err()
    }

    /// Collapse into a `Result`, keeping the key on both sides.
    pub fn into_result(self) -> Result<(u64, LogicalRecord), (u64, ReaderError)> {
        let key = self.logical_key;
        self.outcome.map(|r| (key, r)).map_err(|e| (key, e))
    }
}

type SharedState = Arc<Mutex<ReaderState>>;

fn set_state(state: &SharedState, next: ReaderState) {
    if let Ok(mut guard) = state.lock() {
        *guard = next;
    }
}

// ---------------------------------------------------------------------------
// StreamingReader
// ---------------------------------------------------------------------------

/// Reconciling reader over a fragmented [`TabularSource`].
///
/// The group index is built on the first read and reused afterwards. One
/// reader serves one active stream at a time.
pub struct StreamingReader {
    source: Arc<dyn TabularSource>,
    index: Option<Arc<GroupIndex>>,
    cancel: CancellationToken,
    state: SharedState,
}

impl StreamingReader {
    pub fn new(source: Arc<dyn TabularSource>) -> Self {
        Self {
            source,
            index: None,
            cancel: CancellationToken::new(),
            state: Arc::new(Mutex::new(ReaderState::Idle)),
        }
    }

    /// Attach a cancellation token. Must be called before [`Self::start_read`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Clone of the token the producer polls.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> ReaderState {
        self.state
            .lock()
            .map(|guard| *guard)
            .unwrap_or(ReaderState::Failed)
    }

    /// The memoized index, if built.
    pub fn index(&self) -> Option<&GroupIndex> {
        self.index.as_deref()
    }

    /// Build the index unless a non-empty one already exists.
    pub fn ensure_index(&mut self) -> Result<Arc<GroupIndex>, ReaderError> {
        let index = match self.index.take() {
            Some(idx) if !idx.is_empty() => idx,
            _ => Arc::new(GroupIndex::build(self.source.as_ref())?),
        };
        self.index = Some(Arc::clone(&index));
        set_state(&self.state, ReaderState::Indexed);
        Ok(index)
    }

    /// Build the index (if needed) and spawn the producer.
    ///
    /// Index errors are returned here, before any item is produced. A
    /// `buffer_capacity` of 0 is treated as 1. Must be called from within a
    /// Tokio runtime.
    pub fn start_read(&mut self, buffer_capacity: usize) -> Result<ReadStream, ReaderError> {
        let index = self.ensure_index()?;

        let (tx, rx) = mpsc::channel(buffer_capacity.max(1));
        set_state(&self.state, ReaderState::Streaming);

        let handle = tokio::spawn(produce(
            Arc::clone(&self.source),
            index,
            tx,
            self.cancel.clone(),
            Arc::clone(&self.state),
        ));

        Ok(ReadStream { rx, handle })
    }

    #[cfg(test)]
    pub(crate) fn with_index(source: Arc<dyn TabularSource>, index: GroupIndex) -> Self {
        let mut reader = Self::new(source);
        reader.index = Some(Arc::new(index));
        reader
    }
}

async fn produce(
    source: Arc<dyn TabularSource>,
    index: Arc<GroupIndex>,
    tx: mpsc::Sender<ReadResult>,
    cancel: CancellationToken,
    state: SharedState,
) -> ReaderState {
    let outcome = walk_keys(source.as_ref(), &index, &tx, &cancel).await;
    set_state(&state, outcome);
    info!(state = outcome.as_str(), "record stream finished");
    outcome
}

async fn walk_keys(
    source: &dyn TabularSource,
    index: &GroupIndex,
    tx: &mpsc::Sender<ReadResult>,
    cancel: &CancellationToken,
) -> ReaderState {
    for &key in index.ordered_keys() {
        if cancel.is_cancelled() {
            debug!(key, "cancellation observed");
            return ReaderState::Cancelled;
        }

        let result = match index.group(key) {
            Some(group) => merge(group, source),
            None => Err(ReaderError::GroupMissing(key)),
        };

        let (item, failed) = match result {
            Ok(record) => (ReadResult::ok(key, record), false),
            Err(e) => {
                if e.is_integrity_violation() {
                    error!(key, error = %e, "group index integrity violated; halting stream");
                } else {
                    warn!(key, error = %e, "logical record failed; halting stream");
                }
                (ReadResult::failed(key, e), true)
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(key, "cancelled while waiting for consumer");
                return ReaderState::Cancelled;
            }
            sent = tx.send(item) => {
                if sent.is_err() {
                    debug!(key, "consumer dropped the stream");
                    return ReaderState::Cancelled;
                }
            }
        }

        if failed {
            return ReaderState::Failed;
        }
    }

    ReaderState::Completed
}

// ---------------------------------------------------------------------------
// ReadStream
// ---------------------------------------------------------------------------

/// Consumer side of a running read.
pub struct ReadStream {
    rx: mpsc::Receiver<ReadResult>,
    handle: JoinHandle<ReaderState>,
}

impl ReadStream {
    /// Next result, or `None` once the producer has closed the stream.
    pub async fn recv(&mut self) -> Option<ReadResult> {
        self.rx.recv().await
    }

    /// Adapt into a `futures` stream. The producer keeps running detached.
    pub fn into_stream(self) -> ReceiverStream<ReadResult> {
        ReceiverStream::new(self.rx)
    }

    /// Wait for the producer and return its terminal state.
    ///
    /// Drops the receiver first: call after draining, otherwise an
    /// unfinished producer ends as [`ReaderState::Cancelled`].
    pub async fn join(self) -> ReaderState {
        drop(self.rx);
        self.handle.await.unwrap_or(ReaderState::Failed)
    }

    /// Drain every result, then join the producer.
    pub async fn collect(mut self) -> (Vec<ReadResult>, ReaderState) {
        let mut out = Vec::new();
        while let Some(item) = self.rx.recv().await {
            out.push(item);
        }
        let state = self.join().await;
        (out, state)
    }
}

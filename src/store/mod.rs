//! Store boundary for the sweep pipeline.
//!
//! Two capabilities, each behind its own trait so the pipeline can be
//! exercised against fakes:
//! - [`TableScanner`]: fetch one page of matching row keys at a time.
//! - [`BatchDeleter`]: submit a bounded set of delete-by-key operations and
//!   report the subset the backend declined to apply.
//!
//! [`DynamoTable`] implements both against DynamoDB. [`MemoryTable`] is an
//! in-memory implementation for testing.

mod dynamo;

use std::sync::{
    Mutex,
    atomic::{AtomicU32, Ordering},
};

use async_trait::async_trait;
pub use dynamo::{DynamoTable, TableConfig};
use thiserror::Error;

/// Unique identifier of a record in the target table.
pub type RowKey = String;

/// Maximum number of delete operations per batch-write call, imposed by the
/// storage backend (DynamoDB BatchWriteItem limit).
pub const MAX_BATCH_SIZE: usize = 25;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no valid AWS credentials: {0}")]
    Credentials(String),

    /// Throughput throttling; the operation can be retried after a delay.
    #[error("throughput exceeded: {0}")]
    Throttled(String),

    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    /// Throttling is transient; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Throttled(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One page of a filtered table scan.
#[derive(Debug)]
pub struct ScanPage<T> {
    /// Row keys on this page that matched the server-side filter.
    pub keys: Vec<RowKey>,
    /// Continuation token for the next page; `None` means the scan is done.
    pub next: Option<T>,
}

/// A store that can be scanned page by page for soft-deleted row keys.
///
/// The server-side filter (soft-delete flag set) and the projection (key
/// attribute only) belong to the implementation.
#[async_trait]
pub trait TableScanner: Send + Sync {
    /// Continuation token carried between pages.
    type Token: Send + Sync;

    /// Fetch one page of matching row keys, starting from `start` (or the
    /// beginning of the table when `None`).
    async fn scan_page(&self, start: Option<Self::Token>) -> StoreResult<ScanPage<Self::Token>>;
}

/// A store that accepts bounded batches of delete-by-key operations.
#[async_trait]
pub trait BatchDeleter: Send + Sync {
    /// Submit up to [`MAX_BATCH_SIZE`] delete operations. Returns the keys
    /// the backend did not apply; those must be resubmitted by the caller.
    async fn delete_batch(&self, keys: &[RowKey]) -> StoreResult<Vec<RowKey>>;
}

/// In-memory table (for testing only).
///
/// Rows carry a soft-delete flag; scans page through all rows and yield the
/// keys of flagged ones, batch deletes remove rows outright.
pub struct MemoryTable {
    rows: Mutex<Vec<MemoryRow>>,
    page_size: usize,
    delete_calls: AtomicU32,
}

struct MemoryRow {
    key: RowKey,
    deleted: bool,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            page_size: 100,
            delete_calls: AtomicU32::new(0),
        }
    }

    /// Set how many rows one scan page covers (before filtering).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        assert!(page_size > 0);
        self.page_size = page_size;
        self
    }

    pub fn insert(&self, key: impl Into<RowKey>, deleted: bool) {
        self.rows.lock().unwrap().push(MemoryRow {
            key: key.into(),
            deleted,
        });
    }

    /// Number of batch-delete calls received so far.
    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TableScanner for MemoryTable {
    type Token = usize;

    async fn scan_page(&self, start: Option<usize>) -> StoreResult<ScanPage<usize>> {
        let rows = self.rows.lock().unwrap();
        let offset = start.unwrap_or(0);
        let end = (offset + self.page_size).min(rows.len());

        let keys = rows[offset..end]
            .iter()
            .filter(|row| row.deleted)
            .map(|row| row.key.clone())
            .collect();
        let next = (end < rows.len()).then_some(end);

        Ok(ScanPage { keys, next })
    }
}

#[async_trait]
impl BatchDeleter for MemoryTable {
    async fn delete_batch(&self, keys: &[RowKey]) -> StoreResult<Vec<RowKey>> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|row| !keys.contains(&row.key));
        Ok(Vec::new())
    }
}

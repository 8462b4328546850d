//! Error taxonomy for the sweep pipeline.
//!
//! Every error halts the run; there is no partial-success degraded mode.
//! The binary maps them to a one-line message and a nonzero exit code.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum FlushError {
    /// No intent flags were given; reported before any backend call.
    #[error("nothing to do: pass --flush, --save, or --inspect")]
    NothingToDo,

    /// No valid AWS credential chain.
    #[error("no valid AWS credentials: {0}")]
    Credentials(String),

    /// The scan failed mid-table; no deletions were attempted.
    #[error("table scan failed: {0}")]
    Scan(StoreError),

    /// Non-throttling submission failure.
    #[error("batch delete failed: {0}")]
    Store(StoreError),

    /// Throttling retries exhausted with items still unprocessed.
    #[error("retry budget exhausted with {remaining} keys still unprocessed")]
    RetryBudgetExhausted { remaining: usize },

    /// The audit sink could not be created or written to.
    #[error("audit write failed: {0}")]
    Audit(#[from] std::io::Error),
}

impl FlushError {
    /// Classify a store error raised during the scan phase.
    pub(crate) fn scan(err: StoreError) -> Self {
        match err {
            StoreError::Credentials(msg) => FlushError::Credentials(msg),
            other => FlushError::Scan(other),
        }
    }

    /// Classify a store error raised during batch submission.
    pub(crate) fn submit(err: StoreError) -> Self {
        match err {
            StoreError::Credentials(msg) => FlushError::Credentials(msg),
            other => FlushError::Store(other),
        }
    }
}

pub type FlushResult<T> = Result<T, FlushError>;

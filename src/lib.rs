//! opsweep — bulk removal of soft-deleted records from a managed key-value
//! table.
//!
//! Records in the platform's resources table are marked `deleted = true`
//! and scheduled for removal, which can leave a large number of entries
//! pending deletion. This crate scans the table for those entries, removes
//! them in bounded batches with backoff on partial failures, and can audit
//! the removed identifiers to a file or report counts without mutating
//! anything.

pub mod audit;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod scan;
pub mod store;
pub mod submit;

pub use audit::AuditSink;
pub use config::{BackoffConfig, FlushOptions};
pub use error::{FlushError, FlushResult};
pub use pipeline::{DeletionPipeline, PipelineResult};
pub use store::{DynamoTable, TableConfig};

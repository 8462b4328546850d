//! The scan-accumulate-batch-delete pipeline.
//!
//! Drives the scan to exhaustion, buffering every matched row key (the
//! table is assumed to fit in memory), then partitions the buffer into
//! bounded batches and hands each to the submitter in accumulation order.
//! Auditing streams each key to the sink as it is scanned, independent of
//! whether deletion is enabled. Inspect mode is read-only: it reports the
//! matched count and an estimated audit file size, touching neither the
//! sink nor the table.

use crate::{
    audit::{self, AuditSink},
    config::{BackoffConfig, FlushOptions},
    error::{FlushError, FlushResult},
    scan::ScanCursor,
    store::{BatchDeleter, MAX_BATCH_SIZE, RowKey, TableScanner},
    submit::BatchSubmitter,
};

/// Counts produced by one pipeline run, immutable once returned.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineResult {
    /// Rows that matched the soft-delete filter.
    pub matched: u64,
    /// Rows actually deleted (0 unless flush was enabled).
    pub deleted: u64,
    /// Row keys written to the audit sink (0 unless save was enabled).
    pub audited: u64,
}

pub struct DeletionPipeline<'a, S: TableScanner, D: BatchDeleter> {
    scanner: &'a S,
    deleter: &'a D,
    sink: AuditSink,
    options: FlushOptions,
    backoff: BackoffConfig,
}

impl<'a, S: TableScanner, D: BatchDeleter> DeletionPipeline<'a, S, D> {
    /// Build a pipeline over the given store handles.
    ///
    /// The intent flags are normalized here, so a caller that sets both
    /// inspect and flush gets a read-only run.
    pub fn new(
        scanner: &'a S,
        deleter: &'a D,
        sink: AuditSink,
        options: FlushOptions,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            scanner,
            deleter,
            sink,
            options: options.normalized(),
            backoff,
        }
    }

    /// Run the pipeline to completion.
    ///
    /// A run that matches zero rows is a success: it deletes nothing and
    /// reports zero deleted. Any error aborts remaining work; batches the
    /// backend already accepted stay deleted (deletions are idempotent, so
    /// a rerun finds fewer or zero matches).
    pub async fn run(mut self) -> FlushResult<PipelineResult> {
        if self.options.is_noop() {
            return Err(FlushError::NothingToDo);
        }

        let mut result = PipelineResult::default();
        let mut keys: Vec<RowKey> = Vec::new();

        let mut cursor = ScanCursor::new(self.scanner);
        while let Some(page) = cursor.next_page().await.map_err(FlushError::scan)? {
            for key in page {
                if self.options.save {
                    self.sink.write_key(&key)?;
                    result.audited += 1;
                }
                keys.push(key);
            }
        }

        result.matched = keys.len() as u64;
        tracing::info!(matched = result.matched, "scan complete, items pending deletion");

        if self.options.inspect && !keys.is_empty() {
            let estimate = audit::estimated_size(&keys);
            tracing::info!(
                estimated_size = %audit::human_byte_size(estimate),
                "estimated audit file size"
            );
        }

        if self.options.flush && !keys.is_empty() {
            let submitter = BatchSubmitter::new(self.deleter, self.backoff.clone());
            let batches = keys.len().div_ceil(MAX_BATCH_SIZE);
            tracing::info!(batches = batches, "beginning batch delete");

            for chunk in keys.chunks(MAX_BATCH_SIZE) {
                result.deleted += submitter.submit(chunk.to_vec()).await?;
            }

            tracing::info!(deleted = result.deleted, "completed batch delete");
        }

        Ok(result)
    }
}

//! Batch submission with exponential backoff for partial failures.
//!
//! The backend may apply only part of a batch (throughput throttling marks
//! the rest unprocessed). The submitter resubmits exactly the unprocessed
//! subset, backing off between attempts, until the batch drains or the
//! retry budget is exhausted. Losing track of a requested deletion is
//! incorrect, so exhaustion is a fatal error, never a silent drop.

use tracing::{debug, warn};

use crate::{
    config::BackoffConfig,
    error::{FlushError, FlushResult},
    store::{BatchDeleter, MAX_BATCH_SIZE, RowKey},
};

pub struct BatchSubmitter<'a, D: BatchDeleter> {
    store: &'a D,
    backoff: BackoffConfig,
}

impl<'a, D: BatchDeleter> BatchSubmitter<'a, D> {
    pub fn new(store: &'a D, backoff: BackoffConfig) -> Self {
        Self { store, backoff }
    }

    /// Submit one batch of up to [`MAX_BATCH_SIZE`] delete operations,
    /// guaranteeing eventual full application or a fatal failure.
    ///
    /// Returns the number of keys applied (the full batch on success).
    /// Retries resolve completely before this method returns, so callers
    /// can submit batches sequentially without interleaving retries.
    pub async fn submit(&self, batch: Vec<RowKey>) -> FlushResult<u64> {
        debug_assert!(batch.len() <= MAX_BATCH_SIZE);

        let total = batch.len() as u64;
        let mut pending = batch;
        let max_attempts = self.backoff.max_retries + 1;

        for attempt in 0..max_attempts {
            match self.store.delete_batch(&pending).await {
                Ok(unprocessed) if unprocessed.is_empty() => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "batch drained after resubmission");
                    }
                    return Ok(total);
                }
                Ok(unprocessed) => {
                    pending = unprocessed;
                    if attempt + 1 == max_attempts {
                        break;
                    }
                    let delay = self.backoff.delay_for_attempt(attempt);
                    warn!(
                        unprocessed = pending.len(),
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "backend left items unprocessed, resubmitting after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_retryable() => {
                    if attempt + 1 == max_attempts {
                        break;
                    }
                    let delay = self.backoff.delay_for_attempt(attempt);
                    warn!(
                        error = %err,
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "throttled, resubmitting after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(FlushError::submit(err)),
            }
        }

        Err(FlushError::RetryBudgetExhausted {
            remaining: pending.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::store::{StoreError, StoreResult};

    fn fast_backoff(max_retries: u32) -> BackoffConfig {
        BackoffConfig {
            max_retries,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            jitter: 0.0,
        }
    }

    /// Leaves the last two keys unprocessed on the first call, drains on
    /// the second, recording each call's payload.
    struct PartialFirstCall {
        calls: Mutex<Vec<Vec<RowKey>>>,
    }

    #[async_trait]
    impl BatchDeleter for PartialFirstCall {
        async fn delete_batch(&self, keys: &[RowKey]) -> StoreResult<Vec<RowKey>> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(keys.to_vec());
            if calls.len() == 1 {
                Ok(keys[keys.len() - 2..].to_vec())
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[tokio::test]
    async fn unprocessed_subset_is_resubmitted_until_drained() {
        let store = PartialFirstCall {
            calls: Mutex::new(Vec::new()),
        };
        let submitter = BatchSubmitter::new(&store, fast_backoff(3));

        let batch: Vec<RowKey> = (0..5).map(|i| format!("key-{i}")).collect();
        let applied = submitter.submit(batch.clone()).await.unwrap();
        assert_eq!(applied, 5);

        let calls = store.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], batch);
        // The second submission carries exactly the unprocessed subset,
        // never the full batch again.
        assert_eq!(calls[1], batch[3..].to_vec());
    }

    struct NeverProcesses {
        calls: AtomicU32,
    }

    #[async_trait]
    impl BatchDeleter for NeverProcesses {
        async fn delete_batch(&self, keys: &[RowKey]) -> StoreResult<Vec<RowKey>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(keys.to_vec())
        }
    }

    #[tokio::test]
    async fn exhausted_budget_fails_instead_of_looping() {
        let store = NeverProcesses {
            calls: AtomicU32::new(0),
        };
        let submitter = BatchSubmitter::new(&store, fast_backoff(2));

        let batch: Vec<RowKey> = (0..3).map(|i| format!("key-{i}")).collect();
        let err = submitter.submit(batch).await.unwrap_err();

        assert!(matches!(
            err,
            FlushError::RetryBudgetExhausted { remaining: 3 }
        ));
        // max_retries=2 means 3 total attempts.
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    struct AlwaysThrottled {
        calls: AtomicU32,
    }

    #[async_trait]
    impl BatchDeleter for AlwaysThrottled {
        async fn delete_batch(&self, _keys: &[RowKey]) -> StoreResult<Vec<RowKey>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Throttled("throughput exceeded".into()))
        }
    }

    #[tokio::test]
    async fn throttling_errors_are_retried_under_the_same_budget() {
        let store = AlwaysThrottled {
            calls: AtomicU32::new(0),
        };
        let submitter = BatchSubmitter::new(&store, fast_backoff(2));

        let err = submitter.submit(vec!["a".to_string()]).await.unwrap_err();

        assert!(matches!(
            err,
            FlushError::RetryBudgetExhausted { remaining: 1 }
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    struct Rejects;

    #[async_trait]
    impl BatchDeleter for Rejects {
        async fn delete_batch(&self, _keys: &[RowKey]) -> StoreResult<Vec<RowKey>> {
            Err(StoreError::Backend("access denied".into()))
        }
    }

    #[tokio::test]
    async fn non_throttling_error_is_fatal_immediately() {
        let submitter = BatchSubmitter::new(&Rejects, fast_backoff(5));
        let err = submitter.submit(vec!["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, FlushError::Store(_)));
    }
}

//! Run configuration: the immutable intent flags and the backoff policy
//! used when a batch comes back partially unprocessed.

use std::time::Duration;

/// Intent flags for a single run, resolved once and passed by value into
/// the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlushOptions {
    /// Remove matched entries from the table.
    pub flush: bool,
    /// Stream each matched row key to the audit sink.
    pub save: bool,
    /// Read-only: report the matched count and estimated audit file size.
    pub inspect: bool,
}

impl FlushOptions {
    /// Resolve the mutual constraint between the flags: inspect is
    /// read-only and suppresses both flush and save.
    pub fn normalized(self) -> Self {
        Self {
            flush: self.flush && !self.inspect,
            save: self.save && !self.inspect,
            inspect: self.inspect,
        }
    }

    /// True when no intent was requested at all.
    pub fn is_noop(&self) -> bool {
        !self.flush && !self.save && !self.inspect
    }
}

/// Exponential backoff policy for resubmitting unprocessed batch items.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of resubmissions (not including the initial attempt).
    pub max_retries: u32,
    /// Delay before the first resubmission in milliseconds.
    pub initial_delay_ms: u64,
    /// Ceiling on the delay between resubmissions in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Random jitter applied to delays (fraction, 0.0-1.0).
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay_ms: 500,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Calculate the delay for a given retry attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let jitter_range = capped_delay * self.jitter;
        let jitter = if jitter_range > 0.0 {
            use rand::Rng;
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        let final_delay = (capped_delay + jitter).max(0.0);
        Duration::from_millis(final_delay as u64)
    }
}

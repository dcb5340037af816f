//! Sink statistics
//!
//! Lock-free counters shared between the dispatcher, the connection manager
//! and the value encoder. Every degradation the sink applies silently
//! (overflowed strings, unsupported values, deferred records) is counted here.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sink statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SinkStats {
    /// Records inserted
    pub records_written: u64,
    /// Records skipped while waiting for the next reconnect attempt
    pub records_deferred: u64,
    /// Records skipped because the sink is permanently disabled
    pub records_disabled: u64,
    /// Records refused before execution (unsupported value)
    pub records_rejected: u64,
    /// Records lost to render or execution failures
    pub records_failed: u64,
    /// String values replaced by `''` because they did not fit the buffer
    pub encoding_overflows: u64,
    /// Values of a kind the sink cannot encode
    pub unsupported_values: u64,
    /// Connect attempts (initial, timed and inline)
    pub connect_attempts: u64,
    /// Connect attempts that failed
    pub connect_failures: u64,
    /// Statements rejected by the server or lost in transit
    pub execution_failures: u64,
    /// Total statement execution time (milliseconds)
    pub total_write_time_ms: u64,
}

/// Atomic sink statistics
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicSinkStats {
    pub records_written: AtomicU64,
    pub records_deferred: AtomicU64,
    pub records_disabled: AtomicU64,
    pub records_rejected: AtomicU64,
    pub records_failed: AtomicU64,
    pub encoding_overflows: AtomicU64,
    pub unsupported_values: AtomicU64,
    pub connect_attempts: AtomicU64,
    pub connect_failures: AtomicU64,
    pub execution_failures: AtomicU64,
    pub total_write_time_ms: AtomicU64,
}

#[inline]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl AtomicSinkStats {
    /// Record an inserted record
    pub fn record_written(&self, duration: Duration) {
        bump(&self.records_written);
        self.total_write_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a record skipped before the retry deadline
    pub fn record_deferred(&self) {
        bump(&self.records_deferred);
    }

    /// Record a record skipped by a disabled sink
    pub fn record_disabled(&self) {
        bump(&self.records_disabled);
    }

    /// Record a record refused for an unsupported value
    pub fn record_rejected(&self) {
        bump(&self.records_rejected);
    }

    /// Record a lost record
    pub fn record_failed(&self) {
        bump(&self.records_failed);
    }

    /// Record a string value degraded to `''`
    pub fn record_overflow(&self) {
        bump(&self.encoding_overflows);
    }

    /// Record a value of an unsupported kind
    pub fn record_unsupported(&self) {
        bump(&self.unsupported_values);
    }

    /// Record a connect attempt
    pub fn record_connect_attempt(&self) {
        bump(&self.connect_attempts);
    }

    /// Record a failed connect attempt
    pub fn record_connect_failure(&self) {
        bump(&self.connect_failures);
    }

    /// Record a failed statement execution
    pub fn record_execution_failure(&self) {
        bump(&self.execution_failures);
    }

    /// Get a snapshot
    pub fn snapshot(&self) -> SinkStats {
        SinkStats {
            records_written: self.records_written.load(Ordering::Relaxed),
            records_deferred: self.records_deferred.load(Ordering::Relaxed),
            records_disabled: self.records_disabled.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            encoding_overflows: self.encoding_overflows.load(Ordering::Relaxed),
            unsupported_values: self.unsupported_values.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            execution_failures: self.execution_failures.load(Ordering::Relaxed),
            total_write_time_ms: self.total_write_time_ms.load(Ordering::Relaxed),
        }
    }
}

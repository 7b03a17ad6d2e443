//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the tracker.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! counter or gauge metric.

use metrics::{counter, gauge};
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when a handler failure is registered for a message.
pub struct FailureRecorded {
    /// Whether the entry is final (no further retries) after this failure.
    pub is_final: bool,
}

impl InternalEvent for FailureRecorded {
    fn emit(self) {
        trace!(is_final = self.is_final, "Failure recorded");
        let finality = if self.is_final { "final" } else { "retryable" };
        counter!("snowdrift_failures_recorded_total", "finality" => finality).increment(1);
    }
}

/// Event emitted when the cleanup sweep evicts idle entries.
pub struct EntriesEvicted {
    pub count: u64,
}

impl InternalEvent for EntriesEvicted {
    fn emit(self) {
        trace!(count = self.count, "Idle entries evicted");
        counter!("snowdrift_entries_evicted_total").increment(self.count);
    }
}

/// Event emitted after each sweep with the current registry size.
pub struct EntriesTracked {
    pub count: u64,
}

impl InternalEvent for EntriesTracked {
    fn emit(self) {
        gauge!("snowdrift_tracked_entries").set(self.count as f64);
    }
}

//! Per-message failure records.

use chrono::{DateTime, Utc};
use std::error::Error;
use std::sync::Arc;

/// Shared handle to an opaque handler error.
///
/// The tracker never inspects the error beyond rendering it as a string;
/// handlers can hand over whatever error type they produce.
pub type CaughtError = Arc<dyn Error + Send + Sync>;

/// A single handler failure: the error value and the clock reading at capture.
///
/// The error's `Display` output is captured at construction, so building the
/// poison-sink descriptions later is allocation-cheap and unaffected by
/// anything the error value does afterwards.
#[derive(Debug, Clone)]
pub struct CaughtFailure {
    error: CaughtError,
    rendered: String,
    time: DateTime<Utc>,
}

impl CaughtFailure {
    pub(crate) fn new(error: CaughtError, time: DateTime<Utc>) -> Self {
        let rendered = error.to_string();
        Self {
            error,
            rendered,
            time,
        }
    }

    /// The original error value.
    pub fn error(&self) -> &CaughtError {
        &self.error
    }

    /// The error's display form, captured when the failure was recorded.
    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// When the failure was recorded.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }
}

/// Aggregate failure state for a single message id.
///
/// Logically immutable: updates build a replacement value which the registry
/// swaps in whole, so readers always observe a committed entry.
#[derive(Debug)]
pub(crate) struct TrackingEntry {
    /// Append-only; never empty.
    failures: Vec<CaughtFailure>,
    is_final: bool,
}

impl TrackingEntry {
    pub(crate) fn new(failure: CaughtFailure, is_final: bool) -> Self {
        Self {
            failures: vec![failure],
            is_final,
        }
    }

    /// Append a failure, honoring the sticky-final rule: once an entry is
    /// final it is returned unchanged, dropping the new failure.
    pub(crate) fn extend(prev: &Arc<Self>, failure: CaughtFailure, is_final: bool) -> Arc<Self> {
        if prev.is_final {
            return Arc::clone(prev);
        }
        let mut failures = prev.failures.clone();
        failures.push(failure);
        Arc::new(Self { failures, is_final })
    }

    pub(crate) fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub(crate) fn is_final(&self) -> bool {
        self.is_final
    }

    pub(crate) fn failures(&self) -> &[CaughtFailure] {
        &self.failures
    }

    /// Timestamp of the most recent failure.
    ///
    /// Uses the maximum rather than the last element so a backward clock
    /// jump cannot make an entry look older than it is.
    pub(crate) fn last_failure_at(&self) -> DateTime<Utc> {
        self.failures
            .iter()
            .map(CaughtFailure::time)
            .max()
            .expect("tracking entry holds at least one failure")
    }
}

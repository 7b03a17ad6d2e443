//! Delivery-attempt error tracking.
//!
//! The tracker is consulted once per delivery attempt and updated on every
//! handler failure. It decides when a message has failed too many times to
//! retry and produces the diagnostics the poison sink attaches to
//! dead-lettered messages. A periodic sweep reclaims entries for messages
//! that never reached either outcome.

mod cleanup;
mod entry;

pub use entry::{CaughtError, CaughtFailure};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::warn;

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::emit;
use crate::error::TrackerError;
use crate::metrics::events::FailureRecorded;
use crate::periodic::{PeriodicTask, PeriodicTaskFactory};

use cleanup::IdleEntrySweep;
use entry::TrackingEntry;

/// Concurrent map of message id to failure state.
///
/// A plain map under a mutex is enough here: critical sections are a few
/// pointer operations, and whole-entry replacement makes every update per id
/// linearizable. Shared between the tracker and the cleanup sweep.
pub(crate) struct Registry {
    entries: Mutex<HashMap<String, Arc<TrackingEntry>>>,
    clock: Arc<dyn Clock>,
}

impl Registry {
    fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Queries must stay usable even if a panic poisoned the lock; the map
    /// is never left mid-update, so the inner value is always consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<TrackingEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a fresh entry or extend the existing one, returning the
    /// committed value.
    fn record(&self, id: &str, error: CaughtError, is_final: bool) -> Arc<TrackingEntry> {
        let failure = CaughtFailure::new(error, self.clock.now());
        let mut entries = self.lock();
        let entry = match entries.get(id) {
            Some(prev) => TrackingEntry::extend(prev, failure, is_final),
            None => Arc::new(TrackingEntry::new(failure, is_final)),
        };
        entries.insert(id.to_string(), Arc::clone(&entry));
        entry
    }

    fn get(&self, id: &str) -> Option<Arc<TrackingEntry>> {
        self.lock().get(id).cloned()
    }

    fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    /// Keys whose most recent failure is older than `idle_after`, from a
    /// point-in-time snapshot of the map.
    pub(crate) fn idle_keys(&self, idle_after: Duration) -> Vec<String> {
        let snapshot: Vec<(String, Arc<TrackingEntry>)> = self
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();

        snapshot
            .into_iter()
            .filter(|(_, entry)| self.clock.elapsed_since(entry.last_failure_at()) > idle_after)
            .map(|(id, _)| id)
            .collect()
    }
}

enum CleanupState {
    Stopped(Box<dyn PeriodicTask>),
    Running(Box<dyn PeriodicTask>),
    Disposed,
}

/// Tracks handler failures per message and decides when a message should be
/// moved to the poison sink instead of retried.
///
/// Delivery workers call [`has_failed_too_many_times`](Self::has_failed_too_many_times)
/// before dispatch, [`register_error`](Self::register_error) when the handler
/// fails, and [`clean_up`](Self::clean_up) on success or after dead-lettering.
/// All of those are synchronous, non-suspending, and safe to call from any
/// number of workers concurrently.
pub struct ErrorTracker {
    registry: Arc<Registry>,
    max_delivery_attempts: usize,
    cleanup: Mutex<CleanupState>,
}

impl ErrorTracker {
    /// Create a tracker with the given configuration and collaborators.
    ///
    /// The cleanup task is created through `scheduler` but not started;
    /// call [`initialize`](Self::initialize) once a runtime is available.
    ///
    /// Returns a configuration error if `max_delivery_attempts` is zero,
    /// the cleanup interval is zero, or the task name is empty.
    pub fn new(
        config: TrackerConfig,
        clock: Arc<dyn Clock>,
        scheduler: &dyn PeriodicTaskFactory,
    ) -> Result<Self, TrackerError> {
        config.validate()?;

        let registry = Arc::new(Registry::new(clock));
        let sweep = Arc::new(IdleEntrySweep::new(
            Arc::clone(&registry),
            config.reclaim_idle_after(),
        ));
        let task = scheduler.create(&config.cleanup_task_name, sweep, config.cleanup_interval());

        Ok(Self {
            registry,
            max_delivery_attempts: config.max_delivery_attempts,
            cleanup: Mutex::new(CleanupState::Stopped(task)),
        })
    }

    /// Start the background cleanup task.
    ///
    /// Idempotent. A disposed tracker stays disposed: its public operations
    /// keep working but the cleanup task is never restarted.
    pub fn initialize(&self) {
        let mut state = self
            .cleanup
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *state = match std::mem::replace(&mut *state, CleanupState::Disposed) {
            CleanupState::Stopped(mut task) => {
                task.start();
                CleanupState::Running(task)
            }
            other => other,
        };
    }

    /// Record a handler failure for `id`.
    ///
    /// Creates the tracking entry on first failure, otherwise atomically
    /// replaces it with an extended one. Once an entry is final, further
    /// registrations leave it untouched (sticky final), though the warning
    /// below still fires with the unchanged count.
    ///
    /// Returns an error only when `id` is empty.
    pub fn register_error(
        &self,
        id: &str,
        error: CaughtError,
        is_final: bool,
    ) -> Result<(), TrackerError> {
        snafu::ensure!(!id.is_empty(), crate::error::EmptyMessageIdSnafu);

        let entry = self.registry.record(id, error, is_final);
        let count = entry.failure_count();
        if entry.is_final() {
            warn!(
                message_id = %id,
                error_number = count,
                "Unhandled exception {count} while handling message {id} (FINAL)"
            );
        } else {
            warn!(
                message_id = %id,
                error_number = count,
                "Unhandled exception {count} while handling message {id}"
            );
        }
        emit!(FailureRecorded {
            is_final: entry.is_final(),
        });

        Ok(())
    }

    /// Whether `id` has exhausted its delivery attempts, either by count or
    /// by an explicit final registration. False for untracked ids.
    pub fn has_failed_too_many_times(&self, id: &str) -> bool {
        self.registry
            .get(id)
            .is_some_and(|entry| entry.is_final() || entry.failure_count() >= self.max_delivery_attempts)
    }

    /// One-line failure summary for the poison sink, e.g.
    /// `"3 unhandled exceptions"`. `None` for untracked ids.
    pub fn short_description(&self, id: &str) -> Option<String> {
        self.registry
            .get(id)
            .map(|entry| format!("{} unhandled exceptions", entry.failure_count()))
    }

    /// Multi-line failure report: the short summary followed by one
    /// `"<time>: <error>"` line per failure, in registration order.
    pub fn full_description(&self, id: &str) -> Option<String> {
        self.registry.get(id).map(|entry| {
            let lines: Vec<String> = entry
                .failures()
                .iter()
                .map(|f| format!("{}: {}", f.time(), f.rendered()))
                .collect();
            format!(
                "{} unhandled exceptions: {}",
                entry.failure_count(),
                lines.join("\n")
            )
        })
    }

    /// Snapshot of the error values recorded for `id`, in registration
    /// order. Decoupled from the registry: later registrations do not
    /// mutate a returned snapshot.
    pub fn exceptions(&self, id: &str) -> Vec<CaughtError> {
        self.registry
            .get(id)
            .map(|entry| {
                entry
                    .failures()
                    .iter()
                    .map(|f| Arc::clone(f.error()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of the full failure records for `id`, timestamps included.
    pub fn failures(&self, id: &str) -> Vec<CaughtFailure> {
        self.registry
            .get(id)
            .map(|entry| entry.failures().to_vec())
            .unwrap_or_default()
    }

    /// Forget everything tracked for `id`. No-op for untracked ids.
    pub fn clean_up(&self, id: &str) {
        self.registry.remove(id);
    }

    /// Number of message ids currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.registry.len()
    }

    /// Stop the cleanup task, waiting boundedly for an in-flight sweep.
    ///
    /// Idempotent, and safe to call on a tracker that was never
    /// initialized. Public operations remain usable afterwards.
    pub async fn dispose(&self) {
        let task = {
            let mut state = self
                .cleanup
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, CleanupState::Disposed) {
                CleanupState::Stopped(task) | CleanupState::Running(task) => Some(task),
                CleanupState::Disposed => None,
            }
        };
        if let Some(mut task) = task {
            task.dispose().await;
        }
    }
}

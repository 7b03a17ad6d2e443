//! Periodic background task scheduling.
//!
//! The tracker runs its cleanup sweep through the small contracts defined
//! here, so hosts can substitute their own scheduler. The production
//! implementation spawns a tokio task that races a cancellation token
//! against the interval timer, mirroring the shutdown discipline used by
//! the bus's polling pipelines.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Boxed error type returned by periodic jobs.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How long `dispose` waits for an in-flight job before abandoning it.
const DISPOSE_GRACE: Duration = Duration::from_secs(5);

/// An asynchronous job invoked once per interval.
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    /// Run one iteration. Errors are logged by the runner; they never stop
    /// the schedule.
    async fn run(&self) -> Result<(), BoxError>;
}

/// Handle to a scheduled periodic task.
#[async_trait]
pub trait PeriodicTask: Send {
    /// Begin invoking the job. Idempotent; a second call is a no-op.
    fn start(&mut self);

    /// Stop the schedule. No new invocations begin afterwards; an in-flight
    /// invocation is awaited for a bounded time, then abandoned.
    async fn dispose(&mut self);
}

/// Factory for periodic tasks, injected into the tracker at construction.
pub trait PeriodicTaskFactory: Send + Sync {
    /// Create a task named `name` that runs `job` every `interval` once
    /// started.
    fn create(
        &self,
        name: &str,
        job: Arc<dyn PeriodicJob>,
        interval: Duration,
    ) -> Box<dyn PeriodicTask>;
}

/// Production factory backed by `tokio::spawn`.
///
/// `start` must be called from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPeriodicTaskFactory;

impl PeriodicTaskFactory for TokioPeriodicTaskFactory {
    fn create(
        &self,
        name: &str,
        job: Arc<dyn PeriodicJob>,
        interval: Duration,
    ) -> Box<dyn PeriodicTask> {
        Box::new(TokioPeriodicTask {
            name: name.to_string(),
            job: Some(job),
            interval,
            shutdown: CancellationToken::new(),
            handle: None,
        })
    }
}

struct TokioPeriodicTask {
    name: String,
    /// Taken on `start`; `None` marks the task as already started.
    job: Option<Arc<dyn PeriodicJob>>,
    interval: Duration,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

#[async_trait]
impl PeriodicTask for TokioPeriodicTask {
    fn start(&mut self) {
        let Some(job) = self.job.take() else {
            return;
        };

        let name = self.name.clone();
        let interval = self.interval;
        let shutdown = self.shutdown.clone();

        self.handle = Some(tokio::spawn(async move {
            debug!(task = %name, interval_ms = interval.as_millis() as u64, "Periodic task started");
            loop {
                // Wait out the interval, racing the shutdown signal
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                if let Err(e) = job.run().await {
                    warn!(task = %name, error = %e, "Periodic task iteration failed");
                }
            }
            debug!(task = %name, "Periodic task stopped");
        }));
    }

    async fn dispose(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.take()
            && tokio::time::timeout(DISPOSE_GRACE, handle).await.is_err()
        {
            warn!(
                task = %self.name,
                "Periodic task did not stop within grace period, abandoning"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl PeriodicJob for CountingJob {
        async fn run(&self) -> Result<(), BoxError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingJob;

    #[async_trait]
    impl PeriodicJob for FailingJob {
        async fn run(&self) -> Result<(), BoxError> {
            Err("sweep failed".into())
        }
    }

    #[tokio::test]
    async fn test_job_runs_on_interval() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let mut task =
            TokioPeriodicTaskFactory.create("test", job.clone(), Duration::from_millis(10));

        task.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.dispose().await;

        assert!(job.runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_dispose_stops_invocations() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let mut task =
            TokioPeriodicTaskFactory.create("test", job.clone(), Duration::from_millis(10));

        task.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.dispose().await;

        let after_dispose = job.runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), after_dispose);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let mut task = TokioPeriodicTaskFactory.create("test", job, Duration::from_millis(10));

        task.start();
        task.dispose().await;
        task.dispose().await;
    }

    #[tokio::test]
    async fn test_dispose_without_start() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let mut task =
            TokioPeriodicTaskFactory.create("test", job.clone(), Duration::from_millis(10));

        task.dispose().await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let mut task =
            TokioPeriodicTaskFactory.create("test", job.clone(), Duration::from_millis(10));

        task.start();
        task.start();
        tokio::time::sleep(Duration::from_millis(35)).await;
        task.dispose().await;

        // A duplicate start must not double the schedule
        assert!(job.runs.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn test_failing_job_keeps_schedule_alive() {
        let mut task =
            TokioPeriodicTaskFactory.create("failing", Arc::new(FailingJob), Duration::from_millis(10));

        task.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Still disposable; the loop survived the errors
        task.dispose().await;
    }
}

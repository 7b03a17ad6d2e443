//! Background reclamation of idle tracking entries.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::emit;
use crate::metrics::events::{EntriesEvicted, EntriesTracked};
use crate::periodic::{BoxError, PeriodicJob};

use super::Registry;

/// Periodic sweep that evicts entries idle beyond the reclaim threshold.
///
/// Removal is keyed only: an entry that picked up a fresh failure between
/// snapshot and removal may still be evicted. The caller simply recreates
/// the entry on its next failure, so the slippage is bounded by one attempt.
pub(crate) struct IdleEntrySweep {
    registry: Arc<Registry>,
    reclaim_idle_after: Duration,
}

impl IdleEntrySweep {
    pub(crate) fn new(registry: Arc<Registry>, reclaim_idle_after: Duration) -> Self {
        Self {
            registry,
            reclaim_idle_after,
        }
    }

    async fn sweep(&self) -> usize {
        let stale = self.registry.idle_keys(self.reclaim_idle_after);
        let mut evicted = 0;
        for key in stale {
            if self.registry.remove(&key) {
                evicted += 1;
            }
            // Keep the registry responsive to delivery workers mid-sweep
            tokio::task::yield_now().await;
        }
        evicted
    }
}

#[async_trait]
impl PeriodicJob for IdleEntrySweep {
    async fn run(&self) -> Result<(), BoxError> {
        let evicted = self.sweep().await;
        if evicted > 0 {
            debug!(evicted, "Evicted idle tracking entries");
            emit!(EntriesEvicted {
                count: evicted as u64,
            });
        }
        emit!(EntriesTracked {
            count: self.registry.len() as u64,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    fn registry_with_clock() -> (Arc<Registry>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (Arc::new(Registry::new(clock.clone())), clock)
    }

    fn seed(registry: &Registry, id: &str) {
        registry.record(id, Arc::new(std::io::Error::other("boom")), false);
    }

    #[tokio::test]
    async fn test_sweep_evicts_idle_entries() {
        let (registry, clock) = registry_with_clock();
        seed(&registry, "stale");

        clock.advance(Duration::from_secs(61));
        seed(&registry, "fresh");

        let sweep = IdleEntrySweep::new(Arc::clone(&registry), Duration::from_secs(60));
        sweep.run().await.unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get("stale").is_none());
        assert!(registry.get("fresh").is_some());
    }

    #[tokio::test]
    async fn test_sweep_keeps_entries_at_threshold() {
        let (registry, clock) = registry_with_clock();
        seed(&registry, "m1");

        // Idleness must strictly exceed the threshold before eviction
        clock.advance(Duration::from_secs(60));
        let sweep = IdleEntrySweep::new(Arc::clone(&registry), Duration::from_secs(60));
        sweep.run().await.unwrap();

        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_tolerates_backward_clock() {
        let (registry, clock) = registry_with_clock();
        seed(&registry, "m1");

        clock.set(clock.now() - chrono::Duration::hours(1));
        let sweep = IdleEntrySweep::new(Arc::clone(&registry), Duration::from_secs(60));
        sweep.run().await.unwrap();

        // Elapsed clamps to zero, so the entry looks fresh
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_on_empty_registry() {
        let (registry, _clock) = registry_with_clock();
        let sweep = IdleEntrySweep::new(Arc::clone(&registry), Duration::from_secs(60));
        sweep.run().await.unwrap();
        assert_eq!(registry.len(), 0);
    }
}

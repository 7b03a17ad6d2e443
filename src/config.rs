//! Tracker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

fn default_reclaim_idle_ms() -> u64 {
    10 * 60 * 1000
}

fn default_cleanup_interval_ms() -> u64 {
    60 * 1000
}

fn default_cleanup_task_name() -> String {
    "CleanupTrackedErrors".to_string()
}

/// Configuration for the delivery-attempt error tracker.
///
/// Only `max_delivery_attempts` is required; the reclamation knobs default
/// to values suitable for a production bus. Millisecond granularity keeps
/// sub-second sweep cadences expressible for short-lived test buses.
///
/// # Examples
///
/// ```
/// use snowdrift::TrackerConfig;
///
/// let config = TrackerConfig::new(5);
/// assert_eq!(config.max_delivery_attempts, 5);
/// assert_eq!(config.reclaim_idle_after_ms, 600_000);
/// assert_eq!(config.cleanup_interval_ms, 60_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Delivery attempts before a message is considered poisonous.
    pub max_delivery_attempts: usize,

    /// How long an entry may sit without a new failure before the cleanup
    /// task reclaims it (default: 10 minutes).
    #[serde(default = "default_reclaim_idle_ms")]
    pub reclaim_idle_after_ms: u64,

    /// Interval between cleanup sweeps (default: 60 seconds).
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Name given to the background cleanup task, for logs.
    #[serde(default = "default_cleanup_task_name")]
    pub cleanup_task_name: String,
}

impl TrackerConfig {
    /// Create a config with the given attempt ceiling and default reclamation
    /// settings.
    pub fn new(max_delivery_attempts: usize) -> Self {
        Self {
            max_delivery_attempts,
            reclaim_idle_after_ms: default_reclaim_idle_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            cleanup_task_name: default_cleanup_task_name(),
        }
    }

    /// Validate invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        snafu::ensure!(
            self.max_delivery_attempts >= 1,
            crate::error::ZeroDeliveryAttemptsSnafu
        );
        snafu::ensure!(
            self.cleanup_interval_ms > 0,
            crate::error::ZeroCleanupIntervalSnafu
        );
        snafu::ensure!(
            !self.cleanup_task_name.is_empty(),
            crate::error::EmptyTaskNameSnafu
        );
        Ok(())
    }

    /// Idle threshold as a [`Duration`].
    pub fn reclaim_idle_after(&self) -> Duration {
        Duration::from_millis(self.reclaim_idle_after_ms)
    }

    /// Sweep interval as a [`Duration`].
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::new(3);
        assert_eq!(config.max_delivery_attempts, 3);
        assert_eq!(config.reclaim_idle_after(), Duration::from_secs(600));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(60));
        assert_eq!(config.cleanup_task_name, "CleanupTrackedErrors");
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{"max_delivery_attempts": 5}"#;
        let config: TrackerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_delivery_attempts, 5);
        assert_eq!(config.reclaim_idle_after_ms, 600_000);
        assert_eq!(config.cleanup_interval_ms, 60_000);
        assert_eq!(config.cleanup_task_name, "CleanupTrackedErrors");
    }

    #[test]
    fn test_serde_with_all_fields() {
        let json = r#"{
            "max_delivery_attempts": 2,
            "reclaim_idle_after_ms": 1000,
            "cleanup_interval_ms": 250,
            "cleanup_task_name": "SweepBusErrors"
        }"#;
        let config: TrackerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_delivery_attempts, 2);
        assert_eq!(config.reclaim_idle_after(), Duration::from_secs(1));
        assert_eq!(config.cleanup_interval(), Duration::from_millis(250));
        assert_eq!(config.cleanup_task_name, "SweepBusErrors");
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = TrackerConfig::new(4);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TrackerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
max_delivery_attempts: 3
cleanup_interval_ms: 5000
"#;
        let config: TrackerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_delivery_attempts, 3);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(5));
        assert_eq!(config.reclaim_idle_after_ms, 600_000);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = TrackerConfig::new(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = TrackerConfig {
            cleanup_interval_ms: 0,
            ..TrackerConfig::new(3)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_task_name() {
        let config = TrackerConfig {
            cleanup_task_name: String::new(),
            ..TrackerConfig::new(3)
        };
        assert!(config.validate().is_err());
    }
}

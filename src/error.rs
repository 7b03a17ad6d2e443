//! Error types for the failure tracker.

use snafu::prelude::*;

/// Errors that can occur during configuration validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// `max_delivery_attempts` below the minimum of one.
    #[snafu(display("max_delivery_attempts must be at least 1"))]
    ZeroDeliveryAttempts,

    /// Cleanup interval of zero would spin the sweep loop.
    #[snafu(display("cleanup_interval_ms must be non-zero"))]
    ZeroCleanupInterval,

    /// Cleanup task name is empty.
    #[snafu(display("cleanup_task_name cannot be empty"))]
    EmptyTaskName,
}

/// Errors surfaced by the tracker's public operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum TrackerError {
    /// Message id was empty.
    #[snafu(display("Message id cannot be empty"))]
    EmptyMessageId,

    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },
}

impl From<ConfigError> for TrackerError {
    fn from(source: ConfigError) -> Self {
        TrackerError::Config { source }
    }
}

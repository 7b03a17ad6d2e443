//! Snowdrift: delivery failure tracking for message-bus retry pipelines.
//!
//! Every inbound message passes through the tracker on its way to a handler:
//!
//! - Delivery workers ask [`ErrorTracker::has_failed_too_many_times`] before
//!   dispatching a message.
//! - Handler failures are recorded with [`ErrorTracker::register_error`],
//!   optionally marked final ("do not retry again") to short-circuit the
//!   count-based threshold.
//! - [`ErrorTracker::short_description`], [`ErrorTracker::full_description`]
//!   and [`ErrorTracker::exceptions`] annotate messages headed for the
//!   poison sink.
//! - [`ErrorTracker::clean_up`] clears state on success or after
//!   dead-lettering.
//!
//! A background cleanup task sweeps the registry and reclaims entries whose
//! messages never reached either outcome, keeping memory bounded.

pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod periodic;
pub mod tracker;

// Re-export commonly used items
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use error::{ConfigError, TrackerError};
pub use periodic::{PeriodicJob, PeriodicTask, PeriodicTaskFactory, TokioPeriodicTaskFactory};
pub use tracker::{CaughtError, CaughtFailure, ErrorTracker};

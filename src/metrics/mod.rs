//! Metrics emission for tracker activity.
//!
//! Follows the internal-events pattern: each measurable occurrence is a
//! struct implementing [`InternalEvent`], emitted through the [`emit!`]
//! macro. The host process chooses the recorder (Prometheus or otherwise)
//! through the `metrics` facade.

pub mod events;

pub use events::InternalEvent;

/// Macro for emitting metric events.
///
/// # Example
///
/// ```ignore
/// use snowdrift::metrics::events::FailureRecorded;
///
/// emit!(FailureRecorded { is_final: false });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

pub use emit;

// ABOUTME: Batch widget: state machine, poll timer and async driver
// ABOUTME: Launches a remote batch and tracks it until a terminal state

pub mod state;
pub mod timer;
pub mod widget;

use std::time::Duration;

pub use state::{reduce, BatchJobState, Effect, Transition, WidgetEvent, WidgetState};
pub use timer::PollTimer;
pub use widget::BatchWidget;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const DEFAULT_COMPLETION_RESET_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    /// How long a completed job stays on screen before the modal closes.
    pub completion_reset_delay: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            completion_reset_delay: DEFAULT_COMPLETION_RESET_DELAY,
        }
    }
}

// ABOUTME: Repeating poll timer owned by the batch widget
// ABOUTME: Posts tick events on a fixed period until cancelled or dropped

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::state::WidgetEvent;

pub struct PollTimer {
    handle: JoinHandle<()>,
}

impl PollTimer {
    /// Starts ticking one `period` from now.
    pub fn start(period: Duration, epoch: u64, events: UnboundedSender<WidgetEvent>) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if events.send(WidgetEvent::Tick { epoch }).is_err() {
                    break;
                }
            }
        });

        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

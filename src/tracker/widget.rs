// ABOUTME: Async driver for the batch widget state machine
// ABOUTME: Executes reducer effects: remote calls, the poll timer and the delayed reset

use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

use super::state::{reduce, Effect, WidgetEvent, WidgetState};
use super::timer::PollTimer;
use super::TrackerSettings;
use crate::error::BatchError;
use crate::remote::models::JobStatus;
use crate::remote::BatchApi;

/// Owns the widget state and every task acting on its behalf.
///
/// All transitions run on the task calling [`BatchWidget::dispatch`] or
/// [`BatchWidget::step`]; spawned work only posts events back. Must be used
/// from within a tokio runtime.
pub struct BatchWidget {
    api: Arc<dyn BatchApi>,
    settings: TrackerSettings,
    state: WidgetState,
    events_tx: UnboundedSender<WidgetEvent>,
    events_rx: UnboundedReceiver<WidgetEvent>,
    timer: Option<PollTimer>,
    pending_reset: Option<JoinHandle<()>>,
}

impl BatchWidget {
    pub fn new(api: Arc<dyn BatchApi>, settings: TrackerSettings, default_batch_size: u32) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            api,
            settings,
            state: WidgetState::new(default_batch_size),
            events_tx,
            events_rx,
            timer: None,
            pending_reset: None,
        }
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn dispatch(&mut self, event: WidgetEvent) {
        let transition = reduce(self.state.clone(), event);
        self.state = transition.state;
        for effect in transition.effects {
            self.execute(effect);
        }
    }

    /// Waits for the next internally generated event and applies it.
    pub async fn step(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.dispatch(event);
                true
            }
            None => false,
        }
    }

    /// Drives the submitted job until it completes or fails, calling
    /// `on_update` after every transition. Returns the completed job id.
    pub async fn run_until_settled<F>(&mut self, mut on_update: F) -> Result<String, BatchError>
    where
        F: FnMut(&WidgetState),
    {
        let mut completed_job = None;
        loop {
            if self.state.job.is_errored {
                return Err(self
                    .state
                    .job
                    .error
                    .clone()
                    .unwrap_or_else(|| BatchError::Job("Batch failed".to_string())));
            }
            if !self.state.job.is_running {
                return completed_job
                    .ok_or_else(|| BatchError::Submit("Batch is not running".to_string()));
            }
            if !self.step().await {
                return Err(BatchError::Poll("Widget event channel closed".to_string()));
            }
            if self.state.job.status == JobStatus::Completed {
                completed_job = Some(self.state.job.job_id.clone());
            }
            on_update(&self.state);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartBatch { epoch, request } => {
                let api = Arc::clone(&self.api);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = api.start_batch(&request).await;
                    let _ = events.send(WidgetEvent::Submitted { epoch, result });
                });
            }
            Effect::PollStatus { epoch, job_id } => {
                debug!(job_id = %job_id, "Requesting batch status");
                let api = Arc::clone(&self.api);
                let events = self.events_tx.clone();
                tokio::spawn(async move {
                    let result = api.get_batch_status(&job_id).await;
                    let _ = events.send(WidgetEvent::StatusReceived {
                        epoch,
                        job_id,
                        result,
                    });
                });
            }
            Effect::ArmTimer { epoch } => {
                debug!(
                    interval_ms = self.settings.poll_interval.as_millis() as u64,
                    "Arming batch poll timer"
                );
                self.timer = Some(PollTimer::start(
                    self.settings.poll_interval,
                    epoch,
                    self.events_tx.clone(),
                ));
            }
            Effect::CancelTimer => {
                if let Some(timer) = self.timer.take() {
                    debug!("Cancelling batch poll timer");
                    timer.cancel();
                }
            }
            Effect::ScheduleReset { epoch } => {
                let delay = self.settings.completion_reset_delay;
                let events = self.events_tx.clone();
                if let Some(previous) = self.pending_reset.take() {
                    previous.abort();
                }
                self.pending_reset = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(WidgetEvent::CompletionDelayElapsed { epoch });
                }));
            }
        }
    }
}

impl Drop for BatchWidget {
    fn drop(&mut self) {
        if let Some(pending) = self.pending_reset.take() {
            pending.abort();
        }
    }
}

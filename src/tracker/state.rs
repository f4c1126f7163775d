// ABOUTME: Batch widget state record and the reducer that drives it
// ABOUTME: Pure transitions: remote calls and timers are requested as effects

use tracing::{debug, error, info, warn};

use crate::error::BatchError;
use crate::remote::models::{BatchStatus, JobStatus, StartBatchRequest};

/// Last known state of the tracked batch job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchJobState {
    pub job_id: String,
    pub status: JobStatus,
    pub progress_percent: f64,
    pub is_running: bool,
    pub is_errored: bool,
    pub error: Option<BatchError>,
    pub poll_in_flight: bool,
}

impl BatchJobState {
    pub fn error_message(&self) -> &str {
        self.error.as_ref().map(BatchError::detail).unwrap_or("")
    }

    /// Running and not yet in a terminal status.
    pub fn is_polling(&self) -> bool {
        self.is_running && !self.status.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetState {
    pub modal_open: bool,
    pub batch_size_input: String,
    pub filter_condition: String,
    pub grouping_key: Option<String>,
    pub job: BatchJobState,
    /// Bumped on every submission and reset. Results tagged with an older
    /// epoch are discarded.
    pub epoch: u64,
}

impl WidgetState {
    pub fn new(default_batch_size: u32) -> Self {
        Self {
            modal_open: false,
            batch_size_input: default_batch_size.to_string(),
            filter_condition: String::new(),
            grouping_key: None,
            job: BatchJobState::default(),
            epoch: 0,
        }
    }

    pub fn batch_size(&self) -> Result<u32, BatchError> {
        let raw = self.batch_size_input.trim();
        // whole-number forms such as "1.0" or "2e3" count as integers
        let parsed = raw.parse::<u32>().ok().or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|n| n.is_finite() && n.fract() == 0.0 && *n <= u32::MAX as f64)
                .map(|n| n as u32)
        });
        match parsed {
            Some(size) if size >= 1 => Ok(size),
            _ => Err(BatchError::Input(format!(
                "Batch size must be a positive integer, got '{}'",
                raw
            ))),
        }
    }

    pub fn button_label(&self) -> String {
        if self.job.is_running {
            format!("Status: {}", self.job.status)
        } else {
            "Recalculate".to_string()
        }
    }

    pub fn ok_disabled(&self) -> bool {
        self.job.is_errored || self.job.is_running
    }

    fn apply(&mut self, event: WidgetEvent) -> Vec<Effect> {
        match event {
            WidgetEvent::BatchSizeChanged(input) => {
                self.batch_size_input = input;
                Vec::new()
            }
            WidgetEvent::FilterChanged(filter) => {
                self.filter_condition = filter;
                Vec::new()
            }
            WidgetEvent::GroupingKeyLoaded(Ok(key)) => {
                debug!(grouping_key = %key, "Grouping key loaded");
                self.grouping_key = Some(key);
                Vec::new()
            }
            WidgetEvent::GroupingKeyLoaded(Err(err)) => self.fail(err),
            WidgetEvent::OpenModal => {
                match self.batch_size() {
                    Ok(_) => self.modal_open = true,
                    Err(err) => {
                        warn!("Refusing to open batch modal: {}", err);
                        self.modal_open = false;
                    }
                }
                Vec::new()
            }
            WidgetEvent::CloseModal => {
                self.modal_open = false;
                if self.job.is_errored {
                    self.reset()
                } else {
                    Vec::new()
                }
            }
            WidgetEvent::Cancel => {
                if self.job.is_running {
                    debug!("Cancel ignored while the batch is running");
                    Vec::new()
                } else {
                    self.reset()
                }
            }
            WidgetEvent::Submit => self.submit(),
            WidgetEvent::Submitted { epoch, result } => self.on_submitted(epoch, result),
            WidgetEvent::Tick { epoch } => self.on_tick(epoch),
            WidgetEvent::StatusReceived {
                epoch,
                job_id,
                result,
            } => self.on_status(epoch, &job_id, result),
            WidgetEvent::CompletionDelayElapsed { epoch } => {
                if epoch == self.epoch
                    && self.job.is_running
                    && self.job.status == JobStatus::Completed
                {
                    info!(job_id = %self.job.job_id, "Closing batch modal after completion");
                    self.reset()
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn submit(&mut self) -> Vec<Effect> {
        if !self.modal_open || self.ok_disabled() {
            return Vec::new();
        }
        let batch_size = match self.batch_size() {
            Ok(size) => size,
            Err(err) => {
                warn!("Not submitting batch: {}", err);
                return Vec::new();
            }
        };
        let grouping_key = match self.grouping_key.clone() {
            Some(key) => key,
            None => {
                return self.fail(BatchError::Submit(
                    "Record grouping key has not been loaded".to_string(),
                ))
            }
        };

        self.epoch += 1;
        self.job.is_running = true;
        info!(
            grouping_key = %grouping_key,
            batch_size,
            filter = %self.filter_condition,
            "Submitting batch"
        );

        vec![Effect::StartBatch {
            epoch: self.epoch,
            request: StartBatchRequest {
                grouping_key,
                batch_size,
                filter_condition: self.filter_condition.clone(),
            },
        }]
    }

    fn on_submitted(&mut self, epoch: u64, result: Result<String, BatchError>) -> Vec<Effect> {
        if epoch != self.epoch || !self.job.is_running {
            debug!(epoch, current = self.epoch, "Discarding stale submission result");
            return Vec::new();
        }
        match result {
            Ok(job_id) => {
                info!(job_id = %job_id, "Batch started");
                self.job.job_id = job_id.clone();
                self.job.poll_in_flight = true;
                vec![Effect::PollStatus { epoch, job_id }, Effect::ArmTimer { epoch }]
            }
            Err(err) => self.fail(err),
        }
    }

    fn on_tick(&mut self, epoch: u64) -> Vec<Effect> {
        if epoch != self.epoch {
            return Vec::new();
        }
        if !self.job.is_polling() {
            return vec![Effect::CancelTimer];
        }
        if self.job.poll_in_flight {
            warn!(
                job_id = %self.job.job_id,
                "Batch tracking skipped, previous status request still in flight; poll interval may be too short"
            );
            return Vec::new();
        }
        self.job.poll_in_flight = true;
        vec![Effect::PollStatus {
            epoch,
            job_id: self.job.job_id.clone(),
        }]
    }

    fn on_status(
        &mut self,
        epoch: u64,
        job_id: &str,
        result: Result<BatchStatus, BatchError>,
    ) -> Vec<Effect> {
        if epoch != self.epoch || job_id != self.job.job_id || !self.job.is_polling() {
            debug!(job_id, epoch, current = self.epoch, "Discarding stale status result");
            return Vec::new();
        }
        self.job.poll_in_flight = false;

        let status = match result {
            Ok(status) => status,
            Err(err) => return self.fail(err),
        };
        if let Err(msg) = status.validate() {
            return self.fail(BatchError::Poll(format!("Invalid batch status: {}", msg)));
        }
        debug!(
            job_id,
            status = %status.status,
            processed = status.items_processed,
            total = status.items_total,
            errors = status.error_count,
            "Batch status received"
        );
        self.job.status = status.status;

        if status.error_count > 0 {
            return self.fail(BatchError::Job(status.error_summary()));
        }

        match status.status {
            JobStatus::Processing => {
                self.job.progress_percent = status.progress_percent();
                Vec::new()
            }
            JobStatus::Completed => {
                info!(job_id, "Batch completed");
                self.job.progress_percent = 100.0;
                vec![Effect::CancelTimer, Effect::ScheduleReset { epoch }]
            }
            JobStatus::Aborted | JobStatus::Failed => self.fail(BatchError::Job(format!(
                "Job ended with status '{}'",
                status.status
            ))),
            JobStatus::Holding | JobStatus::Queued | JobStatus::Preparing => Vec::new(),
        }
    }

    fn fail(&mut self, err: BatchError) -> Vec<Effect> {
        error!(job_id = %self.job.job_id, "{}", err);
        self.job.is_running = false;
        self.job.is_errored = true;
        self.job.poll_in_flight = false;
        self.job.error = Some(err);
        vec![Effect::CancelTimer]
    }

    fn reset(&mut self) -> Vec<Effect> {
        self.modal_open = false;
        self.job = BatchJobState::default();
        self.epoch += 1;
        vec![Effect::CancelTimer]
    }
}

/// Inputs to the widget state machine.
#[derive(Debug, Clone)]
pub enum WidgetEvent {
    BatchSizeChanged(String),
    FilterChanged(String),
    GroupingKeyLoaded(Result<String, BatchError>),
    OpenModal,
    CloseModal,
    Cancel,
    Submit,
    Submitted {
        epoch: u64,
        result: Result<String, BatchError>,
    },
    Tick {
        epoch: u64,
    },
    StatusReceived {
        epoch: u64,
        job_id: String,
        result: Result<BatchStatus, BatchError>,
    },
    CompletionDelayElapsed {
        epoch: u64,
    },
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartBatch {
        epoch: u64,
        request: StartBatchRequest,
    },
    PollStatus {
        epoch: u64,
        job_id: String,
    },
    ArmTimer {
        epoch: u64,
    },
    CancelTimer,
    ScheduleReset {
        epoch: u64,
    },
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub state: WidgetState,
    pub effects: Vec<Effect>,
}

pub fn reduce(state: WidgetState, event: WidgetEvent) -> Transition {
    let mut state = state;
    let effects = state.apply(event);
    Transition { state, effects }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: JobStatus, processed: u64, total: u64, errors: u64) -> BatchStatus {
        BatchStatus {
            status,
            items_processed: processed,
            items_total: total,
            error_count: errors,
            extended_status: None,
        }
    }

    fn ready_state() -> WidgetState {
        let mut state = WidgetState::new(2000);
        state = reduce(state, WidgetEvent::GroupingKeyLoaded(Ok("Measles".to_string()))).state;
        reduce(state, WidgetEvent::OpenModal).state
    }

    /// Submits and acknowledges the start call, leaving one poll in flight.
    fn running_state(job_id: &str) -> WidgetState {
        let submitted = reduce(ready_state(), WidgetEvent::Submit);
        let epoch = submitted.state.epoch;
        reduce(
            submitted.state,
            WidgetEvent::Submitted {
                epoch,
                result: Ok(job_id.to_string()),
            },
        )
        .state
    }

    fn receive(state: WidgetState, result: Result<BatchStatus, BatchError>) -> Transition {
        let epoch = state.epoch;
        let job_id = state.job.job_id.clone();
        reduce(
            state,
            WidgetEvent::StatusReceived {
                epoch,
                job_id,
                result,
            },
        )
    }

    fn assert_defaults(job: &BatchJobState) {
        assert_eq!(job.status, JobStatus::Holding);
        assert_eq!(job.progress_percent, 0.0);
        assert!(!job.is_running);
        assert!(!job.is_errored);
        assert_eq!(job.job_id, "");
        assert_eq!(job.error_message(), "");
        assert!(!job.poll_in_flight);
    }

    #[test]
    fn test_invalid_batch_sizes_keep_modal_closed() {
        for input in ["0", "-1", "1.5", "abc", "", "  ", "-0", "-3.0", "4294967296", "inf", "NaN"] {
            let mut state = WidgetState::new(2000);
            state = reduce(state, WidgetEvent::BatchSizeChanged(input.to_string())).state;
            let transition = reduce(state.clone(), WidgetEvent::OpenModal);
            assert!(!transition.state.modal_open, "input {:?} opened the modal", input);
            assert!(transition.effects.is_empty());
            assert_eq!(transition.state.job, state.job);
        }
    }

    #[test]
    fn test_valid_batch_sizes_open_modal() {
        for input in ["1", "2000", " 200 ", "4294967295"] {
            let state = reduce(
                WidgetState::new(2000),
                WidgetEvent::BatchSizeChanged(input.to_string()),
            )
            .state;
            assert!(reduce(state, WidgetEvent::OpenModal).state.modal_open);
        }
    }

    #[test]
    fn test_whole_number_notations_are_valid_batch_sizes() {
        for (input, expected) in [("1.0", 1), ("2e3", 2000), ("2000.00", 2000)] {
            let state = reduce(
                WidgetState::new(2000),
                WidgetEvent::BatchSizeChanged(input.to_string()),
            )
            .state;
            assert_eq!(state.batch_size(), Ok(expected));
            assert!(reduce(state, WidgetEvent::OpenModal).state.modal_open);
        }
    }

    #[test]
    fn test_submit_starts_batch_with_inputs() {
        let mut state = ready_state();
        state = reduce(state, WidgetEvent::FilterChanged("Age__c > 5".to_string())).state;
        let transition = reduce(state, WidgetEvent::Submit);

        assert!(transition.state.job.is_running);
        assert_eq!(transition.state.button_label(), "Status: Holding");
        assert!(transition.state.ok_disabled());
        assert_eq!(
            transition.effects,
            vec![Effect::StartBatch {
                epoch: transition.state.epoch,
                request: StartBatchRequest {
                    grouping_key: "Measles".to_string(),
                    batch_size: 2000,
                    filter_condition: "Age__c > 5".to_string(),
                },
            }]
        );
    }

    #[test]
    fn test_submit_ignored_when_modal_closed_or_disabled() {
        let closed = reduce(WidgetState::new(2000), WidgetEvent::Submit);
        assert!(closed.effects.is_empty());
        assert!(!closed.state.job.is_running);

        let running = running_state("BATCH-1");
        let again = reduce(running.clone(), WidgetEvent::Submit);
        assert!(again.effects.is_empty());
        assert_eq!(again.state, running);
    }

    #[test]
    fn test_submit_without_grouping_key_errors() {
        let state = reduce(WidgetState::new(2000), WidgetEvent::OpenModal).state;
        let transition = reduce(state, WidgetEvent::Submit);
        assert!(transition.state.job.is_errored);
        assert!(!transition.state.job.is_running);
        assert!(matches!(transition.state.job.error, Some(BatchError::Submit(_))));
    }

    #[test]
    fn test_submitted_polls_once_then_arms_timer() {
        let submitted = reduce(ready_state(), WidgetEvent::Submit);
        let epoch = submitted.state.epoch;
        let transition = reduce(
            submitted.state,
            WidgetEvent::Submitted {
                epoch,
                result: Ok("BATCH-1".to_string()),
            },
        );

        assert_eq!(transition.state.job.job_id, "BATCH-1");
        assert!(transition.state.job.poll_in_flight);
        assert_eq!(
            transition.effects,
            vec![
                Effect::PollStatus {
                    epoch,
                    job_id: "BATCH-1".to_string()
                },
                Effect::ArmTimer { epoch },
            ]
        );
    }

    #[test]
    fn test_submit_failure_enters_error_state() {
        let submitted = reduce(ready_state(), WidgetEvent::Submit);
        let epoch = submitted.state.epoch;
        let transition = reduce(
            submitted.state,
            WidgetEvent::Submitted {
                epoch,
                result: Err(BatchError::Submit("Insufficient access".to_string())),
            },
        );
        assert!(transition.state.job.is_errored);
        assert!(!transition.state.job.is_running);
        assert_eq!(transition.state.job.error_message(), "Insufficient access");
        assert_eq!(transition.effects, vec![Effect::CancelTimer]);
    }

    #[test]
    fn test_tick_skipped_while_poll_in_flight() {
        let state = running_state("BATCH-1");
        let epoch = state.epoch;
        let transition = reduce(state.clone(), WidgetEvent::Tick { epoch });
        assert!(transition.effects.is_empty());
        assert_eq!(transition.state, state);
    }

    #[test]
    fn test_tick_polls_when_idle() {
        let state = receive(running_state("BATCH-1"), Ok(status(JobStatus::Queued, 0, 0, 0))).state;
        assert!(!state.job.poll_in_flight);
        let epoch = state.epoch;

        let transition = reduce(state, WidgetEvent::Tick { epoch });
        assert!(transition.state.job.poll_in_flight);
        assert_eq!(
            transition.effects,
            vec![Effect::PollStatus {
                epoch,
                job_id: "BATCH-1".to_string()
            }]
        );
    }

    #[test]
    fn test_tick_after_stop_cancels_timer() {
        let state = receive(
            running_state("BATCH-1"),
            Err(BatchError::Poll("gateway timeout".to_string())),
        )
        .state;
        let epoch = state.epoch;
        let transition = reduce(state, WidgetEvent::Tick { epoch });
        assert_eq!(transition.effects, vec![Effect::CancelTimer]);
    }

    #[test]
    fn test_stale_tick_is_ignored() {
        let state = running_state("BATCH-1");
        let stale = state.epoch - 1;
        let transition = reduce(state.clone(), WidgetEvent::Tick { epoch: stale });
        assert!(transition.effects.is_empty());
        assert_eq!(transition.state, state);
    }

    #[test]
    fn test_processing_updates_progress() {
        let transition = receive(
            running_state("BATCH-1"),
            Ok(status(JobStatus::Processing, 500, 2000, 0)),
        );
        assert_eq!(transition.state.job.progress_percent, 25.0);
        assert_eq!(transition.state.job.status, JobStatus::Processing);
        assert!(transition.state.job.is_running);
        assert!(transition.effects.is_empty());
        assert_eq!(transition.state.button_label(), "Status: Processing");
    }

    #[test]
    fn test_processed_beyond_total_fails_as_poll_error() {
        let transition = receive(
            running_state("BATCH-1"),
            Ok(status(JobStatus::Processing, 3, 2, 0)),
        );
        assert!(transition.state.job.is_errored);
        assert!(!transition.state.job.is_running);
        assert_eq!(transition.state.job.progress_percent, 0.0);
        assert!(matches!(transition.state.job.error, Some(BatchError::Poll(_))));
        assert_eq!(transition.effects, vec![Effect::CancelTimer]);
    }

    #[test]
    fn test_error_count_takes_precedence_over_status() {
        for job_status in [JobStatus::Processing, JobStatus::Completed, JobStatus::Holding] {
            let mut reported = status(job_status, 1, 2, 1);
            reported.extended_status = Some("First error: row locked".to_string());
            let transition = receive(running_state("BATCH-1"), Ok(reported));

            assert!(transition.state.job.is_errored);
            assert!(!transition.state.job.is_running);
            assert_eq!(transition.state.job.error_message(), "First error: row locked");
            assert_eq!(transition.effects, vec![Effect::CancelTimer]);
        }
    }

    #[test]
    fn test_completed_forces_full_progress_and_schedules_reset() {
        let running = receive(
            running_state("BATCH-1"),
            Ok(status(JobStatus::Processing, 10, 2000, 0)),
        )
        .state;
        let epoch = running.epoch;
        let transition = receive(running, Ok(status(JobStatus::Completed, 1990, 2000, 0)));

        assert_eq!(transition.state.job.progress_percent, 100.0);
        assert_eq!(
            transition.effects,
            vec![Effect::CancelTimer, Effect::ScheduleReset { epoch }]
        );

        let tick = reduce(transition.state.clone(), WidgetEvent::Tick { epoch });
        assert_eq!(tick.effects, vec![Effect::CancelTimer]);

        let reset = reduce(transition.state, WidgetEvent::CompletionDelayElapsed { epoch });
        assert_defaults(&reset.state.job);
        assert!(!reset.state.modal_open);

        let again = reduce(reset.state.clone(), WidgetEvent::CompletionDelayElapsed { epoch });
        assert!(again.effects.is_empty());
        assert_eq!(again.state, reset.state);
    }

    #[test]
    fn test_aborted_and_failed_mention_status() {
        for (job_status, word) in [(JobStatus::Aborted, "Aborted"), (JobStatus::Failed, "Failed")] {
            let transition = receive(running_state("BATCH-1"), Ok(status(job_status, 0, 10, 0)));
            assert!(transition.state.job.is_errored);
            assert!(!transition.state.job.is_running);
            assert!(transition.state.job.error_message().contains(word));
            assert!(matches!(transition.state.job.error, Some(BatchError::Job(_))));
        }
    }

    #[test]
    fn test_other_statuses_only_stored() {
        let before = running_state("BATCH-1");
        let transition = receive(before.clone(), Ok(status(JobStatus::Preparing, 0, 0, 0)));
        assert_eq!(transition.state.job.status, JobStatus::Preparing);
        assert_eq!(transition.state.job.progress_percent, before.job.progress_percent);
        assert!(transition.state.job.is_running);
        assert!(transition.effects.is_empty());
    }

    #[test]
    fn test_close_in_error_state_resets_everything() {
        let errored = receive(
            running_state("BATCH-1"),
            Ok(status(JobStatus::Failed, 0, 10, 0)),
        )
        .state;
        let transition = reduce(errored.clone(), WidgetEvent::CloseModal);
        assert_defaults(&transition.state.job);
        assert!(!transition.state.modal_open);
        assert!(transition.state.epoch > errored.epoch);
        assert_eq!(transition.state.batch_size_input, "2000");
        assert_eq!(transition.state.grouping_key.as_deref(), Some("Measles"));
    }

    #[test]
    fn test_close_while_running_keeps_tracking() {
        let running = running_state("BATCH-1");
        let transition = reduce(running.clone(), WidgetEvent::CloseModal);
        assert!(!transition.state.modal_open);
        assert_eq!(transition.state.job, running.job);
        assert!(transition.effects.is_empty());
    }

    #[test]
    fn test_cancel_resets_only_when_idle() {
        let running = running_state("BATCH-1");
        let ignored = reduce(running.clone(), WidgetEvent::Cancel);
        assert_eq!(ignored.state, running);
        assert!(ignored.effects.is_empty());

        let idle = reduce(ready_state(), WidgetEvent::Cancel);
        assert_defaults(&idle.state.job);
        assert!(!idle.state.modal_open);
    }

    #[test]
    fn test_late_status_after_reset_is_discarded() {
        let running = running_state("BATCH-1");
        let old_epoch = running.epoch;
        let errored = receive(running, Err(BatchError::Poll("connection reset".to_string()))).state;
        let reset = reduce(errored, WidgetEvent::CloseModal).state;

        let late = reduce(
            reset.clone(),
            WidgetEvent::StatusReceived {
                epoch: old_epoch,
                job_id: "BATCH-1".to_string(),
                result: Ok(status(JobStatus::Processing, 5, 10, 0)),
            },
        );
        assert_eq!(late.state, reset);
        assert!(late.effects.is_empty());
    }

    #[test]
    fn test_grouping_key_failure_enters_error_state() {
        let transition = reduce(
            WidgetState::new(2000),
            WidgetEvent::GroupingKeyLoaded(Err(BatchError::RecordFetch("no access".to_string()))),
        );
        assert!(transition.state.job.is_errored);
        assert!(transition.state.ok_disabled());
        assert_eq!(transition.state.job.error_message(), "no access");
    }
}

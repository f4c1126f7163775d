// ABOUTME: Error taxonomy for batch submission and tracking
// ABOUTME: Every variant carries the detail string that is shown to the user

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    Input(String),
    RecordFetch(String),
    Submit(String),
    Poll(String),
    Job(String),
}

impl BatchError {
    /// The message displayed in the modal, without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            BatchError::Input(msg)
            | BatchError::RecordFetch(msg)
            | BatchError::Submit(msg)
            | BatchError::Poll(msg)
            | BatchError::Job(msg) => msg,
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BatchError::Input(msg) => write!(f, "Input error: {}", msg),
            BatchError::RecordFetch(msg) => write!(f, "Record fetch error: {}", msg),
            BatchError::Submit(msg) => write!(f, "Batch submission error: {}", msg),
            BatchError::Poll(msg) => write!(f, "Status poll error: {}", msg),
            BatchError::Job(msg) => write!(f, "Job error: {}", msg),
        }
    }
}

impl std::error::Error for BatchError {}

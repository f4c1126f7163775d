// ABOUTME: Data structures for batch launch requests and job status responses
// ABOUTME: Status responses are validated strictly so malformed payloads fail closed

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBatchRequest {
    pub grouping_key: String,
    pub batch_size: u32,
    pub filter_condition: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBatchResponse {
    pub job_id: String,
}

/// Status values reported by the platform's async job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JobStatus {
    #[default]
    Holding,
    Queued,
    Preparing,
    Processing,
    Completed,
    Aborted,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Holding => "Holding",
            Self::Queued => "Queued",
            Self::Preparing => "Preparing",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Aborted => "Aborted",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchStatus {
    #[serde(rename = "Status")]
    pub status: JobStatus,
    #[serde(rename = "JobItemsProcessed")]
    pub items_processed: u64,
    #[serde(rename = "TotalJobItems")]
    pub items_total: u64,
    #[serde(rename = "NumberOfErrors")]
    pub error_count: u64,
    #[serde(rename = "ExtendedStatus", default)]
    pub extended_status: Option<String>,
}

impl BatchStatus {
    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.items_processed > self.items_total {
            return Err(format!(
                "job reports {} items processed out of {} total",
                self.items_processed, self.items_total
            ));
        }
        Ok(())
    }

    pub fn progress_percent(&self) -> f64 {
        if self.items_total == 0 {
            return 0.0;
        }
        self.items_processed as f64 / self.items_total as f64 * 100.0
    }

    /// Message shown when the job reports errors.
    pub fn error_summary(&self) -> String {
        match self.extended_status.as_deref().map(str::trim) {
            Some(extended) if !extended.is_empty() => extended.to_string(),
            _ => format!("Job reported {} error(s)", self.error_count),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordResponse {
    pub fields: HashMap<String, FieldValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldValue {
    pub value: Option<serde_json::Value>,
}

// ABOUTME: External collaborators of the batch widget
// ABOUTME: Trait seams for batch launch, status polling and record field lookup

pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::error::BatchError;

pub use client::RemoteClient;
pub use models::{BatchStatus, JobStatus, StartBatchRequest};

#[async_trait]
pub trait BatchApi: Send + Sync {
    /// Launches the batch job and returns its identifier.
    async fn start_batch(&self, request: &StartBatchRequest) -> Result<String, BatchError>;

    async fn get_batch_status(&self, job_id: &str) -> Result<BatchStatus, BatchError>;
}

#[async_trait]
pub trait RecordApi: Send + Sync {
    /// Reads a single `Object.Field` value from the record identified by `record_id`.
    async fn fetch_record_field(
        &self,
        record_id: &str,
        field: &str,
    ) -> Result<String, BatchError>;
}

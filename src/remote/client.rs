// ABOUTME: HTTP client for the batch launch, job status and record APIs
// ABOUTME: Handles request building, status checks and strict response parsing

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::models::{BatchStatus, RecordResponse, StartBatchRequest, StartBatchResponse};
use super::{BatchApi, RecordApi};
use crate::error::BatchError;

pub struct RemoteClient {
    client: Client,
    api_base_url: String,
}

impl RemoteClient {
    pub fn new(api_base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn submit_batch(&self, request: &StartBatchRequest) -> Result<String> {
        let url = format!("{}/batches", self.api_base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .context("Failed to submit batch to remote service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Batch submission failed with status {}: {}", status, body);
        }

        let started: StartBatchResponse = response
            .json()
            .await
            .context("Failed to parse batch submission response")?;

        if started.job_id.trim().is_empty() {
            anyhow::bail!("Remote service returned an empty job id");
        }

        Ok(started.job_id)
    }

    pub async fn fetch_status(&self, job_id: &str) -> Result<BatchStatus> {
        let url = format!("{}/batches/{}", self.api_base_url, job_id);

        let response = self.client.get(&url).send().await.context(
            "Failed to get batch status from remote service. The remote service may be unavailable",
        )?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to get batch status {}: {}", status, body);
        }

        let batch_status: BatchStatus = response
            .json()
            .await
            .context("Failed to parse batch status")?;

        batch_status
            .validate()
            .map_err(|msg| anyhow::anyhow!("Invalid batch status: {}", msg))?;

        Ok(batch_status)
    }

    pub async fn fetch_field(&self, record_id: &str, field: &str) -> Result<String> {
        let url = format!("{}/records/{}", self.api_base_url, record_id);
        let field_name = field.rsplit('.').next().unwrap_or(field);

        let response = self
            .client
            .get(&url)
            .query(&[("fields", field)])
            .send()
            .await
            .context("Failed to fetch record from remote service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to fetch record {} ({}): {}", record_id, status, body);
        }

        let record: RecordResponse = response
            .json()
            .await
            .context("Failed to parse record response")?;

        match record.fields.get(field_name).and_then(|f| f.value.as_ref()) {
            Some(serde_json::Value::String(value)) => Ok(value.clone()),
            Some(serde_json::Value::Null) | None => {
                anyhow::bail!("Record {} has no value for {}", record_id, field)
            }
            Some(other) => Ok(other.to_string()),
        }
    }
}

#[async_trait]
impl BatchApi for RemoteClient {
    async fn start_batch(&self, request: &StartBatchRequest) -> Result<String, BatchError> {
        self.submit_batch(request)
            .await
            .map_err(|e| BatchError::Submit(format!("{:#}", e)))
    }

    async fn get_batch_status(&self, job_id: &str) -> Result<BatchStatus, BatchError> {
        self.fetch_status(job_id)
            .await
            .map_err(|e| BatchError::Poll(format!("{:#}", e)))
    }
}

#[async_trait]
impl RecordApi for RemoteClient {
    async fn fetch_record_field(
        &self,
        record_id: &str,
        field: &str,
    ) -> Result<String, BatchError> {
        self.fetch_field(record_id, field)
            .await
            .map_err(|e| BatchError::RecordFetch(format!("{:#}", e)))
    }
}

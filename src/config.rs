// ABOUTME: TOML configuration for the batch API endpoint and tracking timings
// ABOUTME: Every key is optional; missing values fall back to defaults

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::tracker::TrackerSettings;

pub const DEFAULT_RECORD_FIELD: &str = "Eligibility_Vaccine_Group__c.Disease__c";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub tracker: TrackerConfig,
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub poll_interval_ms: u64,
    pub completion_reset_delay_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            completion_reset_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub batch_size: u32,
    pub record_field: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            batch_size: 2000,
            record_field: DEFAULT_RECORD_FIELD.to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            anyhow::bail!("api.base_url must not be empty");
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be positive");
        }
        if self.tracker.poll_interval_ms == 0 {
            anyhow::bail!("tracker.poll_interval_ms must be positive");
        }
        if self.defaults.batch_size == 0 {
            anyhow::bail!("defaults.batch_size must be a positive integer");
        }
        if self.defaults.record_field.trim().is_empty() {
            anyhow::bail!("defaults.record_field must not be empty");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            poll_interval: Duration::from_millis(self.tracker.poll_interval_ms),
            completion_reset_delay: Duration::from_millis(self.tracker.completion_reset_delay_ms),
        }
    }
}

// ABOUTME: Library entry point for launching and tracking remote eligibility batches
// ABOUTME: Exposes the widget state machine, its async driver and the remote API client

pub mod config;
pub mod error;
pub mod remote;
pub mod tracker;

pub use error::BatchError;
pub use remote::{BatchApi, RecordApi, RemoteClient};
pub use tracker::{BatchWidget, TrackerSettings, WidgetEvent, WidgetState};

//! Where a generation run reports its progress.
//!
//! The pipeline is written once against `ProgressSink`. `EventStreamSink` feeds the
//! SSE response of the streaming endpoint; `JobSink` writes the job store polled by
//! the background endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::jobs::store::{JobStatus, JobStore, JobUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStep {
    Fetching,
    Analyzing,
    Generating,
    Formatting,
}

impl From<GenerationStep> for JobStatus {
    fn from(step: GenerationStep) -> Self {
        match step {
            GenerationStep::Fetching => JobStatus::Fetching,
            GenerationStep::Analyzing => JobStatus::Analyzing,
            GenerationStep::Generating => JobStatus::Generating,
            GenerationStep::Formatting => JobStatus::Formatting,
        }
    }
}

/// One `data:` payload on the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GenerationEvent {
    Progress { step: GenerationStep, progress: u8 },
    Content { data: String },
    Complete { result: Value },
    Error { message: String },
}

/// How the caller receives the outcome. Streamed runs also fetch competitor sites
/// and consume the model output incrementally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Streamed,
    Background,
}

#[async_trait]
pub trait ProgressSink: Send + Sync {
    fn delivery(&self) -> Delivery;

    async fn progress(&self, step: GenerationStep, progress: u8);

    /// A text delta from the model. Only streamed sinks forward these.
    async fn content(&self, delta: &str);

    async fn complete(&self, result: Value);

    async fn fail(&self, message: &str);

    /// True once nobody is listening any more; the pipeline stops at the next checkpoint.
    fn is_closed(&self) -> bool;
}

/// Forwards events to the SSE response body.
pub struct EventStreamSink {
    tx: mpsc::Sender<GenerationEvent>,
}

impl EventStreamSink {
    pub fn new(tx: mpsc::Sender<GenerationEvent>) -> Self {
        Self { tx }
    }

    async fn send(&self, event: GenerationEvent) {
        // A send error means the client disconnected; `is_closed` reports it.
        let _ = self.tx.send(event).await;
    }
}

#[async_trait]
impl ProgressSink for EventStreamSink {
    fn delivery(&self) -> Delivery {
        Delivery::Streamed
    }

    async fn progress(&self, step: GenerationStep, progress: u8) {
        self.send(GenerationEvent::Progress { step, progress }).await;
    }

    async fn content(&self, delta: &str) {
        self.send(GenerationEvent::Content {
            data: delta.to_string(),
        })
        .await;
    }

    async fn complete(&self, result: Value) {
        self.send(GenerationEvent::Complete { result }).await;
    }

    async fn fail(&self, message: &str) {
        self.send(GenerationEvent::Error {
            message: message.to_string(),
        })
        .await;
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Mirrors the run into one job store record.
pub struct JobSink {
    store: JobStore,
    job_id: String,
}

impl JobSink {
    pub fn new(store: JobStore, job_id: String) -> Self {
        Self { store, job_id }
    }
}

#[async_trait]
impl ProgressSink for JobSink {
    fn delivery(&self) -> Delivery {
        Delivery::Background
    }

    async fn progress(&self, step: GenerationStep, progress: u8) {
        self.store
            .update(&self.job_id, JobUpdate::phase(step.into(), progress));
    }

    async fn content(&self, _delta: &str) {}

    async fn complete(&self, result: Value) {
        self.store.update(&self.job_id, JobUpdate::completed(result));
    }

    async fn fail(&self, message: &str) {
        self.store.update(&self.job_id, JobUpdate::failed(message));
    }

    fn is_closed(&self) -> bool {
        false
    }
}

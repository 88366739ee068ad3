//! Axum route handler for background job polling.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::jobs::store::{Job, JobStatus};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            status: job.status,
            progress: job.progress,
            result: job.result,
            error: job.error,
        }
    }
}

/// GET /api/status/:job_id
pub async fn handle_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let job = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;
    Ok(Json(job.into()))
}

//! Axum route handlers for the Generation API.

use axum::{
    extract::{Multipart, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::generation::pipeline::{run_generation, GenerationRequest, PipelineDeps};
use crate::generation::sink::{EventStreamSink, JobSink};
use crate::jobs::store::{JobStatus, JobStore};
use crate::personas::form::PersonaFormData;
use crate::sources::files::UploadedFile;
use crate::state::AppState;

/// Events buffered between the pipeline task and a slow SSE client.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundJobResponse {
    pub job_id: String,
    pub status: JobStatus,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/generate
///
/// Streams `data: <json>` events until the run completes or fails.
pub async fn handle_generate_stream(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let deps = pipeline_deps(&state)?;
    let request = read_submission(multipart).await?;
    info!(
        "Streaming generation for {} ({} personas, {} files)",
        request.form.product_name,
        request.form.persona_count,
        request.files.len()
    );

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(async move {
        let sink = EventStreamSink::new(tx);
        let _ = run_generation(&deps, request, &sink).await;
    });

    let events = ReceiverStream::new(rx).map(|event| Event::default().json_data(event));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// POST /api/generate/background
///
/// Accepts the run, returns its job id immediately and leaves the work to a spawned task.
pub async fn handle_generate_background(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BackgroundJobResponse>, AppError> {
    let deps = pipeline_deps(&state)?;
    let request = read_submission(multipart).await?;

    let job_id = JobStore::new_id();
    let job = state.jobs.create(&job_id);
    info!("Created job {job_id} for {}", request.form.product_name);

    let sink = JobSink::new(state.jobs.clone(), job_id.clone());
    tokio::spawn(async move {
        let _ = run_generation(&deps, request, &sink).await;
    });

    Ok(Json(BackgroundJobResponse {
        job_id,
        status: job.status,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Request parsing
// ────────────────────────────────────────────────────────────────────────────

fn pipeline_deps(state: &AppState) -> Result<PipelineDeps, AppError> {
    let llm = state
        .llm
        .clone()
        .ok_or_else(|| AppError::Configuration("ANTHROPIC_API_KEY not configured".to_string()))?;
    Ok(PipelineDeps {
        llm,
        reader: state.reader.clone(),
        settings: state.config.generation,
    })
}

/// Reads the `formData` JSON part and every `files` part from the multipart body.
async fn read_submission(mut multipart: Multipart) -> Result<GenerationRequest, AppError> {
    let mut form_json: Option<String> = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("formData") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| AppError::Validation("Missing form data".to_string()))?;
                form_json = Some(text);
            }
            Some("files") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file {name}: {e}")))?;
                debug!("Received file {name} ({content_type}, {} bytes)", bytes.len());
                files.push(UploadedFile {
                    name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    let form_json = form_json
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Missing form data".to_string()))?;
    let form = parse_form(&form_json)?;

    Ok(GenerationRequest { form, files })
}

/// Parses, validates and normalizes the JSON-encoded form.
pub fn parse_form(json: &str) -> Result<PersonaFormData, AppError> {
    let form: PersonaFormData = serde_json::from_str(json)
        .map_err(|e| AppError::Validation(format!("Invalid form data: {e}")))?;
    form.validate()?;
    Ok(form.normalized())
}

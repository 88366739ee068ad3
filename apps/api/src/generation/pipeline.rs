//! The five-phase persona generation run shared by both endpoints.
//!
//! fetching -> analyzing -> generating -> formatting -> completed | error.
//! Per-URL and per-file failures are recovered inside their phase; only a model
//! failure or an unparseable response aborts the run.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures_util::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::GenerationSettings;
use crate::generation::prompts::{build_persona_prompt, PromptContext};
use crate::generation::response_parser::{extract_json, ParseError, ParseStrategy};
use crate::generation::sink::{Delivery, GenerationStep, ProgressSink};
use crate::llm_client::{LanguageModel, LlmError};
use crate::personas::form::PersonaFormData;
use crate::sources::files::{extract_all, format_files_for_prompt, UploadedFile};
use crate::sources::reader::{fetch_many, summarize_website_content, PageReader};

const NO_WEBSITE: &str = "(No website provided)";
const COMPETITOR_SEPARATOR: &str = "\n\n---\n\n";

const FETCH_START: u8 = 10;
const FETCH_DONE: u8 = 25;
const ANALYZE_START: u8 = 35;
const ANALYZE_DONE: u8 = 45;
const GENERATE_START: u8 = 50;
const GENERATE_CEILING: u8 = 95;
const FORMAT_START: u8 = 95;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Generation cancelled by client")]
    Cancelled,
}

/// Collaborators the pipeline needs. Cheap to clone into a spawned task.
#[derive(Clone)]
pub struct PipelineDeps {
    pub llm: Arc<dyn LanguageModel>,
    pub reader: Arc<dyn PageReader>,
    pub settings: GenerationSettings,
}

/// A validated, normalized form plus the raw uploads.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub form: PersonaFormData,
    pub files: Vec<UploadedFile>,
}

/// Runs the pipeline and reports the outcome to `sink`.
///
/// A run whose streamed client went away stops quietly without an `error` event.
pub async fn run_generation(
    deps: &PipelineDeps,
    request: GenerationRequest,
    sink: &dyn ProgressSink,
) -> Result<Value, GenerationError> {
    match generate(deps, &request, sink).await {
        Ok(result) => {
            info!(
                "Generated personas for {} ({:?})",
                request.form.product_name,
                sink.delivery()
            );
            sink.complete(result.clone()).await;
            Ok(result)
        }
        Err(GenerationError::Cancelled) => {
            info!("Client disconnected; stopping generation for {}", request.form.product_name);
            Err(GenerationError::Cancelled)
        }
        Err(e) => {
            error!("Generation error: {e}");
            sink.fail(&e.to_string()).await;
            Err(e)
        }
    }
}

async fn generate(
    deps: &PipelineDeps,
    request: &GenerationRequest,
    sink: &dyn ProgressSink,
) -> Result<Value, GenerationError> {
    let form = &request.form;
    let delivery = sink.delivery();

    sink.progress(GenerationStep::Fetching, FETCH_START).await;
    let (website_content, competitor_content) = tokio::join!(
        primary_website_content(deps, &form.website_url),
        competitor_content(deps, form, delivery),
    );
    sink.progress(GenerationStep::Fetching, FETCH_DONE).await;
    ensure_open(sink)?;

    sink.progress(GenerationStep::Analyzing, ANALYZE_START).await;
    let processed = extract_all(&request.files).await;
    let file_content = format_files_for_prompt(&processed, deps.settings.file_char_budget);
    let prompt = build_persona_prompt(&PromptContext {
        form,
        website_content: &website_content,
        competitor_content: &competitor_content,
        file_content: &file_content,
    });
    sink.progress(GenerationStep::Analyzing, ANALYZE_DONE).await;
    ensure_open(sink)?;

    sink.progress(GenerationStep::Generating, GENERATE_START).await;
    let text = match delivery {
        Delivery::Streamed => stream_response(deps, &prompt, sink).await?,
        Delivery::Background => deps.llm.complete(&prompt).await?,
    };

    sink.progress(GenerationStep::Formatting, FORMAT_START).await;
    let (mut result, strategy) = extract_json(&text)?;
    if strategy != ParseStrategy::Direct {
        warn!("Model response was not bare JSON; recovered with {strategy:?}");
    }
    stamp_metadata(&mut result, &form.product_name);
    Ok(result)
}

async fn primary_website_content(deps: &PipelineDeps, url: &str) -> String {
    if url.is_empty() {
        return NO_WEBSITE.to_string();
    }
    match deps.reader.fetch(url).await {
        Ok(content) => summarize_website_content(&content, deps.settings.website_char_budget),
        Err(e) => {
            warn!("Error fetching primary website: {e}");
            format!("Website URL: {url}\n(Content could not be fetched automatically)")
        }
    }
}

async fn competitor_content(
    deps: &PipelineDeps,
    form: &PersonaFormData,
    delivery: Delivery,
) -> String {
    if delivery == Delivery::Background || form.competitor_urls.is_empty() {
        return String::new();
    }
    let urls: Vec<String> = form
        .competitor_urls
        .iter()
        .take(deps.settings.max_competitors)
        .cloned()
        .collect();
    fetch_many(deps.reader.as_ref(), &urls)
        .await
        .iter()
        .map(|site| summarize_website_content(site, deps.settings.website_char_budget))
        .collect::<Vec<_>>()
        .join(COMPETITOR_SEPARATOR)
}

/// Consumes the model stream, forwarding each delta and a length-based progress estimate.
async fn stream_response(
    deps: &PipelineDeps,
    prompt: &str,
    sink: &dyn ProgressSink,
) -> Result<String, GenerationError> {
    let mut deltas = deps.llm.stream(prompt).await?;
    let mut full = String::new();
    let mut chars = 0usize;
    let mut reported = GENERATE_START;

    while let Some(delta) = deltas.next().await {
        let delta = delta?;
        ensure_open(sink)?;

        chars += delta.chars().count();
        full.push_str(&delta);
        sink.content(&delta).await;

        let estimate = estimate_progress(chars, deps.settings.expected_response_chars);
        if estimate != reported {
            reported = estimate;
            sink.progress(GenerationStep::Generating, estimate).await;
        }
    }
    Ok(full)
}

/// `min(95, 50 + 45 * received / expected)`, rounded down.
pub fn estimate_progress(received_chars: usize, expected_chars: usize) -> u8 {
    let span = (GENERATE_CEILING - GENERATE_START) as usize;
    let expected = expected_chars.max(1);
    let gained = received_chars.saturating_mul(span) / expected;
    (GENERATE_START as usize + gained).min(GENERATE_CEILING as usize) as u8
}

fn stamp_metadata(result: &mut Value, product_name: &str) {
    if let Value::Object(map) = result {
        map.insert(
            "generatedAt".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        map.insert(
            "productName".to_string(),
            Value::String(product_name.to_string()),
        );
    }
}

fn ensure_open(sink: &dyn ProgressSink) -> Result<(), GenerationError> {
    if sink.is_closed() {
        Err(GenerationError::Cancelled)
    } else {
        Ok(())
    }
}

//! HTTP client for a running persona server.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::generation::sink::{GenerationEvent, GenerationStep};
use crate::jobs::JobStatus;
use crate::llm_client::streaming::LineBuffer;
use crate::personas::form::PersonaFormData;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_POLLS: u32 = 150;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error - please check your connection and try again.")]
    Network(#[from] reqwest::Error),

    /// The server reported a failure; the message is shown as-is.
    #[error("{0}")]
    Server(String),

    #[error("Generation incomplete - the request may have timed out. Please try again.")]
    Incomplete,

    #[error("Generation still running after {0} status checks. Please try again.")]
    TimedOut(u32),

    #[error("Failed to generate PDF")]
    Download,

    #[error("Invalid form data: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to access {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A research document to upload alongside the form.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::File {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = content_type_for(&name).to_string();
        Ok(Self {
            name,
            content_type,
            bytes,
        })
    }
}

fn content_type_for(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        "application/pdf"
    } else if lower.ends_with(".docx") {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    } else {
        "application/octet-stream"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedJob {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusReply {
    status: JobStatus,
    #[serde(default)]
    progress: u8,
    result: Option<Value>,
    error: Option<String>,
}

pub struct PersonaClient {
    http: Client,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl PersonaClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::builder().build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        })
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Submits to the streaming endpoint and consumes its events until `complete`.
    pub async fn generate_streaming(
        &self,
        form: &PersonaFormData,
        files: &[Attachment],
        mut on_progress: impl FnMut(Option<GenerationStep>, u8),
    ) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(self.url("/api/generate"))
            .multipart(multipart(form, files)?)
            .send()
            .await?;
        let mut body = ensure_success(response).await?.bytes_stream();

        let mut lines = LineBuffer::default();
        while let Some(chunk) = body.next().await {
            for line in lines.push(&chunk?) {
                match parse_event_line(&line) {
                    Some(GenerationEvent::Progress { step, progress }) => {
                        on_progress(Some(step), progress)
                    }
                    Some(GenerationEvent::Complete { result }) => return Ok(result),
                    Some(GenerationEvent::Error { message }) => {
                        return Err(ClientError::Server(message))
                    }
                    Some(GenerationEvent::Content { .. }) | None => {}
                }
            }
        }
        Err(ClientError::Incomplete)
    }

    /// Submits to the background endpoint and polls the job until it is terminal.
    pub async fn generate_polling(
        &self,
        form: &PersonaFormData,
        files: &[Attachment],
        mut on_progress: impl FnMut(Option<GenerationStep>, u8),
    ) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(self.url("/api/generate/background"))
            .multipart(multipart(form, files)?)
            .send()
            .await?;
        let accepted: AcceptedJob = ensure_success(response).await?.json().await?;
        debug!("Polling job {}", accepted.job_id);

        let status_url = self.url(&format!("/api/status/{}", accepted.job_id));
        for _ in 0..self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            let reply: StatusReply = ensure_success(self.http.get(&status_url).send().await?)
                .await?
                .json()
                .await?;
            match reply.status {
                JobStatus::Completed => return reply.result.ok_or(ClientError::Incomplete),
                JobStatus::Error => {
                    return Err(ClientError::Server(
                        reply.error.unwrap_or_else(|| "Generation failed".to_string()),
                    ))
                }
                status => on_progress(step_for(status), reply.progress),
            }
        }
        Err(ClientError::TimedOut(self.max_polls))
    }

    /// Posts a result to the export endpoint and writes the PDF to `path`.
    pub async fn download(&self, result: &Value, path: &Path) -> Result<usize, ClientError> {
        let response = self
            .http
            .post(self.url("/api/download"))
            .json(result)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Download);
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|source| ClientError::File {
                path: path.display().to_string(),
                source,
            })?;
        Ok(bytes.len())
    }
}

fn multipart(form: &PersonaFormData, files: &[Attachment]) -> Result<Form, ClientError> {
    let mut body = Form::new().text("formData", serde_json::to_string(form)?);
    for file in files {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;
        body = body.part("files", part);
    }
    Ok(body)
}

/// Passes a 2xx response through; otherwise surfaces the server's `error` message.
async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let fallback = format!(
        "Generation failed: {}",
        status.canonical_reason().unwrap_or("Unknown error")
    );
    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(fallback);
    Err(ClientError::Server(message))
}

fn step_for(status: JobStatus) -> Option<GenerationStep> {
    match status {
        JobStatus::Fetching => Some(GenerationStep::Fetching),
        JobStatus::Analyzing => Some(GenerationStep::Analyzing),
        JobStatus::Generating => Some(GenerationStep::Generating),
        JobStatus::Formatting => Some(GenerationStep::Formatting),
        _ => None,
    }
}

/// `data: {...}` -> event. Anything else, including malformed JSON, is skipped.
fn parse_event_line(line: &str) -> Option<GenerationEvent> {
    let data = line.strip_prefix("data:")?;
    serde_json::from_str(data.trim_start()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personas::form::PersonaFormData;
    use crate::testing::{app_state, spawn_server};
    use serde_json::json;

    fn form() -> PersonaFormData {
        serde_json::from_value(json!({
            "productName": "Acme",
            "targetAudience": "freelance designers",
            "personaCount": 2
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_event_line() {
        assert_eq!(
            parse_event_line(r#"data: {"type":"progress","step":"analyzing","progress":35}"#),
            Some(GenerationEvent::Progress {
                step: GenerationStep::Analyzing,
                progress: 35
            })
        );
        assert_eq!(
            parse_event_line("data:{\"type\":\"error\",\"message\":\"boom\"}"),
            Some(GenerationEvent::Error {
                message: "boom".into()
            })
        );
        assert!(parse_event_line("data: {truncated").is_none());
        assert!(parse_event_line(": keep-alive").is_none());
        assert!(parse_event_line("").is_none());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("Notes.PDF"), "application/pdf");
        assert!(content_type_for("brief.docx").contains("wordprocessingml"));
        assert_eq!(content_type_for("notes.txt"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_streaming_against_local_server() {
        let base = spawn_server(app_state(true)).await;
        let client = PersonaClient::new(base).unwrap();
        let mut seen = Vec::new();
        let result = client
            .generate_streaming(&form(), &[], |_, p| seen.push(p))
            .await
            .unwrap();
        assert_eq!(result["productName"], "Acme");
        assert_eq!(seen.first(), Some(&10));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_polling_against_local_server() {
        let base = spawn_server(app_state(true)).await;
        let client = PersonaClient::new(base)
            .unwrap()
            .with_polling(Duration::from_millis(20), 100);
        let attachment = Attachment {
            name: "notes.txt".into(),
            content_type: "text/plain".into(),
            bytes: b"late invoices".to_vec(),
        };
        let mut seen = Vec::new();
        let result = client
            .generate_polling(&form(), &[attachment], |_, p| seen.push(p))
            .await
            .unwrap();
        assert_eq!(result["personas"].as_array().unwrap().len(), 2);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    }

    #[tokio::test]
    async fn test_polling_gives_up_after_max_polls() {
        let base = spawn_server(app_state(true)).await;
        let client = PersonaClient::new(base)
            .unwrap()
            .with_polling(Duration::from_millis(1), 0);
        let err = client
            .generate_polling(&form(), &[], |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::TimedOut(0)));
    }

    #[tokio::test]
    async fn test_server_error_message_is_surfaced() {
        let base = spawn_server(app_state(false)).await;
        let client = PersonaClient::new(base).unwrap();
        let err = client
            .generate_streaming(&form(), &[], |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ANTHROPIC_API_KEY not configured");
    }

    #[tokio::test]
    async fn test_download_writes_pdf() {
        let base = spawn_server(app_state(false)).await;
        let client = PersonaClient::new(base).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme.pdf");

        let written = client
            .download(&json!({"personas": [{"type": "The Hustler"}], "productName": "Acme"}), &path)
            .await
            .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), written);
        assert!(bytes.starts_with(b"%PDF"));

        let err = client.download(&json!({"personas": []}), &path).await.unwrap_err();
        assert!(matches!(err, ClientError::Download));
    }
}

//! Axum route handler for the PDF download.

use axum::{
    body::Bytes,
    http::header,
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::errors::AppError;
use crate::personas::result::GenerationResult;
use crate::render::{document::compose_document, pdf::render_pdf};

/// POST /api/download
///
/// Body is the `result` object of a completed generation; the response is the PDF.
pub async fn handle_download(body: Bytes) -> Result<Response, AppError> {
    let result = parse_result(&body)?;
    let filename = download_filename(&result.product_name);
    info!(
        "Rendering PDF for {} ({} personas)",
        result.product_name,
        result.personas.len()
    );

    let pdf = tokio::task::spawn_blocking(move || render_pdf(&compose_document(&result)))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| AppError::Render(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        pdf,
    )
        .into_response())
}

fn parse_result(body: &[u8]) -> Result<GenerationResult, AppError> {
    let invalid = || AppError::Validation("Invalid result data".to_string());
    let result: GenerationResult = serde_json::from_slice(body).map_err(|_| invalid())?;
    if result.personas.is_empty() {
        return Err(invalid());
    }
    Ok(result)
}

/// `Acme Pay!` -> `Acme-Pay--personas.pdf`
pub fn download_filename(product_name: &str) -> String {
    let stem: String = product_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    if stem.is_empty() {
        "personas.pdf".to_string()
    } else {
        format!("{stem}-personas.pdf")
    }
}

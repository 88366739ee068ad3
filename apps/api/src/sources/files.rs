//! Turns uploaded research documents (PDF, DOCX) into prompt text.

use std::io::{Cursor, Read};

use bytes::Bytes;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::{debug, warn};

use crate::sources::reader::truncate_chars;

const PDF_MIME: &str = "application/pdf";
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("Failed to process PDF: {0}")]
    Pdf(String),

    #[error("Failed to process DOCX: {0}")]
    Docx(String),

    #[error("Extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A file part received from the client, kept in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

/// Text pulled out of one uploaded document.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFile {
    pub name: String,
    pub kind: DocumentKind,
    pub content: String,
}

/// Picks the extractor from the declared MIME type, falling back to the file extension.
pub fn detect_kind(name: &str, mime: &str) -> Result<DocumentKind, ExtractError> {
    let lower = name.to_ascii_lowercase();
    if mime == PDF_MIME || lower.ends_with(".pdf") {
        Ok(DocumentKind::Pdf)
    } else if mime == DOCX_MIME || lower.ends_with(".docx") {
        Ok(DocumentKind::Docx)
    } else {
        let shown = if mime.is_empty() { name } else { mime };
        Err(ExtractError::Unsupported(shown.to_string()))
    }
}

/// Extracts the text of one file. Parsing is CPU-bound, so it runs on the blocking pool.
pub async fn extract_file_text(file: &UploadedFile) -> Result<ProcessedFile, ExtractError> {
    let kind = detect_kind(&file.name, &file.content_type)?;
    let bytes = file.bytes.clone();

    let content = tokio::task::spawn_blocking(move || match kind {
        DocumentKind::Pdf => extract_pdf_text(&bytes),
        DocumentKind::Docx => extract_docx_text(&bytes),
    })
    .await??;

    debug!("Extracted {} chars from {}", content.len(), file.name);
    Ok(ProcessedFile {
        name: file.name.clone(),
        kind,
        content,
    })
}

/// Extracts every file, logging and dropping the ones that fail.
pub async fn extract_all(files: &[UploadedFile]) -> Vec<ProcessedFile> {
    let mut processed = Vec::with_capacity(files.len());
    for file in files {
        match extract_file_text(file).await {
            Ok(p) => processed.push(p),
            Err(e) => warn!("Error processing file {}: {e}", file.name),
        }
    }
    processed
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(format!("Failed to open DOCX: {e}")))?;

    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(format!("Failed to find document.xml: {e}")))?;

    let mut xml = String::new();
    document_xml
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::Docx(format!("Failed to read document.xml: {e}")))?;

    parse_document_xml(&xml)
}

/// Collects `w:t` runs, one output line per `w:p` paragraph.
fn parse_document_xml(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"t" => in_text_run = true,
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_run => {
                let decoded = e
                    .unescape()
                    .map_err(|err| ExtractError::Docx(format!("XML decoding error: {err}")))?;
                text.push_str(&decoded);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(format!("XML parsing error: {e}"))),
            _ => {}
        }
    }

    Ok(text.trim_end().to_string())
}

/// Renders extracted documents for the prompt, `max_chars` characters each.
pub fn format_files_for_prompt(files: &[ProcessedFile], max_chars: usize) -> String {
    files
        .iter()
        .map(|file| {
            format!(
                "## Research Document: {}\n{}",
                file.name,
                truncate_chars(&file.content, max_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file(
                    "word/document.xml",
                    zip::write::SimpleFileOptions::default(),
                )
                .unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        buffer.into_inner()
    }

    const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Interview notes</w:t></w:r></w:p>
    <w:p><w:r><w:t xml:space="preserve">Freelancers hate </w:t></w:r><w:r><w:t>chasing invoices &amp; reminders.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn test_detect_kind_by_mime_and_extension() {
        assert_eq!(detect_kind("x.bin", PDF_MIME).unwrap(), DocumentKind::Pdf);
        assert_eq!(detect_kind("Notes.PDF", "").unwrap(), DocumentKind::Pdf);
        assert_eq!(detect_kind("x", DOCX_MIME).unwrap(), DocumentKind::Docx);
        assert_eq!(
            detect_kind("notes.docx", "application/octet-stream").unwrap(),
            DocumentKind::Docx
        );
    }

    #[test]
    fn test_detect_kind_rejects_other_types() {
        let err = detect_kind("photo.png", "image/png").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file type: image/png");
    }

    #[test]
    fn test_parse_document_xml_keeps_paragraphs() {
        let text = parse_document_xml(DOCUMENT_XML).unwrap();
        assert_eq!(
            text,
            "Interview notes\nFreelancers hate chasing invoices & reminders."
        );
    }

    #[tokio::test]
    async fn test_extract_docx_from_upload() {
        let file = UploadedFile {
            name: "notes.docx".to_string(),
            content_type: DOCX_MIME.to_string(),
            bytes: Bytes::from(docx_bytes(DOCUMENT_XML)),
        };
        let processed = extract_file_text(&file).await.unwrap();
        assert_eq!(processed.kind, DocumentKind::Docx);
        assert!(processed.content.starts_with("Interview notes"));
    }

    #[tokio::test]
    async fn test_extract_all_drops_broken_files() {
        let files = vec![
            UploadedFile {
                name: "broken.docx".to_string(),
                content_type: DOCX_MIME.to_string(),
                bytes: Bytes::from_static(b"not a zip"),
            },
            UploadedFile {
                name: "image.png".to_string(),
                content_type: "image/png".to_string(),
                bytes: Bytes::from_static(b"\x89PNG"),
            },
            UploadedFile {
                name: "notes.docx".to_string(),
                content_type: DOCX_MIME.to_string(),
                bytes: Bytes::from(docx_bytes(DOCUMENT_XML)),
            },
        ];
        let processed = extract_all(&files).await;
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].name, "notes.docx");
    }

    #[test]
    fn test_format_files_for_prompt() {
        assert_eq!(format_files_for_prompt(&[], 5000), "");

        let files = vec![
            ProcessedFile {
                name: "a.pdf".to_string(),
                kind: DocumentKind::Pdf,
                content: "abcdef".to_string(),
            },
            ProcessedFile {
                name: "b.docx".to_string(),
                kind: DocumentKind::Docx,
                content: "short".to_string(),
            },
        ];
        assert_eq!(
            format_files_for_prompt(&files, 3),
            "## Research Document: a.pdf\nabc...\n\n## Research Document: b.docx\nsho..."
        );
    }
}

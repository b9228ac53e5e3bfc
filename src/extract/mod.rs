//! Text extraction from uploaded contract files.
//!
//! PDFs are detected by content type or by their `%PDF-` header and run
//! through `pdf-extract`; anything else must be valid UTF-8 text.

use thiserror::Error;
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Errors raised while turning an upload into contract text.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("Unsupported file type: {0}. Upload a PDF or plain text file.")]
    UnsupportedMediaType(String),

    #[error("Failed to read PDF: {0}")]
    Pdf(String),

    #[error("No extractable text found in the uploaded file")]
    Empty,
}

/// Kind of document detected from an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

/// Decide how to read an upload from its content type and leading bytes.
pub fn detect_kind(content_type: Option<&str>, bytes: &[u8]) -> Result<DocumentKind, ExtractError> {
    let content_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_lowercase())
        .filter(|ct| !ct.is_empty());

    if bytes.starts_with(PDF_MAGIC) || content_type.as_deref() == Some("application/pdf") {
        return Ok(DocumentKind::Pdf);
    }

    if std::str::from_utf8(bytes).is_ok() {
        return Ok(DocumentKind::Text);
    }

    Err(ExtractError::UnsupportedMediaType(
        content_type.unwrap_or_else(|| "application/octet-stream".to_string()),
    ))
}

/// Extract normalised contract text from an uploaded file.
pub fn extract_text(
    content_type: Option<&str>,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<String, ExtractError> {
    if bytes.len() > max_bytes {
        return Err(ExtractError::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let raw = match detect_kind(content_type, bytes)? {
        DocumentKind::Pdf => {
            debug!("Extracting text from {} byte PDF", bytes.len());
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?
        }
        DocumentKind::Text => String::from_utf8_lossy(bytes).into_owned(),
    };

    let text = normalize_whitespace(&raw);
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}

/// Trim every line and collapse runs of blank lines into one.
pub fn normalize_whitespace(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = true;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !previous_blank {
                lines.push("");
            }
            previous_blank = true;
        } else {
            lines.push(line);
            previous_blank = false;
        }
    }

    while lines.last() == Some(&"") {
        lines.pop();
    }

    lines.join("\n")
}

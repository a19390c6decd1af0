//! Text and metadata extraction for PDF and plain-text documents.
//!
//! Extraction is the pipeline's upstream edge: callers supply bytes and a
//! [`ContentKind`]; this module returns raw (un-normalized) UTF-8 text plus a
//! [`DocumentInfo`]. Text comes from `pdf-extract`; page count and the PDF
//! info dictionary come from `lopdf`. A missing or unreadable info dictionary
//! is not an error, only a failed text extraction is.

use chrono::NaiveDate;
use lopdf::{Dictionary, Document, Object};
use std::path::Path;
use thiserror::Error;

use crate::models::DocumentInfo;

/// Extensions accepted by [`ContentKind::from_path`], lowercase.
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["pdf", "txt"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0} (allowed: .pdf, .txt)")]
    UnsupportedFileType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    PlainText,
}

impl ContentKind {
    /// Resolve the kind from a file name's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(ContentKind::Pdf),
            "txt" => Ok(ContentKind::PlainText),
            _ => Err(ExtractError::UnsupportedFileType(if ext.is_empty() {
                path.display().to_string()
            } else {
                format!(".{}", ext)
            })),
        }
    }
}

/// Raw extractor output.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    pub info: DocumentInfo,
}

pub fn extract_bytes(bytes: &[u8], kind: ContentKind) -> Result<Extracted, ExtractError> {
    match kind {
        ContentKind::Pdf => extract_pdf(bytes),
        ContentKind::PlainText => Ok(Extracted {
            text: String::from_utf8_lossy(bytes).into_owned(),
            info: DocumentInfo {
                page_count: 1,
                ..DocumentInfo::default()
            },
        }),
    }
}

pub fn extract_file(path: &Path) -> Result<Extracted, ExtractError> {
    let kind = ContentKind::from_path(path)?;
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extract_bytes(&bytes, kind)
}

fn extract_pdf(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let info = match Document::load_mem(bytes) {
        Ok(doc) => read_pdf_info(&doc),
        Err(e) => {
            tracing::warn!("could not read PDF structure, metadata unavailable: {}", e);
            DocumentInfo::default()
        }
    };

    Ok(Extracted { text, info })
}

fn read_pdf_info(doc: &Document) -> DocumentInfo {
    let info_dict: Option<&Dictionary> = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };

    let field = |key: &[u8]| -> Option<String> {
        let obj = info_dict?.get(key).ok()?;
        let obj = match obj {
            Object::Reference(id) => doc.get_object(*id).ok()?,
            other => other,
        };
        match obj {
            Object::String(raw, _) => decode_pdf_string(raw),
            _ => None,
        }
    };

    DocumentInfo {
        page_count: doc.get_pages().len(),
        title: field(b"Title"),
        author: field(b"Author"),
        subject: field(b"Subject"),
        creator: field(b"Creator"),
        producer: field(b"Producer"),
        creation_date: field(b"CreationDate").and_then(|d| parse_pdf_date(&d)),
    }
}

/// Decode a PDF text string: UTF-16BE or UTF-8 when a BOM is present,
/// otherwise PDFDocEncoding (treated as Latin-1). Blank strings become `None`.
fn decode_pdf_string(raw: &[u8]) -> Option<String> {
    let decoded = if let Some(rest) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else if let Some(rest) = raw.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(rest).into_owned()
    } else {
        raw.iter().map(|&b| b as char).collect()
    };
    let trimmed = decoded.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Convert `D:YYYYMMDDHHmmSS…` to `YYYY-MM-DD`.
fn parse_pdf_date(raw: &str) -> Option<String> {
    let s = raw.strip_prefix("D:").unwrap_or(raw);
    let digits = s.get(0..8)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = digits[0..4].parse().ok()?;
    let month = digits[4..6].parse().ok()?;
    let day = digits[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

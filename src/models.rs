//! Core data models used throughout paperchunk.
//!
//! These types represent the chunks, extracted document info, and tracked
//! document rows that flow through the processing pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stage::Stage;

/// A contiguous window `[start_word, end_word)` of a document's word sequence.
///
/// Created once by the chunker and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Zero-based emission index.
    pub chunk_id: usize,
    /// Words of the window joined by single spaces.
    pub text: String,
    /// Always `end_word - start_word`.
    pub word_count: usize,
    /// Number of Unicode scalar values in `text`.
    pub char_count: usize,
    pub start_word: usize,
    pub end_word: usize,
}

/// Document-level information reported by the extractor.
///
/// Every field other than `page_count` is optional: PDFs frequently omit
/// their info dictionary, and plain text files never have one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    /// ISO `YYYY-MM-DD`.
    pub creation_date: Option<String>,
}

/// Result of extracting, normalizing, and chunking one document.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    pub full_text: String,
    pub info: DocumentInfo,
    pub word_count: usize,
    pub char_count: usize,
    pub chunks: Vec<Chunk>,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedDocument {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// A tracked document row from the `documents` table.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub filename: String,
    pub file_size: i64,
    pub content_hash: String,
    pub status: Stage,
    pub blob_id: Option<String>,
    pub current_folder: Option<String>,
    pub parquet_blob_id: Option<String>,
    pub page_count: Option<i64>,
    pub word_count: Option<i64>,
    pub chunk_count: Option<i64>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub error: Option<String>,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
    pub processed_at: Option<String>,
}

//! Single-document processing: extract → normalize → chunk.
//!
//! Synchronous and CPU-bound. Async callers should run it on a blocking
//! thread (see [`crate::pipeline`]).

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;

use crate::chunk::ChunkConfig;
use crate::extract::{self, ContentKind, Extracted};
use crate::models::ProcessedDocument;
use crate::normalize::{normalize_text, normalize_text_strict};

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentProcessor {
    chunking: ChunkConfig,
    strict_normalize: bool,
}

impl DocumentProcessor {
    pub fn new(chunking: ChunkConfig, strict_normalize: bool) -> Self {
        Self {
            chunking,
            strict_normalize,
        }
    }

    pub fn process_bytes(&self, bytes: &[u8], kind: ContentKind) -> Result<ProcessedDocument> {
        let extracted = extract::extract_bytes(bytes, kind)?;
        Ok(self.finish(extracted))
    }

    pub fn process_file(&self, path: &Path) -> Result<ProcessedDocument> {
        let extracted = extract::extract_file(path)
            .with_context(|| format!("Failed to extract {}", path.display()))?;
        Ok(self.finish(extracted))
    }

    /// Normalize and chunk already-extracted text.
    pub fn process_text(&self, raw: &str) -> ProcessedDocument {
        self.finish(Extracted {
            text: raw.to_string(),
            info: Default::default(),
        })
    }

    fn finish(&self, extracted: Extracted) -> ProcessedDocument {
        let full_text = if self.strict_normalize {
            normalize_text_strict(&extracted.text)
        } else {
            normalize_text(&extracted.text)
        };
        let chunks = self.chunking.chunk(&full_text);

        tracing::debug!(
            pages = extracted.info.page_count,
            chunks = chunks.len(),
            "document processed"
        );

        ProcessedDocument {
            word_count: full_text.split_whitespace().count(),
            char_count: full_text.chars().count(),
            info: extracted.info,
            chunks,
            full_text,
            processed_at: Utc::now(),
        }
    }
}

//! Overlapping fixed-size word-window chunker.
//!
//! Splits normalized document text into [`Chunk`]s of at most `chunk_size`
//! words, where consecutive chunks share `overlap` words of context.
//!
//! # Algorithm
//!
//! 1. Split the text on Unicode whitespace into `words[0..N)`.
//! 2. `stride = chunk_size - overlap`.
//! 3. For `start = 0, stride, 2·stride, …` while `start < N`, emit the window
//!    `[start, min(start + chunk_size, N))`.
//!
//! The tail window may be shorter than `chunk_size` and is always emitted,
//! even when it lies entirely inside the previous window.
//!
//! # Example
//!
//! ```rust
//! use paperchunk::chunk::chunk_words;
//!
//! let chunks = chunk_words("a b c d e f g", 3, 1).unwrap();
//! let spans: Vec<_> = chunks.iter().map(|c| (c.start_word, c.end_word)).collect();
//! assert_eq!(spans, vec![(0, 3), (2, 5), (4, 7), (6, 7)]);
//! ```

use thiserror::Error;

use crate::models::Chunk;

/// Errors raised by the chunker. Text content never causes an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("invalid chunking configuration: {0}")]
    InvalidConfiguration(String),
}

/// A validated `(chunk_size, overlap)` pair with `0 <= overlap < chunk_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidConfiguration(
                "chunk_size must be > 0".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ChunkError::InvalidConfiguration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Word distance between the starts of consecutive chunks. Always >= 1.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Chunk `text` with this configuration. Infallible once validated.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let total = words.len();
        let stride = self.stride();

        let mut chunks = Vec::with_capacity(total.div_ceil(stride));
        let mut start = 0;
        while start < total {
            let end = start.saturating_add(self.chunk_size).min(total);
            let text = words[start..end].join(" ");
            chunks.push(Chunk {
                chunk_id: chunks.len(),
                char_count: text.chars().count(),
                text,
                word_count: end - start,
                start_word: start,
                end_word: end,
            });
            start = start.saturating_add(stride);
        }
        chunks
    }
}

impl Default for ChunkConfig {
    /// 500-word chunks with 50 words of overlap.
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

/// Validate `(chunk_size, overlap)` and chunk `text`.
///
/// Fails with [`ChunkError::InvalidConfiguration`] when `chunk_size == 0` or
/// `overlap >= chunk_size`; no partial output is produced in that case.
/// Empty or whitespace-only text yields an empty vector.
pub fn chunk_words(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ChunkError> {
    Ok(ChunkConfig::new(chunk_size, overlap)?.chunk(text))
}

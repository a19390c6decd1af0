//! Flat chunk records handed to a columnar sink.
//!
//! Each [`ChunkRecord`] carries the chunk's own fields followed by every
//! document metadata entry under a `doc_` prefix, so a Parquet file of
//! chunks can be filtered or joined by document without a side table.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::Chunk;

/// Prefix applied to document-level columns.
pub const DOC_PREFIX: &str = "doc_";

/// Columns contributed by the chunk itself, in record order.
pub const CHUNK_COLUMNS: [&str; 6] = [
    "chunk_id",
    "text",
    "word_count",
    "char_count",
    "start_word",
    "end_word",
];

/// A scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::Int(v)
    }
}

impl From<usize> for ColumnValue {
    fn from(v: usize) -> Self {
        ColumnValue::Int(v as i64)
    }
}

impl From<f64> for ColumnValue {
    fn from(v: f64) -> Self {
        ColumnValue::Float(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::Text(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::Text(v)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ColumnValue::Null)
    }
}

/// Document-level metadata. Ordered by key so every record of a document
/// gets its `doc_` columns in the same order.
pub type DocMetadata = BTreeMap<String, ColumnValue>;

/// One row destined for the columnar sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkRecord {
    columns: Vec<(String, ColumnValue)>,
}

impl ChunkRecord {
    pub fn columns(&self) -> &[(String, ColumnValue)] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }
}

/// Build one record per chunk, preserving order.
///
/// All records share the same column set: the chunk columns followed by
/// `doc_<key>` for each metadata key.
pub fn build_records(chunks: &[Chunk], doc_metadata: &DocMetadata) -> Vec<ChunkRecord> {
    let doc_columns: Vec<(String, ColumnValue)> = doc_metadata
        .iter()
        .map(|(key, value)| (format!("{}{}", DOC_PREFIX, key), value.clone()))
        .collect();

    chunks
        .iter()
        .map(|chunk| {
            let mut columns = Vec::with_capacity(CHUNK_COLUMNS.len() + doc_columns.len());
            columns.push(("chunk_id".to_string(), chunk.chunk_id.into()));
            columns.push(("text".to_string(), chunk.text.clone().into()));
            columns.push(("word_count".to_string(), chunk.word_count.into()));
            columns.push(("char_count".to_string(), chunk.char_count.into()));
            columns.push(("start_word".to_string(), chunk.start_word.into()));
            columns.push(("end_word".to_string(), chunk.end_word.into()));
            columns.extend(doc_columns.iter().cloned());
            ChunkRecord { columns }
        })
        .collect()
}

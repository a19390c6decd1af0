//! Columnar output for chunk records.
//!
//! [`ColumnarSink`] is the seam between record assembly and on-disk
//! serialization. [`ParquetSink`] writes one Arrow record batch per call,
//! inferring each column's type from its first non-null value.
//!
//! | Value | Arrow type |
//! |-------|------------|
//! | `Int` | `Int64` |
//! | `Float` | `Float64` |
//! | `Text` | `Utf8` |
//! | all `Null` | `Utf8` (nullable) |

use arrow_array::{Array, ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::records::{ChunkRecord, ColumnValue, CHUNK_COLUMNS};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("record {row} has columns {found:?}, expected {expected:?}")]
    NonUniformColumns {
        row: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("column '{column}' mixes {expected} and {found} values (row {row})")]
    ColumnType {
        column: String,
        row: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Summary of a completed write.
#[derive(Debug, Clone, Serialize)]
pub struct SinkReport {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<String>,
    pub size_bytes: u64,
}

/// Serializes a uniform record set to a column-oriented file.
///
/// Implementations must preserve row order and the exact column set.
pub trait ColumnarSink {
    fn write(&self, records: &[ChunkRecord], path: &Path) -> Result<SinkReport, SinkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParquetCompression {
    None,
    #[default]
    Snappy,
    Zstd,
}

impl FromStr for ParquetCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Self::None),
            "snappy" => Ok(Self::Snappy),
            "zstd" => Ok(Self::Zstd),
            other => Err(format!(
                "unknown compression '{}': expected none, snappy, or zstd",
                other
            )),
        }
    }
}

impl ParquetCompression {
    fn to_parquet(self) -> Compression {
        match self {
            Self::None => Compression::UNCOMPRESSED,
            Self::Snappy => Compression::SNAPPY,
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetSink {
    compression: ParquetCompression,
}

impl ParquetSink {
    pub fn new(compression: ParquetCompression) -> Self {
        Self { compression }
    }
}

impl ColumnarSink for ParquetSink {
    fn write(&self, records: &[ChunkRecord], path: &Path) -> Result<SinkReport, SinkError> {
        let batch = to_record_batch(records)?;
        let columns: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SinkError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let props = WriterProperties::builder()
            .set_compression(self.compression.to_parquet())
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        let size_bytes = std::fs::metadata(path)
            .map_err(|source| SinkError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        tracing::info!(
            path = %path.display(),
            rows = batch.num_rows(),
            size_bytes,
            "parquet file written"
        );

        Ok(SinkReport {
            path: path.to_path_buf(),
            rows: batch.num_rows(),
            columns,
            size_bytes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Text,
}

impl ColumnKind {
    fn of(value: &ColumnValue) -> Option<Self> {
        match value {
            ColumnValue::Null => None,
            ColumnValue::Int(_) => Some(Self::Int),
            ColumnValue::Float(_) => Some(Self::Float),
            ColumnValue::Text(_) => Some(Self::Text),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Int => "integer",
            Self::Float => "float",
            Self::Text => "text",
        }
    }

    fn data_type(self) -> DataType {
        match self {
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Text => DataType::Utf8,
        }
    }
}

/// Convert records into a single Arrow batch, validating uniformity.
pub fn to_record_batch(records: &[ChunkRecord]) -> Result<RecordBatch, SinkError> {
    let Some(first) = records.first() else {
        return Ok(empty_chunk_batch());
    };
    let names: Vec<String> = first.column_names().map(str::to_string).collect();

    for (row, record) in records.iter().enumerate().skip(1) {
        if !record.column_names().eq(names.iter().map(String::as_str)) {
            return Err(SinkError::NonUniformColumns {
                row,
                expected: names.clone(),
                found: record.column_names().map(str::to_string).collect(),
            });
        }
    }

    let mut fields = Vec::with_capacity(names.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(names.len());

    for (col, name) in names.iter().enumerate() {
        let values: Vec<&ColumnValue> = records.iter().map(|r| &r.columns()[col].1).collect();
        let kind = infer_kind(name, &values)?;
        let nullable = values.iter().any(|v| v.is_null());
        let array: ArrayRef = match kind {
            ColumnKind::Int => Arc::new(Int64Array::from(
                values.iter().map(|v| v.as_i64()).collect::<Vec<_>>(),
            )),
            ColumnKind::Float => Arc::new(Float64Array::from(
                values
                    .iter()
                    .map(|v| match v {
                        ColumnValue::Float(f) => Some(*f),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
            ColumnKind::Text => Arc::new(StringArray::from(
                values.iter().map(|v| v.as_str()).collect::<Vec<_>>(),
            )),
        };
        fields.push(Field::new(name, kind.data_type(), nullable || array.is_empty()));
        arrays.push(array);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

fn infer_kind(column: &str, values: &[&ColumnValue]) -> Result<ColumnKind, SinkError> {
    let mut kind: Option<ColumnKind> = None;
    for (row, value) in values.iter().enumerate() {
        let Some(found) = ColumnKind::of(value) else {
            continue;
        };
        match kind {
            None => kind = Some(found),
            Some(expected) if expected != found => {
                return Err(SinkError::ColumnType {
                    column: column.to_string(),
                    row,
                    expected: expected.name(),
                    found: found.name(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(kind.unwrap_or(ColumnKind::Text))
}

/// Zero-row batch with the base chunk columns.
fn empty_chunk_batch() -> RecordBatch {
    let fields: Vec<Field> = CHUNK_COLUMNS
        .iter()
        .map(|name| {
            let dt = if *name == "text" {
                DataType::Utf8
            } else {
                DataType::Int64
            };
            Field::new(*name, dt, true)
        })
        .collect();
    RecordBatch::new_empty(Arc::new(Schema::new(fields)))
}

/// Summary of an existing Parquet file.
#[derive(Debug, Clone, Serialize)]
pub struct ParquetInfo {
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub file_size: u64,
    /// First row as a JSON object, when the file has rows.
    pub sample_row: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Read a Parquet file's schema, row count, and first row.
pub fn inspect_parquet(path: &Path) -> Result<ParquetInfo, SinkError> {
    let io_err = |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file_size = std::fs::metadata(path).map_err(io_err)?.len();
    let file = File::open(path).map_err(io_err)?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let row_count = builder.metadata().file_metadata().num_rows() as usize;
    let schema = builder.schema().clone();
    let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

    let mut sample_row = None;
    for batch in builder.with_batch_size(1).build()? {
        let batch = batch?;
        if batch.num_rows() > 0 {
            sample_row = Some(row_to_json(&batch, 0));
            break;
        }
    }

    Ok(ParquetInfo {
        row_count,
        column_count: columns.len(),
        columns,
        file_size,
        sample_row,
    })
}

/// Read every row of a Parquet file as JSON objects, in file order.
pub fn read_parquet_rows(
    path: &Path,
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, SinkError> {
    let file = File::open(path).map_err(|source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        for row in 0..batch.num_rows() {
            rows.push(row_to_json(&batch, row));
        }
    }
    Ok(rows)
}

fn row_to_json(batch: &RecordBatch, row: usize) -> serde_json::Map<String, serde_json::Value> {
    let schema = batch.schema();
    let mut out = serde_json::Map::new();
    for (i, field) in schema.fields().iter().enumerate() {
        let column = batch.column(i);
        let value = if column.is_null(row) {
            serde_json::Value::Null
        } else if let Some(a) = column.as_any().downcast_ref::<Int64Array>() {
            serde_json::Value::from(a.value(row))
        } else if let Some(a) = column.as_any().downcast_ref::<Float64Array>() {
            serde_json::Value::from(a.value(row))
        } else if let Some(a) = column.as_any().downcast_ref::<StringArray>() {
            serde_json::Value::from(a.value(row))
        } else {
            serde_json::Value::String(format!("<{}>", field.data_type()))
        };
        out.insert(field.name().clone(), value);
    }
    out
}

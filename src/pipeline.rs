//! End-to-end document pipeline.
//!
//! Coordinates the full flow for one file:
//!
//! ```text
//! upload/ ─▶ staging/ ─▶ processing/ ─▶ extract+chunk ─▶ parquet/ ─▶ processed/
//! ```
//!
//! The tracker records each stage. Once a document record exists, any
//! failure marks it `failed` (leaving the blob where it was) before the
//! error is returned to the caller.

use anyhow::{anyhow, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::Config;
use crate::db;
use crate::extract::ContentKind;
use crate::migrate::migrate_pool;
use crate::models::{DocumentRecord, ProcessedDocument};
use crate::process::DocumentProcessor;
use crate::records::{build_records, ColumnValue, DocMetadata};
use crate::sink::{ColumnarSink, ParquetSink};
use crate::stage::Stage;
use crate::storage::{BlobStore, Folder, LocalFolderStore};
use crate::tracker::{DocumentTracker, NewDocument};

/// Globs used by [`Pipeline::process_dir`] when none are given.
pub const DEFAULT_INCLUDE_GLOBS: [&str; 2] = ["**/*.pdf", "**/*.txt"];

pub struct Pipeline {
    store: Arc<dyn BlobStore>,
    tracker: DocumentTracker,
    processor: DocumentProcessor,
    sink: ParquetSink,
    output_dir: PathBuf,
    keep_local: bool,
}

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: Vec<DocumentRecord>,
    pub failed: Vec<(PathBuf, String)>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        store: Arc<dyn BlobStore>,
        tracker: DocumentTracker,
    ) -> Result<Self> {
        Ok(Self {
            store,
            tracker,
            processor: DocumentProcessor::new(
                config.chunking.chunk_config()?,
                config.chunking.strict_normalize,
            ),
            sink: ParquetSink::new(config.output.parquet_compression()?),
            output_dir: config.output.dir.clone(),
            keep_local: config.output.keep_local,
        })
    }

    /// Open the database and local blob store named by `config`, creating
    /// the schema and stage folders when missing.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate_pool(&pool).await?;
        let store = LocalFolderStore::new(&config.storage.root);
        store.setup_pipeline_folders().await?;
        Self::new(config, Arc::new(store), DocumentTracker::new(pool))
    }

    pub fn tracker(&self) -> &DocumentTracker {
        &self.tracker
    }

    /// Run one local file through every stage. `filename` overrides the
    /// name recorded for the document (defaults to the file's base name).
    pub async fn process_file(
        &self,
        path: &Path,
        filename: Option<&str>,
    ) -> Result<DocumentRecord> {
        let filename = match filename {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| anyhow!("path has no file name: {}", path.display()))?,
        };
        let kind = ContentKind::from_path(Path::new(&filename))?;

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let content_hash = format!("{:x}", Sha256::digest(&bytes));

        tracing::info!(file = %filename, size = bytes.len(), "starting pipeline");

        let blob = self.store.upload(path, Folder::Upload, &filename).await?;
        let created = self
            .tracker
            .create(NewDocument {
                filename: &filename,
                file_size: bytes.len() as u64,
                content_hash: &content_hash,
                blob_id: &blob.id,
            })
            .await;
        let doc_id = match created {
            Ok(id) => id,
            Err(e) => {
                // No record points at the blob, so it must not outlive the error.
                if let Err(del_err) = self.store.delete(&blob.id, Folder::Upload).await {
                    tracing::warn!(
                        blob_id = %blob.id,
                        error = %del_err,
                        "could not remove orphaned upload"
                    );
                }
                return Err(e.context(format!("could not record {}", filename)));
            }
        };

        match self.run_stages(doc_id, &blob.id, &filename, bytes, kind).await {
            Ok(()) => {
                tracing::info!(document_id = doc_id, file = %filename, "pipeline complete");
            }
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::warn!(document_id = doc_id, error = %message, "pipeline failed");
                if let Err(mark_err) = self.tracker.mark_failed(doc_id, &message).await {
                    tracing::warn!(
                        document_id = doc_id,
                        error = %mark_err,
                        "could not mark document failed"
                    );
                }
                return Err(e.context(format!("document {} ({}) failed", doc_id, filename)));
            }
        }

        self.tracker
            .get(doc_id)
            .await?
            .ok_or_else(|| anyhow!("document not found: {}", doc_id))
    }

    async fn run_stages(
        &self,
        doc_id: i64,
        blob_id: &str,
        filename: &str,
        bytes: Vec<u8>,
        kind: ContentKind,
    ) -> Result<()> {
        self.move_to(doc_id, blob_id, Stage::Uploaded, Stage::Staged).await?;
        self.move_to(doc_id, blob_id, Stage::Staged, Stage::Processing).await?;

        let processor = self.processor;
        let processed = tokio::task::spawn_blocking(move || processor.process_bytes(&bytes, kind))
            .await
            .context("processing task panicked")??;
        self.tracker.record_results(doc_id, &processed).await?;

        tracing::info!(
            document_id = doc_id,
            pages = processed.info.page_count,
            words = processed.word_count,
            chunks = processed.chunk_count(),
            "document chunked"
        );

        let parquet_name = parquet_file_name(filename);
        let local_parquet = self
            .output_dir
            .join(format!("{}_{}", doc_id, parquet_name));
        self.write_parquet(doc_id, filename, &processed, &local_parquet)
            .await?;

        let parquet_blob = self
            .store
            .upload(&local_parquet, Folder::Parquet, &parquet_name)
            .await?;
        if !self.keep_local {
            if let Err(e) = tokio::fs::remove_file(&local_parquet).await {
                tracing::warn!(
                    path = %local_parquet.display(),
                    error = %e,
                    "could not remove local parquet"
                );
            }
        }

        self.store
            .move_blob(blob_id, Folder::Processing, Folder::Processed)
            .await?;
        if let Err(e) = self.tracker.mark_processed(doc_id, &parquet_blob.id).await {
            self.move_back(blob_id, Folder::Processed, Folder::Processing).await;
            return Err(e);
        }
        Ok(())
    }

    async fn move_to(&self, doc_id: i64, blob_id: &str, from: Stage, to: Stage) -> Result<()> {
        let (Some(src), Some(dest)) = (from.folder(), to.folder()) else {
            return Err(anyhow!("stages {} -> {} have no folders", from, to));
        };
        from.transition(to)?;
        self.store.move_blob(blob_id, src, dest).await?;
        if let Err(e) = self.tracker.advance(doc_id, to).await {
            self.move_back(blob_id, dest, src).await;
            return Err(e);
        }
        Ok(())
    }

    /// Undo a blob move after the tracker refused the matching update, so
    /// `current_folder` keeps naming the folder that holds the file.
    async fn move_back(&self, blob_id: &str, from: Folder, to: Folder) {
        if let Err(e) = self.store.move_blob(blob_id, from, to).await {
            tracing::warn!(
                blob_id = %blob_id,
                %from,
                %to,
                error = %e,
                "could not roll back blob move"
            );
        }
    }

    async fn write_parquet(
        &self,
        doc_id: i64,
        filename: &str,
        processed: &ProcessedDocument,
        dest: &Path,
    ) -> Result<()> {
        let metadata = document_metadata(doc_id, filename, processed);
        let records = build_records(&processed.chunks, &metadata);
        let sink = self.sink;
        let dest = dest.to_path_buf();
        let report = tokio::task::spawn_blocking(move || sink.write(&records, &dest))
            .await
            .context("parquet task panicked")??;
        tracing::debug!(rows = report.rows, size_bytes = report.size_bytes, "parquet written");
        Ok(())
    }

    /// Process every file under `dir` matching `globs` (or
    /// [`DEFAULT_INCLUDE_GLOBS`]). Per-file failures are collected, not fatal.
    pub async fn process_dir(&self, dir: &Path, globs: &[String]) -> Result<BatchSummary> {
        let files = collect_files(dir, globs)?;
        let mut summary = BatchSummary::default();
        for path in files {
            match self.process_file(&path, None).await {
                Ok(doc) => summary.processed.push(doc),
                Err(e) => {
                    tracing::warn!(
                        file = %path.display(),
                        error = %format!("{:#}", e),
                        "skipping file"
                    );
                    summary.failed.push((path, format!("{:#}", e)));
                }
            }
        }
        Ok(summary)
    }
}

/// Document-level columns attached to every chunk row.
pub fn document_metadata(
    doc_id: i64,
    filename: &str,
    processed: &ProcessedDocument,
) -> DocMetadata {
    let mut meta = file_metadata(filename, processed);
    meta.insert("document_id".to_string(), doc_id.into());
    meta
}

/// Columns describing the source file alone, for output written outside the
/// tracked pipeline.
pub fn file_metadata(filename: &str, processed: &ProcessedDocument) -> DocMetadata {
    let mut meta = DocMetadata::new();
    meta.insert("filename".to_string(), filename.into());
    meta.insert("page_count".to_string(), processed.info.page_count.into());
    meta.insert("word_count".to_string(), processed.word_count.into());
    meta.insert("title".to_string(), ColumnValue::from(processed.info.title.clone()));
    meta.insert("author".to_string(), ColumnValue::from(processed.info.author.clone()));
    meta
}

/// `paper.pdf` → `paper.parquet`.
pub fn parquet_file_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());
    format!("{}.parquet", stem)
}

fn collect_files(dir: &Path, globs: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }
    let patterns: Vec<String> = if globs.is_empty() {
        DEFAULT_INCLUDE_GLOBS.iter().map(|s| s.to_string()).collect()
    } else {
        globs.to_vec()
    };
    let include = build_globset(&patterns)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if include.is_match(relative) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

//! CLI command implementations.
//!
//! Each `run_*` function backs one `paperchunk` subcommand and prints its
//! result to stdout. Errors propagate to `main`, which reports them.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::chunk::ChunkConfig;
use crate::config::Config;
use crate::migrate;
use crate::models::DocumentRecord;
use crate::pipeline::{file_metadata, Pipeline};
use crate::process::DocumentProcessor;
use crate::records::build_records;
use crate::sink::{inspect_parquet, ColumnarSink, ParquetSink};
use crate::storage::LocalFolderStore;

pub async fn run_init(config: &Config) -> Result<()> {
    migrate::run_migrations(config).await?;
    LocalFolderStore::new(&config.storage.root)
        .setup_pipeline_folders()
        .await?;
    println!("Database initialized successfully.");
    println!("Stage folders ready under {}", config.storage.root.display());
    Ok(())
}

pub async fn run_process(config: &Config, file: &Path, name: Option<&str>) -> Result<()> {
    let pipeline = Pipeline::open(config).await?;
    let doc = pipeline.process_file(file, name).await?;
    println!(
        "Processed {} (document {}): {} pages, {} words, {} chunks",
        doc.filename,
        doc.id,
        doc.page_count.unwrap_or(0),
        doc.word_count.unwrap_or(0),
        doc.chunk_count.unwrap_or(0)
    );
    Ok(())
}

pub async fn run_process_dir(config: &Config, dir: &Path, globs: &[String]) -> Result<()> {
    let pipeline = Pipeline::open(config).await?;
    let summary = pipeline.process_dir(dir, globs).await?;

    for doc in &summary.processed {
        println!(
            "  ok    {} (document {}, {} chunks)",
            doc.filename,
            doc.id,
            doc.chunk_count.unwrap_or(0)
        );
    }
    for (path, error) in &summary.failed {
        println!("  FAIL  {}: {}", path.display(), error);
    }
    println!(
        "Done: {} processed, {} failed",
        summary.processed.len(),
        summary.failed.len()
    );

    if summary.processed.is_empty() && !summary.failed.is_empty() {
        bail!("every file in {} failed", dir.display());
    }
    Ok(())
}

/// Extract, chunk and write Parquet for one file without touching the
/// database or blob store. CLI flags override `[chunking]`.
pub fn run_chunk(
    config: &Config,
    file: &Path,
    output: Option<&Path>,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let chunking = ChunkConfig::new(
        chunk_size.unwrap_or(config.chunking.chunk_size),
        overlap.unwrap_or(config.chunking.overlap),
    )?;
    let processor = DocumentProcessor::new(chunking, config.chunking.strict_normalize);
    let processed = processor.process_file(file)?;

    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let records = build_records(&processed.chunks, &file_metadata(&filename, &processed));

    let dest = match output {
        Some(path) => path.to_path_buf(),
        None => default_chunk_output(file),
    };
    let sink = ParquetSink::new(config.output.parquet_compression()?);
    let report = sink
        .write(&records, &dest)
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    println!(
        "{}: {} pages, {} words, {} chunks",
        filename,
        processed.info.page_count,
        processed.word_count,
        processed.chunk_count()
    );
    println!(
        "Wrote {} ({} rows, {} columns, {} bytes)",
        report.path.display(),
        report.rows,
        report.columns.len(),
        report.size_bytes
    );
    Ok(())
}

fn default_chunk_output(file: &Path) -> PathBuf {
    file.with_extension("parquet")
}

pub fn run_inspect(path: &Path) -> Result<()> {
    let info = inspect_parquet(path)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

pub async fn run_documents(config: &Config, limit: i64) -> Result<()> {
    if limit < 1 {
        bail!("--limit must be >= 1");
    }
    let pipeline = Pipeline::open(config).await?;
    let docs = pipeline.tracker().list(limit).await?;
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    println!("{:<6} {:<11} {:>7} {:<20} FILENAME", "ID", "STATUS", "CHUNKS", "CREATED");
    for doc in docs {
        println!(
            "{:<6} {:<11} {:>7} {:<20} {}",
            doc.id,
            doc.status.as_str(),
            doc.chunk_count.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            doc.created_at,
            doc.filename
        );
    }
    Ok(())
}

pub async fn run_status(config: &Config, id: i64) -> Result<()> {
    let doc = fetch(config, id).await?;
    println!("document {}: {}", doc.id, doc.status);
    if let Some(folder) = &doc.current_folder {
        println!("folder:   {}", folder);
    }
    if let Some(error) = &doc.error {
        println!("error:    {}", error);
    }
    Ok(())
}

pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let doc = fetch(config, id).await?;

    println!("--- Document ---");
    println!("id:              {}", doc.id);
    println!("filename:        {}", doc.filename);
    println!("status:          {}", doc.status);
    println!("file_size:       {}", doc.file_size);
    println!("content_hash:    {}", doc.content_hash);
    print_opt("title:", doc.title.as_deref());
    print_opt("author:", doc.author.as_deref());
    print_opt("page_count:", doc.page_count.map(|v| v.to_string()).as_deref());
    print_opt("word_count:", doc.word_count.map(|v| v.to_string()).as_deref());
    print_opt("chunk_count:", doc.chunk_count.map(|v| v.to_string()).as_deref());
    print_opt("blob_id:", doc.blob_id.as_deref());
    print_opt("current_folder:", doc.current_folder.as_deref());
    print_opt("parquet_blob_id:", doc.parquet_blob_id.as_deref());
    print_opt("error:", doc.error.as_deref());
    println!("created_at:      {}", doc.created_at);
    println!("updated_at:      {}", doc.updated_at);
    print_opt("processed_at:", doc.processed_at.as_deref());
    Ok(())
}

fn print_opt(label: &str, value: Option<&str>) {
    if let Some(v) = value {
        println!("{:<16} {}", label, v);
    }
}

async fn fetch(config: &Config, id: i64) -> Result<DocumentRecord> {
    let pipeline = Pipeline::open(config).await?;
    match pipeline.tracker().get(id).await? {
        Some(doc) => Ok(doc),
        None => bail!("document not found: {}", id),
    }
}

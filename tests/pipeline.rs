use std::fs;
use std::path::Path;
use std::sync::Arc;

use paperchunk::config::{load_config, Config};
use paperchunk::db;
use paperchunk::migrate::migrate_pool;
use paperchunk::pipeline::Pipeline;
use paperchunk::sink::read_parquet_rows;
use paperchunk::stage::Stage;
use paperchunk::storage::{BlobStore, Folder, LocalFolderStore};
use paperchunk::tracker::DocumentTracker;
use tempfile::TempDir;

/// Single-page PDF with one Helvetica text run.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn test_config(root: &Path, chunk_size: usize, overlap: usize) -> Config {
    let path = root.join("paperchunk.toml");
    fs::write(
        &path,
        format!(
            r#"[db]
path = "{root}/db.sqlite"

[chunking]
chunk_size = {chunk_size}
overlap = {overlap}

[storage]
root = "{root}/stages"

[output]
dir = "{root}/out"
"#,
            root = root.display(),
            chunk_size = chunk_size,
            overlap = overlap
        ),
    )
    .unwrap();
    load_config(&path).unwrap()
}

async fn pipeline(
    root: &Path,
    chunk_size: usize,
    overlap: usize,
) -> (Pipeline, Arc<LocalFolderStore>) {
    let config = test_config(root, chunk_size, overlap);
    let pool = db::connect(&config).await.unwrap();
    migrate_pool(&pool).await.unwrap();
    let store = Arc::new(LocalFolderStore::new(&config.storage.root));
    store.setup_pipeline_folders().await.unwrap();
    let dyn_store: Arc<dyn BlobStore> = store.clone();
    let pipeline = Pipeline::new(&config, dyn_store, DocumentTracker::new(pool)).unwrap();
    (pipeline, store)
}

#[tokio::test]
async fn test_text_file_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(tmp.path(), 3, 1).await;

    let input = tmp.path().join("letters.txt");
    fs::write(&input, "a  b\tc\n\nd e \u{0}f g").unwrap();

    let doc = pipeline.process_file(&input, None).await.unwrap();
    assert_eq!(doc.status, Stage::Processed);
    assert_eq!(doc.filename, "letters.txt");
    assert_eq!(doc.current_folder.as_deref(), Some("processed"));
    assert_eq!(doc.page_count, Some(1));
    assert_eq!(doc.word_count, Some(7));
    assert_eq!(doc.chunk_count, Some(4));
    assert!(doc.processed_at.is_some());
    assert!(doc.error.is_none());
    assert_eq!(doc.content_hash.len(), 64);

    // source blob ended in processed/, parquet blob in parquet/
    let processed = store.list(Folder::Processed).await.unwrap();
    assert_eq!(processed.len(), 1);
    assert_eq!(Some(processed[0].id.clone()), doc.blob_id);
    assert!(store.list(Folder::Upload).await.unwrap().is_empty());
    assert!(store.list(Folder::Staging).await.unwrap().is_empty());
    assert!(store.list(Folder::Processing).await.unwrap().is_empty());

    let parquet_blobs = store.list(Folder::Parquet).await.unwrap();
    assert_eq!(parquet_blobs.len(), 1);
    assert_eq!(parquet_blobs[0].name, "letters.parquet");
    assert_eq!(Some(parquet_blobs[0].id.clone()), doc.parquet_blob_id);

    // keep_local defaults to false
    assert!(!tmp.path().join("out").join(format!("{}_letters.parquet", doc.id)).exists());

    let dest = tmp.path().join("download.parquet");
    store
        .download(&parquet_blobs[0].id, Folder::Parquet, &dest)
        .await
        .unwrap();
    let rows = read_parquet_rows(&dest).unwrap();
    assert_eq!(rows.len(), 4);
    let texts: Vec<&str> = rows.iter().map(|r| r["text"].as_str().unwrap()).collect();
    assert_eq!(texts, vec!["a b c", "c d e", "e f g", "g"]);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row["chunk_id"], i as i64);
        assert_eq!(row["doc_document_id"], doc.id);
        assert_eq!(row["doc_filename"], "letters.txt");
        assert_eq!(row["doc_word_count"], 7);
        assert!(row["doc_title"].is_null());
    }
}

#[tokio::test]
async fn test_pdf_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(tmp.path(), 500, 50).await;

    let input = tmp.path().join("upload.bin");
    fs::write(&input, minimal_pdf_with_phrase("paper test phrase")).unwrap();

    let doc = pipeline
        .process_file(&input, Some("paper.pdf"))
        .await
        .unwrap();
    assert_eq!(doc.filename, "paper.pdf");
    assert_eq!(doc.status, Stage::Processed);
    assert_eq!(doc.page_count, Some(1));
    assert_eq!(doc.chunk_count, Some(1));

    let parquet_blobs = store.list(Folder::Parquet).await.unwrap();
    assert_eq!(parquet_blobs[0].name, "paper.parquet");
    let dest = tmp.path().join("paper.parquet");
    store
        .download(&parquet_blobs[0].id, Folder::Parquet, &dest)
        .await
        .unwrap();
    let rows = read_parquet_rows(&dest).unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0]["text"].as_str().unwrap().contains("paper test phrase"));
    assert_eq!(rows[0]["doc_page_count"], 1);
}

#[tokio::test]
async fn test_empty_text_writes_zero_rows() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(tmp.path(), 10, 2).await;

    let input = tmp.path().join("blank.txt");
    fs::write(&input, " \n\t ").unwrap();

    let doc = pipeline.process_file(&input, None).await.unwrap();
    assert_eq!(doc.status, Stage::Processed);
    assert_eq!(doc.chunk_count, Some(0));
    assert_eq!(doc.word_count, Some(0));

    let parquet_blobs = store.list(Folder::Parquet).await.unwrap();
    let dest = tmp.path().join("blank.parquet");
    store
        .download(&parquet_blobs[0].id, Folder::Parquet, &dest)
        .await
        .unwrap();
    assert!(read_parquet_rows(&dest).unwrap().is_empty());
}

#[tokio::test]
async fn test_broken_pdf_marks_document_failed() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(tmp.path(), 10, 2).await;

    let input = tmp.path().join("broken.pdf");
    fs::write(&input, b"this is not a pdf").unwrap();

    let err = pipeline.process_file(&input, None).await.unwrap_err();
    assert!(format!("{:#}", err).contains("broken.pdf"));

    let docs = pipeline.tracker().list(10).await.unwrap();
    assert_eq!(docs.len(), 1);
    let doc = &docs[0];
    assert_eq!(doc.status, Stage::Failed);
    assert!(doc.error.as_deref().unwrap().contains("PDF extraction failed"));
    // the blob stays where processing stopped
    assert_eq!(doc.current_folder.as_deref(), Some("processing"));
    assert_eq!(store.list(Folder::Processing).await.unwrap().len(), 1);
    assert!(store.list(Folder::Parquet).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsupported_file_creates_no_record() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, store) = pipeline(tmp.path(), 10, 2).await;

    let input = tmp.path().join("slides.pptx");
    fs::write(&input, b"zip").unwrap();

    let err = pipeline.process_file(&input, None).await.unwrap_err();
    assert!(err.to_string().contains(".pptx"));
    assert!(pipeline.tracker().list(10).await.unwrap().is_empty());
    assert!(store.list(Folder::Upload).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_process_dir_collects_failures() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, _store) = pipeline(tmp.path(), 4, 1).await;

    let dir = tmp.path().join("inbox");
    fs::create_dir_all(dir.join("sub")).unwrap();
    fs::write(dir.join("one.txt"), "one two three four five").unwrap();
    fs::write(dir.join("sub/two.txt"), "six seven").unwrap();
    fs::write(dir.join("bad.pdf"), b"garbage").unwrap();
    fs::write(dir.join("skip.csv"), "a,b").unwrap();

    let summary = pipeline.process_dir(&dir, &[]).await.unwrap();
    assert_eq!(summary.processed.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].0.ends_with("bad.pdf"));

    let statuses: Vec<Stage> = pipeline
        .tracker()
        .list(10)
        .await
        .unwrap()
        .iter()
        .map(|d| d.status)
        .collect();
    assert_eq!(statuses.iter().filter(|s| **s == Stage::Processed).count(), 2);
    assert_eq!(statuses.iter().filter(|s| **s == Stage::Failed).count(), 1);
}

#[tokio::test]
async fn test_open_creates_schema_and_folders() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path(), 10, 2);

    let pipeline = Pipeline::open(&config).await.unwrap();
    assert!(pipeline.tracker().list(5).await.unwrap().is_empty());
    for folder in Folder::ALL {
        assert!(config.storage.root.join(folder.as_str()).is_dir());
    }
}

#[tokio::test]
async fn test_upload_removed_when_record_cannot_be_created() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path(), 3, 1);
    // schema never created, so inserting the document record fails
    let pool = db::connect(&config).await.unwrap();
    let store = Arc::new(LocalFolderStore::new(&config.storage.root));
    store.setup_pipeline_folders().await.unwrap();
    let dyn_store: Arc<dyn BlobStore> = store.clone();
    let pipeline = Pipeline::new(&config, dyn_store, DocumentTracker::new(pool)).unwrap();

    let input = tmp.path().join("notes.txt");
    fs::write(&input, "one two three").unwrap();

    let err = pipeline.process_file(&input, None).await.unwrap_err();
    assert!(format!("{:#}", err).contains("could not record notes.txt"));
    assert!(store.list(Folder::Upload).await.unwrap().is_empty());
    assert!(input.exists());
}

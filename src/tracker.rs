//! Document bookkeeping in the `documents` table.
//!
//! The tracker is the only writer of a document's `status` column and
//! enforces the [`Stage`] transition rules on every change: the stored stage
//! is read, validated against the requested one, and updated with a
//! compare-and-set so concurrent writers cannot skip a check.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{DocumentRecord, ProcessedDocument};
use crate::stage::Stage;
use crate::storage::Folder;

const SELECT_COLUMNS: &str = "id, filename, file_size, content_hash, status, blob_id, \
    current_folder, parquet_blob_id, page_count, word_count, chunk_count, title, author, \
    error, created_at, updated_at, processed_at";

#[derive(Clone)]
pub struct DocumentTracker {
    pool: SqlitePool,
}

/// Fields supplied when a document is first recorded.
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub filename: &'a str,
    pub file_size: u64,
    pub content_hash: &'a str,
    pub blob_id: &'a str,
}

impl DocumentTracker {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a document in the `uploaded` stage. Returns its id.
    pub async fn create(&self, doc: NewDocument<'_>) -> Result<i64> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO documents (filename, file_size, content_hash, status, blob_id, current_folder, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(doc.filename)
        .bind(doc.file_size as i64)
        .bind(doc.content_hash)
        .bind(Stage::Uploaded.as_str())
        .bind(doc.blob_id)
        .bind(Folder::Upload.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to create document record")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(&format!("SELECT {} FROM documents WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    /// Most recent documents first.
    pub async fn list(&self, limit: i64) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY created_at DESC, id DESC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_record).collect()
    }

    /// Move document `id` to `next`, validating the transition against the
    /// stored stage. `current_folder` follows the stage unless the new stage
    /// has no folder (`failed`).
    pub async fn advance(&self, id: i64, next: Stage) -> Result<Stage> {
        let current = self.current_stage(id).await?;
        current.transition(next)?;

        let now = Utc::now().timestamp();
        let processed_at = (next == Stage::Processed).then_some(now);
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET status = ?,
                current_folder = COALESCE(?, current_folder),
                updated_at = ?,
                processed_at = COALESCE(?, processed_at)
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(next.as_str())
        .bind(next.folder().map(|f| f.as_str()))
        .bind(now)
        .bind(processed_at)
        .bind(id)
        .bind(current.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!(
                "document {} changed stage concurrently (expected {})",
                id,
                current
            );
        }
        tracing::debug!(document_id = id, from = %current, to = %next, "stage advanced");
        Ok(next)
    }

    /// Store extraction statistics for a document.
    pub async fn record_results(&self, id: i64, doc: &ProcessedDocument) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE documents
            SET page_count = ?, word_count = ?, chunk_count = ?, title = ?, author = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(doc.info.page_count as i64)
        .bind(doc.word_count as i64)
        .bind(doc.chunk_count() as i64)
        .bind(&doc.info.title)
        .bind(&doc.info.author)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_processed(&self, id: i64, parquet_blob_id: &str) -> Result<()> {
        sqlx::query("UPDATE documents SET parquet_blob_id = ? WHERE id = ?")
            .bind(parquet_blob_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.advance(id, Stage::Processed).await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: i64, error: &str) -> Result<()> {
        self.advance(id, Stage::Failed).await?;
        sqlx::query("UPDATE documents SET error = ? WHERE id = ?")
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn current_stage(&self, id: i64) -> Result<Stage> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match status {
            Some(s) => Ok(s.parse()?),
            None => bail!("document not found: {}", id),
        }
    }
}

fn row_to_record(row: &SqliteRow) -> Result<DocumentRecord> {
    let status: String = row.get("status");
    let processed_at: Option<i64> = row.get("processed_at");
    Ok(DocumentRecord {
        id: row.get("id"),
        filename: row.get("filename"),
        file_size: row.get("file_size"),
        content_hash: row.get("content_hash"),
        status: status.parse()?,
        blob_id: row.get("blob_id"),
        current_folder: row.get("current_folder"),
        parquet_blob_id: row.get("parquet_blob_id"),
        page_count: row.get("page_count"),
        word_count: row.get("word_count"),
        chunk_count: row.get("chunk_count"),
        title: row.get("title"),
        author: row.get("author"),
        error: row.get("error"),
        created_at: format_ts_iso(row.get("created_at")),
        updated_at: format_ts_iso(row.get("updated_at")),
        processed_at: processed_at.map(format_ts_iso),
    })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrate::migrate_pool;
    use crate::process::DocumentProcessor;

    async fn tracker() -> (tempfile::TempDir, DocumentTracker) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect_path(&dir.path().join("t.sqlite")).await.unwrap();
        migrate_pool(&pool).await.unwrap();
        (dir, DocumentTracker::new(pool))
    }

    fn new_doc(name: &str) -> NewDocument<'_> {
        NewDocument {
            filename: name,
            file_size: 42,
            content_hash: "abc123",
            blob_id: "blob-1",
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_dir, tracker) = tracker().await;
        let id = tracker.create(new_doc("a.pdf")).await.unwrap();
        let doc = tracker.get(id).await.unwrap().unwrap();
        assert_eq!(doc.filename, "a.pdf");
        assert_eq!(doc.status, Stage::Uploaded);
        assert_eq!(doc.current_folder.as_deref(), Some("upload"));
        assert_eq!(doc.file_size, 42);
        assert!(doc.processed_at.is_none());
        assert!(tracker.get(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let (_dir, tracker) = tracker().await;
        let id = tracker.create(new_doc("b.txt")).await.unwrap();
        tracker.advance(id, Stage::Staged).await.unwrap();
        tracker.advance(id, Stage::Processing).await.unwrap();

        let processed = DocumentProcessor::default().process_text("one two three");
        tracker.record_results(id, &processed).await.unwrap();
        tracker.mark_processed(id, "parquet-9").await.unwrap();

        let doc = tracker.get(id).await.unwrap().unwrap();
        assert_eq!(doc.status, Stage::Processed);
        assert_eq!(doc.current_folder.as_deref(), Some("processed"));
        assert_eq!(doc.word_count, Some(3));
        assert_eq!(doc.chunk_count, Some(1));
        assert_eq!(doc.parquet_blob_id.as_deref(), Some("parquet-9"));
        assert!(doc.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_illegal_transition_rejected() {
        let (_dir, tracker) = tracker().await;
        let id = tracker.create(new_doc("c.pdf")).await.unwrap();
        let err = tracker.advance(id, Stage::Processed).await.unwrap_err();
        assert!(err.to_string().contains("illegal stage transition"));
        assert_eq!(tracker.get(id).await.unwrap().unwrap().status, Stage::Uploaded);
    }

    #[tokio::test]
    async fn test_failed_is_absorbing_and_keeps_folder() {
        let (_dir, tracker) = tracker().await;
        let id = tracker.create(new_doc("d.pdf")).await.unwrap();
        tracker.advance(id, Stage::Staged).await.unwrap();
        tracker.mark_failed(id, "boom").await.unwrap();

        let doc = tracker.get(id).await.unwrap().unwrap();
        assert_eq!(doc.status, Stage::Failed);
        assert_eq!(doc.current_folder.as_deref(), Some("staging"));
        assert_eq!(doc.error.as_deref(), Some("boom"));

        assert!(tracker.advance(id, Stage::Processing).await.is_err());
        assert!(tracker.mark_failed(id, "again").await.is_err());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_dir, tracker) = tracker().await;
        let first = tracker.create(new_doc("1.txt")).await.unwrap();
        let second = tracker.create(new_doc("2.txt")).await.unwrap();
        let docs = tracker.list(10).await.unwrap();
        assert_eq!(docs.iter().map(|d| d.id).collect::<Vec<_>>(), vec![second, first]);
        assert_eq!(tracker.list(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_advance_unknown_document() {
        let (_dir, tracker) = tracker().await;
        let err = tracker.advance(999, Stage::Staged).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}

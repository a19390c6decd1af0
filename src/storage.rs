//! Blob storage with named folders standing in for pipeline stages.
//!
//! [`BlobStore`] is the seam for remote backends. [`LocalFolderStore`] keeps
//! each folder as a directory under a root path and stores blobs as
//! `<id>__<name>`, so a blob keeps its id while it moves between folders.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Separator between a blob's id and its original name on disk.
const ID_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    Upload,
    Staging,
    Processing,
    Processed,
    Parquet,
}

impl Folder {
    pub const ALL: [Folder; 5] = [
        Folder::Upload,
        Folder::Staging,
        Folder::Processing,
        Folder::Processed,
        Folder::Parquet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Folder::Upload => "upload",
            Folder::Staging => "staging",
            Folder::Processing => "processing",
            Folder::Processed => "processed",
            Folder::Parquet => "parquet",
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A blob as seen by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredBlob {
    pub id: String,
    pub name: String,
    pub folder: Folder,
    pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Copy a local file into `folder` under `name`; returns the new blob.
    async fn upload(&self, local: &Path, folder: Folder, name: &str) -> Result<StoredBlob>;

    /// Move blob `id` from one folder to another, keeping its id.
    async fn move_blob(&self, id: &str, from: Folder, to: Folder) -> Result<()>;

    /// Copy blob `id` out of `folder` to `dest`.
    async fn download(&self, id: &str, folder: Folder, dest: &Path) -> Result<PathBuf>;

    /// Remove blob `id` from `folder`.
    async fn delete(&self, id: &str, folder: Folder) -> Result<()>;

    async fn list(&self, folder: Folder) -> Result<Vec<StoredBlob>>;
}

/// Folder-per-stage store on the local filesystem.
pub struct LocalFolderStore {
    root: PathBuf,
    folders: Mutex<HashMap<Folder, PathBuf>>,
}

impl LocalFolderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            folders: Mutex::new(HashMap::new()),
        }
    }

    /// Create every pipeline folder and return their paths.
    pub async fn setup_pipeline_folders(&self) -> Result<HashMap<Folder, PathBuf>> {
        let mut out = HashMap::new();
        for folder in Folder::ALL {
            out.insert(folder, self.get_or_create_folder(folder).await?);
        }
        tracing::debug!(root = %self.root.display(), "pipeline folders ready");
        Ok(out)
    }

    async fn get_or_create_folder(&self, folder: Folder) -> Result<PathBuf> {
        if let Some(path) = self.cached(folder) {
            return Ok(path);
        }
        let path = self.root.join(folder.as_str());
        tokio::fs::create_dir_all(&path)
            .await
            .with_context(|| format!("Failed to create folder {}", path.display()))?;
        self.folders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(folder, path.clone());
        Ok(path)
    }

    fn cached(&self, folder: Folder) -> Option<PathBuf> {
        self.folders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&folder)
            .cloned()
    }

    async fn find(&self, id: &str, folder: Folder) -> Result<PathBuf> {
        let dir = self.get_or_create_folder(folder).await?;
        let prefix = format!("{}{}", id, ID_SEPARATOR);
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                return Ok(entry.path());
            }
        }
        bail!("blob not found: {} in {}/", id, folder)
    }
}

#[async_trait]
impl BlobStore for LocalFolderStore {
    async fn upload(&self, local: &Path, folder: Folder, name: &str) -> Result<StoredBlob> {
        let dir = self.get_or_create_folder(folder).await?;
        let id = Uuid::new_v4().to_string();
        let safe_name = sanitize_name(name);
        let dest = dir.join(format!("{}{}{}", id, ID_SEPARATOR, safe_name));
        let size = tokio::fs::copy(local, &dest)
            .await
            .with_context(|| format!("Failed to upload {} to {}/", local.display(), folder))?;
        tracing::info!(blob_id = %id, %folder, name = %safe_name, "uploaded");
        Ok(StoredBlob {
            id,
            name: safe_name,
            folder,
            size,
        })
    }

    async fn move_blob(&self, id: &str, from: Folder, to: Folder) -> Result<()> {
        let src = self.find(id, from).await?;
        let dest_dir = self.get_or_create_folder(to).await?;
        let file_name = src
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("blob path has no file name: {}", src.display()))?;
        tokio::fs::rename(&src, dest_dir.join(file_name))
            .await
            .with_context(|| format!("Failed to move blob {} from {}/ to {}/", id, from, to))?;
        tracing::info!(blob_id = %id, %from, %to, "moved");
        Ok(())
    }

    async fn download(&self, id: &str, folder: Folder, dest: &Path) -> Result<PathBuf> {
        let src = self.find(id, folder).await?;
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&src, dest)
            .await
            .with_context(|| format!("Failed to download blob {} to {}", id, dest.display()))?;
        Ok(dest.to_path_buf())
    }

    async fn delete(&self, id: &str, folder: Folder) -> Result<()> {
        let path = self.find(id, folder).await?;
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete blob {} from {}/", id, folder))?;
        tracing::info!(blob_id = %id, %folder, "deleted");
        Ok(())
    }

    async fn list(&self, folder: Folder) -> Result<Vec<StoredBlob>> {
        let dir = self.get_or_create_folder(folder).await?;
        let mut blobs = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some((id, name)) = file_name.split_once(ID_SEPARATOR) else {
                continue;
            };
            let size = entry.metadata().await?.len();
            blobs.push(StoredBlob {
                id: id.to_string(),
                name: name.to_string(),
                folder,
                size,
            });
        }
        blobs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(blobs)
    }
}

/// Keep only the final path component and replace separators.
fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base == "." || base == ".." {
        "unnamed".to_string()
    } else {
        base.to_string()
    }
}

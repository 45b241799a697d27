//! Filesystem-backed document store and inspection mirror
//!
//! Both use the same layout: one JSON file per document at
//! `<root>/<category prefix>/<document id>.json`.

use super::traits::{StorageError, StorageResult};
use crate::sync::{Category, Document, DocumentId, DocumentSource, SourceError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const EXTENSION: &str = "json";

/// Path of a document file, or `None` when the id cannot name a file safely
fn document_path(root: &Path, category: Category, id: &DocumentId) -> Option<PathBuf> {
    let id = id.as_str();
    if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\']) {
        return None;
    }
    Some(
        root.join(category.store_prefix())
            .join(format!("{id}.{EXTENSION}")),
    )
}

/// Reads result documents from a directory tree
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentSource for FsDocumentStore {
    async fn list_ids(&self, category: Category) -> Result<Vec<DocumentId>, SourceError> {
        let dir = self.root.join(category.store_prefix());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%category, dir = %dir.display(), "no document directory");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(DocumentId::from(stem));
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn fetch(&self, category: Category, id: &DocumentId) -> Result<Document, SourceError> {
        let not_found = || SourceError::NotFound {
            category,
            id: id.clone(),
        };
        let path = document_path(&self.root, category, id).ok_or_else(not_found)?;
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        let payload = serde_json::from_slice(&raw)?;
        Ok(Document::new(category, id.clone(), payload))
    }
}

/// Object-store mirror of synced documents
#[derive(Debug, Clone)]
pub struct FsMirrorStore {
    root: PathBuf,
}

impl FsMirrorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, category: Category, id: &DocumentId) -> StorageResult<PathBuf> {
        document_path(&self.root, category, id).ok_or_else(|| {
            StorageError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("document id {id:?} cannot be stored as a file"),
            ))
        })
    }

    /// Whether a document is already mirrored
    pub async fn contains(&self, category: Category, id: &DocumentId) -> StorageResult<bool> {
        let path = self.path_for(category, id)?;
        Ok(tokio::fs::try_exists(path).await?)
    }

    /// Write a document's payload, replacing any earlier copy
    ///
    /// The file is written under a temporary name and renamed into place, so
    /// readers never observe a partial document.
    pub async fn store(&self, document: &Document) -> StorageResult<()> {
        let path = self.path_for(document.category, &document.id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(&document.payload)?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(category = %document.category, document_id = %document.id, "mirrored document");
        Ok(())
    }
}

//! Collaborator contracts consumed by the sync core

use super::error::{IndexError, SourceError};
use super::types::{Category, Document, DocumentId};
use async_trait::async_trait;

/// Enumerates and retrieves raw documents from object storage
///
/// Implementations never mutate or delete documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// List every document id of the category
    ///
    /// Each call starts a fresh listing; order is whatever the backend yields.
    async fn list_ids(&self, category: Category) -> Result<Vec<DocumentId>, SourceError>;

    /// Retrieve one document, failing with `SourceError::NotFound` if it vanished
    async fn fetch(&self, category: Category, id: &DocumentId) -> Result<Document, SourceError>;
}

/// Idempotency guard and writer for the graph database
#[async_trait]
pub trait GraphIndex: Send + Sync {
    /// Whether the document was already synced
    async fn exists(&self, category: Category, id: &DocumentId) -> Result<bool, IndexError>;

    /// Insert or merge the document's content into the graph
    ///
    /// Fails with `IndexError::Insertion` on semantic/storage problems and
    /// with `IndexError::RetryTransaction` on transient write conflicts.
    async fn insert(&self, category: Category, document: &Document) -> Result<(), IndexError>;
}

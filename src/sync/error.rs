//! Error taxonomy of the sync core

use super::types::{Category, CategoryStats, DocumentId};
use crate::storage::StorageError;
use thiserror::Error;

/// Errors raised by a `DocumentSource`
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("document {id} not found in {category}")]
    NotFound { category: Category, id: DocumentId },

    #[error("document {id} in {category} is not ready: {reason}")]
    NotReady {
        category: Category,
        id: DocumentId,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from {url}: {status}")]
    Status { url: String, status: u16 },

    #[error("invalid endpoint URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Errors raised by a `GraphIndex`
#[derive(Debug, Error)]
pub enum IndexError {
    /// The graph rejected the document; permanent for this document
    #[error("insertion rejected: {0}")]
    Insertion(String),

    /// Transient backend write conflict; the whole run must be retried
    #[error("transaction must be retried: {0}")]
    RetryTransaction(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IndexError {
    pub fn insertion(msg: impl Into<String>) -> Self {
        Self::Insertion(msg.into())
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, IndexError::RetryTransaction(_))
    }
}

/// Why a single document could not be synced
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] SourceError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

impl DocumentError {
    pub fn is_retry(&self) -> bool {
        matches!(self, DocumentError::Index(e) if e.is_retry())
    }
}

/// Errors that end a category's sync early
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to list {category} documents: {source}")]
    Listing {
        category: Category,
        #[source]
        source: SourceError,
    },

    /// Fail-fast abort; `stats` holds everything counted up to and including `id`
    #[error("failed to sync {category} document {id}: {source}")]
    Document {
        category: Category,
        id: DocumentId,
        stats: CategoryStats,
        #[source]
        source: DocumentError,
    },

    /// The retried document is not counted; `stats` covers the documents before it
    #[error("{category} sync must be retried: {reason}")]
    RetryTransaction {
        category: Category,
        reason: String,
        stats: CategoryStats,
    },

    #[error("worker pool for {category} failed: {reason}")]
    Worker { category: Category, reason: String },
}

impl SyncError {
    pub fn is_retry(&self) -> bool {
        matches!(self, SyncError::RetryTransaction { .. })
    }

    /// Counters accumulated before the abort, if any were
    pub fn partial_stats(&self) -> Option<CategoryStats> {
        match self {
            SyncError::Document { stats, .. } | SyncError::RetryTransaction { stats, .. } => {
                Some(*stats)
            }
            _ => None,
        }
    }
}

/// Render an error with its full source chain
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = cause.source();
    }
    rendered
}

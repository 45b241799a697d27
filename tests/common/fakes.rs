//! Call-counting collaborators with scripted failures

use async_trait::async_trait;
use graph_sync::metrics::{MetricsError, MetricsSink};
use graph_sync::sync::{IndexError, SourceError};
use graph_sync::{Category, CategoryStats, Document, DocumentId, DocumentSource, GraphIndex};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::fixtures::solver_payload;

/// Source that serves a fixed id list per category
#[derive(Default)]
pub struct ScriptedSource {
    ids: BTreeMap<Category, Vec<DocumentId>>,
    missing: HashSet<DocumentId>,
    failing_listings: HashSet<Category>,
    pub list_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids(mut self, category: Category, ids: &[&str]) -> Self {
        self.ids
            .entry(category)
            .or_default()
            .extend(ids.iter().map(|id| DocumentId::from(*id)));
        self
    }

    /// Listed but gone by the time it is fetched
    pub fn with_missing(mut self, id: &str) -> Self {
        self.missing.insert(DocumentId::from(id));
        self
    }

    pub fn with_failing_listing(mut self, category: Category) -> Self {
        self.failing_listings.insert(category);
        self
    }

    pub fn calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst) + self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for ScriptedSource {
    async fn list_ids(&self, category: Category) -> Result<Vec<DocumentId>, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_listings.contains(&category) {
            return Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "object store unreachable",
            )));
        }
        Ok(self.ids.get(&category).cloned().unwrap_or_default())
    }

    async fn fetch(&self, category: Category, id: &DocumentId) -> Result<Document, SourceError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing.contains(id) {
            return Err(SourceError::NotFound {
                category,
                id: id.clone(),
            });
        }
        Ok(Document::new(category, id.clone(), solver_payload(id.as_str())))
    }
}

/// Index with scripted rejections and retry signals
#[derive(Default)]
pub struct ScriptedIndex {
    synced: Mutex<HashSet<(Category, DocumentId)>>,
    rejected: HashSet<DocumentId>,
    retried: HashSet<DocumentId>,
    stalled: bool,
    inserted: Mutex<Vec<DocumentId>>,
    pub exists_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
}

impl ScriptedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a document was synced by an earlier run
    pub fn with_existing(self, category: Category, id: &str) -> Self {
        self.synced
            .lock()
            .unwrap()
            .insert((category, DocumentId::from(id)));
        self
    }

    /// Inserting this id fails permanently
    pub fn rejecting(mut self, id: &str) -> Self {
        self.rejected.insert(DocumentId::from(id));
        self
    }

    /// Inserting this id reports a write conflict
    pub fn retrying(mut self, id: &str) -> Self {
        self.retried.insert(DocumentId::from(id));
        self
    }

    /// Every insertion hangs forever
    pub fn stalling(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst) + self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn inserted(&self) -> Vec<DocumentId> {
        self.inserted.lock().unwrap().clone()
    }

    pub fn contains(&self, category: Category, id: &str) -> bool {
        self.synced
            .lock()
            .unwrap()
            .contains(&(category, DocumentId::from(id)))
    }
}

#[async_trait]
impl GraphIndex for ScriptedIndex {
    async fn exists(&self, category: Category, id: &DocumentId) -> Result<bool, IndexError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.synced.lock().unwrap().contains(&(category, id.clone())))
    }

    async fn insert(&self, category: Category, document: &Document) -> Result<(), IndexError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled {
            std::future::pending::<()>().await;
        }
        if self.retried.contains(&document.id) {
            return Err(IndexError::RetryTransaction("database is locked".into()));
        }
        if self.rejected.contains(&document.id) {
            return Err(IndexError::insertion(format!("constraint violated by {}", document.id)));
        }
        self.synced
            .lock()
            .unwrap()
            .insert((category, document.id.clone()));
        self.inserted.lock().unwrap().push(document.id.clone());
        Ok(())
    }
}

/// Metrics sink that keeps every record, optionally failing each call
#[derive(Default)]
pub struct RecordingMetrics {
    records: Mutex<Vec<(Category, CategoryStats)>>,
    failing: bool,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<(Category, CategoryStats)> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsSink for RecordingMetrics {
    async fn record(
        &self,
        category: Category,
        stats: &CategoryStats,
        _duration: Duration,
    ) -> Result<(), MetricsError> {
        self.records.lock().unwrap().push((category, *stats));
        if self.failing {
            return Err(MetricsError::Status {
                url: "http://pushgateway.invalid".into(),
                status: 503,
            });
        }
        Ok(())
    }
}

//! CategorySyncer: drives the sync of one category end-to-end
//!
//! Lists candidates (or takes the explicit ids), applies the existence check
//! unless forced, fetches, inserts, and classifies each attempt. Counters are
//! only ever mutated here, also when insertions run on a worker pool.

use super::dispatcher::{Completion, Dispatch, WorkDispatcher};
use super::error::{error_chain, DocumentError, SyncError};
use super::registry::CategoryBinding;
use super::traits::{DocumentSource, GraphIndex};
use super::types::{Category, CategoryStats, Document, DocumentId, SyncOutcome};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-run switches for a category sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Re-attempt documents the graph already holds
    pub force: bool,
    /// Keep going after a per-document failure instead of aborting
    pub graceful: bool,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn graceful(mut self) -> Self {
        self.graceful = true;
        self
    }
}

/// What the coordinator decided for a candidate before insertion
enum Prepared {
    Skip,
    Fetched(Document),
}

/// Syncs one category through its binding
pub struct CategorySyncer {
    category: Category,
    source: Arc<dyn DocumentSource>,
    index: Arc<dyn GraphIndex>,
    /// Zero means sequential
    workers: usize,
}

impl CategorySyncer {
    pub fn new(category: Category, binding: &CategoryBinding) -> Self {
        Self {
            category,
            source: binding.source.clone(),
            index: binding.index.clone(),
            workers: 0,
        }
    }

    /// Run insertions on a pool of `workers`; zero keeps the sequential mode
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sync the category
    ///
    /// An empty `document_ids` means the full listing. Explicit ids bypass the
    /// listing but not the existence check.
    pub async fn sync(
        &self,
        document_ids: &[DocumentId],
        options: SyncOptions,
    ) -> Result<CategoryStats, SyncError> {
        let candidates = self.candidates(document_ids).await?;
        info!(
            category = %self.category,
            candidates = candidates.len(),
            force = options.force,
            graceful = options.graceful,
            workers = self.workers,
            "starting category sync"
        );

        let stats = if self.workers == 0 {
            self.sync_sequential(candidates, options).await?
        } else {
            self.sync_parallel(candidates, options).await?
        };

        debug_assert!(stats.is_conserved());
        info!(category = %self.category, %stats, "category sync finished");
        Ok(stats)
    }

    async fn candidates(&self, document_ids: &[DocumentId]) -> Result<Vec<DocumentId>, SyncError> {
        if !document_ids.is_empty() {
            return Ok(document_ids.to_vec());
        }
        self.source
            .list_ids(self.category)
            .await
            .map_err(|source| SyncError::Listing {
                category: self.category,
                source,
            })
    }

    async fn sync_sequential(
        &self,
        candidates: Vec<DocumentId>,
        options: SyncOptions,
    ) -> Result<CategoryStats, SyncError> {
        let mut stats = CategoryStats::new();
        for id in candidates {
            let result = match self.prepare(&id, options.force).await {
                Ok(Prepared::Skip) => Ok(SyncOutcome::Skipped),
                Ok(Prepared::Fetched(document)) => self
                    .index
                    .insert(self.category, &document)
                    .await
                    .map(|()| SyncOutcome::Synced)
                    .map_err(DocumentError::from),
                Err(err) => Err(err),
            };
            self.count(&mut stats, id, result, options)?;
        }
        Ok(stats)
    }

    async fn sync_parallel(
        &self,
        candidates: Vec<DocumentId>,
        options: SyncOptions,
    ) -> Result<CategoryStats, SyncError> {
        let mut stats = CategoryStats::new();
        let mut dispatch = WorkDispatcher::new(self.index.clone(), self.workers).start();

        for id in candidates {
            match self.prepare(&id, options.force).await {
                Ok(Prepared::Skip) => {
                    self.count(&mut stats, id, Ok(SyncOutcome::Skipped), options)?;
                }
                Ok(Prepared::Fetched(document)) => {
                    if let Err(err) = dispatch.submit(document).await {
                        return Err(SyncError::Worker {
                            category: self.category,
                            reason: err.to_string(),
                        });
                    }
                }
                Err(err) => {
                    if let Err(abort) = self.count(&mut stats, id, Err(err), options) {
                        return Err(self.wind_down(dispatch, stats, abort, options).await);
                    }
                }
            }

            while let Some(completion) = dispatch.try_next() {
                if let Err(abort) = self.count_completion(&mut stats, completion, options) {
                    return Err(self.wind_down(dispatch, stats, abort, options).await);
                }
            }
        }

        dispatch.close();
        while let Some(completion) = dispatch.next().await {
            if let Err(abort) = self.count_completion(&mut stats, completion, options) {
                return Err(self.wind_down(dispatch, stats, abort, options).await);
            }
        }
        dispatch.join().await.map_err(|err| SyncError::Worker {
            category: self.category,
            reason: err.to_string(),
        })?;
        Ok(stats)
    }

    /// Stop the pool after an abort and count whatever was already in flight
    async fn wind_down(
        &self,
        mut dispatch: Dispatch,
        mut stats: CategoryStats,
        abort: SyncError,
        options: SyncOptions,
    ) -> SyncError {
        let discarded = dispatch.abort().await;
        if discarded > 0 {
            debug!(category = %self.category, discarded, "discarded queued documents");
        }

        let mut abort = abort;
        while !abort.is_retry() {
            let Some(completion) = dispatch.next().await else {
                break;
            };
            // Later document failures are already logged; only a retry replaces the first abort.
            if let Err(err) = self.count_completion(&mut stats, completion, options) {
                if err.is_retry() {
                    abort = err;
                }
            }
        }
        if let Err(err) = dispatch.join().await {
            warn!(category = %self.category, error = %err, "worker pool did not shut down cleanly");
        }

        match abort {
            SyncError::Document {
                category,
                id,
                source,
                ..
            } => SyncError::Document {
                category,
                id,
                stats,
                source,
            },
            SyncError::RetryTransaction {
                category, reason, ..
            } => SyncError::RetryTransaction {
                category,
                reason,
                stats,
            },
            other => other,
        }
    }

    /// Existence check and fetch for one candidate
    async fn prepare(&self, id: &DocumentId, force: bool) -> Result<Prepared, DocumentError> {
        if !force && self.index.exists(self.category, id).await? {
            return Ok(Prepared::Skip);
        }
        let document = self.source.fetch(self.category, id).await?;
        Ok(Prepared::Fetched(document))
    }

    fn count_completion(
        &self,
        stats: &mut CategoryStats,
        completion: Completion,
        options: SyncOptions,
    ) -> Result<(), SyncError> {
        let result = completion
            .result
            .map(|()| SyncOutcome::Synced)
            .map_err(DocumentError::from);
        self.count(stats, completion.id, result, options)
    }

    /// Classify one attempt; returns an error when the category must stop
    fn count(
        &self,
        stats: &mut CategoryStats,
        id: DocumentId,
        result: Result<SyncOutcome, DocumentError>,
        options: SyncOptions,
    ) -> Result<(), SyncError> {
        match result {
            Ok(outcome) => {
                stats.record(outcome);
                info!(category = %self.category, document_id = %id, %outcome, "document processed");
                Ok(())
            }
            Err(err) if err.is_retry() => {
                warn!(
                    category = %self.category,
                    document_id = %id,
                    error = %err,
                    "backend requested a retry of the whole run"
                );
                Err(SyncError::RetryTransaction {
                    category: self.category,
                    reason: err.to_string(),
                    stats: *stats,
                })
            }
            Err(err) => {
                stats.record(SyncOutcome::Failed);
                warn!(
                    category = %self.category,
                    document_id = %id,
                    outcome = %SyncOutcome::Failed,
                    error = %error_chain(&err),
                    "document sync failed"
                );
                if options.graceful {
                    Ok(())
                } else {
                    Err(SyncError::Document {
                        category: self.category,
                        id,
                        stats: *stats,
                        source: err,
                    })
                }
            }
        }
    }
}

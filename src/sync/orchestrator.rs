//! SyncOrchestrator: resolves the selected categories and runs them in order
//!
//! Categories run sequentially. A fail-fast abort keeps the stats of the
//! categories that already finished and prevents the remaining ones from
//! starting. A retry signal from the backend ends the run with a distinct
//! outcome so the scheduler can re-invoke the job.

use super::error::{error_chain, SyncError};
use super::registry::CategoryRegistry;
use super::syncer::{CategorySyncer, SyncOptions};
use super::types::{Category, CategoryStats, RunResult};
use crate::config::{ConfigError, RunConfig, EXIT_RETRY, EXIT_SYNC_FAILED};
use crate::metrics::MetricsSink;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

/// How a run ended, when it did not complete
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A category aborted; `result` holds everything recorded up to the abort
    #[error("sync aborted in {category}: {source}")]
    Aborted {
        category: Category,
        result: RunResult,
        #[source]
        source: SyncError,
    },

    /// The backend asked for the whole run to be retried later
    #[error("sync must be retried ({category}): {reason}")]
    Retry {
        category: Category,
        result: RunResult,
        reason: String,
    },
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Config(err) => err.exit_code(),
            RunError::Aborted { .. } => EXIT_SYNC_FAILED,
            RunError::Retry { .. } => EXIT_RETRY,
        }
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, RunError::Retry { .. })
    }

    /// Stats recorded before the run stopped; `None` if no work was attempted
    pub fn partial_result(&self) -> Option<&RunResult> {
        match self {
            RunError::Config(_) => None,
            RunError::Aborted { result, .. } | RunError::Retry { result, .. } => Some(result),
        }
    }
}

/// Top-level coordinator of one sync run
pub struct SyncOrchestrator {
    registry: CategoryRegistry,
    metrics: Arc<dyn MetricsSink>,
}

impl SyncOrchestrator {
    pub fn new(registry: CategoryRegistry, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { registry, metrics }
    }

    /// Run every selected category
    ///
    /// Configuration is validated before any collaborator is called.
    pub async fn run(&self, config: &RunConfig) -> Result<RunResult, RunError> {
        config.validate()?;
        let categories = config.categories();
        if let Some(unbound) = categories.iter().find(|c| !self.registry.contains(**c)) {
            return Err(ConfigError::UnboundCategory(*unbound).into());
        }

        let options = SyncOptions {
            force: config.force,
            graceful: config.graceful,
        };
        let mut result = RunResult::new();

        for category in categories {
            let Some(binding) = self.registry.get(category) else {
                return Err(ConfigError::UnboundCategory(category).into());
            };
            let syncer = CategorySyncer::new(category, binding).with_workers(config.workers);

            let started = Instant::now();
            let outcome = syncer.sync(&config.document_ids, options).await;
            let elapsed = started.elapsed();

            match outcome {
                Ok(stats) => {
                    result.merge(category, stats);
                    self.export(category, &stats, elapsed).await;
                }
                Err(err) => {
                    let stats = err.partial_stats().unwrap_or_default();
                    result.merge(category, stats);
                    self.export(category, &stats, elapsed).await;

                    if err.is_retry() {
                        warn!(%category, error = %err, "aborting run; it must be retried");
                        let reason = match err {
                            SyncError::RetryTransaction { reason, .. } => reason,
                            other => other.to_string(),
                        };
                        return Err(RunError::Retry {
                            category,
                            result,
                            reason,
                        });
                    }

                    if options.graceful && matches!(err, SyncError::Listing { .. }) {
                        warn!(%category, error = %error_chain(&err), "skipping category");
                        continue;
                    }

                    error!(%category, error = %error_chain(&err), "aborting run");
                    return Err(RunError::Aborted {
                        category,
                        result,
                        source: err,
                    });
                }
            }
        }

        let totals = result.totals();
        info!(categories = result.len(), %totals, "sync run finished");
        Ok(result)
    }

    async fn export(&self, category: Category, stats: &CategoryStats, elapsed: Duration) {
        if let Err(err) = self.metrics.record(category, stats, elapsed).await {
            warn!(%category, error = %err, "failed to export metrics");
        }
    }
}

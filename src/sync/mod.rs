//! Sync orchestration core
//!
//! Decides what needs syncing per category, applies the idempotent existence
//! check, dispatches work sequentially or across a worker pool, tolerates
//! per-document failures in graceful mode and produces per-category counters.

mod dispatcher;
mod error;
mod orchestrator;
mod registry;
mod syncer;
mod traits;
mod types;

pub use dispatcher::{
    Completion, Dispatch, DispatchError, WorkDispatcher, DEFAULT_WORKERS, QUEUE_DEPTH_PER_WORKER,
};
pub use error::{error_chain, DocumentError, IndexError, SourceError, SyncError};
pub use orchestrator::{RunError, SyncOrchestrator};
pub use registry::{CategoryBinding, CategoryRegistry};
pub use syncer::{CategorySyncer, SyncOptions};
pub use traits::{DocumentSource, GraphIndex};
pub use types::{Category, CategoryStats, Document, DocumentId, RunResult, SyncOutcome, UnknownCategory};

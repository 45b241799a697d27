//! graph-sync: reconciles analysis result documents into a graph database
//!
//! Upstream jobs (solver runs, container image analyses, adviser runs,
//! provenance checks, dependency-monkey experiments and Amun inspections)
//! leave immutable JSON documents in an object store. A sync run lists the
//! documents of each selected category, skips the ones the graph already
//! holds, fetches the rest and materializes them as nodes and edges.
//!
//! # Core Concepts
//!
//! - **Categories**: independent document classes, each bound to a
//!   `DocumentSource` and a `GraphIndex` in a `CategoryRegistry`
//! - **Stats**: every attempted document is counted exactly once as synced,
//!   skipped or failed
//! - **Modes**: fail-fast aborts on the first failed document, graceful
//!   counts it and continues; a retry signal from the backend always aborts
//!
//! # Example
//!
//! ```
//! use graph_sync::{Category, CategoryRegistry, LogMetricsSink, RunConfig, SyncOrchestrator};
//! use graph_sync::storage::{MemoryDocumentStore, MemoryGraphIndex};
//! use std::sync::Arc;
//!
//! let registry = CategoryRegistry::uniform(
//!     [Category::Solver],
//!     Arc::new(MemoryDocumentStore::new()),
//!     Arc::new(MemoryGraphIndex::new()),
//! );
//! let orchestrator = SyncOrchestrator::new(registry, Arc::new(LogMetricsSink));
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let result = runtime
//!     .block_on(orchestrator.run(&RunConfig::only(Category::Solver)))
//!     .unwrap();
//! assert_eq!(result.totals().processed, 0);
//! ```

pub mod config;
pub mod graph;
pub mod inspection;
pub mod metrics;
pub mod storage;
pub mod sync;

pub use config::{ConfigError, InspectionTargets, RunConfig, Selection, SyncFlags};
pub use metrics::{LogMetricsSink, MetricsError, MetricsSink, PushgatewayMetricsSink};
pub use storage::{OpenStore, SqliteGraphIndex, StorageError, StorageResult};
pub use sync::{
    Category, CategoryBinding, CategoryRegistry, CategoryStats, Document, DocumentId, DocumentSource,
    GraphIndex, RunError, RunResult, SyncError, SyncOrchestrator,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

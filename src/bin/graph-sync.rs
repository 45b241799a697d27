//! graph-sync CLI: one reconciliation run of result documents into the graph.
//!
//! Usage:
//!   graph-sync [--only-<category>-documents] [--document-id ID]... [--force-sync] [--graceful]
//!              [--amun-api-url URL] [--only-graph-sync | --only-ceph-sync] [--workers N]

use clap::Parser;
use graph_sync::config::{CategoryFlags, EXIT_MISSING_AMUN_API_URL, EXIT_OK, EXIT_SYNC_FAILED};
use graph_sync::inspection::{AmunClient, AmunInspectionSource, InspectionIndex};
use graph_sync::storage::{FsDocumentStore, FsMirrorStore};
use graph_sync::sync::{error_chain, DEFAULT_WORKERS};
use graph_sync::{
    Category, CategoryBinding, CategoryRegistry, LogMetricsSink, MetricsSink, OpenStore,
    PushgatewayMetricsSink, RunConfig, RunResult, SqliteGraphIndex, SyncFlags, SyncOrchestrator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::LevelFilter, fmt};

#[derive(Parser)]
#[command(
    name = "graph-sync",
    version,
    about = "Sync analysis result documents into the graph database"
)]
struct Cli {
    /// Sync only solver documents
    #[arg(long)]
    only_solver_documents: bool,
    /// Sync only container image analysis (package-extract) documents
    #[arg(long)]
    only_analysis_documents: bool,
    /// Sync only adviser documents
    #[arg(long)]
    only_adviser_documents: bool,
    /// Sync only provenance checker documents
    #[arg(long)]
    only_provenance_checker_documents: bool,
    /// Sync only dependency monkey documents
    #[arg(long)]
    only_dependency_monkey_documents: bool,
    /// Sync only Amun inspection documents
    #[arg(long)]
    only_inspection_documents: bool,

    /// Sync only the given document (repeatable; needs exactly one category)
    #[arg(long = "document-id", value_name = "ID")]
    document_ids: Vec<String>,
    /// Re-sync documents that are already in the graph
    #[arg(long)]
    force_sync: bool,
    /// Count failed documents and continue instead of aborting
    #[arg(long)]
    graceful: bool,

    /// Amun API base URL, required for inspection sync
    #[arg(long, env = "AMUN_API_URL", value_name = "URL")]
    amun_api_url: Option<String>,
    /// Sync inspections into the graph only, not into the raw mirror
    #[arg(long)]
    only_graph_sync: bool,
    /// Sync inspections into the raw mirror only, not into the graph
    #[arg(long)]
    only_ceph_sync: bool,

    /// Insert on a pool of N workers (4 when N is omitted); 0 inserts sequentially
    #[arg(long, value_name = "N")]
    workers: Option<Option<usize>>,

    /// Root of the result document store
    #[arg(long, env = "GRAPH_SYNC_DOCUMENTS_DIR", value_name = "DIR")]
    documents_dir: Option<PathBuf>,
    /// Root of the raw inspection mirror [default: <documents-dir>/mirror]
    #[arg(long, env = "GRAPH_SYNC_MIRROR_DIR", value_name = "DIR")]
    mirror_dir: Option<PathBuf>,
    /// Path to SQLite database file
    #[arg(long, env = "GRAPH_SYNC_DB")]
    db: Option<PathBuf>,

    /// Prometheus Pushgateway URL; counters are logged when absent
    #[arg(long, env = "GRAPH_SYNC_PUSHGATEWAY_URL", value_name = "URL")]
    metrics_pushgateway_url: Option<String>,

    /// Log at debug level
    #[arg(short, long, env = "GRAPH_SYNC_DEBUG")]
    verbose: bool,

    /// Debug switch read by existing deployments
    #[arg(long = "thoth-graph-sync-debug", env = "THOTH_GRAPH_SYNC_DEBUG", hide = true)]
    legacy_debug: bool,
}

impl Cli {
    fn debug_requested(&self) -> bool {
        self.verbose || self.legacy_debug
    }

    fn flags(&self) -> SyncFlags {
        let mut categories = CategoryFlags::default();
        for (enabled, category) in [
            (self.only_solver_documents, Category::Solver),
            (self.only_analysis_documents, Category::PackageExtract),
            (self.only_adviser_documents, Category::Adviser),
            (self.only_provenance_checker_documents, Category::ProvenanceChecker),
            (self.only_dependency_monkey_documents, Category::DependencyMonkey),
            (self.only_inspection_documents, Category::Inspection),
        ] {
            if enabled {
                categories.set(category);
            }
        }

        SyncFlags {
            categories,
            document_ids: self.document_ids.clone(),
            force: self.force_sync,
            graceful: self.graceful,
            amun_api_url: self.amun_api_url.clone(),
            only_graph_sync: self.only_graph_sync,
            only_ceph_sync: self.only_ceph_sync,
            workers: match self.workers {
                None => 0,
                Some(workers) => workers.unwrap_or(DEFAULT_WORKERS),
            },
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let subscriber = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("Tracing subscriber already set; skipping re-initialization.");
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"))
        .join("graph-sync")
}

/// Get the default database path (~/.local/share/graph-sync/graph.db)
fn default_db_path() -> PathBuf {
    data_dir().join("graph.db")
}

fn default_documents_dir() -> PathBuf {
    data_dir().join("documents")
}

fn build_registry(cli: &Cli, config: &RunConfig) -> Result<CategoryRegistry, (i32, String)> {
    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    let index = SqliteGraphIndex::open(&db_path).map_err(|e| {
        (
            EXIT_SYNC_FAILED,
            format!("Failed to open database {}: {}", db_path.display(), e),
        )
    })?;
    let index = Arc::new(index);
    info!(db = %db_path.display(), "opened graph database");

    let documents_dir = cli.documents_dir.clone().unwrap_or_else(default_documents_dir);
    let documents = Arc::new(FsDocumentStore::new(&documents_dir));
    let mut registry = CategoryRegistry::uniform(
        Category::ALL
            .into_iter()
            .filter(|category| *category != Category::Inspection),
        documents,
        index.clone(),
    );

    if let Some(url) = config.amun_api_url.as_deref() {
        let client = AmunClient::new(url).map_err(|e| (EXIT_MISSING_AMUN_API_URL, e.to_string()))?;
        let mirror_dir = cli
            .mirror_dir
            .clone()
            .unwrap_or_else(|| documents_dir.join("mirror"));
        let inspection_index = InspectionIndex::new(
            index,
            Arc::new(FsMirrorStore::new(mirror_dir)),
            config.inspection,
        );
        registry.register(
            Category::Inspection,
            CategoryBinding::new(
                Arc::new(AmunInspectionSource::new(client)),
                Arc::new(inspection_index),
            ),
        );
    }
    Ok(registry)
}

fn metrics_sink(cli: &Cli) -> Arc<dyn MetricsSink> {
    let Some(url) = cli.metrics_pushgateway_url.as_deref() else {
        return Arc::new(LogMetricsSink);
    };
    match PushgatewayMetricsSink::new(url) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            warn!(error = %e, "metrics will be logged instead of pushed");
            Arc::new(LogMetricsSink)
        }
    }
}

fn log_summary(result: &RunResult) {
    for (category, stats) in result.iter() {
        info!(
            %category,
            processed = stats.processed,
            synced = stats.synced,
            skipped = stats.skipped,
            failed = stats.failed,
            "category summary"
        );
    }
    let totals = result.totals();
    info!(
        processed = totals.processed,
        synced = totals.synced,
        skipped = totals.skipped,
        failed = totals.failed,
        "total"
    );
}

async fn run(cli: Cli) -> i32 {
    let config = match RunConfig::resolve(&cli.flags()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return e.exit_code();
        }
    };

    let registry = match build_registry(&cli, &config) {
        Ok(registry) => registry,
        Err((code, message)) => {
            error!("{}", message);
            return code;
        }
    };

    let orchestrator = SyncOrchestrator::new(registry, metrics_sink(&cli));
    match orchestrator.run(&config).await {
        Ok(result) => {
            log_summary(&result);
            EXIT_OK
        }
        Err(e) => {
            if let Some(result) = e.partial_result() {
                log_summary(result);
            }
            error!(error = %error_chain(&e), "sync run did not complete");
            e.exit_code()
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug_requested());
    let code = run(cli).await;
    std::process::exit(code);
}

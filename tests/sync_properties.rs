//! Behavioral properties of a sync run, checked against scripted collaborators

mod common;

use common::{RecordingMetrics, ScriptedIndex, ScriptedSource};
use graph_sync::config::{
    CategoryFlags, EXIT_CONFLICTING_FLAGS, EXIT_DOCUMENT_IDS_WITHOUT_CATEGORY,
    EXIT_MISSING_AMUN_API_URL, EXIT_RETRY, EXIT_SYNC_FAILED,
};
use graph_sync::sync::{CategorySyncer, SyncOptions, QUEUE_DEPTH_PER_WORKER};
use graph_sync::{
    Category, CategoryBinding, CategoryRegistry, CategoryStats, ConfigError, DocumentId, RunConfig,
    RunError, SyncError, SyncFlags, SyncOrchestrator,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn stats(processed: u64, synced: u64, skipped: u64, failed: u64) -> CategoryStats {
    CategoryStats {
        processed,
        synced,
        skipped,
        failed,
    }
}

fn orchestrator(
    categories: &[Category],
    source: &Arc<ScriptedSource>,
    index: &Arc<ScriptedIndex>,
    metrics: &Arc<RecordingMetrics>,
) -> SyncOrchestrator {
    let registry = CategoryRegistry::uniform(categories.iter().copied(), source.clone(), index.clone());
    SyncOrchestrator::new(registry, metrics.clone())
}

#[tokio::test]
async fn test_existing_document_is_skipped() {
    let source = Arc::new(ScriptedSource::new().with_ids(Category::Solver, &["a", "b", "c"]));
    let index = Arc::new(ScriptedIndex::new().with_existing(Category::Solver, "b"));
    let metrics = Arc::new(RecordingMetrics::new());

    let result = orchestrator(&[Category::Solver], &source, &index, &metrics)
        .run(&RunConfig::only(Category::Solver).graceful())
        .await
        .unwrap();

    assert_eq!(result.get(Category::Solver), Some(&stats(3, 2, 1, 0)));
    assert_eq!(index.inserted().len(), 2);
    // b was never fetched
    assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fail_fast_reports_stats_up_to_the_failure() {
    let source = Arc::new(ScriptedSource::new().with_ids(Category::Solver, &["a", "b", "c"]));
    let index = Arc::new(
        ScriptedIndex::new()
            .with_existing(Category::Solver, "b")
            .rejecting("c"),
    );
    let metrics = Arc::new(RecordingMetrics::new());

    let err = orchestrator(&[Category::Solver], &source, &index, &metrics)
        .run(&RunConfig::only(Category::Solver))
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), EXIT_SYNC_FAILED);
    let partial = err.partial_result().unwrap();
    assert_eq!(partial.get(Category::Solver), Some(&stats(3, 1, 1, 1)));
    match err {
        RunError::Aborted { source, .. } => {
            assert!(matches!(source, SyncError::Document { ref id, .. } if id.as_str() == "c"));
        }
        other => panic!("expected abort, got {other:?}"),
    }
    // Aborted categories still export their partial stats
    assert_eq!(metrics.records(), vec![(Category::Solver, stats(3, 1, 1, 1))]);
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let source = Arc::new(ScriptedSource::new().with_ids(Category::Adviser, &["a", "b", "c"]));
    let index = Arc::new(ScriptedIndex::new());
    let metrics = Arc::new(RecordingMetrics::new());
    let orchestrator = orchestrator(&[Category::Adviser], &source, &index, &metrics);
    let config = RunConfig::only(Category::Adviser);

    let first = orchestrator.run(&config).await.unwrap();
    let second = orchestrator.run(&config).await.unwrap();

    assert_eq!(first.get(Category::Adviser), Some(&stats(3, 3, 0, 0)));
    let second = second.get(Category::Adviser).unwrap();
    assert_eq!(second.synced, 0);
    assert_eq!(second.skipped, second.processed);
    assert_eq!(index.inserted().len(), 3);
}

#[tokio::test]
async fn test_force_resyncs_existing_documents() {
    let source = Arc::new(ScriptedSource::new().with_ids(Category::Solver, &["a", "b"]));
    let index = Arc::new(
        ScriptedIndex::new()
            .with_existing(Category::Solver, "a")
            .with_existing(Category::Solver, "b"),
    );
    let metrics = Arc::new(RecordingMetrics::new());

    let result = orchestrator(&[Category::Solver], &source, &index, &metrics)
        .run(&RunConfig::only(Category::Solver).forced())
        .await
        .unwrap();

    assert_eq!(result.get(Category::Solver), Some(&stats(2, 2, 0, 0)));
    assert_eq!(index.exists_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_abort_keeps_earlier_categories_and_stops_later_ones() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_ids(Category::Solver, &["solver-1", "solver-2"])
            .with_ids(Category::PackageExtract, &["analysis-1", "analysis-bad", "analysis-3"])
            .with_ids(Category::Adviser, &["adviser-1"]),
    );
    let index = Arc::new(ScriptedIndex::new().rejecting("analysis-bad"));
    let metrics = Arc::new(RecordingMetrics::new());
    let categories = [Category::Solver, Category::PackageExtract, Category::Adviser];

    let err = orchestrator(&categories, &source, &index, &metrics)
        .run(&RunConfig::all())
        .await
        .unwrap_err();

    let partial = err.partial_result().unwrap();
    assert_eq!(partial.get(Category::Solver), Some(&stats(2, 2, 0, 0)));
    assert_eq!(partial.get(Category::PackageExtract), Some(&stats(2, 1, 0, 1)));
    assert!(!partial.contains(Category::Adviser));
    assert!(!index.contains(Category::Adviser, "adviser-1"));
    assert_eq!(source.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_graceful_run_counts_failures_and_continues() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_ids(Category::Solver, &["a", "gone", "bad", "d"])
            .with_missing("gone")
            .with_ids(Category::Adviser, &["e"]),
    );
    let index = Arc::new(ScriptedIndex::new().rejecting("bad"));
    let metrics = Arc::new(RecordingMetrics::new());

    let result = orchestrator(&[Category::Solver, Category::Adviser], &source, &index, &metrics)
        .run(&RunConfig::all().graceful())
        .await
        .unwrap();

    assert_eq!(result.get(Category::Solver), Some(&stats(4, 2, 0, 2)));
    assert_eq!(result.get(Category::Adviser), Some(&stats(1, 1, 0, 0)));
    for (_, category_stats) in result.iter() {
        assert!(category_stats.is_conserved());
    }
}

#[tokio::test]
async fn test_two_category_flags_are_rejected_before_any_io() {
    let source = Arc::new(ScriptedSource::new().with_ids(Category::Solver, &["a"]));
    let index = Arc::new(ScriptedIndex::new());
    let metrics = Arc::new(RecordingMetrics::new());
    let _orchestrator = orchestrator(&[Category::Solver, Category::Adviser], &source, &index, &metrics);

    let mut categories = CategoryFlags::only(Category::Solver);
    categories.set(Category::Adviser);
    let err = RunConfig::resolve(&SyncFlags {
        categories,
        ..SyncFlags::default()
    })
    .unwrap_err();

    assert!(matches!(err, ConfigError::ConflictingCategories(_)));
    assert_eq!(err.exit_code(), EXIT_CONFLICTING_FLAGS);
    assert_eq!(source.calls(), 0);
    assert_eq!(index.calls(), 0);
}

#[tokio::test]
async fn test_invalid_configuration_performs_no_io() {
    let source = Arc::new(ScriptedSource::new().with_ids(Category::Solver, &["a"]));
    let index = Arc::new(ScriptedIndex::new());
    let metrics = Arc::new(RecordingMetrics::new());
    let orchestrator = orchestrator(&Category::ALL, &source, &index, &metrics);

    let err = orchestrator
        .run(&RunConfig::all().with_document_ids(["a"]))
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), EXIT_DOCUMENT_IDS_WITHOUT_CATEGORY);

    let err = orchestrator
        .run(&RunConfig::only(Category::Inspection))
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), EXIT_MISSING_AMUN_API_URL);

    assert_eq!(source.calls(), 0);
    assert_eq!(index.calls(), 0);
    assert!(metrics.records().is_empty());
}

#[tokio::test]
async fn test_unbound_category_is_a_configuration_error() {
    let source = Arc::new(ScriptedSource::new());
    let index = Arc::new(ScriptedIndex::new());
    let metrics = Arc::new(RecordingMetrics::new());

    let err = orchestrator(&[Category::Solver], &source, &index, &metrics)
        .run(&RunConfig::all().with_amun_api_url("http://amun.example"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::Config(ConfigError::UnboundCategory(Category::PackageExtract))
    ));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_explicit_ids_skip_the_listing() {
    let source = Arc::new(ScriptedSource::new().with_ids(Category::Solver, &["a", "b", "c"]));
    let index = Arc::new(ScriptedIndex::new());
    let metrics = Arc::new(RecordingMetrics::new());

    let result = orchestrator(&[Category::Solver], &source, &index, &metrics)
        .run(&RunConfig::only(Category::Solver).with_document_ids(["b", "z"]))
        .await
        .unwrap();

    assert_eq!(result.get(Category::Solver), Some(&stats(2, 2, 0, 0)));
    assert_eq!(source.list_calls.load(Ordering::SeqCst), 0);
    assert_eq!(index.inserted(), vec![DocumentId::from("b"), DocumentId::from("z")]);
}

#[tokio::test]
async fn test_retry_escapes_graceful_mode() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_ids(Category::Solver, &["a", "b", "c"])
            .with_ids(Category::Adviser, &["d"]),
    );
    let index = Arc::new(ScriptedIndex::new().retrying("b"));
    let metrics = Arc::new(RecordingMetrics::new());

    let err = orchestrator(&[Category::Solver, Category::Adviser], &source, &index, &metrics)
        .run(&RunConfig::all().graceful())
        .await
        .unwrap_err();

    assert!(err.is_retry());
    assert_eq!(err.exit_code(), EXIT_RETRY);
    // The retried document is not counted at all
    let partial = err.partial_result().unwrap();
    assert_eq!(partial.get(Category::Solver), Some(&stats(1, 1, 0, 0)));
    assert!(!partial.contains(Category::Adviser));
    assert_eq!(index.insert_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_metrics_failure_is_not_fatal() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_ids(Category::Solver, &["a"])
            .with_ids(Category::Adviser, &["b"]),
    );
    let index = Arc::new(ScriptedIndex::new());
    let metrics = Arc::new(RecordingMetrics::failing());

    let result = orchestrator(&[Category::Solver, Category::Adviser], &source, &index, &metrics)
        .run(&RunConfig::all())
        .await
        .unwrap();

    assert_eq!(result.totals(), stats(2, 2, 0, 0));
    assert_eq!(metrics.records().len(), 2);
}

#[tokio::test]
async fn test_graceful_listing_failure_skips_the_category() {
    let source = Arc::new(
        ScriptedSource::new()
            .with_failing_listing(Category::Solver)
            .with_ids(Category::Adviser, &["b"]),
    );
    let index = Arc::new(ScriptedIndex::new());
    let metrics = Arc::new(RecordingMetrics::new());
    let orchestrator = orchestrator(&[Category::Solver, Category::Adviser], &source, &index, &metrics);

    let result = orchestrator.run(&RunConfig::all().graceful()).await.unwrap();
    assert_eq!(result.get(Category::Solver), Some(&CategoryStats::new()));
    assert_eq!(result.get(Category::Adviser), Some(&stats(1, 1, 0, 0)));

    let err = orchestrator.run(&RunConfig::all()).await.unwrap_err();
    assert_eq!(err.exit_code(), EXIT_SYNC_FAILED);
    assert!(matches!(
        err,
        RunError::Aborted {
            source: SyncError::Listing { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_parallel_matches_sequential() {
    let ids: Vec<String> = (0..24).map(|i| format!("doc-{i:02}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let mut outcomes = Vec::new();
    for workers in [0, 1, 2, 4] {
        let source = Arc::new(
            ScriptedSource::new()
                .with_ids(Category::Solver, &id_refs)
                .with_missing("doc-07"),
        );
        let index = Arc::new(
            ScriptedIndex::new()
                .with_existing(Category::Solver, "doc-03")
                .rejecting("doc-11")
                .rejecting("doc-19"),
        );
        let binding = CategoryBinding::new(source, index.clone());
        let syncer = CategorySyncer::new(Category::Solver, &binding).with_workers(workers);

        let result = syncer.sync(&[], SyncOptions::new().graceful()).await.unwrap();
        assert!(result.is_conserved());
        assert_eq!(index.inserted().len(), 20, "workers={workers}");
        outcomes.push(result);
    }

    assert!(outcomes.iter().all(|s| *s == stats(24, 20, 1, 3)), "{outcomes:?}");
}

#[tokio::test]
async fn test_parallel_fail_fast_stops_the_category() {
    let ids: Vec<String> = (0..40).map(|i| format!("doc-{i:02}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let source = Arc::new(ScriptedSource::new().with_ids(Category::Solver, &id_refs));
    let index = Arc::new(ScriptedIndex::new().rejecting("doc-05"));
    let binding = CategoryBinding::new(source, index.clone());

    let err = CategorySyncer::new(Category::Solver, &binding)
        .with_workers(4)
        .sync(&[], SyncOptions::new())
        .await
        .unwrap_err();

    let partial = err.partial_stats().unwrap();
    assert!(partial.is_conserved());
    assert!(partial.failed >= 1);
    assert_eq!(partial.synced as usize, index.inserted().len());
}

#[tokio::test]
async fn test_parallel_fetching_waits_for_slow_insertions() {
    let ids: Vec<String> = (0..5000).map(|i| format!("doc-{i:04}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let source = Arc::new(ScriptedSource::new().with_ids(Category::Solver, &id_refs));
    let index = Arc::new(ScriptedIndex::new().stalling());
    let binding = CategoryBinding::new(source.clone(), index.clone());
    let syncer = CategorySyncer::new(Category::Solver, &binding).with_workers(4);

    let run = syncer.sync(&[], SyncOptions::new());
    assert!(tokio::time::timeout(Duration::from_millis(200), run)
        .await
        .is_err());

    // one document per worker, a full queue, and the one waiting to be queued
    let fetched = source.fetch_calls.load(Ordering::SeqCst);
    assert!(fetched <= 4 + 4 * QUEUE_DEPTH_PER_WORKER + 1, "fetched={fetched}");
    assert_eq!(index.insert_calls.load(Ordering::SeqCst), 4);
}

//! Export of per-category counters
//!
//! Sinks are best-effort: the orchestrator logs their failures and never lets
//! them change the outcome of a run.

use crate::sync::{Category, CategoryStats};
use async_trait::async_trait;
use prometheus::{Encoder, Gauge, IntGauge, Opts, Registry, TextEncoder};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Job name used as the Pushgateway grouping key
pub const JOB_NAME: &str = "graph-sync";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid Pushgateway URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pushgateway at {url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),
}

/// Receives one record per category that ran
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn record(
        &self,
        category: Category,
        stats: &CategoryStats,
        duration: Duration,
    ) -> Result<(), MetricsError>;
}

/// Writes counters to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetricsSink;

#[async_trait]
impl MetricsSink for LogMetricsSink {
    async fn record(
        &self,
        category: Category,
        stats: &CategoryStats,
        duration: Duration,
    ) -> Result<(), MetricsError> {
        info!(
            %category,
            processed = stats.processed,
            synced = stats.synced,
            skipped = stats.skipped,
            failed = stats.failed,
            duration_secs = duration.as_secs_f64(),
            "category metrics"
        );
        Ok(())
    }
}

/// Pushes counters to a Prometheus Pushgateway, one group per category
#[derive(Debug, Clone)]
pub struct PushgatewayMetricsSink {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl PushgatewayMetricsSink {
    pub fn new(base_url: &str) -> Result<Self, MetricsError> {
        let parsed = reqwest::Url::parse(base_url).map_err(|err| MetricsError::InvalidUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Grouping-key URL for a category
    pub fn group_url(&self, category: Category) -> Result<reqwest::Url, MetricsError> {
        let path = format!("metrics/job/{}/category/{}", JOB_NAME, category.slug());
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(&path).map_err(|err| MetricsError::InvalidUrl {
            url: self.base_url.to_string(),
            reason: err.to_string(),
        })
    }
}

#[async_trait]
impl MetricsSink for PushgatewayMetricsSink {
    async fn record(
        &self,
        category: Category,
        stats: &CategoryStats,
        duration: Duration,
    ) -> Result<(), MetricsError> {
        let url = self.group_url(category)?;
        let body = render_exposition(stats, duration)?;
        let response = self
            .client
            .put(url.clone())
            .header(
                reqwest::header::CONTENT_TYPE,
                TextEncoder::new().format_type(),
            )
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MetricsError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Encode counters in the Prometheus text exposition format
///
/// Labels come from the grouping key, so samples carry none.
pub fn render_exposition(
    stats: &CategoryStats,
    duration: Duration,
) -> Result<Vec<u8>, MetricsError> {
    let registry = Registry::new();
    let counters = [
        (
            "graph_sync_documents_processed",
            "Documents considered for sync",
            stats.processed,
        ),
        (
            "graph_sync_documents_synced",
            "Documents inserted into the graph",
            stats.synced,
        ),
        (
            "graph_sync_documents_skipped",
            "Documents already present in the graph",
            stats.skipped,
        ),
        (
            "graph_sync_documents_failed",
            "Documents whose fetch or insertion failed",
            stats.failed,
        ),
    ];
    for (name, help, value) in counters {
        let gauge = IntGauge::with_opts(Opts::new(name, help))?;
        gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
        registry.register(Box::new(gauge))?;
    }
    let elapsed = Gauge::with_opts(Opts::new(
        "graph_sync_duration_seconds",
        "Wall time spent syncing the category",
    ))?;
    elapsed.set(duration.as_secs_f64());
    registry.register(Box::new(elapsed))?;

    let mut body = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut body)?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_contains_every_counter() {
        let stats = CategoryStats {
            processed: 3,
            synced: 2,
            skipped: 1,
            failed: 0,
        };
        let body = render_exposition(&stats, Duration::from_millis(1500)).unwrap();
        let body = String::from_utf8(body).unwrap();

        assert!(body.contains("graph_sync_documents_processed 3\n"));
        assert!(body.contains("graph_sync_documents_synced 2\n"));
        assert!(body.contains("graph_sync_documents_skipped 1\n"));
        assert!(body.contains("graph_sync_documents_failed 0\n"));
        assert!(body.contains("graph_sync_duration_seconds 1.5\n"));
        assert_eq!(body.matches("# TYPE").count(), 5);
        assert_eq!(body.matches(" gauge\n").count(), 5);
    }

    #[test]
    fn group_url_appends_job_and_category() {
        let sink = PushgatewayMetricsSink::new("http://pushgateway:9091").unwrap();
        assert_eq!(
            sink.group_url(Category::PackageExtract).unwrap().as_str(),
            "http://pushgateway:9091/metrics/job/graph-sync/category/package-extract"
        );

        let sink = PushgatewayMetricsSink::new("http://gw.example/prefix").unwrap();
        assert_eq!(
            sink.group_url(Category::Solver).unwrap().as_str(),
            "http://gw.example/prefix/metrics/job/graph-sync/category/solver"
        );
    }

    #[test]
    fn invalid_pushgateway_url_is_rejected() {
        assert!(matches!(
            PushgatewayMetricsSink::new("::nope"),
            Err(MetricsError::InvalidUrl { .. })
        ));
    }
}

//! Metrics for the affiliation pipeline
//!
//! Stages record counters and histograms through [`MetricName`] so the metric
//! catalogue lives in one place. A Prometheus recorder is installed by [`init`];
//! without it every call here is a no-op, which is what unit tests rely on.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Every metric emitted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Acquisition
    SourceObjectsListed,
    SourceBytesDownloaded,

    // Extraction
    ArticlesExtracted,
    AuthorsExtracted,
    RowsFlattened,

    // Enrichment
    EmailsExtracted,
    ZipcodesExtracted,
    NerRequests,
    NerCacheHits,
    CountriesIdentified,
    InstitutionsIdentified,

    // Resolution
    ResolutionSourceIdentity,
    ResolutionRegistryMatches,
    ResolutionAliasMatches,
    ResolutionUnresolved,
    ResolutionScore,

    // Sink
    RowsWritten,
    NotificationsPublished,
    RunDuration,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourceObjectsListed => "pubmed_source_objects_listed_total",
            MetricName::SourceBytesDownloaded => "pubmed_source_bytes_downloaded",
            MetricName::ArticlesExtracted => "pubmed_articles_extracted_total",
            MetricName::AuthorsExtracted => "pubmed_authors_extracted_total",
            MetricName::RowsFlattened => "pubmed_rows_flattened_total",
            MetricName::EmailsExtracted => "pubmed_emails_extracted_total",
            MetricName::ZipcodesExtracted => "pubmed_zipcodes_extracted_total",
            MetricName::NerRequests => "pubmed_ner_requests_total",
            MetricName::NerCacheHits => "pubmed_ner_cache_hits_total",
            MetricName::CountriesIdentified => "pubmed_countries_identified_total",
            MetricName::InstitutionsIdentified => "pubmed_institutions_identified_total",
            MetricName::ResolutionSourceIdentity => "pubmed_resolution_source_identity_total",
            MetricName::ResolutionRegistryMatches => "pubmed_resolution_registry_matches_total",
            MetricName::ResolutionAliasMatches => "pubmed_resolution_alias_matches_total",
            MetricName::ResolutionUnresolved => "pubmed_resolution_unresolved_total",
            MetricName::ResolutionScore => "pubmed_resolution_score",
            MetricName::RowsWritten => "pubmed_rows_written_total",
            MetricName::NotificationsPublished => "pubmed_notifications_published_total",
            MetricName::RunDuration => "pubmed_run_duration_seconds",
        }
    }
}

/// Install the Prometheus recorder for this process
pub fn init() -> Result<PrometheusHandle, Box<dyn std::error::Error>> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    info!("Metrics recorder installed");
    Ok(handle)
}

/// Write the current metric values in Prometheus text format
pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, handle.render())?;
    info!("Metrics snapshot written to {}", path.display());
    Ok(())
}

pub fn emit_counter(name: MetricName, value: u64) {
    ::metrics::counter!(name.as_str()).increment(value);
}

pub fn emit_histogram(name: MetricName, value: f64) {
    ::metrics::histogram!(name.as_str()).record(value);
}

pub fn emit_gauge(name: MetricName, value: f64) {
    ::metrics::gauge!(name.as_str()).set(value);
}

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::app::acquire_use_case::AcquireUseCase;
use crate::app::enrich_use_case::EnrichUseCase;
use crate::app::ports::{EntityExtractorPort, NotifierPort, ObjectStorePort};
use crate::app::publish_use_case::{PublishTarget, PublishUseCase};
use crate::config::{Config, ReferenceConfig};
use crate::domain::{ArticleRecord, EnrichedRow, FlatRow, IdentitySource};
use crate::infra::csv_output::write_rows_to_path;
use crate::observability::metrics::{emit_counter, emit_gauge, MetricName};
use crate::pipeline::processing::enrich::extract_affiliation_fields;
use crate::pipeline::processing::extract::extract_articles_from_path;
use crate::pipeline::processing::flatten::flatten_articles;
use crate::pipeline::processing::resolution::InstitutionResolver;
use crate::registry::{AliasTable, CountryAllowList, InstitutionRegistry};

/// Timestamp format embedded in the uploaded object key
pub const OUTPUT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// External collaborators of a run
#[derive(Clone)]
pub struct PipelinePorts {
    pub object_store: Arc<dyn ObjectStorePort>,
    pub extractor: Arc<dyn EntityExtractorPort>,
    pub notifier: Arc<dyn NotifierPort>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub source_key: String,
    pub source_sha256: String,
    pub articles: usize,
    pub rows: usize,
    pub resolved_rows: usize,
    pub output_bucket: String,
    pub output_key: String,
}

/// Run the whole pipeline once: reference data, acquisition, extraction,
/// flattening, enrichment, then publication. Any stage failure aborts the run
/// before anything is uploaded or announced.
pub async fn run_pipeline(config: &Config, ports: PipelinePorts) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let span = info_span!("pipeline_run", run_id = %run_id);
    run_stages(config, ports, run_id).instrument(span).await
}

async fn run_stages(config: &Config, ports: PipelinePorts, run_id: Uuid) -> Result<RunSummary> {
    let started = Instant::now();
    let timestamp = Utc::now().format(OUTPUT_TIMESTAMP_FORMAT).to_string();
    info!("Starting run at {}", timestamp);

    let resolver = load_resolver(&config.reference())?;
    let countries = CountryAllowList::load(&config.world_countries_path)
        .with_context(|| format!("Failed to load {}", config.world_countries_path.display()))?;
    info!(
        "Reference data: {} institutions, {} aliases, {} countries",
        resolver.registry().len(),
        resolver.aliases().len(),
        countries.len()
    );

    let source = AcquireUseCase::new(ports.object_store.clone())
        .acquire(&config.input_bucket, &config.input_prefix, &config.source_xml_path())
        .await?;

    let articles = extract_articles_from_path(&source.local_path, config.resolution.article_cap)
        .with_context(|| format!("Failed to extract articles from {}", source.key))?;
    let rows = flatten_with_metrics(&articles);

    let enrich = EnrichUseCase::new(
        ports.extractor.clone(),
        countries,
        config.resolution.institution_keywords.clone(),
        resolver,
    );
    let enriched = enrich.enrich_batch(rows).await?;
    let resolved_rows = enriched
        .iter()
        .filter(|row| row.identity.is_some())
        .count();

    let target = PublishTarget {
        local_path: config.processed_csv_path(),
        bucket: config.output_bucket.clone(),
        key: config.output_key(&timestamp),
        topic: config.notify_topic.clone(),
    };
    let outcome = PublishUseCase::new(ports.object_store.clone(), ports.notifier.clone())
        .publish(&enriched, &target)
        .await?;

    let elapsed = started.elapsed().as_secs_f64();
    emit_gauge(MetricName::RunDuration, elapsed);
    info!("Run finished in {:.2}s", elapsed);

    Ok(RunSummary {
        run_id,
        source_key: source.key,
        source_sha256: source.sha256,
        articles: articles.len(),
        rows: outcome.rows_written,
        resolved_rows,
        output_bucket: outcome.bucket,
        output_key: outcome.key,
    })
}

/// Registry (required) and alias table (optional) from the configured directory
pub fn load_resolver(reference: &ReferenceConfig) -> Result<InstitutionResolver> {
    let registry = InstitutionRegistry::load(reference.institutes_path())
        .with_context(|| format!("Failed to load {}", reference.institutes_path().display()))?;
    let aliases = AliasTable::load_or_empty(reference.aliases_path());
    Ok(InstitutionResolver::new(
        registry,
        aliases,
        reference.resolution.similarity_threshold,
    ))
}

fn flatten_with_metrics(articles: &[ArticleRecord]) -> Vec<FlatRow> {
    let authors: usize = articles.iter().map(|a| a.authors.len()).sum();
    let rows = flatten_articles(articles);
    emit_counter(MetricName::ArticlesExtracted, articles.len() as u64);
    emit_counter(MetricName::AuthorsExtracted, authors as u64);
    emit_counter(MetricName::RowsFlattened, rows.len() as u64);
    info!(
        "Extracted {} articles with {} authors into {} rows",
        articles.len(),
        authors,
        rows.len()
    );
    rows
}

/// Offline variant for a local document: extraction, flattening and the regex
/// fields only. Rows keep their source identity or stay unresolved.
pub fn extract_only(input: &Path, output: &Path, article_cap: Option<usize>) -> Result<usize> {
    let articles = extract_articles_from_path(input, article_cap)
        .with_context(|| format!("Failed to extract articles from {}", input.display()))?;
    let rows: Vec<EnrichedRow> = flatten_with_metrics(&articles)
        .into_iter()
        .map(|row| {
            let fields = extract_affiliation_fields(&row.affiliation);
            let identity_source = if row.has_source_identity() {
                IdentitySource::Source
            } else {
                IdentitySource::Unresolved
            };
            EnrichedRow {
                identity: row.source_identity.clone(),
                row,
                email: fields.email,
                zipcode: fields.zipcode,
                country: None,
                institution: None,
                registry_name: None,
                identity_source,
            }
        })
        .collect();

    let written = write_rows_to_path(output, &rows)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">111</PMID>
      <Article>
        <ArticleTitle>First</ArticleTitle>
        <AuthorList>
          <Author>
            <LastName>Berg</LastName>
            <ForeName>Anna</ForeName>
            <AffiliationInfo>
              <Affiliation>Lund University, 221 00 Lund, Sweden. anna@lu.se</Affiliation>
              <Identifier Source="GRID">grid.4514.4</Identifier>
            </AffiliationInfo>
          </Author>
          <Author>
            <LastName>Holm</LastName>
            <ForeName>Erik</ForeName>
            <AffiliationInfo>
              <Affiliation>Karolinska Institutet, Stockholm, Sweden</Affiliation>
            </AffiliationInfo>
          </Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_extract_only_keeps_source_identity() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("batch.xml");
        let output = dir.path().join("out/rows.csv");
        std::fs::write(&input, DOCUMENT).unwrap();

        assert_eq!(extract_only(&input, &output, None).unwrap(), 2);

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&records[0][9], "grid.4514.4");
        assert_eq!(&records[0][11], "anna@lu.se");
        assert_eq!(&records[0][16], "source");
        assert_eq!(&records[1][9], "");
        assert_eq!(&records[1][16], "unresolved");
    }

    #[test]
    fn test_extract_only_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_only(&dir.path().join("absent.xml"), &dir.path().join("out.csv"), None)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<crate::error::EtlError>(),
            Some(crate::error::EtlError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_load_resolver_from_reference_settings_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("institutes.csv"),
            "grid_id,name\ngrid.4514.4,Lund University\n",
        )
        .unwrap();
        let grid_dir = dir.path().display().to_string();
        let reference = ReferenceConfig::from_lookup(|key| match key {
            "GRID_DATA_DIR" => Some(grid_dir.clone()),
            _ => None,
        })
        .unwrap();

        let resolver = load_resolver(&reference).unwrap();
        assert!(resolver.aliases().is_empty());
        assert_eq!(resolver.resolve("Lund University").canonical_id(), Some("grid.4514.4"));
    }

    #[test]
    fn test_timestamp_format() {
        let stamp = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
            .format(OUTPUT_TIMESTAMP_FORMAT)
            .to_string();
        assert_eq!(stamp, "2024-01-02_03-04-05");
    }
}

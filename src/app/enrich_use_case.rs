use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::app::ports::EntityExtractorPort;
use crate::domain::{EnrichedRow, Entity, FlatRow, IdentitySource};
use crate::observability::metrics::{emit_counter, emit_histogram, MetricName};
use crate::pipeline::processing::enrich::extract_affiliation_fields;
use crate::pipeline::processing::entities::{identify_country, identify_institution};
use crate::pipeline::processing::resolution::{resolve_row_identity, InstitutionResolver};
use crate::registry::CountryAllowList;

/// Enriches flat rows: regex fields, NER-based country and institution, then
/// resolution of the institution to a canonical id.
pub struct EnrichUseCase {
    extractor: Arc<dyn EntityExtractorPort>,
    countries: CountryAllowList,
    institution_keywords: Vec<String>,
    resolver: InstitutionResolver,
}

impl EnrichUseCase {
    pub fn new(
        extractor: Arc<dyn EntityExtractorPort>,
        countries: CountryAllowList,
        institution_keywords: Vec<String>,
        resolver: InstitutionResolver,
    ) -> Self {
        Self {
            extractor,
            countries,
            institution_keywords,
            resolver,
        }
    }

    /// Enrich one row given the entities already recognised in its affiliation
    pub fn enrich_with_entities(&self, row: FlatRow, entities: &[Entity]) -> EnrichedRow {
        let fields = extract_affiliation_fields(&row.affiliation);
        let country = identify_country(entities, &self.countries);
        let institution = identify_institution(entities, &self.institution_keywords);
        let identity = resolve_row_identity(&row, institution.as_deref(), &self.resolver);

        if fields.email.is_some() {
            emit_counter(MetricName::EmailsExtracted, 1);
        }
        if fields.zipcode.is_some() {
            emit_counter(MetricName::ZipcodesExtracted, 1);
        }
        if country.is_some() {
            emit_counter(MetricName::CountriesIdentified, 1);
        }
        if institution.is_some() {
            emit_counter(MetricName::InstitutionsIdentified, 1);
        }
        match identity.identity_source {
            IdentitySource::Source => emit_counter(MetricName::ResolutionSourceIdentity, 1),
            IdentitySource::Registry => emit_counter(MetricName::ResolutionRegistryMatches, 1),
            IdentitySource::Alias => emit_counter(MetricName::ResolutionAliasMatches, 1),
            IdentitySource::Unresolved => emit_counter(MetricName::ResolutionUnresolved, 1),
        }
        if let Some(score) = identity.score {
            emit_histogram(MetricName::ResolutionScore, score);
        }

        EnrichedRow {
            row,
            email: fields.email,
            zipcode: fields.zipcode,
            country,
            institution,
            registry_name: identity.registry_name,
            identity: identity.identity,
            identity_source: identity.identity_source,
        }
    }

    /// Enrich every row in order, querying the NER oracle once per distinct
    /// affiliation string. The first oracle failure aborts the batch.
    pub async fn enrich_batch(&self, rows: Vec<FlatRow>) -> Result<Vec<EnrichedRow>> {
        let total = rows.len();
        let mut cache: HashMap<String, Vec<Entity>> = HashMap::new();
        let mut enriched = Vec::with_capacity(total);

        for (index, row) in rows.into_iter().enumerate() {
            debug!("Enriching row {} of {}", index + 1, total);
            if !cache.contains_key(&row.affiliation) {
                let entities = self
                    .extractor
                    .extract_entities(&row.affiliation)
                    .await
                    .with_context(|| format!("Entity recognition failed for row {}", index + 1))?;
                emit_counter(MetricName::NerRequests, 1);
                cache.insert(row.affiliation.clone(), entities);
            } else {
                emit_counter(MetricName::NerCacheHits, 1);
            }
            let entities = cache.get(&row.affiliation).cloned().unwrap_or_default();
            enriched.push(self.enrich_with_entities(row, &entities));
        }

        let resolved = enriched
            .iter()
            .filter(|row| row.identity_source != IdentitySource::Unresolved)
            .count();
        info!(
            "Enriched {} rows ({} distinct affiliations, {} with an identity)",
            total,
            cache.len(),
            resolved
        );
        Ok(enriched)
    }
}

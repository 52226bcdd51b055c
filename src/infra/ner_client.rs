use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::ports::EntityExtractorPort;
use crate::domain::{Entity, EntityLabel};
use crate::error::{EtlError, Result};

#[derive(Debug, Serialize)]
struct NerRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct NerSpan {
    text: String,
    label: String,
}

/// NER oracle served over HTTP.
///
/// Each call POSTs `{"text": ...}` to the endpoint and expects a JSON array of
/// `{"text": ..., "label": ...}` spans, with spaCy style labels (`GPE`, `LOC`,
/// `ORG`, ...).
pub struct HttpEntityExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEntityExtractor {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EntityExtractorPort for HttpEntityExtractor {
    async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&NerRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::Ner {
                message: format!("NER endpoint {} returned {}", self.endpoint, status),
            });
        }

        let body = response.bytes().await?;
        let entities = parse_spans(&body)?;
        debug!("NER returned {} spans", entities.len());
        Ok(entities)
    }
}

/// Decode a NER response body into entities, keeping the service's order
fn parse_spans(body: &[u8]) -> Result<Vec<Entity>> {
    let spans: Vec<NerSpan> = serde_json::from_slice(body)?;
    Ok(spans
        .into_iter()
        .map(|span| Entity {
            label: EntityLabel::from_raw(&span.label),
            text: span.text,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_map_to_entities_in_order() {
        let body = br#"[
            {"text": "Karolinska Institutet", "label": "ORG"},
            {"text": "Stockholm", "label": "GPE"},
            {"text": "Sweden", "label": "LOC", "start": 34, "end": 40},
            {"text": "2019", "label": "DATE"}
        ]"#;
        let entities = parse_spans(body).unwrap();
        assert_eq!(
            entities,
            vec![
                Entity::organization("Karolinska Institutet"),
                Entity::location("Stockholm"),
                Entity::location("Sweden"),
                Entity {
                    text: "2019".to_string(),
                    label: EntityLabel::Other("DATE".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_malformed_body_is_json_error() {
        assert!(matches!(parse_spans(b"{\"error\": \"model unavailable\"}"), Err(EtlError::Json(_))));
        assert!(matches!(parse_spans(b"[{\"text\": \"Lund\"}]"), Err(EtlError::Json(_))));
        assert!(parse_spans(b"[]").unwrap().is_empty());
    }
}

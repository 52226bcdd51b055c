use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::app::ports::EntityExtractorPort;
use crate::domain::Entity;
use crate::error::Result;

/// Deterministic NER stand-in: canned entities per input text, nothing for
/// unknown text. Counts calls so callers can check how often the oracle is hit.
#[derive(Debug, Default)]
pub struct StaticEntityExtractor {
    responses: HashMap<String, Vec<Entity>>,
    calls: AtomicUsize,
}

impl StaticEntityExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, text: &str, entities: Vec<Entity>) -> Self {
        self.responses.insert(text.to_string(), entities);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityExtractorPort for StaticEntityExtractor {
    async fn extract_entities(&self, text: &str) -> Result<Vec<Entity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.responses.get(text).cloned().unwrap_or_default())
    }
}

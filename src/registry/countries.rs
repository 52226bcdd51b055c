use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::error::{EtlError, Result};

/// Known country names, one per line in the source file
#[derive(Debug, Clone, Default)]
pub struct CountryAllowList {
    names: HashSet<String>,
}

impl CountryAllowList {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = lines
            .into_iter()
            .map(|line| line.as_ref().trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self { names }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read country list {}: {}", path.display(), e))
        })?;
        let list = Self::from_lines(content.lines());
        info!("Loaded {} country names from {}", list.len(), path.display());
        Ok(list)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

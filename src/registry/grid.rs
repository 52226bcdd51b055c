use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::domain::{AliasEntry, RegistryInstitution};
use crate::error::{EtlError, Result};

#[derive(Debug, Deserialize)]
struct InstituteRow {
    grid_id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct AliasRow {
    grid_id: String,
    alias: String,
}

/// A registry institution with its lower-cased name precomputed for scoring
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    institution: RegistryInstitution,
    folded_name: String,
    folded_len: usize,
}

impl RegistryEntry {
    pub fn new(institution: RegistryInstitution) -> Self {
        let folded_name = institution.name.to_lowercase();
        let folded_len = folded_name.chars().count();
        Self {
            institution,
            folded_name,
            folded_len,
        }
    }

    pub fn institution(&self) -> &RegistryInstitution {
        &self.institution
    }

    pub fn folded_name(&self) -> &str {
        &self.folded_name
    }

    /// Length of the lower-cased name in characters
    pub fn folded_len(&self) -> usize {
        self.folded_len
    }
}

/// The GRID institutes table, kept in file order
#[derive(Debug, Clone, Default)]
pub struct InstitutionRegistry {
    entries: Vec<RegistryEntry>,
}

impl InstitutionRegistry {
    pub fn new(institutions: Vec<RegistryInstitution>) -> Self {
        Self {
            entries: institutions.into_iter().map(RegistryEntry::new).collect(),
        }
    }

    /// Load `institutes.csv`; the file must exist and carry `grid_id` and `name` columns
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            EtlError::Config(format!("Failed to open registry file {}: {}", path.display(), e))
        })?;
        let registry = Self::from_reader(file)?;
        info!(
            "Loaded {} registry institutions from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut institutions = Vec::new();
        for row in csv_reader.deserialize::<InstituteRow>() {
            let row = row?;
            institutions.push(RegistryInstitution {
                name: row.name,
                canonical_id: row.grid_id,
            });
        }
        Ok(Self::new(institutions))
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Alternate institution spellings mapped to canonical ids.
///
/// Lookups are exact and case-sensitive. When an alias is listed more than once
/// the first row wins.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn from_entries<I: IntoIterator<Item = AliasEntry>>(entries: I) -> Self {
        let mut map = HashMap::new();
        for entry in entries {
            map.entry(entry.alias).or_insert(entry.canonical_id);
        }
        Self { entries: map }
    }

    /// Load `aliases.csv`, falling back to an empty table when the file is missing or malformed
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Alias table {} unavailable, continuing without aliases: {}", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_reader(file) {
            Ok(table) => {
                info!("Loaded {} aliases from {}", table.len(), path.display());
                table
            }
            Err(e) => {
                warn!("Alias table {} is malformed, continuing without aliases: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut entries = Vec::new();
        for row in csv_reader.deserialize::<AliasRow>() {
            let row = row?;
            entries.push(AliasEntry {
                alias: row.alias,
                canonical_id: row.grid_id,
            });
        }
        Ok(Self::from_entries(entries))
    }

    pub fn lookup(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTITUTES: &str = "grid_id,name,wikipedia_url,established\n\
grid.1.a,Harvard University,https://en.wikipedia.org/wiki/Harvard_University,1636\n\
grid.2.b,Karolinska Institutet,,1810\n";

    #[test]
    fn test_registry_keeps_file_order_and_ignores_extra_columns() {
        let registry = InstitutionRegistry::from_reader(INSTITUTES.as_bytes()).unwrap();
        assert_eq!(registry.len(), 2);
        let entries = registry.entries();
        assert_eq!(entries[0].institution().name, "Harvard University");
        assert_eq!(entries[0].institution().canonical_id, "grid.1.a");
        assert_eq!(entries[1].institution().canonical_id, "grid.2.b");
    }

    #[test]
    fn test_entries_fold_names_once() {
        let registry = InstitutionRegistry::new(vec![RegistryInstitution {
            name: "Université Laval".to_string(),
            canonical_id: "grid.23856.3a".to_string(),
        }]);
        let entry = &registry.entries()[0];
        assert_eq!(entry.folded_name(), "université laval");
        assert_eq!(entry.folded_len(), 16);
        assert_eq!(entry.institution().name, "Université Laval");
    }

    #[test]
    fn test_missing_registry_file_is_an_error() {
        let result = InstitutionRegistry::load("/definitely/not/here/institutes.csv");
        assert!(matches!(result, Err(EtlError::Config(_))));
    }

    #[test]
    fn test_alias_lookup_is_case_sensitive_and_first_wins() {
        let csv = "grid_id,alias\ngrid.1.a,Harvard\ngrid.9.z,Harvard\ngrid.2.b,KI\n";
        let table = AliasTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.lookup("Harvard"), Some("grid.1.a"));
        assert_eq!(table.lookup("harvard"), None);
        assert_eq!(table.lookup("KI"), Some("grid.2.b"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_missing_alias_file_is_empty_table() {
        let table = AliasTable::load_or_empty("/definitely/not/here/aliases.csv");
        assert!(table.is_empty());
    }

    #[test]
    fn test_malformed_alias_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.csv");
        std::fs::write(&path, "grid_id,something_else\ngrid.1.a,Harvard\n").unwrap();

        let table = AliasTable::load_or_empty(&path);
        assert!(table.is_empty());
    }
}

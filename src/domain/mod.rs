//! Record shapes shared by every pipeline stage.

use serde::{Deserialize, Serialize};

/// One `PubmedArticle` as extracted from the source document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: Option<String>,
    pub pmid: Option<String>,
    pub year: Option<String>,
    pub keywords: Vec<String>,
    pub mesh_terms: Vec<String>,
    pub authors: Vec<AuthorRecord>,
}

/// An author of an article together with every affiliation string listed for them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    pub forename: Option<String>,
    pub lastname: Option<String>,
    pub initials: Option<String>,
    /// GRID identifier already present in the source document
    pub source_identity: Option<String>,
    pub affiliations: Vec<String>,
}

impl AuthorRecord {
    /// Forename and lastname joined by a single space, using whichever are present
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.forename.as_deref(), self.lastname.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Whether the source document already identified this author's institution
    pub fn has_source_identity(&self) -> bool {
        self.source_identity
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }
}

/// Denormalized (article, author, affiliation) triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    pub title: Option<String>,
    pub pmid: Option<String>,
    pub year: Option<String>,
    pub keywords: Vec<String>,
    pub mesh_terms: Vec<String>,
    pub forename: Option<String>,
    pub lastname: Option<String>,
    pub full_name: Option<String>,
    pub initials: Option<String>,
    pub source_identity: Option<String>,
    pub affiliation: String,
}

impl FlatRow {
    pub fn has_source_identity(&self) -> bool {
        self.source_identity
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }
}

/// Where the final identity of a row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentitySource {
    /// Supplied by the source document; never overwritten
    Source,
    /// Fuzzy match against the registry
    Registry,
    /// Exact match in the alias table
    Alias,
    Unresolved,
}

impl IdentitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentitySource::Source => "source",
            IdentitySource::Registry => "registry",
            IdentitySource::Alias => "alias",
            IdentitySource::Unresolved => "unresolved",
        }
    }
}

/// A flat row after regex enrichment, entity recognition and resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub row: FlatRow,
    pub email: Option<String>,
    pub zipcode: Option<String>,
    pub country: Option<String>,
    /// Institution candidate picked from the NER organisation entities
    pub institution: Option<String>,
    /// Name of the registry entry the candidate matched
    pub registry_name: Option<String>,
    /// Final canonical identifier
    pub identity: Option<String>,
    pub identity_source: IdentitySource,
}

/// Entry of the GRID institutes table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInstitution {
    pub name: String,
    pub canonical_id: String,
}

/// Entry of the GRID aliases table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub alias: String,
    pub canonical_id: String,
}

/// Entity category reported by the NER oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityLabel {
    Location,
    Organization,
    Other(String),
}

impl EntityLabel {
    /// Map a raw model label (spaCy style or spelled out) onto a category
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "GPE" | "LOC" | "LOCATION" => EntityLabel::Location,
            "ORG" | "ORGANIZATION" | "ORGANISATION" => EntityLabel::Organization,
            _ => EntityLabel::Other(raw.to_string()),
        }
    }
}

/// Labelled text span returned by the NER oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
}

impl Entity {
    pub fn location(text: &str) -> Self {
        Self {
            text: text.to_string(),
            label: EntityLabel::Location,
        }
    }

    pub fn organization(text: &str) -> Self {
        Self {
            text: text.to_string(),
            label: EntityLabel::Organization,
        }
    }
}

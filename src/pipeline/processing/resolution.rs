//! Entity resolution: institution name candidate → canonical registry id.
//!
//! Resolution is a pure function of the candidate and the read-only reference
//! tables:
//!
//! 1. score every registry name with `1 - normalized Levenshtein distance` over
//!    the lower-cased strings and keep the best entry; accept it when the score
//!    reaches the threshold. Among entries sharing the best score, one whose name
//!    equals the candidate exactly wins, otherwise the first in registry order,
//! 2. otherwise look the candidate up verbatim in the alias table,
//! 3. otherwise the candidate is unresolved.
//!
//! Rows that already carry an identity from the source document are never passed
//! through here; see [`resolve_row_identity`].

use serde::Serialize;

use crate::domain::{FlatRow, IdentitySource};
use crate::registry::{AliasTable, InstitutionRegistry, RegistryEntry};

/// Best registry entry for a candidate together with its similarity score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryMatch {
    pub name: String,
    pub canonical_id: String,
    pub score: f64,
}

/// Outcome of resolving one candidate name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Resolution {
    Registry(RegistryMatch),
    Alias { canonical_id: String },
    Unresolved,
}

impl Resolution {
    pub fn canonical_id(&self) -> Option<&str> {
        match self {
            Resolution::Registry(m) => Some(&m.canonical_id),
            Resolution::Alias { canonical_id } => Some(canonical_id),
            Resolution::Unresolved => None,
        }
    }

    pub fn registry_name(&self) -> Option<&str> {
        match self {
            Resolution::Registry(m) => Some(&m.name),
            _ => None,
        }
    }

    pub fn identity_source(&self) -> IdentitySource {
        match self {
            Resolution::Registry(_) => IdentitySource::Registry,
            Resolution::Alias { .. } => IdentitySource::Alias,
            Resolution::Unresolved => IdentitySource::Unresolved,
        }
    }
}

/// Similarity in [0, 1] between two names, case-insensitive
pub fn name_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Highest similarity any pair of strings with these character lengths can reach
fn similarity_upper_bound(len_a: usize, len_b: usize) -> f64 {
    let longest = len_a.max(len_b);
    if longest == 0 {
        return 1.0;
    }
    1.0 - (len_a.abs_diff(len_b) as f64 / longest as f64)
}

/// Best-scoring registry entry at or above `threshold`.
///
/// Ties prefer an entry whose name is byte-for-byte the candidate, then the
/// earliest entry. Entries whose length alone rules out reaching the threshold
/// are skipped without computing the edit distance.
pub fn best_registry_match(
    candidate: &str,
    entries: &[RegistryEntry],
    threshold: f64,
) -> Option<RegistryMatch> {
    let lowered = candidate.to_lowercase();
    let candidate_len = lowered.chars().count();
    let mut best: Option<(&RegistryEntry, f64)> = None;

    for entry in entries {
        if similarity_upper_bound(candidate_len, entry.folded_len()) < threshold {
            continue;
        }
        let score = strsim::normalized_levenshtein(&lowered, entry.folded_name());
        let replace = match best {
            None => true,
            Some((current, best_score)) => {
                score > best_score
                    || (score == best_score
                        && entry.institution().name == candidate
                        && current.institution().name != candidate)
            }
        };
        if replace {
            best = Some((entry, score));
        }
    }

    best.filter(|(_, score)| *score >= threshold)
        .map(|(entry, score)| RegistryMatch {
            name: entry.institution().name.clone(),
            canonical_id: entry.institution().canonical_id.clone(),
            score,
        })
}

/// Resolve `candidate` against the registry, then the alias table
pub fn resolve_institution(
    candidate: &str,
    registry: &InstitutionRegistry,
    aliases: &AliasTable,
    threshold: f64,
) -> Resolution {
    if candidate.trim().is_empty() {
        return Resolution::Unresolved;
    }
    if let Some(found) = best_registry_match(candidate, registry.entries(), threshold) {
        return Resolution::Registry(found);
    }
    match aliases.lookup(candidate) {
        Some(canonical_id) => Resolution::Alias {
            canonical_id: canonical_id.to_string(),
        },
        None => Resolution::Unresolved,
    }
}

/// Resolver bound to the reference tables of one run
#[derive(Debug, Clone)]
pub struct InstitutionResolver {
    registry: InstitutionRegistry,
    aliases: AliasTable,
    threshold: f64,
}

impl InstitutionResolver {
    pub fn new(registry: InstitutionRegistry, aliases: AliasTable, threshold: f64) -> Self {
        Self {
            registry,
            aliases,
            threshold,
        }
    }

    pub fn resolve(&self, candidate: &str) -> Resolution {
        resolve_institution(candidate, &self.registry, &self.aliases, self.threshold)
    }

    pub fn registry(&self) -> &InstitutionRegistry {
        &self.registry
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Final identity of a row and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct RowIdentity {
    pub identity: Option<String>,
    pub identity_source: IdentitySource,
    pub registry_name: Option<String>,
    pub score: Option<f64>,
}

/// Identity for a flat row: a source identity is kept as is and the resolver is
/// not consulted; otherwise the institution candidate, if any, is resolved.
pub fn resolve_row_identity(
    row: &FlatRow,
    candidate: Option<&str>,
    resolver: &InstitutionResolver,
) -> RowIdentity {
    if row.has_source_identity() {
        return RowIdentity {
            identity: row.source_identity.clone(),
            identity_source: IdentitySource::Source,
            registry_name: None,
            score: None,
        };
    }

    let resolution = match candidate {
        Some(candidate) => resolver.resolve(candidate),
        None => Resolution::Unresolved,
    };
    let score = match &resolution {
        Resolution::Registry(m) => Some(m.score),
        _ => None,
    };
    RowIdentity {
        identity: resolution.canonical_id().map(str::to_string),
        identity_source: resolution.identity_source(),
        registry_name: resolution.registry_name().map(str::to_string),
        score,
    }
}

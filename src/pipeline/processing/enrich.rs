//! Regex enrichment of affiliation strings: email address and postal code.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("email pattern compiles")
});

/// US ZIP (optionally ZIP+4) or Canadian postal code, with or without the inner space
static ZIPCODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d{5}(?:-\d{4})?\b|\b[A-Z]\d[A-Z] ?\d[A-Z]\d\b")
        .expect("zipcode pattern compiles")
});

/// Fields derived from a single affiliation string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffiliationFields {
    pub email: Option<String>,
    pub zipcode: Option<String>,
}

/// First email address in `text`, if any
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_PATTERN.find(text).map(|m| m.as_str().to_string())
}

/// First US or Canadian postal code in `text`, if any
pub fn extract_zipcode(text: &str) -> Option<String> {
    ZIPCODE_PATTERN.find(text).map(|m| m.as_str().to_string())
}

pub fn extract_affiliation_fields(affiliation: &str) -> AffiliationFields {
    AffiliationFields {
        email: extract_email(affiliation),
        zipcode: extract_zipcode(affiliation),
    }
}

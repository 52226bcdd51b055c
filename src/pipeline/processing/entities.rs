//! Country and institution candidates picked from NER entities.

use crate::domain::{Entity, EntityLabel};
use crate::registry::CountryAllowList;

/// Upper-case the first letter of every alphabetic run and lower-case the rest,
/// so `"UNITED STATES"` and `"united states"` both become `"United States"`.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_alphabetic = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_alphabetic {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            out.push(c);
            previous_alphabetic = false;
        }
    }
    out
}

/// The last location entity whose title-cased text is a known country.
///
/// Countries tend to close an affiliation string, hence last rather than first.
/// The entity's original text is returned.
pub fn identify_country(entities: &[Entity], countries: &CountryAllowList) -> Option<String> {
    entities
        .iter()
        .rev()
        .find(|entity| {
            entity.label == EntityLabel::Location && countries.contains(&title_case(&entity.text))
        })
        .map(|entity| entity.text.clone())
}

/// The first organisation entity whose lower-cased text contains one of `keywords`.
///
/// `keywords` are expected in lower case.
pub fn identify_institution(entities: &[Entity], keywords: &[String]) -> Option<String> {
    entities
        .iter()
        .filter(|entity| entity.label == EntityLabel::Organization)
        .find(|entity| {
            let lowered = entity.text.to_lowercase();
            keywords.iter().any(|keyword| lowered.contains(keyword.as_str()))
        })
        .map(|entity| entity.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn countries() -> CountryAllowList {
        CountryAllowList::from_lines(["France", "Germany", "United States", "Sweden"])
    }

    fn keywords() -> Vec<String> {
        ["university", "center", "centre", "laboratory", "hospital"]
            .iter()
            .map(|k| k.to_string())
            .collect()
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("UNITED STATES"), "United States");
        assert_eq!(title_case("united states"), "United States");
        assert_eq!(title_case("guinea-bissau"), "Guinea-Bissau");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_last_allow_listed_location_wins() {
        let entities = vec![
            Entity::location("France"),
            Entity::location("Boston"),
            Entity::location("Germany"),
        ];
        assert_eq!(identify_country(&entities, &countries()).as_deref(), Some("Germany"));
    }

    #[test]
    fn test_country_matches_after_title_casing_and_keeps_original_text() {
        let entities = vec![Entity::location("SWEDEN"), Entity::location("Stockholm")];
        assert_eq!(identify_country(&entities, &countries()).as_deref(), Some("SWEDEN"));
    }

    #[test]
    fn test_country_ignores_non_location_entities() {
        let entities = vec![Entity::organization("France"), Entity::location("Paris")];
        assert_eq!(identify_country(&entities, &countries()), None);
    }

    #[test]
    fn test_first_keyword_organisation_wins() {
        let entities = vec![
            Entity::organization("Acme Corp"),
            Entity::organization("City Hospital"),
            Entity::organization("General Hospital"),
        ];
        assert_eq!(
            identify_institution(&entities, &["hospital".to_string()]).as_deref(),
            Some("City Hospital")
        );
    }

    #[test]
    fn test_institution_keyword_match_is_case_insensitive() {
        let entities = vec![
            Entity::location("Cambridge University"),
            Entity::organization("HARVARD UNIVERSITY"),
        ];
        assert_eq!(
            identify_institution(&entities, &keywords()).as_deref(),
            Some("HARVARD UNIVERSITY")
        );
    }

    #[test]
    fn test_no_qualifying_organisation() {
        let entities = vec![Entity::organization("Acme Corp")];
        assert_eq!(identify_institution(&entities, &keywords()), None);
        assert_eq!(identify_institution(&[], &keywords()), None);
    }
}

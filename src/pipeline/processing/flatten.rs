use crate::domain::{ArticleRecord, FlatRow};

/// Expand articles into one row per (article, author, affiliation) triple.
///
/// Rows come out in document order: articles, then authors, then affiliations.
/// Authors without any affiliation produce no rows.
pub fn flatten_articles(articles: &[ArticleRecord]) -> Vec<FlatRow> {
    let mut rows = Vec::new();

    for article in articles {
        for author in &article.authors {
            let full_name = author.full_name();
            for affiliation in &author.affiliations {
                rows.push(FlatRow {
                    title: article.title.clone(),
                    pmid: article.pmid.clone(),
                    year: article.year.clone(),
                    keywords: article.keywords.clone(),
                    mesh_terms: article.mesh_terms.clone(),
                    forename: author.forename.clone(),
                    lastname: author.lastname.clone(),
                    full_name: full_name.clone(),
                    initials: author.initials.clone(),
                    source_identity: author.source_identity.clone(),
                    affiliation: affiliation.clone(),
                });
            }
        }
    }

    rows
}

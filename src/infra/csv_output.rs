use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::domain::EnrichedRow;
use crate::error::Result;

const LIST_SEPARATOR: &str = "; ";

const COLUMNS: [&str; 17] = [
    "title",
    "pmid",
    "year",
    "keyword_list",
    "mesh_list",
    "forename",
    "lastname",
    "full_name",
    "initials",
    "identity",
    "affiliation",
    "author_email",
    "zipcode",
    "country",
    "institutions",
    "grid_institutions",
    "identity_source",
];

/// One line of the output table; absent values serialize as empty cells
#[derive(Debug, Serialize)]
struct OutputRecord<'a> {
    title: Option<&'a str>,
    pmid: Option<&'a str>,
    year: Option<&'a str>,
    keyword_list: String,
    mesh_list: String,
    forename: Option<&'a str>,
    lastname: Option<&'a str>,
    full_name: Option<&'a str>,
    initials: Option<&'a str>,
    identity: Option<&'a str>,
    affiliation: &'a str,
    author_email: Option<&'a str>,
    zipcode: Option<&'a str>,
    country: Option<&'a str>,
    institutions: Option<&'a str>,
    grid_institutions: Option<&'a str>,
    identity_source: &'static str,
}

impl<'a> From<&'a EnrichedRow> for OutputRecord<'a> {
    fn from(enriched: &'a EnrichedRow) -> Self {
        let row = &enriched.row;
        Self {
            title: row.title.as_deref(),
            pmid: row.pmid.as_deref(),
            year: row.year.as_deref(),
            keyword_list: row.keywords.join(LIST_SEPARATOR),
            mesh_list: row.mesh_terms.join(LIST_SEPARATOR),
            forename: row.forename.as_deref(),
            lastname: row.lastname.as_deref(),
            full_name: row.full_name.as_deref(),
            initials: row.initials.as_deref(),
            identity: enriched.identity.as_deref(),
            affiliation: &row.affiliation,
            author_email: enriched.email.as_deref(),
            zipcode: enriched.zipcode.as_deref(),
            country: enriched.country.as_deref(),
            institutions: enriched.institution.as_deref(),
            grid_institutions: enriched.registry_name.as_deref(),
            identity_source: enriched.identity_source.as_str(),
        }
    }
}

/// Write rows as CSV with a header line, preserving row order
pub fn write_rows<W: Write>(writer: W, rows: &[EnrichedRow]) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv_writer.write_record(COLUMNS)?;
    }
    for row in rows {
        csv_writer.serialize(OutputRecord::from(row))?;
    }
    csv_writer.flush()?;
    Ok(rows.len())
}

pub fn write_rows_to_path(path: &Path, rows: &[EnrichedRow]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let written = write_rows(File::create(path)?, rows)?;
    info!("Wrote {} rows to {}", written, path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FlatRow, IdentitySource};

    fn enriched(affiliation: &str) -> EnrichedRow {
        EnrichedRow {
            row: FlatRow {
                title: Some("A title, with comma".to_string()),
                pmid: Some("123".to_string()),
                year: Some("2024".to_string()),
                keywords: vec!["one".to_string(), "two".to_string()],
                mesh_terms: vec![],
                forename: Some("Jane".to_string()),
                lastname: Some("Smith".to_string()),
                full_name: Some("Jane Smith".to_string()),
                initials: None,
                source_identity: None,
                affiliation: affiliation.to_string(),
            },
            email: None,
            zipcode: Some("02115".to_string()),
            country: Some("USA".to_string()),
            institution: Some("Harvard University".to_string()),
            registry_name: Some("Harvard University".to_string()),
            identity: Some("grid.38142.3c".to_string()),
            identity_source: IdentitySource::Registry,
        }
    }

    #[test]
    fn test_header_order_and_row_values() {
        let mut buffer = Vec::new();
        let written = write_rows(&mut buffer, &[enriched("Harvard University, Boston")]).unwrap();
        assert_eq!(written, 1);

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "title,pmid,year,keyword_list,mesh_list,forename,lastname,full_name,initials,identity,\
affiliation,author_email,zipcode,country,institutions,grid_institutions,identity_source"
        );
        assert_eq!(
            lines.next().unwrap(),
            "\"A title, with comma\",123,2024,one; two,,Jane,Smith,Jane Smith,,grid.38142.3c,\
\"Harvard University, Boston\",,02115,USA,Harvard University,Harvard University,registry"
        );
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let mut buffer = Vec::new();
        assert_eq!(write_rows(&mut buffer, &[]).unwrap(), 0);
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.trim_end(), COLUMNS.join(","));
    }

    #[test]
    fn test_rows_keep_input_order() {
        let mut buffer = Vec::new();
        write_rows(&mut buffer, &[enriched("first"), enriched("second")]).unwrap();

        let mut reader = csv::Reader::from_reader(buffer.as_slice());
        let affiliations: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[10].to_string())
            .collect();
        assert_eq!(affiliations, vec!["first", "second"]);
    }
}

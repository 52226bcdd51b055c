//! Record extraction from a PubMed XML export.
//!
//! The document is read as a stream of events so that only the articles up to
//! the configured cap are materialised. Text content includes the text of inline
//! markup (`<i>`, `<sup>`, ...) and is trimmed; empty text counts as absent.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::domain::{ArticleRecord, AuthorRecord};
use crate::error::{EtlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Pmid,
    Year,
    Keyword,
    MeshTerm,
    ForeName,
    LastName,
    Initials,
    GridIdentifier,
    Affiliation,
}

#[derive(Debug)]
struct Capture {
    field: Field,
    depth: usize,
    text: String,
}

#[derive(Debug, Default)]
struct ExtractionState {
    stack: Vec<Vec<u8>>,
    article: Option<ArticleRecord>,
    /// Open author and the stack depth of its `Author` element
    author: Option<(usize, AuthorRecord)>,
    capture: Option<Capture>,
}

impl ExtractionState {
    fn parent(&self) -> Option<&[u8]> {
        self.stack.last().map(Vec::as_slice)
    }

    fn field_for(&self, e: &BytesStart<'_>) -> Result<Option<Field>> {
        let article = match &self.article {
            Some(article) => article,
            None => return Ok(None),
        };
        let name = e.local_name();
        let parent = self.parent();

        if let Some((_, author)) = &self.author {
            let field = match name.as_ref() {
                b"ForeName" if author.forename.is_none() => Some(Field::ForeName),
                b"LastName" if author.lastname.is_none() => Some(Field::LastName),
                b"Initials" if author.initials.is_none() => Some(Field::Initials),
                b"Affiliation" => Some(Field::Affiliation),
                b"Identifier"
                    if parent == Some(b"AffiliationInfo".as_slice())
                        && author.source_identity.is_none()
                        && attribute_equals(e, "Source", "GRID")? =>
                {
                    Some(Field::GridIdentifier)
                }
                _ => None,
            };
            return Ok(field);
        }

        let field = match name.as_ref() {
            b"ArticleTitle" if article.title.is_none() => Some(Field::Title),
            b"PMID" if article.pmid.is_none() => Some(Field::Pmid),
            b"Year" if parent == Some(b"DateRevised".as_slice()) && article.year.is_none() => {
                Some(Field::Year)
            }
            b"Keyword" if parent == Some(b"KeywordList".as_slice()) => Some(Field::Keyword),
            b"DescriptorName"
                if parent == Some(b"MeshHeading".as_slice())
                    && e.try_get_attribute("UI")?.is_some() =>
            {
                Some(Field::MeshTerm)
            }
            _ => None,
        };
        Ok(field)
    }

    fn finish_capture(&mut self, capture: Capture) {
        let text = capture.text.trim();
        if text.is_empty() {
            return;
        }
        let text = text.to_string();

        if let Some((_, author)) = self.author.as_mut() {
            match capture.field {
                Field::ForeName => author.forename = Some(text),
                Field::LastName => author.lastname = Some(text),
                Field::Initials => author.initials = Some(text),
                Field::GridIdentifier => author.source_identity = Some(text),
                Field::Affiliation => author.affiliations.push(text),
                _ => {}
            }
            return;
        }

        if let Some(article) = self.article.as_mut() {
            match capture.field {
                Field::Title => article.title = Some(text),
                Field::Pmid => article.pmid = Some(text),
                Field::Year => article.year = Some(text),
                Field::Keyword => article.keywords.push(text),
                Field::MeshTerm => article.mesh_terms.push(text),
                _ => {}
            }
        }
    }
}

fn attribute_equals(e: &BytesStart<'_>, key: &str, expected: &str) -> Result<bool> {
    match e.try_get_attribute(key)? {
        Some(attr) => Ok(attr.unescape_value()? == expected),
        None => Ok(false),
    }
}

/// Extract up to `article_cap` articles from the document at `path`.
///
/// A missing document is fatal and reported as [`EtlError::SourceNotFound`].
pub fn extract_articles_from_path<P: AsRef<Path>>(
    path: P,
    article_cap: Option<usize>,
) -> Result<Vec<ArticleRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(EtlError::SourceNotFound(path.display().to_string()));
    }
    let file = File::open(path)?;
    extract_articles(BufReader::new(file), article_cap)
}

/// Extract up to `article_cap` articles, in document order; `None` reads every article
pub fn extract_articles<R: BufRead>(
    source: R,
    article_cap: Option<usize>,
) -> Result<Vec<ArticleRecord>> {
    let mut reader = Reader::from_reader(source);
    let mut buf = Vec::new();
    let mut state = ExtractionState::default();
    let mut articles = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();

                if name == b"PubmedArticle" {
                    if article_cap.is_some_and(|cap| articles.len() >= cap) {
                        debug!("Article cap reached after {} articles", articles.len());
                        break;
                    }
                    state.article = Some(ArticleRecord::default());
                }

                let mut new_capture = None;
                if state.capture.is_none() {
                    if name == b"Author"
                        && state.article.is_some()
                        && state.author.is_none()
                        && state.parent() == Some(b"AuthorList".as_slice())
                    {
                        state.author = Some((state.stack.len(), AuthorRecord::default()));
                    } else {
                        new_capture = state.field_for(&e)?;
                    }
                }

                state.stack.push(name);
                if let Some(field) = new_capture {
                    state.capture = Some(Capture {
                        field,
                        depth: state.stack.len(),
                        text: String::new(),
                    });
                }
            }
            Event::Text(e) => {
                if let Some(capture) = state.capture.as_mut() {
                    capture.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(capture) = state.capture.as_mut() {
                    capture.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) => {
                let depth = state.stack.len();

                if state.capture.as_ref().is_some_and(|c| c.depth == depth) {
                    if let Some(capture) = state.capture.take() {
                        state.finish_capture(capture);
                    }
                }

                let name = e.local_name();
                if name.as_ref() == b"Author"
                    && state.author.as_ref().is_some_and(|(d, _)| *d + 1 == depth)
                {
                    if let (Some((_, author)), Some(article)) =
                        (state.author.take(), state.article.as_mut())
                    {
                        article.authors.push(author);
                    }
                }

                if name.as_ref() == b"PubmedArticle" {
                    if let Some(article) = state.article.take() {
                        articles.push(article);
                    }
                }

                state.stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(articles)
}

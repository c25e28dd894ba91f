//! arXiv API response parsing.
//!
//! Turns one Atom feed document into validated [`Paper`] records plus the
//! feed-level total-result count. Stateless; no network access.
//!
//! The parser is lenient about optional per-entry fields (DOI, journal
//! reference, comment, PDF link, categories) and strict about everything a
//! paper cannot exist without (id, title, summary, timestamps, at least one
//! author) and about the feed-level `opensearch:totalResults` element.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName, ResolveResult};
use quick_xml::reader::NsReader;
use url::Url;

use crate::error::{ParseError, Result};
use crate::types::{Author, Category, Paper, PrimaryCategory};

const NS_ATOM: &[u8] = b"http://www.w3.org/2005/Atom";
const NS_OPENSEARCH: &[u8] = b"http://a9.com/-/spec/opensearch/1.1/";
const NS_ARXIV: &[u8] = b"http://arxiv.org/schemas/atom";

const PDF_MIME: &str = "application/pdf";

/// What to do when a single entry fails to parse or validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryErrorPolicy {
    /// Fail the whole document on the first bad entry.
    #[default]
    Abort,
    /// Log, count, and continue with the remaining entries.
    Skip,
}

/// The content of one parsed feed document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFeed {
    pub papers: Vec<Paper>,
    /// Feed-level `opensearch:totalResults` value.
    pub total_results: u64,
    /// Entries dropped under [`EntryErrorPolicy::Skip`]; always 0 under `Abort`.
    pub skipped: u32,
}

/// Parse a feed document strictly: the first bad entry fails the batch.
pub fn parse_feed(xml: &str) -> Result<ParsedFeed> {
    parse_feed_with(xml, EntryErrorPolicy::Abort)
}

/// Parse a feed document with an explicit per-entry error policy.
pub fn parse_feed_with(xml: &str, policy: EntryErrorPolicy) -> Result<ParsedFeed> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut total_results: Option<u64> = None;
    let mut skipped = 0u32;
    let mut index = 0usize;
    let mut pos = 0usize;

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        match event {
            Event::Start(e) => {
                let (ns, local) = reader.resolve_element(e.name());
                match (classify(ns), local.as_ref()) {
                    (Ns::Atom, b"entry") => {
                        let raw = collect_entry(&mut reader, xml, pos)?;
                        match raw.into_paper(index) {
                            Ok(paper) => papers.push(paper),
                            Err(err) => match policy {
                                EntryErrorPolicy::Abort => return Err(err),
                                EntryErrorPolicy::Skip => {
                                    tracing::warn!(entry = index + 1, error = %err, "skipping bad entry");
                                    skipped += 1;
                                }
                            },
                        }
                        index += 1;
                    }
                    (Ns::OpenSearch, b"totalResults") => {
                        let text = read_element_text(&mut reader, e.name())?;
                        let value = text.trim().parse::<u64>().map_err(|_| {
                            ParseError::document(format!("totalResults is not an integer: `{text}`"))
                        })?;
                        total_results = Some(value);
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        pos = reader.buffer_position() as usize;
    }

    let total_results = total_results
        .ok_or_else(|| ParseError::document("missing opensearch:totalResults element"))?;

    Ok(ParsedFeed {
        papers,
        total_results,
        skipped,
    })
}

enum Ns {
    Atom,
    OpenSearch,
    Arxiv,
    Other,
}

fn classify(resolution: ResolveResult<'_>) -> Ns {
    match resolution {
        ResolveResult::Bound(ns) => match ns.into_inner() {
            NS_ATOM => Ns::Atom,
            NS_OPENSEARCH => Ns::OpenSearch,
            NS_ARXIV => Ns::Arxiv,
            _ => Ns::Other,
        },
        _ => Ns::Other,
    }
}

fn xml_error(err: quick_xml::Error) -> ParseError {
    ParseError::document(format!("malformed XML: {err}"))
}

/// Accumulated fields of one `<entry>`, still unvalidated.
#[derive(Default)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    published: Option<String>,
    updated: Option<String>,
    authors: Vec<Author>,
    primary: Option<PrimaryCategory>,
    category_terms: Vec<String>,
    pdf_url: Option<String>,
    doi: Option<String>,
    journal_ref: Option<String>,
    comment: Option<String>,
    fragment: String,
}

/// Consume events through `</entry>`, accumulating fields. Structural XML
/// errors abort the document; field validation happens afterwards in
/// [`RawEntry::into_paper`] so the raw fragment is complete for diagnostics.
fn collect_entry(
    reader: &mut NsReader<&[u8]>,
    xml: &str,
    start_pos: usize,
) -> std::result::Result<RawEntry, ParseError> {
    let mut raw = RawEntry::default();

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        match event {
            Event::Start(e) => {
                let (ns, local) = reader.resolve_element(e.name());
                match (classify(ns), local.as_ref()) {
                    (Ns::Atom, b"id") => raw.id = Some(read_element_text(reader, e.name())?),
                    (Ns::Atom, b"title") => raw.title = Some(read_element_text(reader, e.name())?),
                    (Ns::Atom, b"summary") => {
                        raw.summary = Some(read_element_text(reader, e.name())?)
                    }
                    (Ns::Atom, b"published") => {
                        raw.published = Some(read_element_text(reader, e.name())?)
                    }
                    (Ns::Atom, b"updated") => {
                        raw.updated = Some(read_element_text(reader, e.name())?)
                    }
                    (Ns::Atom, b"author") => {
                        if let Some(author) = collect_author(reader)? {
                            raw.authors.push(author);
                        }
                    }
                    (Ns::Atom, b"link") => {
                        raw.record_link(&e)?;
                        skip_subtree(reader, e.name())?;
                    }
                    (Ns::Atom, b"category") => {
                        raw.record_category(&e)?;
                        skip_subtree(reader, e.name())?;
                    }
                    (Ns::Arxiv, b"primary_category") => {
                        raw.record_primary(&e)?;
                        skip_subtree(reader, e.name())?;
                    }
                    (Ns::Arxiv, b"doi") => raw.doi = Some(read_element_text(reader, e.name())?),
                    (Ns::Arxiv, b"journal_ref") => {
                        raw.journal_ref = Some(read_element_text(reader, e.name())?)
                    }
                    (Ns::Arxiv, b"comment") => {
                        raw.comment = Some(read_element_text(reader, e.name())?)
                    }
                    _ => skip_subtree(reader, e.name())?,
                }
            }
            Event::Empty(e) => {
                let (ns, local) = reader.resolve_element(e.name());
                match (classify(ns), local.as_ref()) {
                    (Ns::Atom, b"link") => raw.record_link(&e)?,
                    (Ns::Atom, b"category") => raw.record_category(&e)?,
                    (Ns::Arxiv, b"primary_category") => raw.record_primary(&e)?,
                    _ => {}
                }
            }
            Event::End(e) => {
                if e.name().local_name().as_ref() == b"entry" {
                    break;
                }
            }
            Event::Eof => return Err(ParseError::document("unexpected EOF inside entry")),
            _ => {}
        }
    }

    let end_pos = (reader.buffer_position() as usize).min(xml.len());
    raw.fragment = xml[start_pos..end_pos].trim().to_string();
    Ok(raw)
}

/// Consume one `<author>` element. Authors without a name are dropped here;
/// an entry with no usable authors fails later as a required-field error.
fn collect_author(
    reader: &mut NsReader<&[u8]>,
) -> std::result::Result<Option<Author>, ParseError> {
    let mut name = None;
    let mut affiliation = None;

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        match event {
            Event::Start(e) => {
                let (ns, local) = reader.resolve_element(e.name());
                match (classify(ns), local.as_ref()) {
                    (Ns::Atom, b"name") => name = Some(read_element_text(reader, e.name())?),
                    (Ns::Arxiv, b"affiliation") => {
                        affiliation = Some(read_element_text(reader, e.name())?)
                    }
                    _ => skip_subtree(reader, e.name())?,
                }
            }
            Event::End(e) => {
                if e.name().local_name().as_ref() == b"author" {
                    break;
                }
            }
            Event::Eof => return Err(ParseError::document("unexpected EOF inside author")),
            _ => {}
        }
    }

    Ok(name.map(|name| Author { name, affiliation }))
}

impl RawEntry {
    fn record_link(&mut self, element: &BytesStart<'_>) -> std::result::Result<(), ParseError> {
        let mut href = None;
        let mut mime = None;
        for (key, value) in attributes(element)? {
            match key.as_str() {
                "href" => href = Some(value),
                "type" => mime = Some(value),
                _ => {}
            }
        }
        if self.pdf_url.is_none() && mime.as_deref() == Some(PDF_MIME) {
            self.pdf_url = href;
        }
        Ok(())
    }

    fn record_category(&mut self, element: &BytesStart<'_>) -> std::result::Result<(), ParseError> {
        for (key, value) in attributes(element)? {
            if key == "term" {
                self.category_terms.push(value);
            }
        }
        Ok(())
    }

    fn record_primary(&mut self, element: &BytesStart<'_>) -> std::result::Result<(), ParseError> {
        let mut term = None;
        let mut scheme = None;
        let mut label = None;
        for (key, value) in attributes(element)? {
            match key.as_str() {
                "term" => term = Some(value),
                "scheme" => scheme = Url::parse(&value).ok(),
                "label" => label = Some(value),
                _ => {}
            }
        }
        match term {
            Some(term) => {
                self.primary = Some(PrimaryCategory {
                    term,
                    scheme,
                    label,
                })
            }
            // A primary_category without a term is treated as absent.
            None => tracing::warn!("primary category element has no term attribute"),
        }
        Ok(())
    }

    /// Validate required fields and build the domain record.
    fn into_paper(self, index: usize) -> Result<Paper> {
        let fragment = self.fragment;

        let raw_id = require(self.id, index, &fragment, "id")?;
        let id = raw_id.trim().rsplit('/').next().unwrap_or(&raw_id).to_string();
        let title = require(self.title, index, &fragment, "title")?;
        let summary = require(self.summary, index, &fragment, "summary")?;
        let published = require(self.published, index, &fragment, "published")?;
        let updated = require(self.updated, index, &fragment, "updated")?;

        if self.authors.is_empty() {
            return Err(ParseError::entry(index, fragment, "missing author information").into());
        }

        let primary = self.primary.unwrap_or_else(|| {
            tracing::warn!(entry = index + 1, "no primary category, using placeholder");
            PrimaryCategory::unknown()
        });
        let secondary = self
            .category_terms
            .into_iter()
            .filter(|term| *term != primary.term)
            .collect();

        let pdf_url = match self.pdf_url {
            Some(href) => Some(Url::parse(&href).map_err(|e| {
                ParseError::entry(index, fragment.clone(), format!("invalid PDF link `{href}`: {e}"))
            })?),
            None => None,
        };

        let paper = Paper {
            id,
            title,
            summary,
            authors: self.authors,
            categories: Category { primary, secondary },
            published: parse_datetime(&published, index, &fragment, "published")?,
            updated: parse_datetime(&updated, index, &fragment, "updated")?,
            doi: self.doi,
            journal_ref: self.journal_ref,
            pdf_url,
            comment: self.comment,
        };

        paper.validated()
    }
}

fn require(
    value: Option<String>,
    index: usize,
    fragment: &str,
    name: &str,
) -> std::result::Result<String, ParseError> {
    value.ok_or_else(|| ParseError::entry(index, fragment, format!("missing {name} element")))
}

/// ISO-8601 with a trailing `Z` normalized to an explicit `+00:00` offset.
fn parse_datetime(
    value: &str,
    index: usize,
    fragment: &str,
    field: &str,
) -> std::result::Result<chrono::DateTime<chrono::FixedOffset>, ParseError> {
    let normalized = value.trim().replace('Z', "+00:00");
    chrono::DateTime::parse_from_rfc3339(&normalized).map_err(|e| {
        ParseError::entry(
            index,
            fragment,
            format!("invalid {field} timestamp `{value}`: {e}"),
        )
    })
}

fn attributes(
    element: &BytesStart<'_>,
) -> std::result::Result<Vec<(String, String)>, ParseError> {
    let mut out = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| ParseError::document(format!("malformed attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ParseError::document(format!("malformed attribute value: {e}")))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// Collect the text content of the element whose start tag was just read.
fn read_element_text(
    reader: &mut NsReader<&[u8]>,
    end: QName<'_>,
) -> std::result::Result<String, ParseError> {
    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Text(t) => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| ParseError::document(format!("malformed text: {e}")))?;
                text.push_str(&unescaped);
            }
            Event::CData(t) => text.push_str(&String::from_utf8_lossy(t.as_ref())),
            Event::Start(_) => depth += 1,
            Event::End(e) if depth == 0 && e.name() == end => break,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => return Err(ParseError::document("unexpected EOF inside element")),
            _ => {}
        }
    }
    Ok(text)
}

/// Consume and discard everything through the matching end tag.
fn skip_subtree(
    reader: &mut NsReader<&[u8]>,
    end: QName<'_>,
) -> std::result::Result<(), ParseError> {
    let mut depth = 0usize;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(_) => depth += 1,
            Event::End(e) if depth == 0 && e.name() == end => return Ok(()),
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => return Err(ParseError::document("unexpected EOF")),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArxivError;

    fn feed(total: &str, entries: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <link href="http://arxiv.org/api/query?search_query=all:electron" rel="self" type="application/atom+xml"/>
  <title type="html">ArXiv Query: search_query=all:electron</title>
  <id>http://arxiv.org/api/cHxbiOdZaP56ODnBPIenZhzg5f8</id>
  <updated>2007-10-08T00:00:00-04:00</updated>
  {total}
  <opensearch:startIndex>0</opensearch:startIndex>
  <opensearch:itemsPerPage>1</opensearch:itemsPerPage>
  {entries}
</feed>"#
        )
    }

    const TOTAL: &str = r#"<opensearch:totalResults>218712</opensearch:totalResults>"#;

    const AUTHORS: &str = r#"<author><name>David Prendergast</name><arxiv:affiliation>Department of Physics</arxiv:affiliation></author>
    <author><name>M. Nolan</name><arxiv:affiliation>NMRC, University College, Cork, Ireland</arxiv:affiliation></author>
    <author><name>Claudia Filippi</name><arxiv:affiliation>Department of Physics</arxiv:affiliation></author>
    <author><name>Stephen Fahy</name><arxiv:affiliation>Department of Physics</arxiv:affiliation></author>
    <author><name>J. C. Greer</name><arxiv:affiliation>NMRC, University College, Cork, Ireland</arxiv:affiliation></author>"#;

    const PDF_LINK: &str = r#"<link title="pdf" href="http://arxiv.org/pdf/cond-mat/0102536v1" rel="related" type="application/pdf"/>"#;

    fn entry(authors: &str, pdf_link: &str, updated: &str) -> String {
        format!(
            r#"<entry>
    <id>http://arxiv.org/abs/cond-mat/0102536v1</id>
    <updated>{updated}</updated>
    <published>2001-02-28T20:12:09Z</published>
    <title>Impact of Electron-Electron Cusp on Configuration Interaction Energies</title>
    <summary>  The effect of the electron-electron cusp on the convergence of configuration
interaction (CI) wave functions is examined.</summary>
    {authors}
    <arxiv:doi>10.1063/1.1383585</arxiv:doi>
    <link title="doi" href="http://dx.doi.org/10.1063/1.1383585" rel="related"/>
    <arxiv:comment>11 pages, 6 figures, 3 tables</arxiv:comment>
    <arxiv:journal_ref>J. Chem. Phys. 115, 1626 (2001)</arxiv:journal_ref>
    <link href="http://arxiv.org/abs/cond-mat/0102536v1" rel="alternate" type="text/html"/>
    {pdf_link}
    <arxiv:primary_category scheme="http://arxiv.org/schemas/atom" term="cond-mat.str-el"/>
    <category term="cond-mat.str-el" scheme="http://arxiv.org/schemas/atom"/>
    <category term="physics.chem-ph" scheme="http://arxiv.org/schemas/atom"/>
  </entry>"#
        )
    }

    fn canonical_feed() -> String {
        feed(TOTAL, &entry(AUTHORS, PDF_LINK, "2001-02-28T20:12:09Z"))
    }

    #[test]
    fn test_parse_canonical_feed() {
        let parsed = parse_feed(&canonical_feed()).unwrap();
        assert_eq!(parsed.total_results, 218712);
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.papers.len(), 1);

        let paper = &parsed.papers[0];
        assert_eq!(paper.id, "0102536v1");
        assert_eq!(
            paper.title,
            "Impact of Electron-Electron Cusp on Configuration Interaction Energies"
        );
        assert!(paper.summary.starts_with("The effect of the electron-electron cusp"));
        assert_eq!(paper.authors.len(), 5);
        assert_eq!(paper.authors[0].name, "David Prendergast");
        assert_eq!(
            paper.authors[0].affiliation.as_deref(),
            Some("Department of Physics")
        );
        assert_eq!(
            paper.authors[1].affiliation.as_deref(),
            Some("NMRC, University College, Cork, Ireland")
        );
        assert_eq!(paper.doi.as_deref(), Some("10.1063/1.1383585"));
        assert_eq!(
            paper.journal_ref.as_deref(),
            Some("J. Chem. Phys. 115, 1626 (2001)")
        );
        assert!(paper.comment.as_deref().unwrap().contains("11 pages, 6 figures"));
        assert_eq!(paper.categories.primary.term, "cond-mat.str-el");
        assert_eq!(paper.categories.secondary, vec!["physics.chem-ph"]);
        assert_eq!(
            paper.pdf_url.as_ref().map(Url::as_str),
            Some("http://arxiv.org/pdf/cond-mat/0102536v1")
        );
        assert_eq!(paper.published.to_rfc3339(), "2001-02-28T20:12:09+00:00");
    }

    #[test]
    fn test_missing_authors_is_entry_error() {
        let xml = feed(TOTAL, &entry("", PDF_LINK, "2001-02-28T20:12:09Z"));
        let err = parse_feed(&xml).unwrap_err();
        match err {
            ArxivError::Parse(parse) => {
                assert_eq!(parse.entry_index, Some(0));
                assert!(parse.to_string().contains("author"));
                assert!(parse.fragment.as_deref().unwrap().contains("<entry>"));
            }
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn test_missing_pdf_link_is_not_an_error() {
        let xml = feed(TOTAL, &entry(AUTHORS, "", "2001-02-28T20:12:09Z"));
        let parsed = parse_feed(&xml).unwrap();
        assert_eq!(parsed.papers[0].pdf_url, None);
    }

    #[test]
    fn test_missing_total_results_is_fatal() {
        let xml = feed("", &entry(AUTHORS, PDF_LINK, "2001-02-28T20:12:09Z"));
        let err = parse_feed(&xml).unwrap_err();
        match err {
            ArxivError::Parse(parse) => {
                assert!(parse.to_string().contains("totalResults"));
                assert!(parse.entry_index.is_none());
            }
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn test_non_integer_total_results_is_fatal() {
        let xml = feed(
            r#"<opensearch:totalResults>many</opensearch:totalResults>"#,
            "",
        );
        assert!(parse_feed(&xml).is_err());
    }

    #[test]
    fn test_malformed_timestamp_is_entry_error() {
        let xml = feed(TOTAL, &entry(AUTHORS, PDF_LINK, "yesterday"));
        let err = parse_feed(&xml).unwrap_err();
        match err {
            ArxivError::Parse(parse) => {
                assert!(parse.to_string().contains("timestamp"));
                assert_eq!(parse.entry_index, Some(0));
            }
            other => panic!("expected parse error, got {other}"),
        }
    }

    #[test]
    fn test_missing_primary_category_falls_back_to_unknown() {
        let entry_xml = r#"<entry>
    <id>http://arxiv.org/abs/2301.00001v1</id>
    <updated>2023-01-01T00:00:00Z</updated>
    <published>2023-01-01T00:00:00Z</published>
    <title>A Paper</title>
    <summary>A summary.</summary>
    <author><name>Solo Author</name></author>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>"#;
        let parsed = parse_feed(&feed(TOTAL, entry_xml)).unwrap();
        let categories = &parsed.papers[0].categories;
        assert_eq!(categories.primary.term, "unknown");
        assert_eq!(categories.secondary, vec!["cs.AI"]);
    }

    #[test]
    fn test_skip_policy_counts_bad_entries() {
        let good = entry(AUTHORS, PDF_LINK, "2001-02-28T20:12:09Z");
        let bad = entry("", "", "2001-02-28T20:12:09Z");
        let xml = feed(TOTAL, &format!("{bad}\n  {good}"));

        let parsed = parse_feed_with(&xml, EntryErrorPolicy::Skip).unwrap();
        assert_eq!(parsed.papers.len(), 1);
        assert_eq!(parsed.skipped, 1);

        // The same document fails under the default strict policy.
        assert!(parse_feed(&xml).is_err());
    }

    #[test]
    fn test_invalid_doi_is_a_validation_error() {
        let entry_xml = entry(AUTHORS, PDF_LINK, "2001-02-28T20:12:09Z")
            .replace("10.1063/1.1383585", "11.1063/1.1383585");
        let err = parse_feed(&feed(TOTAL, &entry_xml)).unwrap_err();
        assert!(matches!(err, ArxivError::InvalidDoi(_)));
    }

    #[test]
    fn test_malformed_xml_is_document_error() {
        let err = parse_feed("<feed><entry></feed>").unwrap_err();
        assert!(matches!(err, ArxivError::Parse(_)));
    }
}

//! Public types for the arXiv client.
//!
//! Value objects only: papers, queries, and per-fetch result shapes are
//! constructed once and never mutated in place. "Updates" (stamping an end
//! time, attaching parsed papers) derive a new value from the old one.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ArxivError, Result};

/// Sort criterion accepted by the arXiv query API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortCriterion {
    Relevance,
    LastUpdatedDate,
    SubmittedDate,
}

impl SortCriterion {
    /// Wire value for the `sortBy` query parameter.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::LastUpdatedDate => "lastUpdatedDate",
            Self::SubmittedDate => "submittedDate",
        }
    }
}

impl std::fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// Sort order accepted by the arXiv query API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// Wire value for the `sortOrder` query parameter.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_api_str())
    }
}

/// An author of a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    /// Institutional affiliation, rarely present in the feed.
    pub affiliation: Option<String>,
}

/// The primary category of a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryCategory {
    /// Category identifier, e.g. `cond-mat.str-el`.
    pub term: String,
    /// URI of the categorization scheme.
    pub scheme: Option<Url>,
    /// Human-readable label.
    pub label: Option<String>,
}

impl PrimaryCategory {
    /// Placeholder used when the feed omits the primary category element.
    pub fn unknown() -> Self {
        Self {
            term: "unknown".to_string(),
            scheme: None,
            label: None,
        }
    }
}

/// Category set of a paper: one primary plus secondary terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub primary: PrimaryCategory,
    /// Every other category term that differs from the primary, in feed order.
    pub secondary: Vec<String>,
}

/// A paper from arXiv search results.
///
/// `id` is the trailing path segment of the raw Atom id URI (version suffix
/// retained) and is stable across pages; `updated` breaks ties when the same
/// id shows up in more than one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Canonical arXiv id, e.g. `0102536v1`.
    pub id: String,
    pub title: String,
    /// Abstract text.
    pub summary: String,
    pub authors: Vec<Author>,
    pub categories: Category,
    pub published: DateTime<FixedOffset>,
    pub updated: DateTime<FixedOffset>,
    /// DOI, validated against `10.XXXX/suffix` on construction.
    pub doi: Option<String>,
    /// Journal reference, e.g. `J. Chem. Phys. 115, 1626 (2001)`.
    pub journal_ref: Option<String>,
    /// Link to the PDF variant, when the feed advertises one.
    pub pdf_url: Option<Url>,
    /// Author comment.
    pub comment: Option<String>,
}

impl Paper {
    /// Validate the paper at the domain boundary, consuming and returning it.
    ///
    /// The only check today is the DOI format; a failure is a validation
    /// error, distinct from a parse failure.
    pub fn validated(self) -> Result<Self> {
        if let Some(doi) = &self.doi {
            validate_doi(doi)?;
        }
        Ok(self)
    }
}

fn doi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^10\.\d{4,9}/[-._;()/:a-zA-Z0-9]+$").expect("DOI pattern is valid")
    })
}

/// Check a DOI against the `10.XXXX/suffix` registrant format.
pub fn validate_doi(doi: &str) -> Result<()> {
    if doi_pattern().is_match(doi) {
        Ok(())
    } else {
        Err(ArxivError::InvalidDoi(doi.to_string()))
    }
}

/// A logical search request.
///
/// Carries either free-text terms or an explicit id list, never both and
/// never neither — the two constructors enforce this. Immutable once built;
/// page fetches derive new queries with adjusted `start`/`max_results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    terms: Option<String>,
    id_list: Option<Vec<String>>,
    /// 0-based offset into the full result set.
    pub start: u32,
    /// Cap on the total number of papers returned across all pages.
    pub max_results: Option<u32>,
    pub sort_by: Option<SortCriterion>,
    pub sort_order: Option<SortOrder>,
}

impl SearchQuery {
    /// A free-text search, e.g. `all:electron` or plain keywords.
    pub fn terms(query: impl Into<String>) -> Self {
        Self {
            terms: Some(query.into()),
            id_list: None,
            start: 0,
            max_results: None,
            sort_by: None,
            sort_order: None,
        }
    }

    /// An exact lookup of known arXiv ids.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: None,
            id_list: Some(ids.into_iter().map(Into::into).collect()),
            start: 0,
            max_results: None,
            sort_by: None,
            sort_order: None,
        }
    }

    /// Override the start offset.
    pub fn with_start(mut self, start: u32) -> Self {
        self.start = start;
        self
    }

    /// Cap the total number of results.
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Set the sort criterion.
    pub fn with_sort_by(mut self, sort_by: SortCriterion) -> Self {
        self.sort_by = Some(sort_by);
        self
    }

    /// Set the sort order.
    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    /// Free-text terms, if this is a term query.
    pub fn query_terms(&self) -> Option<&str> {
        self.terms.as_deref()
    }

    /// Explicit id list, if this is an id query.
    pub fn id_list(&self) -> Option<&[String]> {
        self.id_list.as_deref()
    }

    /// Derive the query for one page: same search, shifted window.
    pub(crate) fn page(&self, start: u32, max_results: u32) -> Self {
        let mut derived = self.clone();
        derived.start = start;
        derived.max_results = Some(max_results);
        derived
    }
}

/// Timing and provenance for one fetch (or one merged aggregate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub start_time: DateTime<Utc>,
    /// Unset until the fetch completes.
    pub end_time: Option<DateTime<Utc>>,
    /// Entries dropped by the lenient parse policy.
    pub missing_results: u32,
    /// Effective page size used for the request.
    pub pagesize: u32,
    pub source: String,
}

impl Metadata {
    /// Start the clock for a fetch.
    pub fn begin(source: impl Into<String>, pagesize: u32) -> Self {
        Self {
            start_time: Utc::now(),
            end_time: None,
            missing_results: 0,
            pagesize,
            source: source.into(),
        }
    }

    /// Stamp the end time, deriving a completed copy.
    pub fn completed(mut self) -> Self {
        self.end_time = Some(Utc::now());
        self
    }

    /// Elapsed seconds, rounded to 3 decimals. Zero while `end_time` is unset.
    pub fn duration_seconds(&self) -> f64 {
        self.elapsed_ms().map_or(0.0, |ms| round3(ms / 1000.0))
    }

    /// Elapsed milliseconds, rounded to 3 decimals. Zero while `end_time` is unset.
    pub fn duration_ms(&self) -> f64 {
        self.elapsed_ms().map_or(0.0, round3)
    }

    fn elapsed_ms(&self) -> Option<f64> {
        let end = self.end_time?;
        let micros = (end - self.start_time).num_microseconds().unwrap_or(0);
        Some((micros.max(0) as f64) / 1000.0)
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// The papers returned by one fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    pub papers: Vec<Paper>,
    /// Server-reported total match count.
    pub total_result: u64,
    /// 1-based page number.
    pub page: u32,
    /// Whether the server holds results beyond this page's window.
    pub has_more: bool,
    /// The query this page was fetched for.
    pub query: SearchQuery,
    pub metadata: Metadata,
}

impl PageResult {
    pub fn papers_count(&self) -> usize {
        self.papers.len()
    }
}

/// The merged result across every page fetched for one logical search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Papers deduplicated by id; later `updated` wins, first seen on ties.
    pub papers: Vec<Paper>,
    /// Max of the inputs' server-reported totals.
    pub total_result: u64,
    /// Highest page number merged in.
    pub page: u32,
    /// True if any merged page had more results beyond its window.
    pub has_more: bool,
    /// The logical query the pages were fetched for.
    pub query: SearchQuery,
    pub metadata: Metadata,
}

impl AggregateResult {
    pub fn papers_count(&self) -> usize {
        self.papers.len()
    }
}

#[cfg(test)]
pub(crate) fn sample_paper(doi: Option<&str>) -> Paper {
    use chrono::TimeZone;

    let stamp = FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2001, 2, 28, 20, 12, 9)
        .unwrap();
    Paper {
        id: "2312.12345".to_string(),
        title: "Test Paper Title".to_string(),
        summary: "Test paper summary".to_string(),
        authors: vec![Author {
            name: "BalconyJH".to_string(),
            affiliation: Some("Test University".to_string()),
        }],
        categories: Category {
            primary: PrimaryCategory {
                term: "cs.AI".to_string(),
                scheme: None,
                label: Some("Artificial Intelligence".to_string()),
            },
            secondary: vec!["cs.LG".to_string(), "stat.ML".to_string()],
        },
        published: stamp,
        updated: stamp,
        doi: doi.map(str::to_string),
        journal_ref: None,
        pdf_url: None,
        comment: None,
    }
}

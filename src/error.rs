//! Error types for the arXiv client.

/// Errors that can occur when interacting with the arXiv API.
#[derive(Debug, thiserror::Error)]
pub enum ArxivError {
    /// HTTP request failed (network, timeout, etc.)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// arXiv API returned a non-2xx status code.
    #[error("API error (HTTP {status})")]
    Api { status: u16 },

    /// Failed to parse an API response.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Invalid query parameter composition, caught before any network call.
    #[error("failed to build query parameter `{field}`: {message}")]
    QueryBuild { field: String, message: String },

    /// DOI does not match `10.XXXX/suffix`. Raised when a paper is
    /// constructed, not while parsing.
    #[error("invalid DOI `{0}`: must match 10.XXXX/suffix")]
    InvalidDoi(String),

    /// Bad rate limiter parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Aggregation was given nothing to merge.
    #[error("cannot aggregate an empty list of page results")]
    EmptyInput,

    /// The downstream result handler failed. Logged by the orchestrator and
    /// never allowed to fail the search path.
    #[error("result handler failed: {0}")]
    Download(String),
}

/// A malformed or structurally invalid API response.
///
/// Carries the raw XML fragment and entry ordinal when the failure is scoped
/// to a single entry, so callers can see exactly what the server sent.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    /// 0-based index of the offending entry, if the error is entry-scoped.
    pub entry_index: Option<usize>,
    /// Raw XML of the offending entry or element.
    pub fragment: Option<String>,
}

impl ParseError {
    /// A document-level failure (malformed XML, missing totalResults, ...).
    pub fn document(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            entry_index: None,
            fragment: None,
        }
    }

    /// A failure scoped to one entry, tagged with its ordinal and raw XML.
    pub fn entry(index: usize, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: format!("entry {}: {}", index + 1, message.into()),
            entry_index: Some(index),
            fragment: Some(fragment.into()),
        }
    }
}

/// Convenience alias for Results using [`ArxivError`].
pub type Result<T> = std::result::Result<T, ArxivError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_error_carries_context() {
        let err = ParseError::entry(2, "<entry/>", "missing title");
        assert_eq!(err.entry_index, Some(2));
        assert_eq!(err.fragment.as_deref(), Some("<entry/>"));
        assert!(err.to_string().contains("entry 3"));
    }

    #[test]
    fn test_document_error_has_no_entry_context() {
        let err = ParseError::document("missing totalResults element");
        assert!(err.entry_index.is_none());
        assert!(err.fragment.is_none());
    }

    #[test]
    fn test_query_build_display() {
        let err = ArxivError::QueryBuild {
            field: "max_results".into(),
            message: "must be greater than zero".into(),
        };
        assert!(err.to_string().contains("max_results"));
    }
}

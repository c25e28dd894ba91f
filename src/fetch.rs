//! Page-level fetching.
//!
//! One [`PageFetcher::fetch_page`] call is one rate-limited HTTP request:
//! build parameters, wait for a limiter slot, issue the request through the
//! injected transport, parse the body, and report whether more pages remain.

use std::sync::Arc;

use crate::config::ArxivConfig;
use crate::error::{ArxivError, Result};
use crate::parse::{self, EntryErrorPolicy};
use crate::rate_limit::RateLimiter;
use crate::transport::Transport;
use crate::types::{Metadata, PageResult, SearchQuery};

/// Source tag stamped into result metadata.
pub const SOURCE: &str = "arxiv";

/// Fetches one page of results per call.
#[derive(Clone)]
pub struct PageFetcher {
    config: Arc<ArxivConfig>,
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    policy: EntryErrorPolicy,
}

impl PageFetcher {
    pub fn new(
        config: Arc<ArxivConfig>,
        transport: Arc<dyn Transport>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            config,
            transport,
            limiter,
            policy: EntryErrorPolicy::default(),
        }
    }

    /// Override the per-entry parse policy (strict by default).
    pub fn with_entry_policy(mut self, policy: EntryErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch and parse the page starting at `query.start`.
    pub async fn fetch_page(&self, query: &SearchQuery) -> Result<PageResult> {
        let page_size = effective_page_size(self.config.page_size, 0, query.max_results);
        let params = build_params(query, page_size)?;
        let metadata = Metadata::begin(SOURCE, page_size);

        let permit = self.limiter.acquire().await;
        let response = self
            .transport
            .request("GET", &self.config.base_url, &params)
            .await?;
        drop(permit);

        if response.status != 200 {
            tracing::warn!(status = response.status, url = %response.url, "search request failed");
            return Err(ArxivError::Api {
                status: response.status,
            });
        }

        let parsed = parse::parse_feed_with(&response.body, self.policy)?;
        let fetched_through = u64::from(query.start) + parsed.papers.len() as u64;

        let mut metadata = metadata.completed();
        metadata.missing_results = parsed.skipped;

        // Page numbers are windows of the configured size, independent of
        // how far a tail chunk was shrunk.
        let page = query.start / self.config.page_size.max(1) + 1;

        Ok(PageResult {
            has_more: fetched_through < parsed.total_results,
            total_result: parsed.total_results,
            page,
            papers: parsed.papers,
            query: query.clone(),
            metadata,
        })
    }
}

/// Page size for the next request: the configured size, shrunk so the total
/// yield never exceeds `max_results`.
pub fn effective_page_size(
    config_page_size: u32,
    already_fetched: u32,
    max_results: Option<u32>,
) -> u32 {
    match max_results {
        Some(max) => config_page_size.min(max.saturating_sub(already_fetched)),
        None => config_page_size,
    }
}

/// Whether another page is worth fetching after the most recent one.
pub fn should_continue(
    last_page_count: usize,
    total_yielded: u64,
    max_results: Option<u32>,
    total_result: u64,
) -> bool {
    if last_page_count == 0 {
        return false;
    }
    if let Some(max) = max_results {
        if total_yielded >= u64::from(max) {
            return false;
        }
    }
    total_result > total_yielded
}

/// Build the wire query parameters for one page request.
///
/// Fails with [`ArxivError::QueryBuild`] before any network call when the
/// composition is invalid; never leaks a transport error.
pub fn build_params(query: &SearchQuery, page_size: u32) -> Result<Vec<(String, String)>> {
    let mut params = Vec::with_capacity(6);

    match (query.query_terms(), query.id_list()) {
        (Some(terms), None) => {
            if terms.trim().is_empty() {
                return Err(query_build("search_query", "query text is empty"));
            }
            params.push(("search_query".to_string(), terms.to_string()));
        }
        (None, Some(ids)) => {
            if ids.is_empty() {
                return Err(query_build("id_list", "id list is empty"));
            }
            params.push(("id_list".to_string(), ids.join(",")));
        }
        _ => {
            return Err(query_build(
                "search_query",
                "exactly one of query text and id list must be set",
            ))
        }
    }

    if query.max_results == Some(0) {
        return Err(query_build("max_results", "must be greater than zero"));
    }

    params.push(("start".to_string(), query.start.to_string()));
    params.push(("max_results".to_string(), page_size.to_string()));

    if let Some(sort_by) = query.sort_by {
        params.push(("sortBy".to_string(), sort_by.as_api_str().to_string()));
    }
    if let Some(sort_order) = query.sort_order {
        params.push(("sortOrder".to_string(), sort_order.as_api_str().to_string()));
    }

    Ok(params)
}

fn query_build(field: &str, message: &str) -> ArxivError {
    ArxivError::QueryBuild {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportResponse;
    use crate::types::{SortCriterion, SortOrder};
    use async_trait::async_trait;
    use url::Url;

    #[test]
    fn test_effective_page_size() {
        assert_eq!(effective_page_size(10, 0, None), 10);
        assert_eq!(effective_page_size(10, 0, Some(5)), 5);
        assert_eq!(effective_page_size(10, 0, Some(500)), 10);
        assert_eq!(effective_page_size(10, 3, Some(5)), 2);
        // Already past the cap.
        assert_eq!(effective_page_size(10, 7, Some(5)), 0);
    }

    #[test]
    fn test_should_continue() {
        // Empty page stops.
        assert!(!should_continue(0, 0, None, 100));
        // Cap reached stops.
        assert!(!should_continue(10, 10, Some(10), 100));
        // Server exhausted stops.
        assert!(!should_continue(10, 100, None, 100));
        // Otherwise keep going.
        assert!(should_continue(10, 10, Some(50), 100));
        assert!(should_continue(10, 10, None, 100));
    }

    #[test]
    fn test_build_params_round_trip() {
        let query = SearchQuery::terms("neural networks")
            .with_max_results(5)
            .with_sort_by(SortCriterion::SubmittedDate)
            .with_sort_order(SortOrder::Ascending);
        let page_size = effective_page_size(10, 0, query.max_results);
        let params = build_params(&query, page_size).unwrap();

        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("search_query"), Some("neural networks"));
        assert_eq!(get("start"), Some("0"));
        assert_eq!(get("max_results"), Some("5"));
        assert_eq!(get("sortBy"), Some("submittedDate"));
        assert_eq!(get("sortOrder"), Some("ascending"));
        assert_eq!(get("id_list"), None);
    }

    #[test]
    fn test_build_params_caps_page_size() {
        let query = SearchQuery::terms("electron").with_max_results(500);
        let page_size = effective_page_size(10, 0, query.max_results);
        let params = build_params(&query, page_size).unwrap();
        let max = params.iter().find(|(k, _)| k == "max_results").unwrap();
        assert_eq!(max.1, "10");
    }

    #[test]
    fn test_build_params_joins_id_list() {
        let query = SearchQuery::ids(["2301.00001", "2301.00002"]);
        let params = build_params(&query, 10).unwrap();
        let ids = params.iter().find(|(k, _)| k == "id_list").unwrap();
        assert_eq!(ids.1, "2301.00001,2301.00002");
        assert!(!params.iter().any(|(k, _)| k == "search_query"));
    }

    #[test]
    fn test_build_params_rejects_bad_composition() {
        let err = build_params(&SearchQuery::terms("   "), 10).unwrap_err();
        assert!(matches!(err, ArxivError::QueryBuild { ref field, .. } if field == "search_query"));

        let err = build_params(&SearchQuery::ids(Vec::<String>::new()), 10).unwrap_err();
        assert!(matches!(err, ArxivError::QueryBuild { ref field, .. } if field == "id_list"));

        let err = build_params(&SearchQuery::terms("x").with_max_results(0), 10).unwrap_err();
        assert!(matches!(err, ArxivError::QueryBuild { ref field, .. } if field == "max_results"));
    }

    struct StaticTransport {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn request(
            &self,
            _method: &str,
            url: &Url,
            _params: &[(String, String)],
        ) -> Result<TransportResponse> {
            Ok(TransportResponse {
                status: self.status,
                body: self.body.to_string(),
                url: url.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_non_200_is_fatal_for_the_page() {
        let fetcher = PageFetcher::new(
            Arc::new(ArxivConfig::default()),
            Arc::new(StaticTransport {
                status: 503,
                body: "",
            }),
            RateLimiter::new(3, 1.0).unwrap(),
        );

        let err = fetcher
            .fetch_page(&SearchQuery::terms("electron"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArxivError::Api { status: 503 }));
    }

    #[tokio::test]
    async fn test_query_build_error_precedes_any_request() {
        let fetcher = PageFetcher::new(
            Arc::new(ArxivConfig::default()),
            Arc::new(StaticTransport {
                status: 200,
                body: "",
            }),
            RateLimiter::new(3, 1.0).unwrap(),
        );

        let err = fetcher
            .fetch_page(&SearchQuery::terms(""))
            .await
            .unwrap_err();
        assert!(matches!(err, ArxivError::QueryBuild { .. }));
    }
}

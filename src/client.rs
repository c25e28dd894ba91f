//! The arXiv API client.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::aggregate;
use crate::config::ArxivConfig;
use crate::download::ResultHandler;
use crate::error::{ArxivError, Result};
use crate::fetch::{should_continue, PageFetcher};
use crate::parse::EntryErrorPolicy;
use crate::rate_limit::RateLimiter;
use crate::transport::{HttpTransport, Transport};
use crate::types::{AggregateResult, PageResult, SearchQuery};

/// Async client for the arXiv search API.
///
/// One logical search becomes one or more rate-limited page fetches: the
/// first page is always fetched and validated alone (its total count decides
/// how many more pages are needed), the remainder is fetched concurrently,
/// and everything is merged into a single [`AggregateResult`].
///
/// # Example
///
/// ```no_run
/// # async fn example() -> arxiv_client::error::Result<()> {
/// use arxiv_client::{ArxivClient, ArxivConfig, SearchQuery};
///
/// let client = ArxivClient::new(ArxivConfig::default())?;
/// let query = SearchQuery::terms("all:electron").with_max_results(25);
/// let results = client.search(&query).await?;
/// for paper in &results.papers {
///     println!("{} ({})", paper.title, paper.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ArxivClient {
    config: Arc<ArxivConfig>,
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    handler: Option<Arc<dyn ResultHandler>>,
    entry_policy: EntryErrorPolicy,
}

impl ArxivClient {
    /// Create a client with the default reqwest-backed transport.
    pub fn new(config: ArxivConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Create a client over an injected transport.
    pub fn with_transport(config: ArxivConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        if config.page_size == 0 {
            return Err(ArxivError::InvalidConfiguration(
                "page size must be greater than zero".to_string(),
            ));
        }
        let limiter = RateLimiter::new(config.rate_limit_calls, config.rate_limit_period)?;
        Ok(Self {
            config: Arc::new(config),
            transport,
            limiter,
            handler: None,
            entry_policy: EntryErrorPolicy::default(),
        })
    }

    /// Tolerate bad entries instead of failing the page (strict by default).
    pub fn with_entry_policy(mut self, policy: EntryErrorPolicy) -> Self {
        self.entry_policy = policy;
        self
    }

    /// Share a rate limiter with other clients so they draw on one quota.
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Attach a handler invoked with the final aggregate of every search.
    pub fn with_result_handler(mut self, handler: Arc<dyn ResultHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// The rate limiter backing this client.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Run one logical search to completion.
    ///
    /// The first page is fatal when it fails; failures among the additional
    /// pages are logged with their parameters and dropped, and the search
    /// returns a best-effort aggregate over the pages that succeeded.
    pub async fn search(&self, query: &SearchQuery) -> Result<AggregateResult> {
        let fetcher = PageFetcher::new(
            Arc::clone(&self.config),
            Arc::clone(&self.transport),
            self.limiter.clone(),
        )
        .with_entry_policy(self.entry_policy);

        let first = fetcher.fetch_page(query).await?;
        let received = first.papers.len() as u64;
        let total = first.total_result;

        if !should_continue(first.papers.len(), received, query.max_results, total) {
            return self.finish(vec![first]).await;
        }

        let remaining = match query.max_results {
            Some(max) => (u64::from(max) - received).min(total - received),
            None => total - received,
        };

        let chunk_queries = plan_chunks(query, first.metadata.pagesize, self.config.page_size, remaining);
        tracing::debug!(
            pages = chunk_queries.len(),
            total,
            remaining,
            "fetching additional pages"
        );

        let outcomes = join_all(chunk_queries.iter().map(|chunk| fetcher.fetch_page(chunk))).await;

        let mut pages = Vec::with_capacity(1 + chunk_queries.len());
        pages.push(first);
        for (chunk, outcome) in chunk_queries.iter().zip(outcomes) {
            match outcome {
                Ok(page) => pages.push(page),
                Err(error) => tracing::warn!(
                    start = chunk.start,
                    max_results = ?chunk.max_results,
                    %error,
                    "dropping failed page fetch"
                ),
            }
        }

        self.finish(pages).await
    }

    async fn finish(&self, pages: Vec<PageResult>) -> Result<AggregateResult> {
        let aggregate = aggregate::merge(&pages)?;
        if let Some(handler) = &self.handler {
            if let Err(error) = handler.handle(&aggregate).await {
                tracing::warn!(%error, "result handler failed");
            }
        }
        Ok(aggregate)
    }
}

/// Partition the remaining result range into page-sized chunk queries,
/// starting just past the first page's window.
fn plan_chunks(
    query: &SearchQuery,
    first_page_size: u32,
    page_size: u32,
    remaining: u64,
) -> Vec<SearchQuery> {
    let base = u64::from(query.start) + u64::from(first_page_size);
    let mut chunks = Vec::new();
    let mut offset = 0u64;
    while offset < remaining {
        let size = u64::from(page_size).min(remaining - offset);
        let Ok(start) = u32::try_from(base + offset) else {
            break;
        };
        chunks.push(query.page(start, size as u32));
        offset += size;
    }
    chunks
}

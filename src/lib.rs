//! # arxiv-client
//!
//! An async Rust client for the arXiv search API.
//!
//! Provides:
//! - **Search orchestration**: one logical query fanned out over as many
//!   rate-limited page fetches as its result set needs, merged back into a
//!   single deduplicated aggregate
//! - **Strict-where-it-matters Atom parsing**: lenient about optional entry
//!   fields, fatal on structurally invalid documents
//! - **Sliding-window rate limiting** with a concurrency gate, shareable
//!   across clients
//!
//! ## Quick Start
//!
//! ```no_run
//! # async fn example() -> arxiv_client::error::Result<()> {
//! use arxiv_client::{ArxivClient, ArxivConfig, SearchQuery, SortCriterion};
//!
//! let client = ArxivClient::new(ArxivConfig::default())?;
//!
//! // Search for papers, capped at 30 results across pages.
//! let query = SearchQuery::terms("cat:cs.AI AND all:transformers")
//!     .with_max_results(30)
//!     .with_sort_by(SortCriterion::SubmittedDate);
//! let results = client.search(&query).await?;
//!
//! println!("{} of {} matches", results.papers_count(), results.total_result);
//! for paper in &results.papers {
//!     println!("{} ({})", paper.title, paper.id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Looking up known ids
//!
//! ```no_run
//! # async fn example() -> arxiv_client::error::Result<()> {
//! # use arxiv_client::{ArxivClient, ArxivConfig, SearchQuery};
//! # let client = ArxivClient::new(ArxivConfig::default())?;
//! let query = SearchQuery::ids(["2301.00001", "cond-mat/0102536"]);
//! let results = client.search(&query).await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod parse;
pub mod rate_limit;
pub mod transport;
pub mod types;

// Re-export key types at the crate root.
pub use client::ArxivClient;
pub use config::ArxivConfig;
pub use download::ResultHandler;
pub use error::{ArxivError, ParseError};
pub use parse::{parse_feed, parse_feed_with, EntryErrorPolicy, ParsedFeed};
pub use rate_limit::{RateLimitPermit, RateLimitState, RateLimiter};
pub use transport::{HttpTransport, Transport, TransportResponse};
pub use types::*;

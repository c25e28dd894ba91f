//! Client configuration.
//!
//! The config is a plain value handed in by the embedding application; this
//! crate performs no file or environment loading.

use serde::{Deserialize, Serialize};
use url::Url;

/// Static configuration for an [`ArxivClient`](crate::ArxivClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivConfig {
    /// Base URL of the arXiv query API.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Number of results requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Concurrency cap for the download collaborator.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,

    /// Maximum requests per rate-limit window.
    #[serde(default = "default_rate_limit_calls")]
    pub rate_limit_calls: usize,

    /// Rate-limit window length in seconds.
    #[serde(default = "default_rate_limit_period")]
    pub rate_limit_period: f64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Optional proxy URL for outbound requests.
    #[serde(default)]
    pub proxy: Option<String>,

    /// IANA timezone identifier used by consumers when rendering timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            max_concurrent_requests: default_max_concurrent(),
            rate_limit_calls: default_rate_limit_calls(),
            rate_limit_period: default_rate_limit_period(),
            timeout: default_timeout(),
            proxy: None,
            timezone: default_timezone(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse("http://export.arxiv.org/api/query").expect("default base URL is valid")
}

fn default_page_size() -> u32 {
    10
}

fn default_max_concurrent() -> usize {
    3
}

fn default_rate_limit_calls() -> usize {
    3
}

fn default_rate_limit_period() -> f64 {
    1.0
}

fn default_timeout() -> f64 {
    30.0
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArxivConfig::default();
        assert_eq!(config.base_url.as_str(), "http://export.arxiv.org/api/query");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.rate_limit_calls, 3);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: ArxivConfig = serde_json::from_str(r#"{"page_size": 50}"#).unwrap();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.timezone, "UTC");
    }
}

//! HTTP transport abstraction.
//!
//! The core never talks to the network directly: it consumes a [`Transport`]
//! implementation that makes one request and returns status plus body text.
//! [`HttpTransport`] is the default, backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::config::ArxivConfig;
use crate::error::{ArxivError, Result};

/// One completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// Final request URL, for diagnostics.
    pub url: Url,
}

/// Minimal outbound HTTP interface consumed by the fetcher.
///
/// The connection pool behind an implementation is owned by the caller and
/// lent to this crate; the client never closes or reconfigures it. A non-2xx
/// response is not an error at this level — the caller decides.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
    ) -> Result<TransportResponse>;
}

/// Default [`Transport`] backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from the client configuration (timeout, proxy).
    pub fn new(config: &ArxivConfig) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(config.timeout).map_err(|_| {
            ArxivError::InvalidConfiguration(format!(
                "timeout must be a positive number of seconds, got {}",
                config.timeout
            ))
        })?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout);

        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            http: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: &str,
        url: &Url,
        params: &[(String, String)],
    ) -> Result<TransportResponse> {
        let method = reqwest::Method::from_bytes(method.as_bytes()).map_err(|_| {
            ArxivError::InvalidConfiguration(format!("invalid HTTP method `{method}`"))
        })?;

        let started = std::time::Instant::now();
        tracing::debug!(%url, %method, "starting request");

        let response = self
            .http
            .request(method, url.clone())
            .query(params)
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.text().await?;

        tracing::debug!(
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request finished"
        );

        Ok(TransportResponse {
            status,
            body,
            url: final_url,
        })
    }
}

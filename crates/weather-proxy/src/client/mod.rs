//! Upstream weather API client.
//!
//! Provides async HTTP client with:
//! - Connection pooling via reqwest
//! - Bounded request and connect timeouts
//! - Optional retry middleware with exponential backoff (off by default)

mod middleware;

use reqwest_middleware::ClientWithMiddleware;
use url::Url;

use crate::config::Config;
use crate::error::{UpstreamError, UpstreamResult};

/// Longest upstream error body kept for logging.
const MAX_ERROR_BODY: usize = 512;

/// Client for the single upstream endpoint.
#[derive(Clone)]
pub struct UpstreamClient {
    /// HTTP client with middleware.
    client: ClientWithMiddleware,

    /// Fixed upstream URL, query string included.
    upstream_url: Url,
}

impl UpstreamClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = middleware::base_client(config)?;
        let client = middleware::with_retries(client, config.upstream_retries);

        Ok(Self { client, upstream_url: config.upstream_url.clone() })
    }

    #[must_use]
    pub const fn upstream_url(&self) -> &Url {
        &self.upstream_url
    }

    /// Fetch the upstream payload.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, or a body that is not JSON.
    pub async fn fetch(&self) -> UpstreamResult<serde_json::Value> {
        let response = self.client.get(self.upstream_url.clone()).send().await?;
        let response = Self::handle_response(response).await?;

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(UpstreamError::from)
    }

    /// Map non-success statuses to [`UpstreamError::Status`].
    async fn handle_response(response: reqwest::Response) -> UpstreamResult<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let mut text = response.text().await.unwrap_or_default();
        if text.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
            text.truncate(cut);
        }
        Err(UpstreamError::status(status.as_u16(), text))
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient").field("upstream_url", &self.upstream_url.as_str()).finish()
    }
}

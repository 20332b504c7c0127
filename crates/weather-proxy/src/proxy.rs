//! Cache-fronted access to the upstream payload.

use std::sync::Arc;

use url::Url;

use crate::cache::{ResponseCache, cache_key};
use crate::client::UpstreamClient;
use crate::error::ProxyResult;

/// How a successful response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Upstream,
}

/// Serves the upstream payload, fetching it only on a cache miss.
#[derive(Debug, Clone)]
pub struct ProxyHandler {
    client: UpstreamClient,
    cache: ResponseCache,
    key: String,
}

impl ProxyHandler {
    #[must_use]
    pub fn new(client: UpstreamClient, cache: ResponseCache) -> Self {
        let key = cache_key("GET", client.upstream_url().as_str());
        Self { client, cache, key }
    }

    /// Return the cached payload, or fetch, cache and return a fresh one.
    ///
    /// A failed fetch leaves the cache untouched, so the next request tries again.
    /// No lock is held across the upstream call; concurrent misses may each fetch.
    pub async fn handle(&self) -> ProxyResult<(Arc<serde_json::Value>, Source)> {
        if let Some(cached) = self.cache.get(&self.key).await {
            tracing::debug!("Serving upstream payload from cache");
            return Ok((cached, Source::Cache));
        }

        let value = match self.client.fetch().await {
            Ok(value) => Arc::new(value),
            Err(e) => {
                tracing::warn!(
                    upstream = %self.client.upstream_url(),
                    error = %e,
                    "Upstream fetch failed"
                );
                return Err(e.into());
            }
        };

        self.cache.set_default(&self.key, Arc::clone(&value)).await;
        tracing::debug!(ttl = ?self.cache.default_ttl(), "Cached fresh upstream payload");

        Ok((value, Source::Upstream))
    }

    #[must_use]
    pub const fn upstream_url(&self) -> &Url {
        self.client.upstream_url()
    }

    #[must_use]
    pub const fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Key the upstream payload is cached under.
    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.key
    }
}

//! Middleware stack for the upstream HTTP client.
//!
//! The plain reqwest client is wrapped in `reqwest-middleware` so a transient-failure
//! retry policy can be layered on. With the default of zero retries every cache
//! miss results in exactly one upstream request.

use std::time::Duration;

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};

use crate::config::{Config, defaults};

/// Lower bound for backoff between retries.
const RETRY_MIN_BACKOFF: Duration = Duration::from_millis(250);

/// Upper bound for backoff between retries.
const RETRY_MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Build the underlying reqwest client with timeouts and pooling from `config`.
pub(super) fn base_client(config: &Config) -> reqwest::Result<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    Client::builder()
        .default_headers(headers)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(defaults::MAX_KEEPALIVE)
        .pool_idle_timeout(defaults::KEEPALIVE_EXPIRY)
        .gzip(true)
        .build()
}

/// Wrap `client` with the retry policy.
pub(super) fn with_retries(client: Client, max_retries: u32) -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(RETRY_MIN_BACKOFF, RETRY_MAX_BACKOFF)
        .build_with_max_retries(max_retries);

    ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

//! Configuration for the weather proxy.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::auth::Credentials;

/// Proxy configuration constants.
pub mod defaults {
    use std::time::Duration;

    /// Open-Meteo forecast endpoint the proxy fronts.
    pub const UPSTREAM_URL: &str = "https://api.open-meteo.com/v1/forecast?latitude=52.52&longitude=13.41&current=temperature_2m,wind_speed_10m&hourly=temperature_2m,relative_humidity_2m,wind_speed_10m";

    /// Listen port.
    pub const PORT: u16 = 3000;

    /// Requests allowed per client per window.
    pub const RATE_LIMIT_MAX: u32 = 5;

    /// Rate-limit window (1 minute).
    pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

    /// Cache TTL (5 minutes).
    pub const CACHE_TTL: Duration = Duration::from_secs(300);

    /// Maximum cache size. Only one route is proxied, so this is never reached.
    pub const CACHE_MAX_SIZE: u64 = 100;

    /// Upstream request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Upstream connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Upstream retries. Zero keeps one upstream call per cache miss.
    pub const UPSTREAM_RETRIES: u32 = 0;

    /// Maximum keepalive connections to the upstream.
    pub const MAX_KEEPALIVE: usize = 10;

    /// Keepalive expiry.
    pub const KEEPALIVE_EXPIRY: Duration = Duration::from_secs(30);
}

/// Errors raised while building a [`Config`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Upstream URL could not be parsed.
    #[error("Invalid upstream URL '{url}': {source}")]
    InvalidUpstreamUrl {
        /// The rejected value
        url: String,
        /// Parser error
        source: url::ParseError,
    },

    /// An environment variable held a value of the wrong type.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv {
        /// Variable name
        name: &'static str,
        /// The rejected value
        value: String,
    },
}

/// Server configuration.
#[derive(Clone)]
pub struct Config {
    /// Listen port.
    pub port: u16,

    /// Requests allowed per client per window.
    pub rate_limit_max: u32,

    /// Rate-limit window length.
    pub rate_limit_window: Duration,

    /// Lifetime of a cached upstream payload.
    pub cache_ttl: Duration,

    /// Maximum cache size.
    pub cache_max_size: u64,

    /// Static credential pair accepted on the protected route.
    pub credentials: Credentials,

    /// Upstream URL (overridable for testing with mock servers).
    pub upstream_url: Url,

    /// Upstream request timeout.
    pub request_timeout: Duration,

    /// Upstream connection timeout.
    pub connect_timeout: Duration,

    /// Transient-failure retries for the upstream call.
    pub upstream_retries: u32,
}

impl Config {
    /// Create a configuration with the given credentials and defaults for everything else.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            port: defaults::PORT,
            rate_limit_max: defaults::RATE_LIMIT_MAX,
            rate_limit_window: defaults::RATE_LIMIT_WINDOW,
            cache_ttl: defaults::CACHE_TTL,
            cache_max_size: defaults::CACHE_MAX_SIZE,
            credentials,
            upstream_url: default_upstream_url(),
            request_timeout: defaults::REQUEST_TIMEOUT,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            upstream_retries: defaults::UPSTREAM_RETRIES,
        }
    }

    /// Create a test configuration pointing at a mock upstream.
    ///
    /// Credentials are `admin` / `secret`.
    ///
    /// # Panics
    ///
    /// Panics if `upstream_url` is not a valid URL.
    #[must_use]
    pub fn for_testing(upstream_url: &str) -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            upstream_url: Url::parse(upstream_url).expect("valid mock upstream URL"),
            ..Self::new(Credentials::new("admin", "secret"))
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Reads `.env` first if present. Recognised variables: `PORT`,
    /// `RATE_LIMIT_MAX`, `CACHE_TTL` (seconds), `API_USER`, `API_PASS`,
    /// `UPSTREAM_URL`, `UPSTREAM_TIMEOUT` (seconds), `UPSTREAM_RETRIES`.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from a variable lookup. Blank values count as unset.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let lookup = |name: &str| var(name).filter(|value| !value.trim().is_empty());

        let credentials = Credentials::new(
            lookup("API_USER").unwrap_or_default(),
            lookup("API_PASS").unwrap_or_default(),
        );
        let mut config = Self::new(credentials);

        if let Some(port) = parse_var(&lookup, "PORT")? {
            config.port = port;
        }
        if let Some(max) = parse_var(&lookup, "RATE_LIMIT_MAX")? {
            config.rate_limit_max = max;
        }
        if let Some(secs) = parse_var(&lookup, "CACHE_TTL")? {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "UPSTREAM_TIMEOUT")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var(&lookup, "UPSTREAM_RETRIES")? {
            config.upstream_retries = retries;
        }
        if let Some(url) = lookup("UPSTREAM_URL") {
            config.upstream_url = parse_upstream_url(url.trim())?;
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Credentials::default())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("rate_limit_max", &self.rate_limit_max)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("cache_ttl", &self.cache_ttl)
            .field("credentials", &self.credentials)
            .field("upstream_url", &self.upstream_url.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("upstream_retries", &self.upstream_retries)
            .finish()
    }
}

/// Parse an upstream URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidUpstreamUrl`] when `url` does not parse.
pub fn parse_upstream_url(url: &str) -> Result<Url, ConfigError> {
    Url::parse(url)
        .map_err(|source| ConfigError::InvalidUpstreamUrl { url: url.to_string(), source })
}

fn default_upstream_url() -> Url {
    Url::parse(defaults::UPSTREAM_URL).expect("default upstream URL is valid")
}

fn parse_var<T: std::str::FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(name)
        .map(|value| value.trim().parse().map_err(|_| ConfigError::InvalidEnv { name, value }))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.rate_limit_max, 5);
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.upstream_retries, 0);
        assert!(config.credentials.is_empty());
        assert_eq!(config.upstream_url.host_str(), Some("api.open-meteo.com"));
    }

    #[test]
    fn test_for_testing_overrides_upstream() {
        let config = Config::for_testing("http://127.0.0.1:9999/v1/forecast");
        assert_eq!(config.upstream_url.as_str(), "http://127.0.0.1:9999/v1/forecast");
        assert_eq!(config.credentials.login(), "admin");
    }

    #[test]
    fn test_parse_upstream_url_rejects_garbage() {
        let err = parse_upstream_url("not a url").unwrap_err();
        assert!(err.to_string().contains("not a url"));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_from_vars_empty_environment_uses_defaults() {
        let config = Config::from_vars(vars(&[])).unwrap();
        assert_eq!(config.port, defaults::PORT);
        assert_eq!(config.rate_limit_max, defaults::RATE_LIMIT_MAX);
        assert!(config.credentials.is_empty());
        assert_eq!(config.upstream_url.as_str(), default_upstream_url().as_str());
    }

    #[test]
    fn test_from_vars_reads_every_variable() {
        let config = Config::from_vars(vars(&[
            ("PORT", "8080"),
            ("RATE_LIMIT_MAX", " 12 "),
            ("CACHE_TTL", "30"),
            ("API_USER", "admin"),
            ("API_PASS", "secret"),
            ("UPSTREAM_URL", "http://127.0.0.1:9/v1/forecast"),
            ("UPSTREAM_TIMEOUT", "7"),
            ("UPSTREAM_RETRIES", "2"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.rate_limit_max, 12);
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.credentials, Credentials::new("admin", "secret"));
        assert_eq!(config.upstream_url.as_str(), "http://127.0.0.1:9/v1/forecast");
        assert_eq!(config.request_timeout, Duration::from_secs(7));
        assert_eq!(config.upstream_retries, 2);
    }

    #[test]
    fn test_from_vars_blank_values_fall_back_to_defaults() {
        let config = Config::from_vars(vars(&[
            ("PORT", ""),
            ("RATE_LIMIT_MAX", "   "),
            ("UPSTREAM_URL", ""),
            ("API_USER", " "),
        ]))
        .unwrap();

        assert_eq!(config.port, defaults::PORT);
        assert_eq!(config.rate_limit_max, defaults::RATE_LIMIT_MAX);
        assert_eq!(config.upstream_url.host_str(), Some("api.open-meteo.com"));
        assert!(config.credentials.is_empty());
    }

    #[test]
    fn test_from_vars_rejects_non_numeric_limit() {
        let err = Config::from_vars(vars(&[("RATE_LIMIT_MAX", "abc")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv { name: "RATE_LIMIT_MAX", ref value } if value == "abc"
        ));
    }

    #[test]
    fn test_from_vars_rejects_bad_upstream_url() {
        let err = Config::from_vars(vars(&[("UPSTREAM_URL", "not a url")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUpstreamUrl { ref url, .. } if url == "not a url"
        ));
    }

    #[test]
    fn test_debug_hides_password() {
        let config = Config::new(Credentials::new("admin", "hunter2"));
        let debug = format!("{config:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}

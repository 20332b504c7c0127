//! Error types for the weather proxy.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! [`ProxyError`] is the HTTP boundary: every variant renders a fixed client-facing
//! response and never leaks upstream detail.

use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

/// Body sent with every 429.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests atm, please try again later.";

/// Body sent with every 401.
pub const UNAUTHORIZED_MESSAGE: &str = "Authentication is required!";

/// Challenge sent with every 401.
pub const AUTH_CHALLENGE: &str = "Basic realm=\"401\"";

/// `error` field of the JSON body sent on upstream failure.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Error fetching data from external API";

/// Errors from the upstream HTTP client.
#[derive(thiserror::Error, Debug)]
pub enum UpstreamError {
    /// HTTP transport error (connection, DNS, TLS, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },

    /// Response body was not JSON
    #[error("Failed to parse upstream response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl UpstreamError {
    /// Create a status error.
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status { status, message: message.into() }
    }

    /// Upstream status code, if the upstream answered at all.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Reasons a credential header is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header
    #[error("Missing Authorization header")]
    MissingHeader,

    /// Header present but not `<scheme> <base64(login:password)>`
    #[error("Malformed Authorization header: {0}")]
    MalformedHeader(&'static str),

    /// Well-formed header carrying the wrong credentials
    #[error("Invalid credentials")]
    InvalidCredentials,
}

/// Errors surfaced by the request pipeline.
#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    /// Client exceeded its per-window request budget
    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded {
        /// Time until the client's window resets
        retry_after: Duration,
    },

    /// Credential check failed
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    /// Upstream fetch failed
    #[error("Upstream unavailable: {0}")]
    Upstream(#[from] UpstreamError),
}

impl ProxyError {
    /// Create a rate limited error with retry-after duration.
    #[must_use]
    pub const fn rate_limited(retry_after: Duration) -> Self {
        Self::RateLimitExceeded { retry_after }
    }

    /// HTTP status this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::RateLimitExceeded { retry_after } => {
                let mut response = (status, RATE_LIMIT_MESSAGE).into_response();
                response.headers_mut().insert(
                    header::RETRY_AFTER,
                    HeaderValue::from(ceil_secs(retry_after)),
                );
                response
            }
            Self::Unauthorized(_) => (
                status,
                [(header::WWW_AUTHENTICATE, AUTH_CHALLENGE)],
                UNAUTHORIZED_MESSAGE,
            )
                .into_response(),
            Self::Upstream(_) => (
                status,
                Json(serde_json::json!({ "error": UPSTREAM_FAILURE_MESSAGE })),
            )
                .into_response(),
        }
    }
}

/// Whole seconds, rounded up, so clients never retry early.
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 { secs + 1 } else { secs }
}

/// Result type alias for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Result type alias for pipeline operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

//! Request pipeline for the protected route.
//!
//! `Received → RateChecked → AuthChecked → Handled → Responded`, short-circuiting
//! with 429 when the limiter denies and with 401 when authentication fails.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::error::{AuthError, ProxyError, ceil_secs};
use crate::rate_limit::RateDecision;

/// Identity used when the peer address is unavailable.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Per-client key for rate limiting: the peer IP.
pub fn client_identity(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}

/// First stage: reject clients over their window budget.
pub async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let identity = client_identity(&req);
    let decision = state.limiter.check(&identity).await;

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        tracing::info!(client = %identity, limit = decision.limit, "Rate limit exceeded");
        ProxyError::rate_limited(decision.reset_after).into_response()
    };

    insert_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Second stage: require valid Basic credentials.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ProxyError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(HeaderValue::to_str)
        .transpose()
        .map_err(|_| AuthError::MalformedHeader("header is not visible ASCII"))?;

    if let Err(e) = state.authenticator.authenticate(header) {
        tracing::debug!(reason = %e, "Rejected credentials");
        return Err(e.into());
    }

    Ok(next.run(req).await)
}

/// Final stage: serve the upstream payload.
pub async fn handle_proxy(State(state): State<Arc<AppState>>) -> Response {
    match state.proxy.handle().await {
        Ok((payload, source)) => {
            tracing::debug!(?source, "Proxied upstream payload");
            Json(payload.as_ref()).into_response()
        }
        Err(e) => e.into_response(),
    }
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    let reset_at = SystemTime::now()
        .checked_add(decision.reset_after)
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, ceil_secs);

    headers.insert(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(decision.limit));
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(HeaderName::from_static("x-ratelimit-reset"), HeaderValue::from(reset_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_client_identity_from_connect_info() {
        let mut req = Request::new(Body::empty());
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 5123))));
        assert_eq!(client_identity(&req), "10.0.0.7");
    }

    #[test]
    fn test_client_identity_ignores_port() {
        let mut a = Request::new(Body::empty());
        a.extensions_mut().insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 1))));
        let mut b = Request::new(Body::empty());
        b.extensions_mut().insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 2))));
        assert_eq!(client_identity(&a), client_identity(&b));
    }

    #[test]
    fn test_client_identity_without_connect_info() {
        let req = Request::new(Body::empty());
        assert_eq!(client_identity(&req), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_rate_limit_headers() {
        let mut headers = HeaderMap::new();
        let decision = RateDecision {
            allowed: true,
            limit: 5,
            remaining: 3,
            reset_after: std::time::Duration::from_secs(42),
        };
        insert_rate_limit_headers(&mut headers, &decision);

        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "5");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "3");
        let reset: u64 =
            headers.get("x-ratelimit-reset").unwrap().to_str().unwrap().parse().unwrap();
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
        assert!(reset >= now + 41 && reset <= now + 43);
    }
}

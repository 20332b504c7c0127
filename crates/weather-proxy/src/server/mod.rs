//! HTTP server for the weather proxy.
//!
//! Routes:
//! - `GET /`       plain landing text, unprotected
//! - `GET /health` liveness document, unprotected
//! - `GET /api`    the proxied upstream payload behind the request pipeline

pub mod pipeline;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, middleware, response::IntoResponse, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::auth::Authenticator;
use crate::cache::ResponseCache;
use crate::client::UpstreamClient;
use crate::config::Config;
use crate::proxy::ProxyHandler;
use crate::rate_limit::RateLimiter;

/// Path of the single proxied route.
pub const PROXY_PATH: &str = "/api";

/// Body of the landing route.
pub const LANDING_MESSAGE: &str = "HELLO WORLD!";

/// Components shared by every request.
#[derive(Debug)]
pub struct AppState {
    pub proxy: ProxyHandler,
    pub limiter: Arc<RateLimiter>,
    pub authenticator: Authenticator,
}

impl AppState {
    /// Build fresh, isolated state from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the upstream HTTP client cannot be built.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = UpstreamClient::new(config)?;
        let cache = ResponseCache::new(config.cache_max_size, config.cache_ttl);

        Ok(Self {
            proxy: ProxyHandler::new(client, cache),
            limiter: Arc::new(RateLimiter::new(config.rate_limit_max, config.rate_limit_window)),
            authenticator: Authenticator::new(config.credentials.clone()),
        })
    }
}

/// Create the HTTP router.
///
/// The rate-limit layer wraps the auth layer, which wraps the proxy handler, so
/// limiting runs first and a denied request never reaches authentication.
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route(PROXY_PATH, get(pipeline::handle_proxy))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), pipeline::require_auth))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            pipeline::enforce_rate_limit,
        ));

    Router::new()
        .route("/", get(landing))
        .route("/health", get(health_check))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn landing() -> &'static str {
    LANDING_MESSAGE
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// The weather proxy server.
pub struct ProxyServer {
    state: Arc<AppState>,
}

impl ProxyServer {
    /// Create a new server.
    ///
    /// # Errors
    ///
    /// Returns error if the upstream HTTP client cannot be built.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self { state: Arc::new(AppState::from_config(config)?) })
    }

    #[must_use]
    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state))
    }

    /// Serve on `0.0.0.0:port` until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error on bind or server failure.
    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let cleanup = Arc::clone(&self.state.limiter).start_cleanup_task();

        tracing::info!(
            upstream = %self.state.proxy.upstream_url(),
            rate_limit_max = self.state.limiter.max_requests(),
            cache_ttl = ?self.state.proxy.cache().default_ttl(),
            "Server is running on port {}",
            port
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router().into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        cleanup.abort();
        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for ProxyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyServer").field("proxy", &self.state.proxy).finish()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}

//! Weather Proxy
//!
//! A small HTTP reverse proxy in front of the Open-Meteo forecast API.
//! One protected route passes through a fixed pipeline:
//!
//! - **Rate-limited**: 5 requests per client per minute by default
//! - **Authenticated**: HTTP Basic against one static login/password pair
//! - **Cached**: 5-minute TTL cache reduces upstream calls
//!
//! # Example
//!
//! ```no_run
//! use weather_proxy::{config::Config, server::ProxyServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = ProxyServer::new(&config)?;
//!     server.run(config.port).await
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod proxy;
pub mod rate_limit;
pub mod server;

pub use auth::{Authenticator, Credentials};
pub use client::UpstreamClient;
pub use config::Config;
pub use error::{AuthError, ProxyError, UpstreamError};
pub use proxy::ProxyHandler;
pub use rate_limit::RateLimiter;
pub use server::ProxyServer;

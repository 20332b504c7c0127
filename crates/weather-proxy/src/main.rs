//! Weather Proxy - Entry Point

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use weather_proxy::{
    config::{self, Config},
    Credentials, ProxyServer,
};

#[derive(Parser, Debug)]
#[command(name = "weather-proxy")]
#[command(about = "Caching, rate-limited, Basic-auth proxy for the Open-Meteo forecast API")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value_t = config::defaults::PORT, env = "PORT")]
    port: u16,

    /// Requests allowed per client per minute
    #[arg(long, default_value_t = config::defaults::RATE_LIMIT_MAX, env = "RATE_LIMIT_MAX")]
    rate_limit_max: u32,

    /// Cache TTL in seconds
    #[arg(long, default_value_t = config::defaults::CACHE_TTL.as_secs(), env = "CACHE_TTL")]
    cache_ttl: u64,

    /// Login accepted on the protected route
    #[arg(long, default_value = "", env = "API_USER")]
    api_user: String,

    /// Password accepted on the protected route
    #[arg(long, default_value = "", env = "API_PASS", hide_env_values = true)]
    api_pass: String,

    /// Upstream URL to proxy
    #[arg(long, default_value = config::defaults::UPSTREAM_URL, env = "UPSTREAM_URL")]
    upstream_url: String,

    /// Upstream request timeout in seconds
    #[arg(
        long,
        default_value_t = config::defaults::REQUEST_TIMEOUT.as_secs(),
        env = "UPSTREAM_TIMEOUT"
    )]
    upstream_timeout: u64,

    /// Retries for transient upstream failures
    #[arg(long, default_value_t = config::defaults::UPSTREAM_RETRIES, env = "UPSTREAM_RETRIES")]
    upstream_retries: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = Config::new(Credentials::new(self.api_user, self.api_pass));
        config.port = self.port;
        config.rate_limit_max = self.rate_limit_max;
        config.cache_ttl = Duration::from_secs(self.cache_ttl);
        config.upstream_url = config::parse_upstream_url(&self.upstream_url)?;
        config.request_timeout = Duration::from_secs(self.upstream_timeout);
        config.upstream_retries = self.upstream_retries;
        Ok(config)
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let config = cli.into_config()?;
    if config.credentials.is_empty() {
        tracing::warn!(
            "API_USER/API_PASS not set; every request to the protected route will be rejected"
        );
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?config, "Starting weather proxy");

    let port = config.port;
    ProxyServer::new(&config)?.run(port).await
}

//! User registration service.

use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use user_registration::{
    api::{create_router_with_rate_limit, AppState, RateLimitState},
    config::{Config, LogConfig, LogFormat},
    RegistrationHandler,
};

#[tokio::main]
async fn main() {
    // A missing table name stops startup before anything is logged.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log);

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);

    match log.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn run(config: Config) -> Result<()> {
    info!(
        table = %config.users_table,
        backend = ?config.store.backend,
        "Starting user registration service"
    );

    let store = config
        .open_store()
        .await
        .with_context(|| format!("Failed to open user table {}", config.users_table))?;

    let handler = RegistrationHandler::new(store).with_store_timeout(config.store.timeout);
    let app = create_router_with_rate_limit(
        AppState::new(handler, config.users_table.as_str()),
        RateLimitState::new(config.rate_limit.requests_per_minute),
    );

    let ip: IpAddr = config
        .server
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.server.listen_addr))?;
    let addr = SocketAddr::new(ip, config.server.port);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app).await.context("Server error")
}

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gpt_gateway::config::{Cli, Config};
use gpt_gateway::provider::http::HttpCompletion;
use gpt_gateway::provider::ProviderRegistry;
use gpt_gateway::server::api::{build_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Load configuration before logging so file settings pick the filter and format.
    let config = Arc::new(Config::resolve(&cli)?);

    // Initialize tracing/logging.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter().into());

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }

    info!("gpt-gateway v{}", env!("CARGO_PKG_VERSION"));

    if !cli.config.exists() {
        warn!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    info!(
        upstream = %config.upstream.base_url,
        timeout_secs = config.upstream.timeout_secs,
        api_key = config.upstream.api_key.is_some(),
        debug = config.server.debug,
        log_json = config.logging.json,
        "Configuration loaded"
    );

    // Every provider is served by the aggregator's HTTP API.
    let backend = HttpCompletion::new(&config.upstream)?;
    info!(endpoint = backend.endpoint(), "Upstream backend ready");
    let registry = ProviderRegistry::new(Arc::new(backend));

    let state = Arc::new(AppState::new(config.clone(), registry)?);
    let app = build_router(state);

    // Start the server.
    let listen_addr = config.server.listen.clone();
    info!(addr = listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

//! Runtime configuration for gpt-gateway.
//!
//! Configuration is loaded from a JSON file (every section optional), then
//! the environment, then command-line flags, each overriding the previous.

use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::http::StatusCode;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Environment variable holding the upstream API key.
pub const ENV_API_KEY: &str = "GPT_GATEWAY_API_KEY";

/// Command-line arguments.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gpt-gateway", about = "HTTP gateway for a multi-provider LLM aggregator")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address, overrides the config file.
    #[arg(long)]
    pub listen: Option<String>,

    /// Upstream aggregator base URL, overrides the config file.
    #[arg(long)]
    pub upstream: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Debug mode (implies verbose logging).
    #[arg(long)]
    pub debug: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Upstream aggregator configuration.
    pub upstream: UpstreamConfig,

    /// Log output settings.
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:5000").
    pub listen: String,

    /// Debug mode: debug-level logging.
    pub debug: bool,

    /// Status returned when a normal-mode completion fails upstream.
    /// `None` keeps 200 with the error text in the `response` field.
    pub upstream_error_status: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            debug: false,
            upstream_error_status: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Debug-level logging for the gateway and HTTP layers.
    pub verbose: bool,

    /// Emit logs as JSON lines.
    pub json: bool,
}

/// Upstream aggregator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,

    /// Bearer token sent upstream, if any.
    pub api_key: Option<String>,

    /// Bound on a normal-mode completion and on opening a stream, in seconds.
    pub timeout_secs: u64,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1337/v1".to_string(),
            api_key: None,
            timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            let config: Config = serde_json::from_str(&data)
                .with_context(|| format!("parsing config file {}", path.display()))?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Load the file named by `cli`, then apply the environment and flags.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = Self::load(&cli.config)?;
        config.apply_env(std::env::var(ENV_API_KEY).ok());
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, api_key: Option<String>) {
        if self.upstream.api_key.is_none() {
            self.upstream.api_key = api_key.filter(|key| !key.is_empty());
        }
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if let Some(upstream) = &cli.upstream {
            self.upstream.base_url = upstream.clone();
        }
        if cli.debug {
            self.server.debug = true;
        }
        if cli.verbose {
            self.logging.verbose = true;
        }
        if cli.log_json {
            self.logging.json = true;
        }
    }

    /// Default `EnvFilter` directives when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.logging.verbose || self.server.debug {
            "gpt_gateway=debug,tower_http=debug"
        } else {
            "gpt_gateway=info,tower_http=info"
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.upstream.base_url.trim().is_empty(),
            "upstream.base_url must not be empty"
        );
        anyhow::ensure!(self.upstream.timeout_secs > 0, "upstream.timeout_secs must be positive");
        self.upstream_error_status()?;
        Ok(())
    }

    /// Parsed `server.upstream_error_status`.
    pub fn upstream_error_status(&self) -> anyhow::Result<Option<StatusCode>> {
        self.server
            .upstream_error_status
            .map(|code| {
                StatusCode::from_u16(code)
                    .with_context(|| format!("invalid server.upstream_error_status {code}"))
            })
            .transpose()
    }
}

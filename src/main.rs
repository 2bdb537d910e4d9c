//! # kb-gateway binary
//!
//! Starts the retrieval gateway HTTP server.
//!
//! ```bash
//! kb-gateway --config ./config/gateway.toml serve
//! ```
//!
//! All settings are read from the TOML config file; `RUST_LOG` controls
//! log verbosity (e.g. `RUST_LOG=kb_gateway=debug`). The OpenAI API key
//! is taken from the `OPENAI_API_KEY` environment variable when the
//! `openai` embedding provider is selected.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kb_gateway::config::load_config;
use kb_gateway::embed::create_embedder;
use kb_gateway::gateway::Gateway;
use kb_gateway::index::QdrantClient;
use kb_gateway::server::run_server;

/// Access-controlled retrieval gateway over a vector index.
#[derive(Parser)]
#[command(
    name = "kb-gateway",
    about = "Access-controlled retrieval gateway over a vector index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gateway.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let embedder = create_embedder(&config.embedding)?;
            let index = Arc::new(QdrantClient::new(
                &config.qdrant.url,
                std::time::Duration::from_secs(config.qdrant.timeout_secs),
            )?);
            let gateway = Arc::new(Gateway::new(&config, embedder, index));
            run_server(&config, gateway).await
        }
    }
}

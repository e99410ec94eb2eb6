//! API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌───────────────────────────────────────────────────────┐
//!                   │                      API GATEWAY                      │
//!                   │                                                       │
//!  Client Request   │  ┌────────┐    ┌──────────────┐    ┌──────────────┐  │
//!  ─────────────────┼─▶│  http  │───▶│   Pipeline   │───▶│    merge     │  │
//!                   │  │ server │    │ (per route)  │    │  fan-out     │  │
//!                   │  └────────┘    └──────────────┘    └──────┬───────┘  │
//!                   │                                           │          │
//!                   │                       per backend         ▼          │
//!                   │   ┌───────────────┐  ┌─────────────┐  ┌──────────┐   │
//!                   │   │request builder│─▶│load balancer│─▶│concurrent│   │
//!                   │   └───────────────┘  └─────────────┘  └────┬─────┘   │
//!                   │                                            ▼         │
//!  Client Response  │  ┌──────────┐                        ┌───────────┐   │
//!  ◀────────────────┼──│ response │◀───── merged data ─────│  backend  │◀──┼── Backends
//!                   │  └──────────┘                        │ + format  │   │
//!                   │                                      └───────────┘   │
//!                   └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::loader::load_config;
use api_gateway::observability::{logging, metrics};
use api_gateway::{HttpServer, PipelineFactory};

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "API gateway merging the answers of several backends", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        path = %cli.config.display(),
        endpoints = config.endpoints.len(),
        bind_address = %config.listener.bind_address,
        "Configuration loaded"
    );

    if cli.check {
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let factory = PipelineFactory::http(reqwest::Client::new());
    let server = HttpServer::new(config, &factory)?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

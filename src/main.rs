//! A-then-B fallback reverse proxy.
//!
//! Every request is tried against backend A first. When A answers
//! `404 Not Found` with the no-route header, the request is replayed
//! against backend B, and the (method, path) pair is remembered so later
//! requests go straight to the right backend.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────┐
//!                    │                    GATEWAY                    │
//!  Client Request    │  ┌─────────┐   ┌─────────┐   ┌─────────────┐  │
//!  ──────────────────┼─▶│   net   │──▶│  http   │──▶│   proxy     │  │
//!                    │  │listener │   │ server  │   │   router    │  │
//!                    │  └─────────┘   └─────────┘   └──────┬──────┘  │
//!                    │                                     │         │
//!                    │                 cache hit ┌─────────┴───────┐ │
//!                    │              ┌────────────┤ routing::cache  │ │
//!                    │              │            └─────────┬───────┘ │
//!                    │              ▼              cache miss│        │
//!                    │      ┌──────────────┐     ┌─────────▼──────┐  │
//!                    │      │   dispatch   │     │ fallback engine│  │      ┌───┐
//!                    │      │   (A or B)   │     │ probe A → B    │──┼─────▶│ A │
//!                    │      └──────┬───────┘     └────────┬───────┘  │      └───┘
//!                    │             └──────────┬───────────┘          │      ┌───┐
//!  Client Response   │                        ▼                      │─────▶│ B │
//!  ◀─────────────────┼──────────────── forward (hyper) ──────────────│      └───┘
//!                    └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gateway_proxy::config::load_config;
use gateway_proxy::http::GatewayServer;
use gateway_proxy::lifecycle::signals::wait_for_signal;
use gateway_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "gateway-proxy")]
#[command(about = "Reverse proxy that falls back from backend A to backend B", long_about = None)]
struct Cli {
    /// Optional TOML config file; GATEWAY_* environment variables override it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging("info");
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("gateway-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        host = %config.listener.host,
        port = ?config.listener.port,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = match GatewayServer::bind(&config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start gateway");
            return ExitCode::FAILURE;
        }
    };

    let handle = server.handle();
    tokio::spawn(async move {
        wait_for_signal().await;
        handle.shutdown();
    });

    if let Err(e) = server.run().await {
        tracing::error!(error = %e, "Gateway exited with error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

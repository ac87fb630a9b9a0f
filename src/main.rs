//! site-gate: request-processing gateway for a headless CMS.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────────┐
//!                 │                          SITE GATE                            │
//!                 │                                                              │
//!  Client ───────▶│ request-id → trace → panic guard → timeout → body limit      │
//!                 │      │                                                       │
//!                 │      ▼                                                       │
//!                 │  health ──▶ cors ──▶ auth ──▶ 404 rewrite ──▶ cache tags     │
//!                 │  (live/ready) (403/204) (401)                    │            │
//!                 │                                                  ▼            │
//!                 │                         ┌────────────────────────────────┐   │
//!                 │                         │ core: /auth/login, /auth/session│   │
//!                 │                         │       everything else → upstream│───┼──▶ CMS renderer
//!                 │                         └────────────────────────────────┘   │
//!                 │                                                              │
//!                 │  counter store (memory | redis) · health checks · metrics    │
//!                 └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use site_gate::config::load_config;
use site_gate::lifecycle::signals::shutdown_on_signal;
use site_gate::observability::{logging, metrics};
use site_gate::{GateServer, Shutdown};

#[derive(Parser)]
#[command(name = "site-gate", version, about = "Request-processing gateway for a headless CMS")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("site-gate: {e}");
            std::process::exit(2);
        }
    };
    if args.check {
        println!("configuration OK");
        return Ok(());
    }

    logging::init_logging(&config.observability);
    tracing::info!("site-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        allowed_origins = config.cors.allowed_origins.len(),
        counter_store = ?config.rate_limit.store,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = GateServer::new(config)?;
    let shutdown = Shutdown::new();
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

//! Service bootstrap entry point.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                    SERVER PROCESS                    │
//!                    │                                                      │
//!   Client Request   │  ┌──────────┐    ┌───────────┐    ┌──────────────┐   │
//!   ─────────────────┼─▶│ listener │───▶│  router   │───▶│ API handlers │   │
//!                    │  └──────────┘    │ CORS/auth │    └──────┬───────┘   │
//!                    │                  └───────────┘           │           │
//!                    │                                          ▼           │
//!                    │  ┌──────────────┐   ┌──────────┐   ┌────────────┐    │
//!                    │  │ TaskRegistry │◀──│background│   │  storage   │    │
//!                    │  │  (drain)     │   │  work    │   │ (timed)    │    │
//!                    │  └──────┬───────┘   └──────────┘   └─────┬──────┘    │
//!                    │         │                                ▼           │
//!   SIGINT/SIGTERM ──┼──▶ lifecycle (deadline)            metrics registry  │
//!                    │                                    GET /metrics      │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use axum::Router;
use clap::Parser;

use service_bootstrap::config::{load_config, LogFormat};
use service_bootstrap::lifecycle;
use service_bootstrap::observability::{logging, reporting};

#[derive(Parser)]
#[command(name = "service-bootstrap")]
#[command(about = "HTTP service with graceful, deadline-bounded shutdown", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "configs/default.toml")]
    config: PathBuf,

    /// interface:port to listen on (overrides listener.bind_address)
    #[arg(short, long)]
    port: Option<String>,

    /// Log format (text|json), overrides observability.log_format
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.listener.bind_address = port;
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }

    logging::init(config.observability.log_format, &config.observability.log_level)?;
    let _reporting = reporting::init(&config.sentry);

    tracing::info!(
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        shutdown_timeout_secs = config.listener.shutdown_timeout_secs,
        "service-bootstrap v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let bind_address = config.listener.bind_address.clone();
    let app = lifecycle::build(config, Router::new())?;
    let storage = app.state.storage.clone();

    let outcome = app.process.run(&bind_address).await;
    app.upkeep.abort();
    storage.close().await;

    match outcome {
        Ok(()) => {
            tracing::info!("graceful shutdown completed");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "can't start or gracefully stop application");
            sentry::capture_error(&e);
            Err(e.into())
        }
    }
}

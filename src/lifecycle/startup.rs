//! Startup orchestration.
//!
//! # Responsibilities
//! - Construct the metrics registry, storage pool, authorization adapter
//!   and outbound client from configuration
//! - Build the route table
//! - Hand everything to a [`ServerProcess`]
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Nothing is bound here; the listener starts in `ServerProcess::run`
//! - Must be called inside a Tokio runtime (metrics upkeep is spawned)

use std::sync::Arc;

use axum::Router;
use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::client::InstrumentedClient;
use crate::config::ServiceConfig;
use crate::http::{build_router, AppState};
use crate::lifecycle::process::ServerProcess;
use crate::lifecycle::registry::TaskRegistry;
use crate::observability::metrics::{MetricSink, Metrics, DB_ACCESS_LATENCY, UPKEEP_INTERVAL};
use crate::security::authorization::{Authorization, StaticTokenAuth};
use crate::storage::Storage;

/// Errors raised while constructing the application.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("can't build metrics registry: {0}")]
    Metrics(#[from] BuildError),

    #[error("can't configure storage: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("can't build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A fully wired application, ready to run.
pub struct Application {
    pub process: ServerProcess,
    pub state: AppState,
    /// Periodic metrics upkeep; abort once the process has stopped.
    pub upkeep: JoinHandle<()>,
}

/// Build the application around the caller's `api` routes.
pub fn build(config: ServiceConfig, api: Router<AppState>) -> Result<Application, StartupError> {
    let metrics = Metrics::new(config.observability.metrics_max_age())?;

    let db_sink: Arc<dyn MetricSink> = Arc::new(metrics.sink(DB_ACCESS_LATENCY));
    let storage = Storage::connect_lazy(&config.database)?
        .with_metrics(db_sink, config.observability.record_failed_queries);

    let auth: Arc<dyn Authorization> = Arc::new(StaticTokenAuth::from_config(&config.auth));
    let client = InstrumentedClient::new(&config.http_client)?;
    let registry = TaskRegistry::new();
    let upkeep = metrics.spawn_upkeep(UPKEEP_INTERVAL);
    let shutdown_timeout = config.listener.shutdown_timeout();

    let state = AppState {
        config: Arc::new(config),
        auth,
        metrics,
        storage,
        client,
        registry: registry.clone(),
    };

    let router = build_router(state.clone(), api);
    let process = ServerProcess::new(router)
        .shutdown_timeout(shutdown_timeout)
        .with_registry(registry);

    tracing::info!(
        shutdown_timeout = ?shutdown_timeout,
        audiences = state.config.auth.tokens.len(),
        "Application initialized"
    );

    Ok(Application {
        process,
        state,
        upkeep,
    })
}

//! HTTP route table.
//!
//! # Responsibilities
//! - Create the Axum Router with the service-level routes
//! - Nest the caller's API router under `/api/v1/{audience}`
//! - Wire up middleware (panic recovery, CORS, token validation, tracing,
//!   request ID, timeout)
//!
//! # Routes
//! - `GET /metrics`: Prometheus exposition
//! - `/swagger-ui/*`: static API docs
//! - `/api/v1/{audience}/*`: business handlers supplied by the embedding binary

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::client::InstrumentedClient;
use crate::config::{CorsConfig, ServiceConfig};
use crate::http::middleware::require_token;
use crate::http::response::ApiError;
use crate::lifecycle::TaskRegistry;
use crate::observability::Metrics;
use crate::security::authorization::Authorization;
use crate::storage::Storage;

/// Application state injected into handlers. Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub auth: Arc<dyn Authorization>,
    pub metrics: Metrics,
    pub storage: Storage,
    pub client: InstrumentedClient,
    /// Handlers register background work here so shutdown waits for it.
    pub registry: TaskRegistry,
}

/// Build the service router around the caller's `api` routes.
#[allow(deprecated)]
pub fn build_router(state: AppState, api: Router<AppState>) -> Router {
    let config = Arc::clone(&state.config);

    let api = api
        .layer(middleware::from_fn_with_state(Arc::clone(&state.auth), require_token))
        .layer(cors_layer(&config.cors))
        .layer(CatchPanicLayer::custom(handle_panic));

    Router::new()
        .route("/metrics", get(render_metrics))
        .nest_service("/swagger-ui", ServeDir::new(&config.swagger_dir))
        .nest("/api/v1/{audience}", api)
        .with_state(state)
        .layer(TimeoutLayer::new(config.listener.request_timeout()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// CORS policy for the API group.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-random-id"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::PATCH])
        .allow_origin(origins)
        .max_age(Duration::from_secs(config.max_age_secs))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::Internal(format!("handler panicked: {}", detail)).into_response()
}

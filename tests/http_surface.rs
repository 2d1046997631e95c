//! Route table, token middleware, CORS and panic recovery.

mod common;

use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{header, Method, Request, StatusCode},
    routing::{delete, get},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use service_bootstrap::http::{build_router, ApiError};
use service_bootstrap::observability::metrics::DB_ACCESS_LATENCY;
use service_bootstrap::observability::MetricSink;
use service_bootstrap::security::{Action, Claims};
use service_bootstrap::AppState;

async fn whoami(Extension(claims): Extension<Claims>) -> Json<Value> {
    Json(json!({ "subject": claims.subject, "audience": claims.audience }))
}

async fn delete_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((_audience, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.auth.check(&claims, Action::Delete, &["rooms", &id])?;
    Ok(StatusCode::NO_CONTENT)
}

async fn explode() -> &'static str {
    panic!("boom")
}

fn api() -> Router<AppState> {
    Router::new()
        .route("/whoami", get(whoami))
        .route("/rooms/{id}", delete(delete_room))
        .route("/explode", get(explode))
}

fn router() -> (Router, AppState) {
    let app = test_app(api());
    let router = build_router(app.state.clone(), api());
    (router, app.state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_with_token(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let (router, _) = router();

    let response = router
        .oneshot(get_with_token("/api/v1/example.org/whoami", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn token_for_another_audience_is_unauthorized() {
    let (router, _) = router();

    let response = router
        .oneshot(get_with_token("/api/v1/other.org/whoami", Some(ADMIN_TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_reaches_handler_with_claims() {
    let (router, _) = router();

    let response = router
        .oneshot(get_with_token("/api/v1/example.org/whoami", Some(READER_TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["subject"], "reader");
    assert_eq!(body["audience"], AUDIENCE);
}

#[tokio::test]
async fn permission_check_uses_granted_actions() {
    let (router, _) = router();

    let denied = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/api/v1/example.org/rooms/42")
                .header(header::AUTHORIZATION, format!("Bearer {}", READER_TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let allowed = router
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/api/v1/example.org/rooms/42")
                .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_TOKEN))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn preflight_allows_configured_origin() {
    let (router, _) = router();

    let response = router
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/v1/example.org/whoami")
                .header(header::ORIGIN, ALLOWED_ORIGIN)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "600");
}

#[tokio::test]
async fn preflight_from_unknown_origin_gets_no_allow_header() {
    let (router, _) = router();

    let response = router
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/v1/example.org/whoami")
                .header(header::ORIGIN, "https://evil.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn handler_panic_becomes_internal_error() {
    let (router, _) = router();

    let response = router
        .oneshot(get_with_token("/api/v1/example.org/explode", Some(ADMIN_TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(!body["error"].as_str().unwrap().contains("boom"));
}

#[tokio::test]
async fn metrics_route_exposes_recorded_latency() {
    let (router, state) = router();

    state
        .metrics
        .sink(DB_ACCESS_LATENCY)
        .record(&[("query", "list_rooms".to_string())], 0.012);

    let response = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("db_access_latency"));
    assert!(text.contains("query=\"list_rooms\""));
    assert!(text.contains("quantile=\"0.99\""));
}

#[tokio::test]
async fn metrics_route_needs_no_token() {
    let (router, _) = router();

    let response = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn application_keeps_metrics_upkeep_running() {
    let app = test_app(api());

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(!app.upkeep.is_finished());

    app.upkeep.abort();
}

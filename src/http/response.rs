//! Response rendering and request decoding.
//!
//! # Responsibilities
//! - Map well-known errors to HTTP status codes
//! - Render JSON bodies with an explicit charset
//! - Decode and validate JSON request bodies
//!
//! # Status Mapping
//! - no rows → 404
//! - missing or invalid token → 401
//! - permission denied → 403
//! - malformed body or failed validation → 400
//! - anything else → 500 (details logged, not returned)

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::security::authorization::AuthError;

/// Content type used for every JSON response.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Errors rendered by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        render(self.status(), Some(&serde_json::json!({ "error": message })))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken => ApiError::Unauthorized(err.to_string()),
            AuthError::NotAuthorized => ApiError::Forbidden(err.to_string()),
            AuthError::UnknownAction(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Render `body` as JSON with `status`. `None` renders an empty body.
pub fn render<T: Serialize>(status: StatusCode, body: Option<&T>) -> Response {
    let Some(body) = body else {
        return status.into_response();
    };

    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
            response
        }
        Err(e) => ApiError::Internal(format!("failed to encode response: {}", e)).into_response(),
    }
}

/// Semantic checks run after a request body is decoded.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// JSON body extractor that requires `application/json` and runs [`Validate`].
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

fn is_json(content_type: &str) -> bool {
    format!("{};", content_type).starts_with("application/json;")
}

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !is_json(&content_type) {
            return Err(ApiError::BadRequest(format!("unknown content type: {}", content_type)));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let value: T = serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        value.validate().map_err(ApiError::BadRequest)?;

        Ok(ValidatedJson(value))
    }
}

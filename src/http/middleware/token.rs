//! Token validation middleware for the API group.
//!
//! Reads the audience from `/api/v1/{audience}/...`, validates the bearer
//! token against it and attaches the resulting [`Claims`] to the request.

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::http::response::ApiError;
use crate::security::authorization::{AuthError, Authorization};

/// Path prefix of the API group.
pub const API_PREFIX: &str = "/api/v1/";

/// Extract the audience segment from a full request path.
pub fn audience_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(API_PREFIX)?;
    let audience = rest.split('/').next()?;

    let valid = !audience.is_empty()
        && audience
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.');
    valid.then_some(audience)
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn require_token(
    State(auth): State<Arc<dyn Authorization>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // Nested routers see a stripped URI; the original carries the audience.
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let audience = audience_from_path(&path).ok_or(ApiError::NotFound)?;
    let token = bearer_token(&request).ok_or(AuthError::MissingToken)?;

    let claims = auth.validate(audience, token).map_err(|e| {
        tracing::warn!(audience = %audience, error = %e, "Token rejected");
        e
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audience_segment() {
        assert_eq!(audience_from_path("/api/v1/example.org/rooms"), Some("example.org"));
        assert_eq!(audience_from_path("/api/v1/dev-tenant_1"), Some("dev-tenant_1"));
        assert_eq!(audience_from_path("/api/v1//rooms"), None);
        assert_eq!(audience_from_path("/api/v1/bad%20name/rooms"), None);
        assert_eq!(audience_from_path("/metrics"), None);
    }
}

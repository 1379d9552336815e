// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token guard for the `/v1` admin routes.
//!
//! Fail-closed: with no token configured every admin request is refused.
//! The webhook and health routes are mounted outside this layer and are
//! never affected by it.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

/// State for the admin route guard.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` disables the admin API entirely.
    pub bearer_token: Option<String>,
}

// Manual Debug so the token can never leak into logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shown = if self.bearer_token.is_some() {
            "Some(<redacted>)"
        } else {
            "None"
        };
        f.debug_struct("AuthConfig")
            .field("bearer_token", &shown)
            .finish()
    }
}

/// Admits a request only when its `Authorization: Bearer <token>` header
/// matches the configured token exactly.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = auth.bearer_token.as_deref() else {
        tracing::error!("admin API has no bearer token configured, rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    if bearer_from(&request) == Some(expected) {
        return Ok(next.run(request).await);
    }
    Err(StatusCode::UNAUTHORIZED)
}

/// Pulls the bearer credential out of the request, if one was presented.
fn bearer_from(request: &Request) -> Option<&str> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_auth(value: &str) -> Request {
        axum::http::Request::builder()
            .header(header::AUTHORIZATION, value)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[test]
    fn debug_never_prints_the_token() {
        let config = AuthConfig {
            bearer_token: Some("secret-token".to_string()),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn bearer_extraction_requires_the_scheme_prefix() {
        let request = request_with_auth("Bearer abc123");
        assert_eq!(bearer_from(&request), Some("abc123"));

        let request = request_with_auth("Basic abc123");
        assert_eq!(bearer_from(&request), None);
    }

    #[test]
    fn missing_header_yields_no_credential() {
        let request = axum::http::Request::builder()
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_from(&request), None);
    }
}

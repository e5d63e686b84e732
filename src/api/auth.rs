//! API key middleware for the `/api` routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::api::error::ApiError;

/// Header carrying the client's key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared auth state injected via axum middleware state.
#[derive(Clone, Default)]
pub struct AuthState {
    /// `None` disables the check.
    pub api_key: Option<SecretString>,
}

impl AuthState {
    /// Constant-time comparison against the configured key.
    pub fn accepts(&self, provided: Option<&str>) -> bool {
        match &self.api_key {
            None => true,
            Some(expected) => provided
                .map(|p| {
                    p.as_bytes()
                        .ct_eq(expected.expose_secret().as_bytes())
                        .into()
                })
                .unwrap_or(false),
        }
    }
}

/// Reject requests without a matching `x-api-key` header.
///
/// Wire up with `axum::middleware::from_fn_with_state(auth_state, api_key_middleware)`.
pub async fn api_key_middleware(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if !auth.accepts(provided) {
        tracing::debug!(path = %request.uri().path(), "Rejected request with missing or invalid API key");
        return ApiError::Unauthorized.into_response();
    }

    next.run(request).await
}

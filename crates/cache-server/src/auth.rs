//! Bearer-token authentication for the cache routes
//!
//! When no token is configured, auth is disabled and every request passes.
//! The health endpoint never requires auth.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::server::SharedState;

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.split_once(' ')?;
    if scheme != "Bearer" || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Check a request's Authorization header against the configured token
pub fn check_token(expected: Option<&str>, authorization: Option<&str>) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let presented = authorization
        .and_then(bearer_token)
        .ok_or(ApiError::Unauthorized)?;
    if presented != expected {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

/// Axum extractor that enforces bearer auth on a handler.
///
/// Use this as a handler parameter to require authentication:
///
/// ```ignore
/// async fn my_handler(_auth: RequireAuth, ...) -> Result<..., ApiError> { ... }
/// ```
pub struct RequireAuth;

impl FromRequestParts<SharedState> for RequireAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let authorization = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        check_token(state.auth_token.as_deref(), authorization)?;
        Ok(RequireAuth)
    }
}

//! Bearer token extraction for protected routes.
//!
//! Flow Overview: read the `Authorization` header, resolve the token to a
//! principal through the session resolver, and hand it to the handler.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;

use super::ApiError;
use crate::auth::{Principal, SessionResolver};

/// Return the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolve the caller, or fail with 401.
pub async fn require_auth(
    headers: &HeaderMap,
    sessions: &SessionResolver,
) -> Result<Principal, ApiError> {
    let token = extract_bearer_token(headers).ok_or(ApiError::NotAuthenticated)?;
    Ok(sessions.resolve(token, Utc::now()).await?)
}

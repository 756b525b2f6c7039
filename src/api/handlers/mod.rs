//! API handlers and shared utilities.
//!
//! Every handler returns `Result<_, ApiError>`; [`ApiError`] owns the mapping
//! from auth and store failures to status codes and `{"detail": ...}` bodies.

pub mod health;
pub mod me;
pub mod principal;
pub mod root;
pub mod tasks;
pub mod user_login;
pub mod user_register;
pub mod users;

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::{auth::AuthError, store::StoreError};

/// Error body shared by every non-2xx response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// No `Authorization: Bearer` header on a protected route.
    NotAuthenticated,
    Auth(AuthError),
    /// Request body, form or path failed validation.
    Validation(String),
    NotFound(&'static str),
    Store(StoreError),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl ApiError {
    /// 401 responses, which also carry the `Bearer` challenge.
    fn is_unauthenticated(&self) -> bool {
        match self {
            Self::NotAuthenticated => true,
            Self::Auth(err) => err.is_unauthenticated(),
            _ => false,
        }
    }

    fn status_and_detail(&self) -> (StatusCode, String) {
        if self.is_unauthenticated() {
            let detail = match self {
                Self::NotAuthenticated => "Not authenticated",
                Self::Auth(AuthError::AuthenticationFailed) => {
                    "Invalid credentials: incorrect username or password"
                }
                Self::Auth(AuthError::ExpiredToken) => "Token has expired",
                _ => "Could not validate credentials",
            };
            return (StatusCode::UNAUTHORIZED, detail.to_string());
        }

        match self {
            Self::Auth(AuthError::Forbidden) => (
                StatusCode::FORBIDDEN,
                "Not enough permissions".to_string(),
            ),
            Self::Auth(AuthError::UsernameTaken) => (
                StatusCode::BAD_REQUEST,
                "Username already registered".to_string(),
            ),
            Self::Validation(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail.clone()),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            Self::NotAuthenticated | Self::Auth(_) | Self::Store(_) => internal(),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();

        if status.is_server_error() {
            match &self {
                Self::Auth(err) => error!("request failed: {err}"),
                Self::Store(err) => error!("store failure: {err}"),
                _ => {}
            }
        }

        let body = Json(ErrorDetail { detail });
        if self.is_unauthenticated() {
            (
                status,
                [(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))],
                body,
            )
                .into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// 3-50 characters of letters, digits and underscores.
pub fn valid_username(username: &str) -> bool {
    (3..=50).contains(&username.chars().count())
        && Regex::new(r"^[A-Za-z0-9_]+$").is_ok_and(|re| re.is_match(username))
}

/// 6-100 characters, no other constraint.
pub fn valid_password(password: &str) -> bool {
    (6..=100).contains(&password.chars().count())
}

/// 5-50 characters, starting with a letter.
pub fn valid_task_name(name: &str) -> bool {
    (5..=50).contains(&name.chars().count())
        && Regex::new(r"^[A-Za-z]").is_ok_and(|re| re.is_match(name))
}

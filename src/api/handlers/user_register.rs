use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::StatusCode,
    response::IntoResponse,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use tracing::instrument;
use utoipa::ToSchema;

use super::{valid_password, valid_username, ApiError, ErrorDetail};
use crate::auth::{Authenticator, Role, User};

#[derive(ToSchema, Deserialize)]
pub struct UserRegister {
    /// 3-50 characters: letters, digits, underscores.
    username: String,
    /// 6-100 characters.
    password: String,
    /// `user` (default) or `admin`.
    role: Option<String>,
}

impl fmt::Debug for UserRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRegister")
            .field("username", &self.username)
            .field("password", &"***")
            .field("role", &self.role)
            .finish()
    }
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = UserRegister,
    responses(
        (status = 201, description = "User created", body = User, content_type = "application/json"),
        (status = 400, description = "Username already registered", body = ErrorDetail),
        (status = 422, description = "Invalid username, password or role", body = ErrorDetail),
    ),
    tag = "auth"
)]
#[instrument(skip(authenticator, payload))]
pub async fn register(
    authenticator: Extension<Authenticator>,
    payload: Result<Json<UserRegister>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

    if !valid_username(&request.username) {
        return Err(ApiError::Validation(
            "username must be 3-50 characters of letters, digits or underscores".to_string(),
        ));
    }
    if !valid_password(&request.password) {
        return Err(ApiError::Validation(
            "password must be 6-100 characters".to_string(),
        ));
    }
    let role = match request.role.as_deref() {
        None => Role::default(),
        Some(role) => role
            .parse::<Role>()
            .map_err(|err| ApiError::Validation(err.to_string()))?,
    };

    let password = SecretString::from(request.password);
    let user = authenticator
        .register(&request.username, &password, role)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

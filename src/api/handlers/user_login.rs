use axum::{
    extract::{rejection::FormRejection, Extension, Form},
    response::Json,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use tracing::instrument;
use utoipa::ToSchema;

use super::{ApiError, ErrorDetail};
use crate::auth::{AccessToken, Authenticator};

/// OAuth2 password-grant style form.
#[derive(ToSchema, Deserialize)]
pub struct UserLogin {
    username: String,
    password: String,
}

impl fmt::Debug for UserLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserLogin")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    post,
    path = "/token",
    request_body(content = UserLogin, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Bearer token issued", body = AccessToken),
        (status = 401, description = "Invalid credentials", body = ErrorDetail),
        (status = 422, description = "Missing form fields", body = ErrorDetail),
    ),
    tag = "auth"
)]
#[instrument(skip(authenticator, form))]
pub async fn login(
    authenticator: Extension<Authenticator>,
    form: Result<Form<UserLogin>, FormRejection>,
) -> Result<Json<AccessToken>, ApiError> {
    let Form(request) = form.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

    let password = SecretString::from(request.password);
    let token = authenticator.login(&request.username, &password).await?;

    Ok(Json(token))
}

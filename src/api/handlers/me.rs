use axum::{
    extract::Extension,
    http::HeaderMap,
    response::Json,
};
use std::sync::Arc;

use super::{principal::require_auth, ApiError, ErrorDetail};
use crate::{
    auth::{AuthError, SessionResolver, User},
    store::CredentialStore,
};

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "The authenticated user", body = User),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorDetail),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_me(
    headers: HeaderMap,
    sessions: Extension<SessionResolver>,
    users: Extension<Arc<dyn CredentialStore>>,
) -> Result<Json<User>, ApiError> {
    let principal = require_auth(&headers, &sessions).await?;

    let record = users
        .find_by_id(principal.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(User::from(record)))
}

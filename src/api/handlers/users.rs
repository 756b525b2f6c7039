use axum::{extract::Extension, http::HeaderMap, response::Json};
use std::sync::Arc;
use tracing::debug;

use super::{principal::require_auth, ApiError, ErrorDetail};
use crate::{
    auth::{policy, AuthError, SessionResolver, User},
    store::CredentialStore,
};

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Every registered user", body = [User]),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorDetail),
        (status = 403, description = "Caller is not an admin", body = ErrorDetail),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    sessions: Extension<SessionResolver>,
    users: Extension<Arc<dyn CredentialStore>>,
) -> Result<Json<Vec<User>>, ApiError> {
    let principal = require_auth(&headers, &sessions).await?;
    if !policy::is_admin(&principal) {
        debug!(user_id = principal.id, "non-admin tried to list users");
        return Err(AuthError::Forbidden.into());
    }

    let list = users
        .list_users()
        .await?
        .into_iter()
        .map(User::from)
        .collect();

    Ok(Json(list))
}

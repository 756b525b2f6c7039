//! Task endpoints.
//!
//! Flow Overview:
//! 1) Resolve the caller from the bearer token.
//! 2) Validate the payload.
//! 3) Look the task up and apply the owner-or-admin rule before touching it.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Json, Path,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::{principal::require_auth, valid_task_name, ApiError, ErrorDetail};
use crate::{
    auth::{policy, AuthError, Principal, SessionResolver},
    store::{NewTask, Task, TaskChanges, TaskStatus, TaskStore},
};

#[derive(ToSchema, Deserialize, Debug)]
pub struct TaskCreate {
    /// 5-50 characters, starting with a letter.
    name: String,
    /// Defaults to `pending`.
    status: Option<TaskStatus>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct TaskUpdate {
    name: Option<String>,
    status: Option<TaskStatus>,
}

const TASK_NAME_RULE: &str = "name must be 5-50 characters and start with a letter";

fn json_payload<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

fn task_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| ApiError::Validation(rejection.body_text()))
}

/// Fetch a task the caller may act on: 404 before 403.
async fn accessible_task(
    tasks: &dyn TaskStore,
    principal: &Principal,
    id: i64,
) -> Result<Task, ApiError> {
    let task = tasks.get_task(id).await?.ok_or(ApiError::NotFound("Task"))?;

    if !policy::can_access(principal, task.user_id) {
        debug!(user_id = principal.id, task_id = id, "task access denied");
        return Err(AuthError::Forbidden.into());
    }

    Ok(task)
}

#[utoipa::path(
    post,
    path = "/tasks",
    request_body = TaskCreate,
    responses(
        (status = 201, description = "Task created for the caller", body = Task),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorDetail),
        (status = 422, description = "Invalid task", body = ErrorDetail),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn create_task(
    headers: HeaderMap,
    sessions: Extension<SessionResolver>,
    tasks: Extension<Arc<dyn TaskStore>>,
    payload: Result<Json<TaskCreate>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&headers, &sessions).await?;
    let request = json_payload(payload)?;

    if !valid_task_name(&request.name) {
        return Err(ApiError::Validation(TASK_NAME_RULE.to_string()));
    }

    let task = tasks
        .create_task(
            principal.id,
            NewTask {
                name: request.name,
                status: request.status.unwrap_or_default(),
            },
        )
        .await?;
    info!(user_id = principal.id, task_id = task.id, "task created");

    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    get,
    path = "/tasks",
    responses(
        (status = 200, description = "All tasks for admins, own tasks otherwise", body = [Task]),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorDetail),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn list_tasks(
    headers: HeaderMap,
    sessions: Extension<SessionResolver>,
    tasks: Extension<Arc<dyn TaskStore>>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let principal = require_auth(&headers, &sessions).await?;
    let owner = (!policy::is_admin(&principal)).then_some(principal.id);

    Ok(Json(tasks.list_tasks(owner).await?))
}

#[utoipa::path(
    get,
    path = "/my-tasks",
    responses(
        (status = 200, description = "Tasks owned by the caller", body = [Task]),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorDetail),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn my_tasks(
    headers: HeaderMap,
    sessions: Extension<SessionResolver>,
    tasks: Extension<Arc<dyn TaskStore>>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let principal = require_auth(&headers, &sessions).await?;

    Ok(Json(tasks.list_tasks(Some(principal.id)).await?))
}

#[utoipa::path(
    get,
    path = "/task/{id}",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 200, description = "The task", body = Task),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorDetail),
        (status = 403, description = "Task belongs to another user", body = ErrorDetail),
        (status = 404, description = "Task not found", body = ErrorDetail),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn get_task(
    headers: HeaderMap,
    sessions: Extension<SessionResolver>,
    tasks: Extension<Arc<dyn TaskStore>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Task>, ApiError> {
    let principal = require_auth(&headers, &sessions).await?;
    let id = task_id(path)?;

    Ok(Json(accessible_task(tasks.as_ref(), &principal, id).await?))
}

#[utoipa::path(
    put,
    path = "/task/{id}",
    params(("id" = i64, Path, description = "Task id")),
    request_body = TaskUpdate,
    responses(
        (status = 200, description = "The updated task", body = Task),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorDetail),
        (status = 403, description = "Task belongs to another user", body = ErrorDetail),
        (status = 404, description = "Task not found", body = ErrorDetail),
        (status = 422, description = "Empty or invalid update", body = ErrorDetail),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn update_task(
    headers: HeaderMap,
    sessions: Extension<SessionResolver>,
    tasks: Extension<Arc<dyn TaskStore>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<TaskUpdate>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let principal = require_auth(&headers, &sessions).await?;
    let id = task_id(path)?;
    let request = json_payload(payload)?;

    let changes = TaskChanges {
        name: request.name,
        status: request.status,
    };
    if changes.is_empty() {
        return Err(ApiError::Validation(
            "update must set name or status".to_string(),
        ));
    }
    if changes.name.as_deref().is_some_and(|name| !valid_task_name(name)) {
        return Err(ApiError::Validation(TASK_NAME_RULE.to_string()));
    }

    accessible_task(tasks.as_ref(), &principal, id).await?;

    // Deleted between the check and the update.
    let task = tasks
        .update_task(id, changes)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;
    info!(user_id = principal.id, task_id = id, "task updated");

    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/task/{id}",
    params(("id" = i64, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorDetail),
        (status = 403, description = "Task belongs to another user", body = ErrorDetail),
        (status = 404, description = "Task not found", body = ErrorDetail),
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn delete_task(
    headers: HeaderMap,
    sessions: Extension<SessionResolver>,
    tasks: Extension<Arc<dyn TaskStore>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let principal = require_auth(&headers, &sessions).await?;
    let id = task_id(path)?;

    accessible_task(tasks.as_ref(), &principal, id).await?;

    if !tasks.delete_task(id).await? {
        return Err(ApiError::NotFound("Task"));
    }
    info!(user_id = principal.id, task_id = id, "task deleted");

    Ok(StatusCode::NO_CONTENT)
}

//! Task endpoints.
//!
//! Creating and reading tasks is free.  `POST /v1/tasks/{id}/execute` charges
//! the caller once and returns as soon as the charge commits; the task
//! finishes in the background, so clients poll `GET /v1/tasks/{id}`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::error::ServerError;
use crate::middleware::CallerId;
use crate::schemas::v1::task::{ExecuteResponse, TaskResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(create_task, list_tasks, get_task, execute_task),
    components(schemas(TaskResponse, ExecuteResponse))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/execute", post(execute_task))
}

fn parse_task_id(raw: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw).map_err(|_| ServerError::BadRequest(format!("invalid task id: {raw}")))
}

#[utoipa::path(
    post,
    path = "/v1/tasks",
    tag = "tasks",
    params(("x-user-id" = String, Header, description = "Caller user id")),
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 401, description = "Missing or malformed caller id"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    CallerId(caller): CallerId,
) -> Result<(StatusCode, Json<TaskResponse>), ServerError> {
    let task = state.tasks.create_task(caller).await?;
    Ok((StatusCode::CREATED, Json(task.into())))
}

#[utoipa::path(
    get,
    path = "/v1/tasks",
    tag = "tasks",
    params(("x-user-id" = String, Header, description = "Caller user id")),
    responses(
        (status = 200, description = "Caller's tasks, newest first", body = [TaskResponse]),
        (status = 401, description = "Missing or malformed caller id"),
    )
)]
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    CallerId(caller): CallerId,
) -> Result<Json<Vec<TaskResponse>>, ServerError> {
    let tasks = state.tasks.list_tasks(caller).await?;
    Ok(Json(tasks.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/tasks/{id}",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task id"),
        ("x-user-id" = String, Header, description = "Caller user id"),
    ),
    responses(
        (status = 200, description = "Task retrieved", body = TaskResponse),
        (status = 400, description = "Malformed task id"),
        (status = 403, description = "Task belongs to another user"),
        (status = 404, description = "Task not found"),
    )
)]
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    CallerId(caller): CallerId,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ServerError> {
    let task = state.tasks.get_task(parse_task_id(&id)?, caller).await?;
    Ok(Json(task.into()))
}

#[utoipa::path(
    post,
    path = "/v1/tasks/{id}/execute",
    tag = "tasks",
    params(
        ("id" = String, Path, description = "Task id"),
        ("x-user-id" = String, Header, description = "Caller user id"),
    ),
    responses(
        (status = 200, description = "Charge decision; repeated calls report the first one", body = ExecuteResponse),
        (status = 400, description = "Malformed task id"),
        (status = 403, description = "Task belongs to another user"),
        (status = 404, description = "Task not found"),
        (status = 503, description = "Store busy; retry"),
    )
)]
pub async fn execute_task(
    State(state): State<Arc<AppState>>,
    CallerId(caller): CallerId,
    Path(id): Path<String>,
) -> Result<Json<ExecuteResponse>, ServerError> {
    let outcome = state.engine.execute(parse_task_id(&id)?, caller).await?;
    Ok(Json(outcome.into()))
}

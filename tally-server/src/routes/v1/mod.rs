pub mod profile;
pub mod tasks;
pub mod users;

use crate::state::AppState;
use utoipa::OpenApi;

use axum::Router;
use std::sync::Arc;

/// Routes nested under `/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(users::router())
        .merge(profile::router())
        .merge(tasks::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct V1Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = V1Api::openapi();
    spec.merge(users::UsersApi::openapi());
    spec.merge(profile::ProfileApi::openapi());
    spec.merge(tasks::TasksApi::openapi());
    spec
}

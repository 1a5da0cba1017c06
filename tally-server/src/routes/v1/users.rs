//! Account provisioning.
//!
//! Stands in for the registration flow of the auth gateway, which owns
//! credentials; this endpoint only opens the ledger account.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::v1::user::{CreateUserRequest, UserResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(create_user),
    components(schemas(CreateUserRequest, UserResponse))
)]
pub struct UsersApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(create_user))
}

#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Negative starting balance"),
        (status = 500, description = "Store error"),
    )
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ServerError> {
    let user = state.accounts.register(req.initial_credits).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

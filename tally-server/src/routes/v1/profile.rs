//! The caller's balance and ledger history.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::middleware::CallerId;
use crate::schemas::v1::profile::{LedgerEntryResponse, ProfileResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_profile, get_ledger),
    components(schemas(ProfileResponse, LedgerEntryResponse))
)]
pub struct ProfileApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/ledger", get(get_ledger))
}

#[utoipa::path(
    get,
    path = "/v1/profile",
    tag = "profile",
    params(("x-user-id" = String, Header, description = "Caller user id")),
    responses(
        (status = 200, description = "Caller profile", body = ProfileResponse),
        (status = 401, description = "Missing or malformed caller id"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    CallerId(caller): CallerId,
) -> Result<Json<ProfileResponse>, ServerError> {
    let profile = state
        .accounts
        .profile(caller)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("user {caller} not found")))?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    get,
    path = "/v1/ledger",
    tag = "profile",
    params(("x-user-id" = String, Header, description = "Caller user id")),
    responses(
        (status = 200, description = "Ledger entries, newest first", body = [LedgerEntryResponse]),
        (status = 401, description = "Missing or malformed caller id"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn get_ledger(
    State(state): State<Arc<AppState>>,
    CallerId(caller): CallerId,
) -> Result<Json<Vec<LedgerEntryResponse>>, ServerError> {
    let entries = state.accounts.ledger(caller).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

//! Caller identity.
//!
//! Authentication happens upstream: the gateway in front of tally-server
//! verifies the session and forwards the user id in `x-user-id`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tally_core::UserId;
use uuid::Uuid;

use crate::error::ServerError;

pub static X_USER_ID: &str = "x-user-id";

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub UserId);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(X_USER_ID)
            .ok_or_else(|| ServerError::Unauthorized(format!("missing {X_USER_ID} header")))?;
        raw.to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(CallerId)
            .ok_or_else(|| ServerError::Unauthorized(format!("malformed {X_USER_ID} header")))
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::User;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    /// Starting balance; must not be negative.
    pub initial_credits: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub credits: i64,
    pub initial_credits: i64,
    pub registered_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            credits: user.credits,
            initial_credits: user.initial_credits,
            registered_at: user.registered_at,
        }
    }
}

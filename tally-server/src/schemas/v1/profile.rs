use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_core::{LedgerEntry, Profile};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub credits: i64,
    pub registered_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            credits: profile.credits,
            registered_at: profile.registered_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LedgerEntryResponse {
    pub id: Uuid,
    pub task_id: Option<Uuid>,
    /// Signed change to the balance.
    pub amount: i64,
    /// `debit` or `auto_grant`.
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for LedgerEntryResponse {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id,
            task_id: entry.task_id,
            amount: entry.amount,
            kind: entry.kind.as_str().to_owned(),
            created_at: entry.created_at,
        }
    }
}

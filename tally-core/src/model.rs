//! Ledger records: users, tasks and ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::lifecycle::TaskStatus;

pub type UserId = Uuid;
pub type TaskId = Uuid;

/// A credit-holding account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Current balance.  Never negative: debits are conditional on it.
    pub credits: i64,
    /// Balance at registration; the ledger explains every change since.
    pub initial_credits: i64,
    pub registered_at: DateTime<Utc>,
    /// `None` until the first auto-grant.
    pub last_grant_at: Option<DateTime<Utc>>,
}

impl User {
    /// The instant the next grant period is measured from.
    pub fn grant_baseline(&self) -> DateTime<Utc> {
        self.last_grant_at.unwrap_or(self.registered_at)
    }

    /// Whether the user is owed a grant when grants older than `due_before`
    /// have expired.
    pub fn is_due(&self, due_before: DateTime<Utc>) -> bool {
        self.grant_baseline() <= due_before
    }
}

/// Read-only view of a user returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: UserId,
    pub credits: i64,
    pub registered_at: DateTime<Utc>,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            credits: user.credits,
            registered_at: user.registered_at,
        }
    }
}

/// A unit of paid work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner_id: UserId,
    pub status: TaskStatus,
    /// Set exactly once, when the task leaves `Created`.
    pub cost: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Only set on `Failed`.
    pub failure_reason: Option<String>,
}

impl Task {
    /// A new, unpaid task owned by `owner_id`.
    pub fn new(owner_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            status: TaskStatus::Created,
            cost: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            failure_reason: None,
        }
    }
}

/// Why a balance changed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LedgerKind {
    /// Charge for a task execution attempt.
    Debit,
    /// Periodic top-up by the grant scheduler.
    AutoGrant,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

/// Append-only audit record paired 1:1 with a balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: UserId,
    /// `None` for grants.
    pub task_id: Option<TaskId>,
    /// Signed: debits are negative, grants positive.
    pub amount: i64,
    pub kind: LedgerKind,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn debit(user_id: UserId, task_id: TaskId, cost: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            task_id: Some(task_id),
            amount: -cost,
            kind: LedgerKind::Debit,
            created_at: now,
        }
    }

    pub fn auto_grant(user_id: UserId, amount: i64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            task_id: None,
            amount,
            kind: LedgerKind::AutoGrant,
            created_at: now,
        }
    }
}

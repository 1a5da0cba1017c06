//! Task lifecycle: statuses, legal transitions and record invariants.
//!
//! ```text
//! Created ──► Running ──► Succeeded
//!    │           └──────► Failed
//!    └──────► Rejected
//! ```
//!
//! Only a `Created` task may be charged.  Every other status makes a repeated
//! execute request a read-only no-op, which is what keeps execution
//! idempotent.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::model::Task;

/// Status of a [`Task`].  Stored as its snake_case name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Running,
    Succeeded,
    Failed,
    Rejected,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }

    /// `true` for statuses no transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Rejected)
    }

    /// `true` while the task may still be charged.
    pub fn is_chargeable(&self) -> bool {
        matches!(self, Self::Created)
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running)
                | (Self::Created, Self::Rejected)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

/// A record-level invariant a [`Task`] fails to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    /// `cost` must be set exactly when the task has left `Created`.
    Cost,
    /// `started_at` must be set exactly when the task has left `Created`.
    StartedAt,
    /// `completed_at` must be set exactly when the task is terminal.
    CompletedAt,
    /// `failure_reason` may only be set on `Failed`.
    FailureReason,
}

impl Task {
    /// Check the record invariants, returning the first one violated.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let charged = !self.status.is_chargeable();
        if self.cost.is_some() != charged {
            return Err(InvariantViolation::Cost);
        }
        if self.started_at.is_some() != charged {
            return Err(InvariantViolation::StartedAt);
        }
        if self.completed_at.is_some() != self.status.is_terminal() {
            return Err(InvariantViolation::CompletedAt);
        }
        if self.failure_reason.is_some() && self.status != TaskStatus::Failed {
            return Err(InvariantViolation::FailureReason);
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

//! Row <-> record conversion.
//!
//! Ids are stored as hyphenated UUID text.  Timestamps are stored as
//! fixed-width RFC 3339 UTC text with microsecond precision, which makes SQL
//! string comparison agree with chronological order.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::lifecycle::TaskStatus;
use crate::model::{LedgerEntry, LedgerKind, Task, User};

pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_ts(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Unexpected(format!("bad timestamp {raw:?}: {e}")))
}

fn decode_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>, LedgerError> {
    raw.as_deref().map(decode_ts).transpose()
}

pub(crate) fn decode_id(raw: &str) -> Result<Uuid, LedgerError> {
    Uuid::parse_str(raw).map_err(|e| LedgerError::Unexpected(format!("bad id {raw:?}: {e}")))
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    id: String,
    credits: i64,
    initial_credits: i64,
    registered_at: String,
    last_grant_at: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = LedgerError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: decode_id(&row.id)?,
            credits: row.credits,
            initial_credits: row.initial_credits,
            registered_at: decode_ts(&row.registered_at)?,
            last_grant_at: decode_opt_ts(row.last_grant_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TaskRow {
    id: String,
    owner_id: String,
    status: String,
    cost: Option<i64>,
    failure_reason: Option<String>,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = LedgerError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status).map_err(|_| {
            LedgerError::Unexpected(format!("task {} has unknown status {:?}", row.id, row.status))
        })?;
        Ok(Task {
            id: decode_id(&row.id)?,
            owner_id: decode_id(&row.owner_id)?,
            status,
            cost: row.cost,
            created_at: decode_ts(&row.created_at)?,
            started_at: decode_opt_ts(row.started_at)?,
            completed_at: decode_opt_ts(row.completed_at)?,
            failure_reason: row.failure_reason,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LedgerRow {
    id: String,
    user_id: String,
    task_id: Option<String>,
    amount: i64,
    kind: String,
    created_at: String,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = LedgerError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let kind = LedgerKind::from_str(&row.kind).map_err(|_| {
            LedgerError::Unexpected(format!("ledger entry {} has unknown kind {:?}", row.id, row.kind))
        })?;
        Ok(LedgerEntry {
            id: decode_id(&row.id)?,
            user_id: decode_id(&row.user_id)?,
            task_id: row.task_id.as_deref().map(decode_id).transpose()?,
            amount: row.amount,
            kind,
            created_at: decode_ts(&row.created_at)?,
        })
    }
}

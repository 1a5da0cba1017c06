//! Queries shared by the pooled (untracked) and transactional (tracked) paths.
//!
//! Every function takes any [`SqliteExecutor`], so the same SQL runs against
//! the pool for read-only views and against an open [`super::LedgerTx`] for
//! read-decide-write sequences.

use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use super::codec::{encode_ts, LedgerRow, TaskRow, UserRow};
use crate::error::LedgerError;
use crate::model::{LedgerEntry, Task, TaskId, User, UserId};

const USER_COLUMNS: &str = "id, credits, initial_credits, registered_at, last_grant_at";
const TASK_COLUMNS: &str =
    "id, owner_id, status, cost, failure_reason, created_at, started_at, completed_at";
const LEDGER_COLUMNS: &str = "id, user_id, task_id, amount, kind, created_at";

pub(crate) async fn fetch_user<'e>(
    exec: impl SqliteExecutor<'e>,
    id: UserId,
) -> Result<Option<User>, LedgerError> {
    let row: Option<UserRow> =
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(exec)
            .await?;
    row.map(User::try_from).transpose()
}

pub(crate) async fn fetch_task<'e>(
    exec: impl SqliteExecutor<'e>,
    id: TaskId,
) -> Result<Option<Task>, LedgerError> {
    let row: Option<TaskRow> =
        sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"))
            .bind(id.to_string())
            .fetch_optional(exec)
            .await?;
    row.map(Task::try_from).transpose()
}

pub(crate) async fn tasks_by_owner<'e>(
    exec: impl SqliteExecutor<'e>,
    owner_id: UserId,
) -> Result<Vec<Task>, LedgerError> {
    let rows: Vec<TaskRow> = sqlx::query_as(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ?1 \
         ORDER BY created_at DESC, rowid DESC"
    ))
    .bind(owner_id.to_string())
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(Task::try_from).collect()
}

pub(crate) async fn ledger_by_user<'e>(
    exec: impl SqliteExecutor<'e>,
    user_id: UserId,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let rows: Vec<LedgerRow> = sqlx::query_as(&format!(
        "SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE user_id = ?1 \
         ORDER BY created_at DESC, rowid DESC"
    ))
    .bind(user_id.to_string())
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(LedgerEntry::try_from).collect()
}

pub(crate) async fn ledger_entries_for_task<'e>(
    exec: impl SqliteExecutor<'e>,
    task_id: TaskId,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let rows: Vec<LedgerRow> = sqlx::query_as(&format!(
        "SELECT {LEDGER_COLUMNS} FROM ledger_entries WHERE task_id = ?1 ORDER BY rowid"
    ))
    .bind(task_id.to_string())
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(LedgerEntry::try_from).collect()
}

pub(crate) async fn ledger_sum<'e>(
    exec: impl SqliteExecutor<'e>,
    user_id: UserId,
) -> Result<i64, LedgerError> {
    let (sum,): (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE user_id = ?1")
            .bind(user_id.to_string())
            .fetch_one(exec)
            .await?;
    Ok(sum)
}

pub(crate) async fn insert_user<'e>(
    exec: impl SqliteExecutor<'e>,
    user: &User,
) -> Result<(), LedgerError> {
    sqlx::query(
        "INSERT INTO users (id, credits, initial_credits, registered_at, last_grant_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(user.id.to_string())
    .bind(user.credits)
    .bind(user.initial_credits)
    .bind(encode_ts(user.registered_at))
    .bind(user.last_grant_at.map(encode_ts))
    .execute(exec)
    .await?;
    Ok(())
}

pub(crate) async fn insert_task<'e>(
    exec: impl SqliteExecutor<'e>,
    task: &Task,
) -> Result<(), LedgerError> {
    sqlx::query(
        "INSERT INTO tasks (id, owner_id, status, cost, failure_reason, created_at, \
                            started_at, completed_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?6)",
    )
    .bind(task.id.to_string())
    .bind(task.owner_id.to_string())
    .bind(task.status.as_str())
    .bind(task.cost)
    .bind(task.failure_reason.as_deref())
    .bind(encode_ts(task.created_at))
    .bind(task.started_at.map(encode_ts))
    .bind(task.completed_at.map(encode_ts))
    .execute(exec)
    .await?;
    Ok(())
}

pub(crate) async fn insert_ledger_entry<'e>(
    exec: impl SqliteExecutor<'e>,
    entry: &LedgerEntry,
) -> Result<(), LedgerError> {
    sqlx::query(
        "INSERT INTO ledger_entries (id, user_id, task_id, amount, kind, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(entry.id.to_string())
    .bind(entry.user_id.to_string())
    .bind(entry.task_id.map(|id| id.to_string()))
    .bind(entry.amount)
    .bind(entry.kind.as_str())
    .bind(encode_ts(entry.created_at))
    .execute(exec)
    .await?;
    Ok(())
}

pub(crate) async fn due_users<'e>(
    exec: impl SqliteExecutor<'e>,
    due_before: DateTime<Utc>,
) -> Result<Vec<User>, LedgerError> {
    let rows: Vec<UserRow> = sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users \
         WHERE COALESCE(last_grant_at, registered_at) <= ?1 \
         ORDER BY id"
    ))
    .bind(encode_ts(due_before))
    .fetch_all(exec)
    .await?;
    rows.into_iter().map(User::try_from).collect()
}

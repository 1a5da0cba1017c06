//! Tracked unit of work over the ledger.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use super::codec::encode_ts;
use super::queries;
use crate::error::LedgerError;
use crate::lifecycle::TaskStatus;
use crate::model::{LedgerEntry, Task, TaskId, User, UserId};

/// An open transaction on the ledger.
///
/// Dropping a `LedgerTx` without calling [`LedgerTx::commit`] rolls it back.
/// Status writes are compare-and-swap on the current status, and debits are
/// conditional on the balance, so a guard that lost a race surfaces as a
/// `false` return rather than a silent overwrite.
pub struct LedgerTx {
    tx: Transaction<'static, Sqlite>,
}

impl std::fmt::Debug for LedgerTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerTx").finish_non_exhaustive()
    }
}

impl LedgerTx {
    pub(super) fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    pub async fn commit(self) -> Result<(), LedgerError> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }

    // ── Locking ────────────────────────────────────────────────────────────────

    /// Take the database write lock by touching the task row.
    ///
    /// Must be the first statement of the transaction: a concurrent caller
    /// then blocks (up to the busy timeout) until this transaction ends, and
    /// reads the committed state afterwards.  Returns `false` when the task
    /// does not exist.
    pub async fn lock_task(&mut self, id: TaskId, now: DateTime<Utc>) -> Result<bool, LedgerError> {
        let result = sqlx::query("UPDATE tasks SET updated_at = ?1 WHERE id = ?2")
            .bind(encode_ts(now))
            .bind(id.to_string())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record the start of a grant cycle.  Being a write, it also takes the
    /// database write lock, so overlapping cycles run one after the other.
    pub async fn open_grant_cycle(
        &mut self,
        cycle_id: Uuid,
        now: DateTime<Utc>,
        due_before: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        sqlx::query("INSERT INTO grant_cycles (id, started_at, due_before) VALUES (?1, ?2, ?3)")
            .bind(cycle_id.to_string())
            .bind(encode_ts(now))
            .bind(encode_ts(due_before))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    pub async fn close_grant_cycle(
        &mut self,
        cycle_id: Uuid,
        granted_users: usize,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        sqlx::query("UPDATE grant_cycles SET granted_users = ?1, completed_at = ?2 WHERE id = ?3")
            .bind(granted_users as i64)
            .bind(encode_ts(now))
            .bind(cycle_id.to_string())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    // ── Reads ──────────────────────────────────────────────────────────────────

    pub async fn user(&mut self, id: UserId) -> Result<Option<User>, LedgerError> {
        queries::fetch_user(&mut *self.tx, id).await
    }

    pub async fn task(&mut self, id: TaskId) -> Result<Option<Task>, LedgerError> {
        queries::fetch_task(&mut *self.tx, id).await
    }

    pub async fn ledger_sum(&mut self, user_id: UserId) -> Result<i64, LedgerError> {
        queries::ledger_sum(&mut *self.tx, user_id).await
    }

    /// Users whose grant baseline is at or before `due_before`, ordered by id.
    pub async fn due_users(&mut self, due_before: DateTime<Utc>) -> Result<Vec<User>, LedgerError> {
        queries::due_users(&mut *self.tx, due_before).await
    }

    // ── Task transitions ───────────────────────────────────────────────────────

    /// `Created → Running`: record the cost and start time.
    pub async fn start_task(
        &mut self,
        id: TaskId,
        cost: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let ts = encode_ts(now);
        let result = sqlx::query(
            "UPDATE tasks SET status = ?1, cost = ?2, started_at = ?3, updated_at = ?3 \
             WHERE id = ?4 AND status = ?5",
        )
        .bind(TaskStatus::Running.as_str())
        .bind(cost)
        .bind(&ts)
        .bind(id.to_string())
        .bind(TaskStatus::Created.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `Created → Rejected`: record the cost that could not be paid.
    pub async fn reject_task(
        &mut self,
        id: TaskId,
        cost: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let ts = encode_ts(now);
        let result = sqlx::query(
            "UPDATE tasks SET status = ?1, cost = ?2, started_at = ?3, completed_at = ?3, \
                              updated_at = ?3 \
             WHERE id = ?4 AND status = ?5",
        )
        .bind(TaskStatus::Rejected.as_str())
        .bind(cost)
        .bind(&ts)
        .bind(id.to_string())
        .bind(TaskStatus::Created.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// `Running → Succeeded | Failed`.
    pub async fn finish_task(
        &mut self,
        id: TaskId,
        outcome: TaskStatus,
        failure_reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        if !TaskStatus::Running.can_transition_to(outcome) {
            return Err(LedgerError::Unexpected(format!(
                "running task cannot finish as {outcome}"
            )));
        }
        let ts = encode_ts(now);
        let result = sqlx::query(
            "UPDATE tasks SET status = ?1, failure_reason = ?2, completed_at = ?3, updated_at = ?3 \
             WHERE id = ?4 AND status = ?5",
        )
        .bind(outcome.as_str())
        .bind(failure_reason)
        .bind(&ts)
        .bind(id.to_string())
        .bind(TaskStatus::Running.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // ── Balance mutations ──────────────────────────────────────────────────────

    /// Subtract `amount` if the balance covers it.  Returns `false` otherwise.
    pub async fn debit(&mut self, user_id: UserId, amount: i64) -> Result<bool, LedgerError> {
        let result =
            sqlx::query("UPDATE users SET credits = credits - ?1 WHERE id = ?2 AND credits >= ?1")
                .bind(amount)
                .bind(user_id.to_string())
                .execute(&mut *self.tx)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Add `amount` and advance `last_grant_at`, but only if the user is still
    /// due relative to `due_before` and the new balance fits in an `i64`.
    /// SQLite would silently store an overflowing sum as REAL.
    pub async fn grant(
        &mut self,
        user_id: UserId,
        amount: i64,
        now: DateTime<Utc>,
        due_before: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE users SET credits = credits + ?1, last_grant_at = ?2 \
             WHERE id = ?3 AND COALESCE(last_grant_at, registered_at) <= ?4 \
             AND credits <= ?5",
        )
        .bind(amount)
        .bind(encode_ts(now))
        .bind(user_id.to_string())
        .bind(encode_ts(due_before))
        .bind(i64::MAX.saturating_sub(amount))
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn append_entry(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        queries::insert_ledger_entry(&mut *self.tx, entry).await
    }
}

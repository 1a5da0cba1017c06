//! Task execution engine.
//!
//! [`ExecutionEngine::execute`] is split in two phases:
//!
//! 1. **Charge** (synchronous): inside one write-locked transaction the task
//!    is checked, a cost is drawn, and the task is either `Rejected` (balance
//!    too low, nothing debited) or moved to `Running` with the debit and its
//!    ledger entry.  The caller gets the decision as soon as it commits.
//! 2. **Completion** (detached): see [`completion`].
//!
//! Because the charge transaction holds the write lock from its first
//! statement, two concurrent executes on one task serialize; the second one
//! reads the first one's committed status and returns it unchanged.

mod completion;
mod tracker;

use std::ops::{Range, RangeInclusive};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::lifecycle::TaskStatus;
use crate::model::{LedgerEntry, Task, TaskId, UserId};
use crate::random::{RandomSource, StdRandom};
use crate::shutdown::ShutdownSignal;
use crate::store::LedgerStore;

use completion::Completion;
use tracker::CompletionTracker;

/// Knobs for the execution engine.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Inclusive range task costs are drawn from.
    pub cost_range: RangeInclusive<i64>,
    /// Half-open range the simulated work duration is drawn from.
    pub work_duration: Range<Duration>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            cost_range: 1..=14,
            work_duration: Duration::from_secs(10)..Duration::from_secs(40),
        }
    }
}

/// What an execute request decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecuteOutcome {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Charged (or refused) cost; `0` for a task that was never costed.
    pub cost: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub message: String,
    /// `true` when the task had already left `Created` and nothing changed.
    pub already_processed: bool,
}

impl ExecuteOutcome {
    fn already_processed(task: &Task) -> Self {
        Self {
            id: task.id,
            status: task.status,
            cost: task.cost.unwrap_or(0),
            started_at: task.started_at,
            message: format!("task already processed (status: {})", task.status),
            already_processed: true,
        }
    }
}

struct EngineInner {
    store: LedgerStore,
    config: ExecutionConfig,
    random: Arc<dyn RandomSource>,
    shutdown: ShutdownSignal,
    completions: CompletionTracker,
}

/// Charges tasks and schedules their completion.  Cheap to clone.
#[derive(Clone)]
pub struct ExecutionEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("config", &self.inner.config)
            .field("completions", &self.inner.completions)
            .finish()
    }
}

impl ExecutionEngine {
    /// Engine drawing from OS entropy.
    pub fn new(store: LedgerStore, config: ExecutionConfig, shutdown: ShutdownSignal) -> Self {
        Self::with_random(store, config, Arc::new(StdRandom::from_entropy()), shutdown)
    }

    pub fn with_random(
        store: LedgerStore,
        config: ExecutionConfig,
        random: Arc<dyn RandomSource>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                config,
                random,
                shutdown,
                completions: CompletionTracker::new(),
            }),
        }
    }

    /// Charge `task_id` on behalf of `caller` and start it.
    ///
    /// Returns immediately after the charge decision commits.  Repeated calls
    /// on a task that already left `Created` are read-only and report its
    /// current state.
    pub async fn execute(&self, task_id: TaskId, caller: UserId) -> Result<ExecuteOutcome, LedgerError> {
        // Unlocked pre-check: ownership is immutable, and an already
        // processed task never goes back to `Created`.
        let task = self
            .inner
            .store
            .task(task_id)
            .await?
            .ok_or_else(|| LedgerError::task_not_found(task_id))?;
        if task.owner_id != caller {
            return Err(LedgerError::Forbidden {
                task_id: task_id.to_string(),
            });
        }
        if !task.status.is_chargeable() {
            debug!(task_id = %task_id, status = %task.status, "execute on processed task");
            return Ok(ExecuteOutcome::already_processed(&task));
        }

        let outcome = self.charge(task_id, caller).await?;
        if outcome.status == TaskStatus::Running && !outcome.already_processed {
            self.spawn_completion(task_id, caller);
        }
        Ok(outcome)
    }

    async fn charge(&self, task_id: TaskId, caller: UserId) -> Result<ExecuteOutcome, LedgerError> {
        let now = Utc::now().trunc_subsecs(6);
        let mut tx = self.inner.store.begin().await?;

        if !tx.lock_task(task_id, now).await? {
            return Err(LedgerError::task_not_found(task_id));
        }
        let task = tx
            .task(task_id)
            .await?
            .ok_or_else(|| LedgerError::task_not_found(task_id))?;
        if task.owner_id != caller {
            return Err(LedgerError::Forbidden {
                task_id: task_id.to_string(),
            });
        }
        if !task.status.is_chargeable() {
            // Another request charged it while we waited for the lock.
            tx.rollback().await?;
            debug!(task_id = %task_id, status = %task.status, "lost charge race");
            return Ok(ExecuteOutcome::already_processed(&task));
        }

        let user = tx
            .user(task.owner_id)
            .await?
            .ok_or_else(|| LedgerError::user_not_found(task.owner_id))?;
        let cost = self.inner.random.cost(self.inner.config.cost_range.clone());

        if user.credits < cost {
            if !tx.reject_task(task_id, cost, now).await? {
                return Err(LedgerError::Unexpected(format!(
                    "task {task_id} left created while locked"
                )));
            }
            tx.commit().await?;
            info!(
                task_id = %task_id,
                user_id = %user.id,
                cost,
                available = user.credits,
                "task rejected: insufficient credits"
            );
            return Ok(ExecuteOutcome {
                id: task_id,
                status: TaskStatus::Rejected,
                cost,
                started_at: Some(now),
                message: format!(
                    "insufficient credits: task requires {cost}, {} available",
                    user.credits
                ),
                already_processed: false,
            });
        }

        if !tx.debit(user.id, cost).await? {
            return Err(LedgerError::Unexpected(format!(
                "debit of {cost} refused for user {} holding {}",
                user.id, user.credits
            )));
        }
        if !tx.start_task(task_id, cost, now).await? {
            return Err(LedgerError::Unexpected(format!(
                "task {task_id} left created while locked"
            )));
        }
        tx.append_entry(&LedgerEntry::debit(user.id, task_id, cost, now))
            .await?;
        tx.commit().await?;

        info!(
            task_id = %task_id,
            user_id = %user.id,
            cost,
            balance = user.credits - cost,
            "task charged and started"
        );
        Ok(ExecuteOutcome {
            id: task_id,
            status: TaskStatus::Running,
            cost,
            started_at: Some(now),
            message: format!("task started; {cost} credits charged"),
            already_processed: false,
        })
    }

    fn spawn_completion(&self, task_id: TaskId, owner_id: UserId) {
        let work = self
            .inner
            .random
            .work_duration(self.inner.config.work_duration.clone());
        let completion = Completion {
            store: self.inner.store.clone(),
            random: Arc::clone(&self.inner.random),
            shutdown: self.inner.shutdown.clone(),
            task_id,
            owner_id,
            work,
        };
        debug!(task_id = %task_id, work_ms = work.as_millis() as u64, "completion scheduled");
        let handle = tokio::spawn(completion.run());
        self.inner.completions.insert(task_id, handle);
    }

    /// Number of completion units still pending.
    pub fn in_flight(&self) -> usize {
        self.inner.completions.in_flight()
    }

    /// Wait for the completion unit of `task_id`, if one is tracked.
    pub async fn wait_for_completion(&self, task_id: TaskId) -> bool {
        self.inner.completions.wait_for(task_id).await
    }

    /// Wait for every pending completion unit.  After shutdown has been
    /// triggered this returns promptly, since the units abort.
    pub async fn drain(&self) {
        self.inner.completions.drain().await;
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

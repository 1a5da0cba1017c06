//! Detached second phase of task execution.
//!
//! Runs on its own tokio task after the charge has committed.  It waits out
//! the simulated work, then finalizes `Running → Succeeded | Failed` in a
//! fresh transaction.  It never touches balances: the charge pays for the
//! attempt, not the outcome.
//!
//! Nothing here can reach the original caller, so every error is logged and
//! dropped.  A unit that never finishes leaves its task in `Running`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::lifecycle::TaskStatus;
use crate::model::{TaskId, UserId};
use crate::random::RandomSource;
use crate::shutdown::ShutdownSignal;
use crate::store::LedgerStore;

pub(crate) const FAILURE_REASON: &str = "task execution failed";

pub(crate) struct Completion {
    pub(crate) store: LedgerStore,
    pub(crate) random: Arc<dyn RandomSource>,
    pub(crate) shutdown: ShutdownSignal,
    pub(crate) task_id: TaskId,
    pub(crate) owner_id: UserId,
    pub(crate) work: Duration,
}

impl Completion {
    pub(crate) async fn run(mut self) {
        let task_id = self.task_id;
        tokio::select! {
            _ = tokio::time::sleep(self.work) => {}
            _ = self.shutdown.wait() => {
                info!(task_id = %task_id, "shutdown before completion; task left running");
                return;
            }
        }

        match self.finish().await {
            Ok(Some(status)) => info!(task_id = %task_id, %status, "task completed"),
            Ok(None) => {}
            Err(e) => warn!(task_id = %task_id, error = %e, "task completion failed; task left running"),
        }
    }

    /// Returns the terminal status written, or `None` when there was nothing
    /// to do.
    async fn finish(&self) -> Result<Option<TaskStatus>, LedgerError> {
        let now = Utc::now().trunc_subsecs(6);
        let mut tx = self.store.begin().await?;

        if !tx.lock_task(self.task_id, now).await? {
            debug!(task_id = %self.task_id, "task vanished before completion");
            return Ok(None);
        }
        let Some(task) = tx.task(self.task_id).await? else {
            return Ok(None);
        };
        if task.owner_id != self.owner_id || task.status != TaskStatus::Running {
            debug!(
                task_id = %self.task_id,
                status = %task.status,
                "task not eligible for completion; skipping"
            );
            return Ok(None);
        }

        let (status, reason) = if self.random.succeeds() {
            (TaskStatus::Succeeded, None)
        } else {
            (TaskStatus::Failed, Some(FAILURE_REASON))
        };
        if !tx.finish_task(self.task_id, status, reason, now).await? {
            return Ok(None);
        }

        if self.shutdown.is_triggered() {
            tx.rollback().await?;
            info!(task_id = %self.task_id, "shutdown during completion; rolled back");
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Task;
    use crate::shutdown::Shutdown;
    use crate::test_support::{temp_store, user_with, ScriptedRandom};

    async fn running_task(store: &LedgerStore) -> Task {
        let now = Utc::now().trunc_subsecs(6);
        let user = user_with(10, now);
        store.insert_user(&user).await.unwrap();
        let task = Task::new(user.id, now);
        store.insert_task(&task).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.start_task(task.id, 4, now).await.unwrap());
        tx.commit().await.unwrap();
        store.task(task.id).await.unwrap().unwrap()
    }

    fn completion(store: &LedgerStore, task: &Task, shutdown: &Shutdown) -> Completion {
        Completion {
            store: store.clone(),
            random: Arc::new(ScriptedRandom::fixed(4, Duration::from_millis(1))),
            shutdown: shutdown.signal(),
            task_id: task.id,
            owner_id: task.owner_id,
            work: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn finish_commits_terminal_status() {
        let (_dir, store) = temp_store().await;
        let task = running_task(&store).await;
        let shutdown = Shutdown::new();

        let written = completion(&store, &task, &shutdown).finish().await.unwrap();
        assert_eq!(written, Some(TaskStatus::Succeeded));

        let stored = store.task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Succeeded);
        assert_eq!(stored.check_invariants(), Ok(()));
    }

    #[tokio::test]
    async fn shutdown_before_commit_rolls_back_the_write() {
        let (_dir, store) = temp_store().await;
        let task = running_task(&store).await;
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let written = completion(&store, &task, &shutdown).finish().await.unwrap();
        assert_eq!(written, None);

        let stored = store.task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Running);
        assert_eq!(stored.completed_at, None);
        assert_eq!(stored, task);
    }

    #[tokio::test]
    async fn finish_skips_task_of_another_owner() {
        let (_dir, store) = temp_store().await;
        let task = running_task(&store).await;
        let shutdown = Shutdown::new();
        let mut unit = completion(&store, &task, &shutdown);
        unit.owner_id = uuid::Uuid::new_v4();

        assert_eq!(unit.finish().await.unwrap(), None);
        let stored = store.task(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Running);
    }
}

//! Task creation and read-only task views.

use chrono::{SubsecRound, Utc};
use tracing::info;

use crate::error::LedgerError;
use crate::model::{Task, TaskId, UserId};
use crate::store::LedgerStore;

/// Free task operations: nothing here touches the ledger.
#[derive(Debug, Clone)]
pub struct TaskService {
    store: LedgerStore,
}

impl TaskService {
    pub fn new(store: LedgerStore) -> Self {
        Self { store }
    }

    /// Create a task in `Created` for `owner_id`.
    pub async fn create_task(&self, owner_id: UserId) -> Result<Task, LedgerError> {
        if self.store.user(owner_id).await?.is_none() {
            return Err(LedgerError::user_not_found(owner_id));
        }
        let task = Task::new(owner_id, Utc::now().trunc_subsecs(6));
        self.store.insert_task(&task).await?;
        info!(task_id = %task.id, user_id = %owner_id, "task created");
        Ok(task)
    }

    /// Tasks owned by `owner_id`, newest first.
    pub async fn list_tasks(&self, owner_id: UserId) -> Result<Vec<Task>, LedgerError> {
        self.store.tasks_by_owner(owner_id).await
    }

    /// A single task, visible only to its owner.
    pub async fn get_task(&self, task_id: TaskId, caller: UserId) -> Result<Task, LedgerError> {
        let task = self
            .store
            .task(task_id)
            .await?
            .ok_or_else(|| LedgerError::task_not_found(task_id))?;
        if task.owner_id != caller {
            return Err(LedgerError::Forbidden {
                task_id: task_id.to_string(),
            });
        }
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::TaskStatus;
    use crate::test_support::{temp_store, user_with};
    use uuid::Uuid;

    #[tokio::test]
    async fn created_task_is_free_and_uncosted() {
        let (_dir, store) = temp_store().await;
        let user = user_with(7, Utc::now());
        store.insert_user(&user).await.unwrap();
        let service = TaskService::new(store.clone());

        let task = service.create_task(user.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Created);
        assert_eq!(task.cost, None);
        assert_eq!(task.check_invariants(), Ok(()));

        assert_eq!(store.user(user.id).await.unwrap().unwrap().credits, 7);
        assert!(store.ledger(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_for_unknown_user_is_not_found() {
        let (_dir, store) = temp_store().await;
        let service = TaskService::new(store);
        let err = service.create_task(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "user", .. }));
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let (_dir, store) = temp_store().await;
        let user = user_with(7, Utc::now());
        store.insert_user(&user).await.unwrap();
        let service = TaskService::new(store);

        let a = service.create_task(user.id).await.unwrap();
        let b = service.create_task(user.id).await.unwrap();
        let c = service.create_task(user.id).await.unwrap();

        let ids: Vec<_> = service
            .list_tasks(user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![c.id, b.id, a.id]);
    }

    #[tokio::test]
    async fn get_task_enforces_ownership() {
        let (_dir, store) = temp_store().await;
        let user = user_with(7, Utc::now());
        store.insert_user(&user).await.unwrap();
        let service = TaskService::new(store);
        let task = service.create_task(user.id).await.unwrap();

        assert_eq!(service.get_task(task.id, user.id).await.unwrap().id, task.id);
        assert!(matches!(
            service.get_task(task.id, Uuid::new_v4()).await,
            Err(LedgerError::Forbidden { .. })
        ));
        assert!(matches!(
            service.get_task(Uuid::new_v4(), user.id).await,
            Err(LedgerError::NotFound { .. })
        ));
    }
}

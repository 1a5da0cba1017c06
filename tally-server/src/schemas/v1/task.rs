use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_core::{ExecuteOutcome, Task};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// One of `created`, `running`, `succeeded`, `failed`, `rejected`.
    pub status: String,
    /// Credits charged; absent until the first execute.
    pub cost: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            owner_id: task.owner_id,
            status: task.status.as_str().to_owned(),
            cost: task.cost,
            created_at: task.created_at,
            started_at: task.started_at,
            completed_at: task.completed_at,
            failure_reason: task.failure_reason,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExecuteResponse {
    pub id: Uuid,
    pub status: String,
    pub cost: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub message: String,
    /// `true` when the task had already been charged before this call.
    pub already_processed: bool,
}

impl From<ExecuteOutcome> for ExecuteResponse {
    fn from(outcome: ExecuteOutcome) -> Self {
        Self {
            id: outcome.id,
            status: outcome.status.as_str().to_owned(),
            cost: outcome.cost,
            started_at: outcome.started_at,
            message: outcome.message,
            already_processed: outcome.already_processed,
        }
    }
}

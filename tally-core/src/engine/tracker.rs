use std::collections::HashMap;
use std::sync::Mutex;

use tokio::task::JoinHandle;
use tracing::warn;

use crate::model::TaskId;

/// Tracks detached completion units, keyed by task id.
pub(crate) struct CompletionTracker {
    handles: Mutex<HashMap<TaskId, JoinHandle<()>>>,
}

impl std::fmt::Debug for CompletionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompletionTracker({} in flight)", self.in_flight())
    }
}

impl CompletionTracker {
    pub(crate) fn new() -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, id: TaskId, handle: JoinHandle<()>) {
        if let Ok(mut map) = self.handles.lock() {
            map.retain(|_, h| !h.is_finished());
            map.insert(id, handle);
        }
    }

    /// Number of completion units that have not finished yet.
    pub(crate) fn in_flight(&self) -> usize {
        self.handles
            .lock()
            .map(|map| map.values().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Wait for the completion unit of `id`.  Returns `false` if none is
    /// tracked.
    pub(crate) async fn wait_for(&self, id: TaskId) -> bool {
        let handle = match self.handles.lock() {
            Ok(mut map) => map.remove(&id),
            Err(_) => None,
        };
        match handle {
            Some(h) => {
                if let Err(e) = h.await {
                    warn!(task_id = %id, error = %e, "completion unit panicked");
                }
                true
            }
            None => false,
        }
    }

    /// Wait for every tracked completion unit.
    pub(crate) async fn drain(&self) {
        let handles: Vec<(TaskId, JoinHandle<()>)> = match self.handles.lock() {
            Ok(mut map) => map.drain().collect(),
            Err(_) => Vec::new(),
        };
        for (id, h) in handles {
            if let Err(e) = h.await {
                warn!(task_id = %id, error = %e, "completion unit panicked");
            }
        }
    }
}

//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use tally_core::{AccountService, ExecutionEngine, LedgerStore, TaskService};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Shared ledger pool, used directly only for health checks.
    pub store: LedgerStore,
    pub tasks: TaskService,
    pub accounts: AccountService,
    /// Charges tasks and tracks their detached completion.
    pub engine: ExecutionEngine,
}

impl AppState {
    pub fn new(config: Config, store: LedgerStore, engine: ExecutionEngine) -> Self {
        Self {
            config: Arc::new(config),
            tasks: TaskService::new(store.clone()),
            accounts: AccountService::new(store.clone()),
            store,
            engine,
        }
    }
}

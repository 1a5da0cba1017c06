//! tally-core – credit ledger, task execution engine and auto-grant scheduler.
//!
//! Every user holds a credit balance.  Executing a task charges a random cost
//! exactly once, synchronously, and then finishes the task out-of-band on a
//! detached tokio task.  A background [`GrantScheduler`] periodically tops up
//! every user whose last grant is older than the configured period.
//!
//! All state lives in the SQLite-backed [`LedgerStore`]; every balance change
//! is written together with a [`LedgerEntry`] in one transaction.
//!
//! ```rust,ignore
//! let store = LedgerStore::connect("sqlite://tally.db").await?;
//! let shutdown = Shutdown::new();
//! let engine = ExecutionEngine::new(store.clone(), ExecutionConfig::default(), shutdown.signal());
//! let scheduler = GrantScheduler::new(store.clone(), GrantConfig::new(10, 1, 5));
//! let handle = scheduler.spawn(shutdown.signal());
//! ```

pub mod accounts;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod random;
pub mod scheduler;
pub mod shutdown;
pub mod store;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_support;

pub use accounts::{AccountService, Reconciliation};
pub use engine::{ExecuteOutcome, ExecutionConfig, ExecutionEngine};
pub use error::LedgerError;
pub use lifecycle::{InvariantViolation, TaskStatus};
pub use model::{LedgerEntry, LedgerKind, Profile, Task, TaskId, User, UserId};
pub use random::{RandomSource, StdRandom};
pub use scheduler::{GrantConfig, GrantReport, GrantScheduler};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use store::LedgerStore;
pub use tasks::TaskService;

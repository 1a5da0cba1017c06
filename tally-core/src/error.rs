//! Error taxonomy shared by every ledger operation.
//!
//! Insufficient credits is deliberately absent: a task that cannot be paid
//! for ends in [`crate::TaskStatus::Rejected`], which is a normal outcome.

use thiserror::Error;

/// All errors that can occur while reading or mutating the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A task or user referenced by the caller does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The caller does not own the task.
    #[error("task {task_id} belongs to another user")]
    Forbidden { task_id: String },

    /// The request itself is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The store was busy, locked or unreachable.  The transaction has been
    /// rolled back and the operation may be retried.
    #[error("transient store failure: {0}")]
    Transient(#[source] sqlx::Error),

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(#[source] sqlx::Error),

    /// Schema migration failed at startup.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A persisted record could not be decoded, or an internal guard tripped.
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl LedgerError {
    pub fn task_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "task",
            id: id.to_string(),
        }
    }

    pub fn user_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "user",
            id: id.to_string(),
        }
    }

    /// `true` when retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

// SQLite primary result codes for contention.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        let transient = match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => true,
            sqlx::Error::Database(db) => db.code().is_some_and(|code| {
                // Extended codes (e.g. 517 SQLITE_BUSY_SNAPSHOT) carry the
                // primary code in the low byte.
                let primary = code
                    .parse::<i32>()
                    .map(|c| (c & 0xff).to_string())
                    .unwrap_or_else(|_| code.to_string());
                primary == SQLITE_BUSY || primary == SQLITE_LOCKED
            }),
            _ => false,
        };
        if transient {
            Self::Transient(e)
        } else {
            Self::Store(e)
        }
    }
}

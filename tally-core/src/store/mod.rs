//! SQLite-backed ledger store.
//!
//! [`LedgerStore`] offers two kinds of access:
//!
//! * **untracked** reads and inserts straight against the pool, for views
//!   and for records nothing else can be racing on (a brand-new task);
//! * **tracked** access through [`LedgerTx`], a transaction whose first
//!   statement takes SQLite's write lock.  Every read-decide-write sequence
//!   on balances or task statuses goes through it.
//!
//! Migrations are embedded at compile time from `./migrations` and run by
//! [`LedgerStore::connect`].
//!
//! The `sqlx::query` (runtime-checked) form is used throughout so no
//! `DATABASE_URL` is needed at build time.

mod codec;
mod queries;
mod tx;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::LedgerError;
use crate::model::{LedgerEntry, Task, TaskId, User, UserId};

pub use tx::LedgerTx;

/// How long a connection waits on another writer before giving up with
/// `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 8;

/// Handle to the ledger database.  Cheap to clone.
#[derive(Clone, Debug)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL, e.g. `"sqlite://tally.db"` or
    /// `"sqlite::memory:"`.  In-memory databases are private to a connection,
    /// so they get a single, never-recycled connection.
    pub async fn connect(url: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str(url)?;
        let in_memory = url.contains(":memory:");
        Self::connect_with(options, in_memory).await
    }

    /// Open the database described by `options` and run pending migrations.
    pub async fn connect_with(
        options: SqliteConnectOptions,
        in_memory: bool,
    ) -> Result<Self, LedgerError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };

        let pool = pool_options.connect_with(options).await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("ledger schema up to date");
        Ok(Self { pool })
    }

    /// Start a tracked unit of work.
    ///
    /// The transaction holds no lock until its first write; callers take the
    /// lock up front with [`LedgerTx::lock_task`] or
    /// [`LedgerTx::open_grant_cycle`].
    pub async fn begin(&self) -> Result<LedgerTx, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(LedgerTx::new(tx))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Round-trip a trivial query to prove the database answers.
    pub async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ── Untracked access ───────────────────────────────────────────────────────

    pub async fn user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        queries::fetch_user(&self.pool, id).await
    }

    pub async fn task(&self, id: TaskId) -> Result<Option<Task>, LedgerError> {
        queries::fetch_task(&self.pool, id).await
    }

    /// Tasks owned by `owner_id`, newest first.
    pub async fn tasks_by_owner(&self, owner_id: UserId) -> Result<Vec<Task>, LedgerError> {
        queries::tasks_by_owner(&self.pool, owner_id).await
    }

    /// Ledger entries for `user_id`, newest first.
    pub async fn ledger(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, LedgerError> {
        queries::ledger_by_user(&self.pool, user_id).await
    }

    /// Ledger entries referencing `task_id`, oldest first.
    pub async fn ledger_for_task(&self, task_id: TaskId) -> Result<Vec<LedgerEntry>, LedgerError> {
        queries::ledger_entries_for_task(&self.pool, task_id).await
    }

    /// Signed sum of every ledger entry for `user_id`.
    pub async fn ledger_sum(&self, user_id: UserId) -> Result<i64, LedgerError> {
        queries::ledger_sum(&self.pool, user_id).await
    }

    pub async fn insert_user(&self, user: &User) -> Result<(), LedgerError> {
        queries::insert_user(&self.pool, user).await
    }

    pub async fn insert_task(&self, task: &Task) -> Result<(), LedgerError> {
        queries::insert_task(&self.pool, task).await
    }

    /// Number of grant cycles that have committed.
    pub async fn grant_cycle_count(&self) -> Result<i64, LedgerError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM grant_cycles WHERE completed_at IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

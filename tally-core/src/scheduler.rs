//! Auto-grant scheduler.
//!
//! A long-lived background loop that tops up every *due* user: one whose
//! last grant (or, failing that, registration) is at least `grant_frequency`
//! old.  Due-ness is derived only from persisted timestamps, so a restart
//! loses at most the tick that was in flight, and `last_grant_at` advances in
//! the same transaction as the credit, so a period is never paid twice.
//!
//! Each tick is one transaction.  Its first statement inserts the
//! `grant_cycles` row, which takes SQLite's write lock; overlapping ticks (from
//! this process or another one on the same database) therefore run strictly
//! one after the other.  Any failure rolls back the whole batch and the next
//! tick retries the same users.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::model::{LedgerEntry, UserId};
use crate::shutdown::ShutdownSignal;
use crate::store::LedgerStore;

/// Longest accepted grant period (about a century).
pub const MAX_FREQUENCY_DAYS: i64 = 36_500;
/// Longest accepted delay between ticks (one week).
pub const MAX_CHECK_INTERVAL_MINUTES: i64 = 7 * 24 * 60;

/// Immutable scheduler settings.  Built only through [`GrantConfig::new`],
/// so every value is within bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantConfig {
    grant_amount: i64,
    grant_frequency: Duration,
    check_interval: StdDuration,
}

impl GrantConfig {
    /// Build a config, clamping each value into its accepted range.
    ///
    /// Out-of-range values are logged and clamped rather than rejected.
    pub fn new(grant_amount: i64, frequency_days: i64, check_interval_minutes: i64) -> Self {
        let amount = clamp_setting("grant_amount", grant_amount, 1, i64::MAX);
        let days = clamp_setting("grant_frequency_days", frequency_days, 1, MAX_FREQUENCY_DAYS);
        let minutes = clamp_setting(
            "check_interval_minutes",
            check_interval_minutes,
            1,
            MAX_CHECK_INTERVAL_MINUTES,
        );
        Self {
            grant_amount: amount,
            grant_frequency: Duration::try_days(days).unwrap_or(Duration::MAX),
            check_interval: StdDuration::from_secs((minutes as u64).saturating_mul(60)),
        }
    }

    /// Credits added per grant.  At least 1.
    pub fn grant_amount(&self) -> i64 {
        self.grant_amount
    }

    /// Minimum age of the previous grant.  At least one day.
    pub fn grant_frequency(&self) -> Duration {
        self.grant_frequency
    }

    /// Delay between ticks.  At least one minute.
    pub fn check_interval(&self) -> StdDuration {
        self.check_interval
    }
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self::new(10, 1, 5)
    }
}

fn clamp_setting(name: &str, value: i64, min: i64, max: i64) -> i64 {
    if value < min {
        warn!(setting = name, value, min, "grant setting too small; clamped");
        min
    } else if value > max {
        warn!(setting = name, value, max, "grant setting too large; clamped");
        max
    } else {
        value
    }
}

/// Outcome of one committed tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantReport {
    pub cycle_id: Uuid,
    pub due_before: DateTime<Utc>,
    pub amount: i64,
    /// Users credited in this cycle, in id order.
    pub granted: Vec<UserId>,
}

#[derive(Debug, Clone)]
pub struct GrantScheduler {
    store: LedgerStore,
    config: GrantConfig,
}

impl GrantScheduler {
    pub fn new(store: LedgerStore, config: GrantConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &GrantConfig {
        &self.config
    }

    /// Run one grant cycle now.
    pub async fn tick(&self) -> Result<GrantReport, LedgerError> {
        self.tick_at(Utc::now().trunc_subsecs(6)).await
    }

    /// Run one grant cycle as if the current time were `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<GrantReport, LedgerError> {
        let due_before = now
            .checked_sub_signed(self.config.grant_frequency)
            .ok_or_else(|| {
                LedgerError::InvalidInput(format!(
                    "grant period of {} days reaches before the calendar starts",
                    self.config.grant_frequency.num_days()
                ))
            })?;
        let amount = self.config.grant_amount;
        let cycle_id = Uuid::new_v4();

        let mut tx = self.store.begin().await?;
        tx.open_grant_cycle(cycle_id, now, due_before).await?;

        let candidates = tx.due_users(due_before).await?;
        let mut granted = Vec::with_capacity(candidates.len());
        for user in candidates {
            if !user.is_due(due_before) {
                continue;
            }
            if user.credits.checked_add(amount).is_none() {
                warn!(user_id = %user.id, credits = user.credits, amount, "grant would overflow balance; skipped");
                continue;
            }
            // The UPDATE re-checks due-ness against the row itself.
            if !tx.grant(user.id, amount, now, due_before).await? {
                debug!(user_id = %user.id, "user no longer due or at balance ceiling; skipped");
                continue;
            }
            tx.append_entry(&LedgerEntry::auto_grant(user.id, amount, now))
                .await?;
            granted.push(user.id);
        }

        tx.close_grant_cycle(cycle_id, granted.len(), now).await?;
        tx.commit().await?;

        Ok(GrantReport {
            cycle_id,
            due_before,
            amount,
            granted,
        })
    }

    /// Tick immediately, then every `check_interval`, until `shutdown` fires.
    ///
    /// Shutdown is only observed between ticks; a tick in progress always
    /// commits or rolls back on its own.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        info!(
            amount = self.config.grant_amount,
            frequency_days = self.config.grant_frequency.num_days(),
            check_interval_secs = self.config.check_interval.as_secs(),
            "grant scheduler started"
        );
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                Ok(report) if report.granted.is_empty() => {
                    debug!(cycle_id = %report.cycle_id, "grant cycle: nobody due");
                }
                Ok(report) => info!(
                    cycle_id = %report.cycle_id,
                    granted = report.granted.len(),
                    amount = report.amount,
                    "grant cycle committed"
                ),
                Err(e) => warn!(error = %e, transient = e.is_transient(), "grant cycle rolled back"),
            }
        }
        info!("grant scheduler stopped");
    }

    /// Spawn [`Self::run`] on the tokio runtime.
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

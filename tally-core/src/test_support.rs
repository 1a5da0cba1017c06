//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::ops::{Range, RangeInclusive};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use crate::model::User;
use crate::random::RandomSource;
use crate::store::LedgerStore;

/// A fresh on-disk store in a temporary directory.  Keep the `TempDir`
/// alive for as long as the store is used.
pub(crate) async fn temp_store() -> (TempDir, LedgerStore) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let url = format!("sqlite://{}", dir.path().join("tally.db").display());
    let store = LedgerStore::connect(&url).await.expect("open temp store");
    (dir, store)
}

/// A user record with `credits`, registered at `registered_at` (truncated to
/// the store's microsecond precision).
pub(crate) fn user_with(credits: i64, registered_at: DateTime<Utc>) -> User {
    User {
        id: Uuid::new_v4(),
        credits,
        initial_credits: credits,
        registered_at: registered_at.trunc_subsecs(6),
        last_grant_at: None,
    }
}

/// Random source replaying scripted draws.  Once a script runs dry the last
/// value repeats.
#[derive(Debug)]
pub(crate) struct ScriptedRandom {
    costs: Mutex<VecDeque<i64>>,
    outcomes: Mutex<VecDeque<bool>>,
    work: Duration,
}

impl ScriptedRandom {
    pub(crate) fn new(costs: &[i64], outcomes: &[bool], work: Duration) -> Self {
        Self {
            costs: Mutex::new(costs.iter().copied().collect()),
            outcomes: Mutex::new(outcomes.iter().copied().collect()),
            work,
        }
    }

    /// Always costs `cost`, always succeeds, finishes after `work`.
    pub(crate) fn fixed(cost: i64, work: Duration) -> Self {
        Self::new(&[cost], &[true], work)
    }
}

fn next<T: Copy>(queue: &Mutex<VecDeque<T>>) -> T {
    let mut q = queue.lock().expect("scripted random lock");
    if q.len() > 1 {
        q.pop_front().expect("non-empty script")
    } else {
        *q.front().expect("script must not be empty")
    }
}

impl RandomSource for ScriptedRandom {
    fn cost(&self, _range: RangeInclusive<i64>) -> i64 {
        next(&self.costs)
    }

    fn work_duration(&self, _range: Range<Duration>) -> Duration {
        self.work
    }

    fn succeeds(&self) -> bool {
        next(&self.outcomes)
    }
}

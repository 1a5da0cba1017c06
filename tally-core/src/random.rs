//! Injectable randomness for task cost, simulated work time and outcome.

use std::ops::{Range, RangeInclusive};
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of every random decision the execution engine makes.
///
/// Production wiring uses [`StdRandom::from_entropy`]; tests seed it or supply
/// a scripted implementation.
pub trait RandomSource: Send + Sync + 'static {
    /// Uniform draw from `range` (inclusive).
    fn cost(&self, range: RangeInclusive<i64>) -> i64;

    /// Uniform draw from `range` (half-open).
    fn work_duration(&self, range: Range<Duration>) -> Duration;

    /// Fair coin: `true` means the task succeeds.
    fn succeeds(&self) -> bool;
}

/// [`RandomSource`] backed by a mutex-guarded [`StdRng`].
#[derive(Debug)]
pub struct StdRandom {
    rng: Mutex<StdRng>,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic sequence for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A poisoned lock only means another thread panicked mid-draw; the
        // generator state is still usable.
        let mut guard = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

impl Default for StdRandom {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RandomSource for StdRandom {
    fn cost(&self, range: RangeInclusive<i64>) -> i64 {
        self.with_rng(|rng| rng.gen_range(range))
    }

    fn work_duration(&self, range: Range<Duration>) -> Duration {
        if range.start >= range.end {
            return range.start;
        }
        self.with_rng(|rng| rng.gen_range(range))
    }

    fn succeeds(&self) -> bool {
        self.with_rng(|rng| rng.gen_bool(0.5))
    }
}

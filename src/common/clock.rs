//! Time source abstraction.
//!
//! TTLs, lock ceilings and throttling all read time through a [`Clock`] so
//! tests can drive them deterministically with a [`ManualClock`].

use std::fmt::Debug;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of monotonic and wall-clock time, and the engine's only way to wait.
pub trait Clock: Send + Sync + Debug {
    /// Monotonic time for TTLs and deadlines.
    fn now(&self) -> Instant;

    /// Wall-clock time for stored case timestamps.
    fn utc_now(&self) -> DateTime<Utc>;

    /// Block the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// The real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// A clock that only moves when told to.
///
/// `sleep` advances the clock instead of blocking, so throttling and lock
/// waits complete instantly while still being observable.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    origin_utc: DateTime<Utc>,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a clock whose wall time starts at `origin_utc`.
    pub fn starting_at(origin_utc: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            origin_utc,
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }

    /// Total time advanced so far, including sleeps.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.elapsed()).unwrap_or(chrono::Duration::zero());
        self.origin_utc + elapsed
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

//! Lock Coordinator - named, timeout-bound exclusive locks.
//!
//! Locks are advisory and process-local. Every ticket carries a hard
//! ceiling: once `expires_at` passes, the next coordinator access (or
//! the engine janitor) force-releases it, so a crashed or stuck holder
//! cannot block a key forever.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::common::{Clock, EngineConfig, LockTimeout, TableId};
use crate::lock::guard::LockGuard;

/// Key serializing read-modify-write of one case.
pub fn case_update_key(case_id: &str) -> String {
    format!("case_update_{}", case_id)
}

/// Key serializing case creation (id check plus append) in one table.
pub fn case_create_key(table: &TableId) -> String {
    format!("case_create_{}", table)
}

/// Key for a named multi-record batch job.
pub fn batch_key(name: &str) -> String {
    format!("batch_{}", name)
}

/// Proof of holding a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTicket {
    pub lock_key: String,
    pub owner_id: Uuid,
    /// Unique per acquisition; release must present the holder's token.
    pub token: u64,
    pub acquired_at: Instant,
    /// The timeout the caller was willing to wait for this lock.
    pub timeout: Duration,
    pub expires_at: Instant,
}

/// Result of a release call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    /// The key is held by another ticket.
    NotHolder,
    /// The key is not held at all.
    NotHeld,
}

#[derive(Debug, Default)]
struct LockStats {
    acquired: AtomicU64,
    released: AtomicU64,
    timeouts: AtomicU64,
    forced_releases: AtomicU64,
    stale_releases: AtomicU64,
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockCounters {
    pub acquired: u64,
    pub released: u64,
    pub timeouts: u64,
    pub forced_releases: u64,
    pub stale_releases: u64,
}

/// One currently held lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldLock {
    pub key: String,
    pub owner_id: Uuid,
    pub age: Duration,
    pub remaining: Duration,
}

/// Administrative view of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockStatus {
    /// Held locks ordered by key.
    pub held: Vec<HeldLock>,
    pub counters: LockCounters,
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LockStatus {{ held: {}, acquired: {}, released: {}, timeouts: {}, forced: {}, stale: {} }}",
            self.held.len(),
            self.counters.acquired,
            self.counters.released,
            self.counters.timeouts,
            self.counters.forced_releases,
            self.counters.stale_releases
        )
    }
}

/// Grants exclusive named locks with timeouts and a hard hold ceiling.
#[derive(Debug)]
pub struct LockCoordinator {
    held: Mutex<HashMap<String, LockTicket>>,
    next_token: AtomicU64,
    max_hold: Duration,
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
    stats: LockStats,
}

impl LockCoordinator {
    pub fn new(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(config.lock_max_hold, config.lock_poll_interval, clock)
    }

    pub fn with_limits(max_hold: Duration, poll_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            max_hold,
            poll_interval,
            clock,
            stats: LockStats::default(),
        }
    }

    // ========================================================================
    // Public API: Acquire / release
    // ========================================================================

    /// Wait up to `timeout` for `key` to be free, then take it.
    ///
    /// # Errors
    /// `LockTimeout` if the key is still held when the timeout elapses.
    pub fn acquire(&self, key: &str, timeout: Duration) -> Result<LockTicket, LockTimeout> {
        let start = self.clock.now();
        loop {
            let now = self.clock.now();
            {
                let mut held = self.held.lock();
                self.reap_locked(&mut held, now);
                if !held.contains_key(key) {
                    let ticket = LockTicket {
                        lock_key: key.to_string(),
                        owner_id: Uuid::new_v4(),
                        token: self.next_token.fetch_add(1, Ordering::Relaxed),
                        acquired_at: now,
                        timeout,
                        expires_at: now + self.max_hold,
                    };
                    held.insert(key.to_string(), ticket.clone());
                    self.stats.acquired.fetch_add(1, Ordering::Relaxed);
                    debug!(key, owner = %ticket.owner_id, "lock acquired");
                    return Ok(ticket);
                }
            }

            let waited = now.saturating_duration_since(start);
            if waited >= timeout {
                self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(key, waited_ms = waited.as_millis() as u64, "lock acquisition timed out");
                return Err(LockTimeout {
                    key: key.to_string(),
                    waited,
                });
            }
            self.clock.sleep(self.poll_interval.min(timeout - waited));
        }
    }

    /// Release `key` if `ticket` is the current holder.
    ///
    /// Foreign and stale tickets leave the lock untouched.
    pub fn release(&self, key: &str, ticket: &LockTicket) -> ReleaseOutcome {
        let mut held = self.held.lock();
        self.reap_locked(&mut held, self.clock.now());

        match held.get(key) {
            Some(current) if current.token == ticket.token => {
                held.remove(key);
                self.stats.released.fetch_add(1, Ordering::Relaxed);
                debug!(key, "lock released");
                ReleaseOutcome::Released
            }
            Some(current) => {
                self.stats.stale_releases.fetch_add(1, Ordering::Relaxed);
                warn!(key, holder = %current.owner_id, caller = %ticket.owner_id, "release by non-holder ignored");
                ReleaseOutcome::NotHolder
            }
            None => {
                self.stats.stale_releases.fetch_add(1, Ordering::Relaxed);
                warn!(key, caller = %ticket.owner_id, "release of unheld lock ignored");
                ReleaseOutcome::NotHeld
            }
        }
    }

    /// Acquire `key` as a guard that releases on drop.
    pub fn lock(&self, key: &str, timeout: Duration) -> Result<LockGuard<'_>, LockTimeout> {
        let ticket = self.acquire(key, timeout)?;
        Ok(LockGuard::new(self, ticket))
    }

    /// Run `f` while holding `key`.
    ///
    /// The lock is released however `f` exits, including by panic.
    pub fn with_lock<T, E, F>(&self, key: &str, timeout: Duration, f: F) -> Result<T, E>
    where
        E: From<LockTimeout>,
        F: FnOnce() -> Result<T, E>,
    {
        let _guard = self.lock(key, timeout)?;
        f()
    }

    // ========================================================================
    // Public API: Maintenance and status
    // ========================================================================

    /// Force-release every ticket past its hard ceiling.
    pub fn reap_expired(&self) -> usize {
        let mut held = self.held.lock();
        self.reap_locked(&mut held, self.clock.now())
    }

    pub fn is_held(&self, key: &str) -> bool {
        let mut held = self.held.lock();
        self.reap_locked(&mut held, self.clock.now());
        held.contains_key(key)
    }

    pub fn status(&self) -> LockStatus {
        let now = self.clock.now();
        let mut held = self.held.lock();
        self.reap_locked(&mut held, now);

        let mut locks: Vec<HeldLock> = held
            .values()
            .map(|t| HeldLock {
                key: t.lock_key.clone(),
                owner_id: t.owner_id,
                age: now.saturating_duration_since(t.acquired_at),
                remaining: t.expires_at.saturating_duration_since(now),
            })
            .collect();
        locks.sort_by(|a, b| a.key.cmp(&b.key));

        LockStatus {
            held: locks,
            counters: self.counters(),
        }
    }

    pub fn counters(&self) -> LockCounters {
        LockCounters {
            acquired: self.stats.acquired.load(Ordering::Relaxed),
            released: self.stats.released.load(Ordering::Relaxed),
            timeouts: self.stats.timeouts.load(Ordering::Relaxed),
            forced_releases: self.stats.forced_releases.load(Ordering::Relaxed),
            stale_releases: self.stats.stale_releases.load(Ordering::Relaxed),
        }
    }

    pub fn max_hold(&self) -> Duration {
        self.max_hold
    }

    pub(crate) fn remaining(&self, ticket: &LockTicket) -> Duration {
        ticket.expires_at.saturating_duration_since(self.clock.now())
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn reap_locked(&self, held: &mut HashMap<String, LockTicket>, now: Instant) -> usize {
        let before = held.len();
        held.retain(|key, ticket| {
            let expired = now >= ticket.expires_at;
            if expired {
                warn!(
                    key = key.as_str(),
                    owner = %ticket.owner_id,
                    held_ms = now.saturating_duration_since(ticket.acquired_at).as_millis() as u64,
                    "lock force-released at hard ceiling"
                );
            }
            !expired
        });
        let reaped = before - held.len();
        if reaped > 0 {
            self.stats.forced_releases.fetch_add(reaped as u64, Ordering::Relaxed);
        }
        reaped
    }
}

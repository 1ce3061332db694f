//! RAII guard for a held lock.

use std::time::Duration;

use crate::lock::coordinator::{LockCoordinator, LockTicket, ReleaseOutcome};

/// Holds a named lock until dropped.
///
/// Release happens on every exit path: normal return, early `?` return
/// and panic unwinding. If the hard ceiling already force-released the
/// lock, the drop-time release is a logged no-op.
///
/// # Example
/// ```ignore
/// let guard = coordinator.lock("case_update_C-1", Duration::from_secs(5))?;
/// // ... read-modify-write the record ...
/// // guard drops here, lock released
/// ```
pub struct LockGuard<'a> {
    coordinator: &'a LockCoordinator,
    /// `None` once released explicitly.
    ticket: Option<LockTicket>,
}

impl<'a> LockGuard<'a> {
    /// Called by `LockCoordinator::lock()`.
    pub(crate) fn new(coordinator: &'a LockCoordinator, ticket: LockTicket) -> Self {
        Self {
            coordinator,
            ticket: Some(ticket),
        }
    }

    pub fn key(&self) -> &str {
        self.ticket.as_ref().map(|t| t.lock_key.as_str()).unwrap_or("")
    }

    pub fn ticket(&self) -> Option<&LockTicket> {
        self.ticket.as_ref()
    }

    /// Time left before the hard ceiling force-releases this lock.
    pub fn remaining(&self) -> Duration {
        self.ticket
            .as_ref()
            .map(|t| self.coordinator.remaining(t))
            .unwrap_or(Duration::ZERO)
    }

    /// Release now and report what happened.
    pub fn release(mut self) -> ReleaseOutcome {
        match self.ticket.take() {
            Some(ticket) => self.coordinator.release(&ticket.lock_key, &ticket),
            None => ReleaseOutcome::NotHeld,
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.coordinator.release(&ticket.lock_key, &ticket);
        }
    }
}

impl std::fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("ticket", &self.ticket).finish()
    }
}

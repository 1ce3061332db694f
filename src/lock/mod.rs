//! Pessimistic locking for multi-step record mutations.
//!
//! - [`LockCoordinator`] - Named exclusive locks with timeouts and a hard
//!   hold ceiling
//! - [`LockGuard`] - RAII holder, releases on drop

mod coordinator;
mod guard;

pub use coordinator::{
    batch_key, case_create_key, case_update_key, HeldLock, LockCoordinator, LockCounters,
    LockStatus, LockTicket, ReleaseOutcome,
};
pub use guard::LockGuard;

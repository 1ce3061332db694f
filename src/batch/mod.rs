//! Batch I/O - caching, batching and throttling in front of the backend.
//!
//! # Components
//! - [`BatchEngine`] - Executes logical read/write/update/delete batches
//! - [`TtlCache`] - Read-through cache with intersection-based eviction
//! - [`Throttle`] - Inter-call delay plus sliding-window call ceiling
//! - [`BatchStats`] / [`CacheStatistics`] - Counters and their snapshot

mod cache;
mod engine;
mod request;
mod stats;
mod throttle;

pub use cache::{CacheEntry, Generation, TtlCache};
pub use engine::BatchEngine;
pub use request::{
    BatchResult, DeleteRequest, ItemFailure, ItemResult, ReadRequest, UpdateRequest, WriteRequest,
};
pub use stats::{BatchStats, CacheStatistics};
pub use throttle::Throttle;

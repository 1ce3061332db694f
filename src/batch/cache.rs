//! Read-through TTL cache keyed by table and range.
//!
//! Pure TTL, no size bound or LRU: the working set is bounded by the
//! number of distinct ranges the record layer reads, which is small.
//!
//! Every invalidation bumps a per-table generation. A reader captures the
//! generation before its physical fetch and inserts only if it is still
//! current, so a grid fetched before a mutation never lands after it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::batch::stats::BatchStats;
use crate::common::{CellRange, Clock, TableId};
use crate::storage::Grid;

/// One cached grid.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub grid: Grid,
    pub inserted_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

type CacheKey = (TableId, CellRange);

/// Opaque invalidation counter for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    generations: HashMap<TableId, u64>,
    // Bumped by `clear`; folded into every table's generation
    epoch: u64,
}

impl CacheState {
    fn generation(&self, table: &TableId) -> Generation {
        let local = self.generations.get(table).copied().unwrap_or(0);
        Generation(self.epoch.wrapping_add(local))
    }
}

/// Process-local grid cache with lazy expiry.
#[derive(Debug)]
pub struct TtlCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    stats: Arc<BatchStats>,
}

impl TtlCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>, stats: Arc<BatchStats>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            ttl,
            clock,
            stats,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry, counting a hit or a miss.
    ///
    /// An expired entry is removed on the spot and never returned.
    pub fn get(&self, table: &TableId, range: &CellRange) -> Option<Grid> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let entries = &mut state.entries;
        let key = (table.clone(), *range);

        match entries.get(&key) {
            Some(entry) if !entry.is_expired(now) => {
                BatchStats::bump(&self.stats.hits, 1);
                Some(entry.grid.clone())
            }
            Some(_) => {
                entries.remove(&key);
                BatchStats::bump(&self.stats.expirations, 1);
                BatchStats::bump(&self.stats.misses, 1);
                None
            }
            None => {
                BatchStats::bump(&self.stats.misses, 1);
                None
            }
        }
    }

    /// Current invalidation generation of `table`.
    pub fn generation(&self, table: &TableId) -> Generation {
        self.state.lock().generation(table)
    }

    pub fn insert(&self, table: &TableId, range: CellRange, grid: Grid) {
        let mut state = self.state.lock();
        self.store(&mut state, table, range, grid);
    }

    /// Insert only if nothing in `table` was invalidated since `seen`.
    ///
    /// Returns whether the grid was stored.
    pub fn insert_if_current(
        &self,
        table: &TableId,
        range: CellRange,
        grid: Grid,
        seen: Generation,
    ) -> bool {
        let mut state = self.state.lock();
        if state.generation(table) != seen {
            debug!(table = %table, range = %range, "stale read not cached");
            return false;
        }
        self.store(&mut state, table, range, grid);
        true
    }

    fn store(&self, state: &mut CacheState, table: &TableId, range: CellRange, grid: Grid) {
        let entry = CacheEntry {
            grid,
            inserted_at: self.clock.now(),
            ttl: self.ttl,
        };
        state.entries.insert((table.clone(), range), entry);
        BatchStats::bump(&self.stats.insertions, 1);
    }

    /// Evict every entry of `table` whose range shares a cell with `range`.
    ///
    /// Returns the number of entries evicted. The table's generation moves
    /// on even when nothing was evicted, since a read may be in flight.
    pub fn invalidate_intersecting(&self, table: &TableId, range: &CellRange) -> usize {
        let mut state = self.state.lock();
        *state.generations.entry(table.clone()).or_insert(0) += 1;
        let entries = &mut state.entries;
        let before = entries.len();
        entries.retain(|(t, r), _| !(t == table && r.intersects(range)));
        let evicted = before - entries.len();
        if evicted > 0 {
            BatchStats::bump(&self.stats.invalidations, evicted as u64);
            debug!(table = %table, range = %range, evicted, "cache invalidated");
        }
        evicted
    }

    /// Drop all expired entries. Returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let entries = &mut state.entries;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let expired = before - entries.len();
        if expired > 0 {
            BatchStats::bump(&self.stats.expirations, expired as u64);
            debug!(expired, "cache sweep");
        }
        expired
    }

    /// Drop everything. Returns how many entries were held.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        state.epoch = state.epoch.wrapping_add(1);
        let cleared = state.entries.len();
        state.entries.clear();
        BatchStats::bump(&self.stats.invalidations, cleared as u64);
        cleared
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

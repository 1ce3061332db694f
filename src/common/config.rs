//! Configuration for casegrid.
//!
//! Defaults are exposed as constants; [`EngineConfig`] bundles them and
//! offers `with_*` builders for deployment-specific overrides.

use std::time::Duration;

use crate::common::{Error, Result};

/// Default cache entry lifetime.
///
/// Across processes this is also the staleness bound: the cache is
/// process-local and the backend offers no change notification.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Requests per physical call, by operation type.
///
/// Writes are the costliest backend call and get the smallest chunk
/// after deletes.
pub const DEFAULT_READ_CHUNK: usize = 100;
pub const DEFAULT_WRITE_CHUNK: usize = 50;
pub const DEFAULT_UPDATE_CHUNK: usize = 75;
pub const DEFAULT_DELETE_CHUNK: usize = 25;

/// Largest mutation range accepted, in cells.
///
/// Matches the backend's per-sheet cell ceiling; anything larger cannot
/// address real data.
pub const DEFAULT_MAX_RANGE_CELLS: usize = 10_000_000;

/// Minimum spacing between consecutive physical calls.
pub const DEFAULT_INTER_CHUNK_DELAY: Duration = Duration::from_millis(100);

/// Backend short-window quota: at most this many calls per window.
pub const DEFAULT_CALLS_PER_WINDOW: usize = 60;
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Hard ceiling on how long any lock may be held.
pub const DEFAULT_LOCK_MAX_HOLD: Duration = Duration::from_secs(30);

/// How long record mutations wait for a contended lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// How often a waiting `acquire` re-checks the lock.
pub const DEFAULT_LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long an integrity report is served from cache.
pub const DEFAULT_REPORT_TTL: Duration = Duration::from_secs(60);

/// Janitor period for cache sweeps and lock reaping.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Per-operation chunk ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLimits {
    pub read: usize,
    pub write: usize,
    pub update: usize,
    pub delete: usize,
}

impl Default for ChunkLimits {
    fn default() -> Self {
        Self {
            read: DEFAULT_READ_CHUNK,
            write: DEFAULT_WRITE_CHUNK,
            update: DEFAULT_UPDATE_CHUNK,
            delete: DEFAULT_DELETE_CHUNK,
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub cache_ttl: Duration,
    pub chunk_limits: ChunkLimits,
    pub max_range_cells: usize,
    pub inter_chunk_delay: Duration,
    pub calls_per_window: usize,
    pub rate_window: Duration,
    pub lock_max_hold: Duration,
    pub lock_timeout: Duration,
    pub lock_poll_interval: Duration,
    pub report_ttl: Duration,
    /// Background janitor period; `None` disables the janitor thread.
    pub sweep_interval: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            chunk_limits: ChunkLimits::default(),
            max_range_cells: DEFAULT_MAX_RANGE_CELLS,
            inter_chunk_delay: DEFAULT_INTER_CHUNK_DELAY,
            calls_per_window: DEFAULT_CALLS_PER_WINDOW,
            rate_window: DEFAULT_RATE_WINDOW,
            lock_max_hold: DEFAULT_LOCK_MAX_HOLD,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_poll_interval: DEFAULT_LOCK_POLL_INTERVAL,
            report_ttl: DEFAULT_REPORT_TTL,
            sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_chunk_limits(mut self, limits: ChunkLimits) -> Self {
        self.chunk_limits = limits;
        self
    }

    pub fn with_max_range_cells(mut self, cells: usize) -> Self {
        self.max_range_cells = cells;
        self
    }

    pub fn with_inter_chunk_delay(mut self, delay: Duration) -> Self {
        self.inter_chunk_delay = delay;
        self
    }

    pub fn with_rate_window(mut self, calls: usize, window: Duration) -> Self {
        self.calls_per_window = calls;
        self.rate_window = window;
        self
    }

    pub fn with_lock_max_hold(mut self, max_hold: Duration) -> Self {
        self.lock_max_hold = max_hold;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    pub fn with_report_ttl(mut self, ttl: Duration) -> Self {
        self.report_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Option<Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Reject values that would make the engine unusable.
    pub fn validate(&self) -> Result<()> {
        let limits = &self.chunk_limits;
        if limits.read == 0 || limits.write == 0 || limits.update == 0 || limits.delete == 0 {
            return Err(Error::Configuration("chunk limits must be > 0".into()));
        }
        if self.max_range_cells == 0 {
            return Err(Error::Configuration("max_range_cells must be > 0".into()));
        }
        if self.calls_per_window == 0 {
            return Err(Error::Configuration("calls_per_window must be > 0".into()));
        }
        if self.lock_max_hold.is_zero() {
            return Err(Error::Configuration("lock_max_hold must be > 0".into()));
        }
        if self.lock_poll_interval.is_zero() {
            return Err(Error::Configuration("lock_poll_interval must be > 0".into()));
        }
        if matches!(self.sweep_interval, Some(d) if d.is_zero()) {
            return Err(Error::Configuration("sweep_interval must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(config.chunk_limits.write < config.chunk_limits.read);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new()
            .with_cache_ttl(Duration::from_secs(10))
            .with_inter_chunk_delay(Duration::ZERO)
            .with_sweep_interval(None);
        assert_eq!(config.cache_ttl, Duration::from_secs(10));
        assert_eq!(config.inter_chunk_delay, Duration::ZERO);
        assert_eq!(config.sweep_interval, None);
    }

    #[test]
    fn test_validate_rejects_zero_chunks() {
        let config = EngineConfig::new().with_chunk_limits(ChunkLimits {
            read: 0,
            ..ChunkLimits::default()
        });
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_zero_range_cap() {
        let config = EngineConfig::new().with_max_range_cells(0);
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
        assert!(EngineConfig::new().with_max_range_cells(1).validate().is_ok());
    }
}

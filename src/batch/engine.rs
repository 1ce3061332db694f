//! Batch I/O Engine - amortized, rate-limited access to the backend.
//!
//! The [`BatchEngine`] provides:
//! - Read-through TTL caching with coalescing of identical misses
//! - Write/update/delete batching under per-operation chunk ceilings
//! - Self-throttling against the backend's call quota
//! - Per-item outcomes: a failed chunk fails only its own items

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::batch::cache::TtlCache;
use crate::batch::request::{
    BatchResult, DeleteRequest, ItemFailure, ItemResult, ReadRequest, UpdateRequest, WriteRequest,
};
use crate::batch::stats::{BatchStats, CacheStatistics};
use crate::batch::throttle::Throttle;
use crate::common::{BackendError, CellRange, ChunkLimits, Clock, EngineConfig, ErrorKind, TableId};
use crate::storage::{check_shape, CellFormat, Grid, RangeUpdate, TabularBackend};

type Outcome<T> = Option<Result<T, ItemFailure>>;

/// One physical range and the logical requests it serves.
#[derive(Debug)]
struct Pending<P> {
    range: CellRange,
    payload: P,
    indices: Vec<usize>,
}

#[derive(Debug, Clone)]
struct UpdatePayload {
    values: Option<Grid>,
    format: Option<CellFormat>,
}

/// Executes logical batches against a [`TabularBackend`].
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────┐
/// │                       BatchEngine                        │
/// │  requests ─▶ admission ─▶ cache split ─▶ group by table  │
/// │                                   │                      │
/// │                    sort by address, chunk by ceiling     │
/// │                                   │                      │
/// │  ┌──────────┐   ┌──────────┐   ┌──────────────────────┐  │
/// │  │ TtlCache │◀──│ Throttle │──▶│ dyn TabularBackend   │  │
/// │  └──────────┘   └──────────┘   └──────────────────────┘  │
/// └──────────────────────────────────────────────────────────┘
/// ```
///
/// Physical calls run in table order, then address order. Every range a
/// mutation targets is evicted from the cache before the call returns,
/// whether the physical call succeeded or not.
pub struct BatchEngine {
    backend: Arc<dyn TabularBackend>,
    cache: TtlCache,
    throttle: Throttle,
    limits: ChunkLimits,
    max_range_cells: usize,
    stats: Arc<BatchStats>,
}

impl BatchEngine {
    pub fn new(
        backend: Arc<dyn TabularBackend>,
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let stats = Arc::new(BatchStats::new());
        let limits = config.chunk_limits;
        Self {
            backend,
            cache: TtlCache::new(config.cache_ttl, clock.clone(), stats.clone()),
            throttle: Throttle::new(
                config.inter_chunk_delay,
                config.calls_per_window,
                config.rate_window,
                clock,
                stats.clone(),
            ),
            limits: ChunkLimits {
                read: limits.read.max(1),
                write: limits.write.max(1),
                update: limits.update.max(1),
                delete: limits.delete.max(1),
            },
            max_range_cells: config.max_range_cells.max(1),
            stats,
        }
    }

    // ========================================================================
    // Public API: Reads
    // ========================================================================

    /// Read many ranges, serving what it can from the cache.
    ///
    /// Identical misses are fetched once and fanned out. Successful
    /// physical reads populate the cache unless a mutation of the same
    /// table landed while they were in flight.
    pub fn read(&self, requests: &[ReadRequest]) -> BatchResult<Grid> {
        self.read_with(requests, true)
    }

    /// Read many ranges straight from the backend, skipping cache lookups.
    ///
    /// Used where a decision must rest on the backend's current state.
    pub fn read_fresh(&self, requests: &[ReadRequest]) -> BatchResult<Grid> {
        self.read_with(requests, false)
    }

    fn read_with(&self, requests: &[ReadRequest], consult_cache: bool) -> BatchResult<Grid> {
        let mut outcomes: Vec<Outcome<Grid>> = vec![None; requests.len()];
        let mut misses: BTreeMap<TableId, BTreeMap<CellRange, Vec<usize>>> = BTreeMap::new();

        for (index, request) in requests.iter().enumerate() {
            let range = match request.address.parse::<CellRange>() {
                Ok(range) => range,
                Err(err) => {
                    outcomes[index] = Some(Err(ItemFailure::from(&err)));
                    continue;
                }
            };
            let cached = if consult_cache {
                self.cache.get(&request.table, &range)
            } else {
                None
            };
            match cached {
                Some(grid) => outcomes[index] = Some(Ok(grid)),
                None => misses
                    .entry(request.table.clone())
                    .or_default()
                    .entry(range)
                    .or_default()
                    .push(index),
            }
        }

        let mut physical_calls = 0;
        for (table, ranges) in misses {
            let pending: Vec<Pending<()>> = ranges
                .into_iter()
                .map(|(range, indices)| Pending {
                    range,
                    payload: (),
                    indices,
                })
                .collect();

            for chunk in pending.chunks(self.limits.read) {
                let ranges: Vec<CellRange> = chunk.iter().map(|p| p.range).collect();
                physical_calls += 1;
                let generation = self.cache.generation(&table);
                let result = self.call(|| self.backend.batch_get(&table, &ranges)).and_then(|grids| {
                    if grids.len() == ranges.len() {
                        Ok(grids)
                    } else {
                        Err(BackendError::new(
                            "batch_get",
                            table.as_str(),
                            format!("expected {} grids, got {}", ranges.len(), grids.len()),
                        ))
                    }
                });

                match result {
                    Ok(grids) => {
                        debug!(table = %table, ranges = chunk.len(), "batch read");
                        for (pending, grid) in chunk.iter().zip(grids) {
                            self.cache
                                .insert_if_current(&table, pending.range, grid.clone(), generation);
                            for &index in &pending.indices {
                                outcomes[index] = Some(Ok(grid.clone()));
                            }
                        }
                    }
                    Err(err) => {
                        warn!(table = %table, ranges = chunk.len(), error = %err, "batch read chunk failed");
                        Self::fail_chunk(&mut outcomes, chunk, &err);
                    }
                }
            }
        }

        Self::finish(requests.iter().map(|r| (&r.table, &r.address)), outcomes, physical_calls)
    }

    // ========================================================================
    // Public API: Mutations
    // ========================================================================

    /// Overwrite many bounded ranges.
    pub fn write(&self, requests: &[WriteRequest]) -> BatchResult<()> {
        let mut outcomes: Vec<Outcome<()>> = vec![None; requests.len()];
        let mut groups: BTreeMap<TableId, Vec<Pending<Grid>>> = BTreeMap::new();

        for (index, request) in requests.iter().enumerate() {
            let admitted = self.admit_bounded(&request.address).and_then(|range| {
                if request.values.is_empty() {
                    return Err(ItemFailure::validation("empty payload"));
                }
                check_shape(&range, &request.values).map_err(ItemFailure::validation)?;
                Ok(range)
            });
            match admitted {
                Ok(range) => groups.entry(request.table.clone()).or_default().push(Pending {
                    range,
                    payload: request.values.clone(),
                    indices: vec![index],
                }),
                Err(failure) => outcomes[index] = Some(Err(failure)),
            }
        }

        let physical_calls = self.execute(groups, self.limits.write, "write", &mut outcomes, |table, chunk| {
            let writes: Vec<(CellRange, Grid)> =
                chunk.iter().map(|p| (p.range, p.payload.clone())).collect();
            self.backend.batch_write(table, &writes)
        });

        Self::finish(requests.iter().map(|r| (&r.table, &r.address)), outcomes, physical_calls)
    }

    /// Apply values and/or formatting to many bounded ranges.
    ///
    /// Value-only single-row updates that continue each other to the
    /// right are merged into one range; the merged outcome is reported
    /// on every original item.
    pub fn update(&self, requests: &[UpdateRequest]) -> BatchResult<()> {
        let mut outcomes: Vec<Outcome<()>> = vec![None; requests.len()];
        let mut groups: BTreeMap<TableId, Vec<Pending<UpdatePayload>>> = BTreeMap::new();

        for (index, request) in requests.iter().enumerate() {
            let admitted = self.admit_bounded(&request.address).and_then(|range| {
                match (&request.values, &request.format) {
                    (None, None) => Err(ItemFailure::validation("update carries no values or format")),
                    (Some(values), _) if values.is_empty() => {
                        Err(ItemFailure::validation("empty payload"))
                    }
                    (Some(values), _) => {
                        check_shape(&range, values).map_err(ItemFailure::validation)?;
                        Ok(range)
                    }
                    (None, Some(_)) => Ok(range),
                }
            });
            match admitted {
                Ok(range) => groups.entry(request.table.clone()).or_default().push(Pending {
                    range,
                    payload: UpdatePayload {
                        values: request.values.clone(),
                        format: request.format.clone(),
                    },
                    indices: vec![index],
                }),
                Err(failure) => outcomes[index] = Some(Err(failure)),
            }
        }

        let groups: BTreeMap<TableId, Vec<Pending<UpdatePayload>>> = groups
            .into_iter()
            .map(|(table, mut pending)| {
                pending.sort_by_key(|p| (p.range, p.indices[0]));
                (table, Self::merge_adjacent(pending))
            })
            .collect();

        let physical_calls = self.execute(groups, self.limits.update, "update", &mut outcomes, |table, chunk| {
            let updates: Vec<RangeUpdate> = chunk
                .iter()
                .map(|p| RangeUpdate {
                    range: p.range,
                    values: p.payload.values.clone(),
                    format: p.payload.format.clone(),
                })
                .collect();
            self.backend.batch_update(table, &updates)
        });

        Self::finish(requests.iter().map(|r| (&r.table, &r.address)), outcomes, physical_calls)
    }

    /// Clear many bounded ranges.
    pub fn delete(&self, requests: &[DeleteRequest]) -> BatchResult<()> {
        let mut outcomes: Vec<Outcome<()>> = vec![None; requests.len()];
        let mut groups: BTreeMap<TableId, Vec<Pending<()>>> = BTreeMap::new();

        for (index, request) in requests.iter().enumerate() {
            match self.admit_bounded(&request.address) {
                Ok(range) => groups.entry(request.table.clone()).or_default().push(Pending {
                    range,
                    payload: (),
                    indices: vec![index],
                }),
                Err(failure) => outcomes[index] = Some(Err(failure)),
            }
        }

        let physical_calls = self.execute(groups, self.limits.delete, "delete", &mut outcomes, |table, chunk| {
            let ranges: Vec<CellRange> = chunk.iter().map(|p| p.range).collect();
            self.backend.batch_clear(table, &ranges)
        });

        Self::finish(requests.iter().map(|r| (&r.table, &r.address)), outcomes, physical_calls)
    }

    // ========================================================================
    // Public API: Cache administration
    // ========================================================================

    pub fn statistics(&self) -> CacheStatistics {
        self.stats.snapshot(self.cache.len())
    }

    /// Drop every cached entry. Returns how many were dropped.
    pub fn clear_cache(&self) -> usize {
        let cleared = self.cache.clear();
        debug!(cleared, "cache cleared");
        cleared
    }

    /// Drop expired entries. Returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        self.cache.sweep_expired()
    }

    pub fn limits(&self) -> ChunkLimits {
        self.limits
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Throttle, then issue one physical call.
    fn call<T>(&self, f: impl FnOnce() -> Result<T, BackendError>) -> Result<T, BackendError> {
        self.throttle.admit();
        BatchStats::bump(&self.stats.physical_calls, 1);
        f()
    }

    /// Parse a mutation target; open-ended and oversized ranges are rejected.
    fn admit_bounded(&self, address: &str) -> Result<CellRange, ItemFailure> {
        let range = address
            .parse::<CellRange>()
            .map_err(|err| ItemFailure::from(&err))?;
        let Some(height) = range.height() else {
            return Err(ItemFailure::validation(format!(
                "range {} is open-ended",
                range
            )));
        };
        let cells = height.saturating_mul(range.width());
        if cells > self.max_range_cells {
            return Err(ItemFailure::validation(format!(
                "range {} covers {} cells, limit is {}",
                range, cells, self.max_range_cells
            )));
        }
        Ok(range)
    }

    /// Run grouped mutations chunk by chunk, evicting every targeted range.
    ///
    /// Returns the number of physical calls issued.
    fn execute<P>(
        &self,
        groups: BTreeMap<TableId, Vec<Pending<P>>>,
        limit: usize,
        op: &'static str,
        outcomes: &mut [Outcome<()>],
        physical: impl Fn(&TableId, &[Pending<P>]) -> Result<(), BackendError>,
    ) -> usize {
        let mut calls = 0;
        for (table, mut pending) in groups {
            pending.sort_by_key(|p| (p.range, p.indices[0]));

            for chunk in pending.chunks(limit) {
                calls += 1;
                let result = self.call(|| physical(&table, chunk));

                for p in chunk {
                    self.cache.invalidate_intersecting(&table, &p.range);
                }

                match result {
                    Ok(()) => {
                        debug!(table = %table, op, ranges = chunk.len(), "batch mutation");
                        for p in chunk {
                            for &index in &p.indices {
                                outcomes[index] = Some(Ok(()));
                            }
                        }
                    }
                    Err(err) => {
                        warn!(table = %table, op, ranges = chunk.len(), error = %err, "batch chunk failed");
                        Self::fail_chunk(outcomes, chunk, &err);
                    }
                }
            }
        }
        calls
    }

    fn fail_chunk<T, P>(outcomes: &mut [Outcome<T>], chunk: &[Pending<P>], err: &BackendError) {
        let failure = ItemFailure::from(err);
        for p in chunk {
            for &index in &p.indices {
                outcomes[index] = Some(Err(failure.clone()));
            }
        }
    }

    /// Fold sorted value-only updates that continue each other on one row.
    fn merge_adjacent(pending: Vec<Pending<UpdatePayload>>) -> Vec<Pending<UpdatePayload>> {
        let mut merged: Vec<Pending<UpdatePayload>> = Vec::with_capacity(pending.len());
        for next in pending {
            if let Some(last) = merged.last_mut() {
                let both_values_only = last.payload.format.is_none() && next.payload.format.is_none();
                if both_values_only {
                    if let (Some(range), Some(left), Some(right)) = (
                        last.range.merge_right(&next.range),
                        last.payload.values.as_mut(),
                        next.payload.values.as_ref(),
                    ) {
                        if let (Some(left_row), Some(right_row)) = (left.first_mut(), right.first()) {
                            left_row.extend(right_row.iter().cloned());
                            last.range = range;
                            last.indices.extend(next.indices);
                            continue;
                        }
                    }
                }
            }
            merged.push(next);
        }
        merged
    }

    fn finish<'a, T>(
        requests: impl Iterator<Item = (&'a TableId, &'a String)>,
        outcomes: Vec<Outcome<T>>,
        physical_calls: usize,
    ) -> BatchResult<T> {
        let items = requests
            .zip(outcomes)
            .enumerate()
            .map(|(index, ((table, address), outcome))| ItemResult {
                index,
                table: table.clone(),
                address: address.clone(),
                outcome: outcome.unwrap_or_else(|| {
                    Err(ItemFailure::new(ErrorKind::BackendUnavailable, "request was not executed"))
                }),
            })
            .collect();
        BatchResult::from_items(items, physical_calls)
    }
}

impl std::fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEngine")
            .field("cache", &self.cache)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ManualClock;
    use crate::storage::{BackendOp, CellValue, InMemoryBackend};
    use std::time::Duration;

    fn setup(config: EngineConfig) -> (Arc<InMemoryBackend>, Arc<ManualClock>, BatchEngine) {
        let backend = Arc::new(InMemoryBackend::with_tables(["Chat Cases", "Email Cases"]));
        let clock = Arc::new(ManualClock::new());
        let engine = BatchEngine::new(backend.clone(), &config, clock.clone());
        (backend, clock, engine)
    }

    fn row(values: &[&str]) -> Grid {
        vec![values.iter().map(|v| CellValue::from(*v)).collect()]
    }

    #[test]
    fn test_read_coalesces_and_caches() {
        let (backend, _, engine) = setup(EngineConfig::default());
        let requests = vec![
            ReadRequest::new("Chat Cases", "A2"),
            ReadRequest::new("Chat Cases", "A2"),
            ReadRequest::new("Chat Cases", "B2"),
        ];

        let result = engine.read(&requests);
        assert!(result.is_complete());
        assert_eq!(result.physical_calls, 1);
        assert_eq!(backend.calls()[0].ranges.len(), 2);

        let again = engine.read(&requests);
        assert_eq!(again.physical_calls, 0);
        assert_eq!(backend.call_count(BackendOp::Get), 1);
    }

    #[test]
    fn test_read_rejects_malformed_address_only() {
        let (_, _, engine) = setup(EngineConfig::default());
        let result = engine.read(&[
            ReadRequest::new("Chat Cases", "2A"),
            ReadRequest::new("Chat Cases", "A2"),
        ]);
        assert_eq!(result.successful, 1);
        assert_eq!(
            result.items[0].outcome.as_ref().unwrap_err().kind,
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_write_admission() {
        let (backend, _, engine) = setup(EngineConfig::default());
        let result = engine.write(&[
            WriteRequest::new("Chat Cases", "A2:M", row(&["x"])),
            WriteRequest::new("Chat Cases", "A2:B2", row(&["x"])),
            WriteRequest::new("Chat Cases", "A2", Vec::new()),
            WriteRequest::new("Chat Cases", "A2:B2", row(&["x", "y"])),
        ]);
        assert_eq!(result.total, 4);
        assert_eq!(result.successful, 1);
        assert_eq!(result.physical_calls, 1);
        assert!(result.items[3].is_ok());
        assert_eq!(backend.call_count(BackendOp::Write), 1);
    }

    #[test]
    fn test_write_evicts_intersecting_reads() {
        let (backend, _, engine) = setup(EngineConfig::default());
        engine.read(&[ReadRequest::new("Chat Cases", "A2:A")]);

        engine.write(&[WriteRequest::new("Chat Cases", "A2:B2", row(&["C-1", "x"]))]);
        let result = engine.read(&[ReadRequest::new("Chat Cases", "A2:A")]);
        assert_eq!(result.items[0].outcome.as_ref().unwrap(), &row(&["C-1"]));
        assert_eq!(backend.call_count(BackendOp::Get), 2);
    }

    #[test]
    fn test_failed_write_still_evicts() {
        let (backend, _, engine) = setup(EngineConfig::default());
        engine.read(&[ReadRequest::new("Chat Cases", "A2")]);

        backend.fail_next_calls(1);
        let result = engine.write(&[WriteRequest::new("Chat Cases", "A2", row(&["C-1"]))]);
        assert_eq!(result.successful, 0);
        assert_eq!(engine.statistics().entries, 0);
    }

    #[test]
    fn test_update_merges_adjacent_cells() {
        let (backend, _, engine) = setup(EngineConfig::default());
        let result = engine.update(&[
            UpdateRequest::values("Chat Cases", "C2", row(&["c"])),
            UpdateRequest::values("Chat Cases", "A2:B2", row(&["a", "b"])),
            UpdateRequest::values("Chat Cases", "E2", row(&["e"])),
        ]);
        assert!(result.is_complete());

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        let ranges: Vec<String> = calls[0].ranges.iter().map(|r| r.to_string()).collect();
        assert_eq!(ranges, vec!["A2:C2", "E2"]);
        let c2 = "C2".parse::<CellRange>().unwrap().start();
        assert_eq!(backend.cell(&TableId::new("Chat Cases"), c2), CellValue::from("c"));
    }

    #[test]
    fn test_update_format_only() {
        let (backend, _, engine) = setup(EngineConfig::default());
        let format = CellFormat {
            bold: Some(true),
            ..CellFormat::default()
        };
        let result = engine.update(&[
            UpdateRequest::format("Chat Cases", "B3", format.clone()),
            UpdateRequest {
                table: TableId::new("Chat Cases"),
                address: "B4".into(),
                values: None,
                format: None,
            },
        ]);
        assert_eq!(result.successful, 1);
        let cell = "B3".parse::<CellRange>().unwrap().start();
        assert_eq!(backend.format_at(&TableId::new("Chat Cases"), cell), Some(format));
    }

    #[test]
    fn test_delete_chunks_by_table() {
        let config = EngineConfig::default().with_chunk_limits(ChunkLimits {
            delete: 2,
            ..ChunkLimits::default()
        });
        let (backend, _, engine) = setup(config);
        let result = engine.delete(&[
            DeleteRequest::new("Email Cases", "A2"),
            DeleteRequest::new("Chat Cases", "A4"),
            DeleteRequest::new("Chat Cases", "A2"),
            DeleteRequest::new("Chat Cases", "A3"),
        ]);
        assert!(result.is_complete());
        assert_eq!(result.physical_calls, 3);

        let calls = backend.calls();
        assert_eq!(calls[0].table, TableId::new("Chat Cases"));
        assert_eq!(calls[0].ranges.len(), 2);
        assert_eq!(calls[2].table, TableId::new("Email Cases"));
    }

    #[test]
    fn test_oversized_mutations_rejected_before_backend() {
        let config = EngineConfig::default().with_max_range_cells(1_000);
        let (backend, _, engine) = setup(config);
        let format = CellFormat {
            bold: Some(true),
            ..CellFormat::default()
        };

        let updated = engine.update(&[
            UpdateRequest::format("Chat Cases", "A1:Z4000000", format.clone()),
            UpdateRequest::format("Chat Cases", "A1:J100", format),
        ]);
        assert_eq!(updated.successful, 1);
        assert_eq!(
            updated.items[0].outcome.as_ref().unwrap_err().kind,
            ErrorKind::Validation
        );

        let deleted = engine.delete(&[DeleteRequest::new("Chat Cases", "A2:M4000000")]);
        assert_eq!(deleted.successful, 0);
        assert_eq!(deleted.physical_calls, 0);
        assert_eq!(backend.call_count(BackendOp::Clear), 0);
        assert_eq!(backend.call_count(BackendOp::Update), 1);
    }

    #[test]
    fn test_zero_chunk_limits_are_clamped() {
        let config = EngineConfig::default().with_chunk_limits(ChunkLimits {
            read: 0,
            write: 0,
            update: 0,
            delete: 0,
        });
        let (backend, _, engine) = setup(config);
        assert_eq!(engine.limits().read, 1);

        let written = engine.write(&[
            WriteRequest::new("Chat Cases", "A2", row(&["C-1"])),
            WriteRequest::new("Chat Cases", "A3", row(&["C-2"])),
        ]);
        assert!(written.is_complete());
        assert_eq!(written.physical_calls, 2);

        let read = engine.read(&[ReadRequest::new("Chat Cases", "A2:A3")]);
        assert!(read.is_complete());
        assert!(engine.delete(&[DeleteRequest::new("Chat Cases", "A2")]).is_complete());
        assert_eq!(backend.call_count(BackendOp::Write), 2);
    }

    #[test]
    fn test_read_fresh_skips_cached_grid() {
        let (backend, _, engine) = setup(EngineConfig::default());
        engine.read(&[ReadRequest::new("Chat Cases", "A2:A")]);

        // Another process writes behind the cache's back
        let range = "A2".parse::<CellRange>().unwrap();
        backend
            .batch_write(&TableId::new("Chat Cases"), &[(range, row(&["C-9"]))])
            .unwrap();

        let cached = engine.read(&[ReadRequest::new("Chat Cases", "A2:A")]);
        assert!(cached.items[0].outcome.as_ref().unwrap().is_empty());
        let fresh = engine.read_fresh(&[ReadRequest::new("Chat Cases", "A2:A")]);
        assert_eq!(fresh.items[0].outcome.as_ref().unwrap(), &row(&["C-9"]));
        assert_eq!(fresh.physical_calls, 1);
    }

    #[test]
    fn test_calls_are_throttled() {
        let config = EngineConfig::default()
            .with_inter_chunk_delay(Duration::from_millis(100))
            .with_chunk_limits(ChunkLimits {
                read: 1,
                ..ChunkLimits::default()
            });
        let (_, clock, engine) = setup(config);

        engine.read(&[
            ReadRequest::new("Chat Cases", "A2"),
            ReadRequest::new("Chat Cases", "A3"),
            ReadRequest::new("Chat Cases", "A4"),
        ]);
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
        assert_eq!(engine.statistics().throttle_waits, 2);
    }
}

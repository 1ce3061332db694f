//! Integration tests for the batch I/O engine.
//!
//! These tests drive the engine against the in-memory backend and check
//! what actually reaches the physical API.

use casegrid::batch::{BatchEngine, ReadRequest, UpdateRequest, WriteRequest};
use casegrid::common::{CellRange, ChunkLimits, EngineConfig, ManualClock, TableId};
use casegrid::storage::{BackendOp, CellValue, InMemoryBackend};
use casegrid::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

fn setup(config: EngineConfig) -> (Arc<InMemoryBackend>, Arc<ManualClock>, BatchEngine) {
    let backend = Arc::new(InMemoryBackend::with_tables([
        "Email Cases",
        "Chat Cases",
        "Phone Cases",
    ]));
    let clock = Arc::new(ManualClock::new());
    let engine = BatchEngine::new(backend.clone(), &config, clock.clone());
    (backend, clock, engine)
}

fn quiet() -> EngineConfig {
    EngineConfig::default().with_inter_chunk_delay(Duration::ZERO)
}

fn row(values: &[&str]) -> Vec<Vec<CellValue>> {
    vec![values.iter().map(|v| CellValue::from(*v)).collect()]
}

/// N logical writes become ceil(N/M) calls, each at most M ranges, in address order.
#[test]
fn test_write_chunking_and_ordering() {
    let (backend, _, engine) = setup(quiet().with_chunk_limits(ChunkLimits {
        write: 50,
        ..ChunkLimits::default()
    }));

    // Issue in reverse so ordering is the engine's doing
    let requests: Vec<WriteRequest> = (2..122)
        .rev()
        .map(|r| WriteRequest::new("Chat Cases", format!("A{}:B{}", r, r), row(&["C", "x"])))
        .collect();

    let result = engine.write(&requests);
    assert!(result.is_complete());
    assert_eq!(result.total, 120);
    assert_eq!(result.physical_calls, 3);

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    let sizes: Vec<usize> = calls.iter().map(|c| c.ranges.len()).collect();
    assert_eq!(sizes, vec![50, 50, 20]);

    let all: Vec<CellRange> = calls.iter().flat_map(|c| c.ranges.clone()).collect();
    assert!(all.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(all[0].to_string(), "A2:B2");
}

/// One table failing does not take down the other tables' items.
#[test]
fn test_partial_failure_isolation() {
    let (backend, _, engine) = setup(quiet());
    backend.fail_table(&TableId::new("Phone Cases"));

    let result = engine.write(&[
        WriteRequest::new("Email Cases", "A2", row(&["E-1"])),
        WriteRequest::new("Phone Cases", "A2", row(&["P-1"])),
        WriteRequest::new("Chat Cases", "A2", row(&["C-1"])),
    ]);

    assert_eq!(result.total, 3);
    assert_eq!(result.successful, 2);
    assert!(!result.is_complete());

    let failed: Vec<&str> = result.failures().map(|i| i.table.as_str()).collect();
    assert_eq!(failed, vec!["Phone Cases"]);
    assert_eq!(result.first_failure().unwrap().kind, ErrorKind::BackendUnavailable);

    // Results come back in request order
    let indices: Vec<usize> = result.items.iter().map(|i| i.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

/// A read after a write sees the write, never a stale cached grid.
#[test]
fn test_read_your_writes() {
    let (backend, _, engine) = setup(quiet());

    let before = engine.read(&[ReadRequest::new("Email Cases", "A2:B")]);
    assert!(before.items[0].outcome.as_ref().unwrap().is_empty());

    engine.write(&[WriteRequest::new("Email Cases", "A2:B2", row(&["E-1", "2024-01-01"]))]);
    let after = engine.read(&[ReadRequest::new("Email Cases", "A2:B")]);
    let grid = after.items[0].outcome.as_ref().unwrap();
    assert_eq!(grid[0][0], CellValue::from("E-1"));
    assert_eq!(backend.call_count(BackendOp::Get), 2);

    engine.update(&[UpdateRequest::values("Email Cases", "B2", row(&["2024-02-02"]))]);
    let updated = engine.read(&[ReadRequest::new("Email Cases", "A2:B")]);
    assert_eq!(
        updated.items[0].outcome.as_ref().unwrap()[0][1],
        CellValue::from("2024-02-02")
    );
    assert_eq!(backend.call_count(BackendOp::Get), 3);
}

/// Cached reads stay local until the TTL runs out.
#[test]
fn test_ttl_expiry_refetches() {
    let (backend, clock, engine) = setup(quiet().with_cache_ttl(Duration::from_secs(30)));

    engine.read(&[ReadRequest::new("Chat Cases", "A2:M")]);
    engine.read(&[ReadRequest::new("Chat Cases", "A2:M")]);
    assert_eq!(backend.call_count(BackendOp::Get), 1);

    clock.advance(Duration::from_secs(31));
    engine.read(&[ReadRequest::new("Chat Cases", "A2:M")]);
    assert_eq!(backend.call_count(BackendOp::Get), 2);

    let stats = engine.statistics();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.expirations, 1);
}

/// Mixed tables and duplicate ranges in one read.
#[test]
fn test_read_across_tables() {
    let (backend, _, engine) = setup(quiet());
    engine.write(&[
        WriteRequest::new("Email Cases", "A2", row(&["E-1"])),
        WriteRequest::new("Chat Cases", "A2", row(&["C-1"])),
    ]);
    backend.reset_calls();

    let result = engine.read(&[
        ReadRequest::new("Email Cases", "A2"),
        ReadRequest::new("Chat Cases", "A2"),
        ReadRequest::new("Email Cases", "A2"),
        ReadRequest::new("Nowhere", "A2"),
    ]);

    assert_eq!(result.physical_calls, 3);
    assert_eq!(result.successful, 3);
    assert_eq!(
        result.items[2].outcome.as_ref().unwrap()[0][0],
        CellValue::from("E-1")
    );
    assert!(!result.items[3].is_ok());
}

/// Throttling spaces calls out by the configured delay.
#[test]
fn test_inter_chunk_delay_is_observed() {
    let (_, clock, engine) = setup(
        EngineConfig::default()
            .with_inter_chunk_delay(Duration::from_millis(100))
            .with_chunk_limits(ChunkLimits {
                read: 1,
                ..ChunkLimits::default()
            }),
    );

    engine.read(&[
        ReadRequest::new("Chat Cases", "A2"),
        ReadRequest::new("Chat Cases", "B2"),
        ReadRequest::new("Chat Cases", "C2"),
        ReadRequest::new("Chat Cases", "D2"),
    ]);

    assert_eq!(clock.elapsed(), Duration::from_millis(300));
    assert_eq!(engine.statistics().physical_calls, 4);
}

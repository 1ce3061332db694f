//! Record model tests through the public engine surface.

use casegrid::batch::ReadRequest;
use casegrid::common::{BackendError, CellRange, ManualClock, SystemClock};
use casegrid::record::RecordFilter;
use casegrid::schema::CaseStatus;
use casegrid::storage::{FileBackend, Grid, InMemoryBackend, RangeUpdate, TabularBackend};
use casegrid::{CaseEngine, CellValue, EngineConfig, Error, FieldName, SchemaMapper, TableId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn config() -> EngineConfig {
    EngineConfig::default()
        .with_inter_chunk_delay(Duration::ZERO)
        .with_rate_window(10_000, Duration::from_secs(1))
        .with_sweep_interval(None)
}

fn create_engine() -> CaseEngine {
    let mapper = SchemaMapper::standard().unwrap();
    let backend = Arc::new(InMemoryBackend::with_tables(mapper.tables().cloned()));
    let engine =
        CaseEngine::with_mapper(backend, mapper, config(), Arc::new(ManualClock::new())).unwrap();
    engine.initialize_tables().unwrap();
    engine
}

fn fields(pairs: &[(FieldName, &str)]) -> BTreeMap<FieldName, CellValue> {
    pairs.iter().map(|(f, v)| (*f, CellValue::from(*v))).collect()
}

/// Voice tables carry two extra columns and a required caller phone.
#[test]
fn test_voice_table_layout() {
    let engine = create_engine();
    let phone = TableId::new("Phone Cases");

    let missing = engine.create_record(&phone, fields(&[(FieldName::Subject, "No dial tone")]));
    assert!(matches!(missing, Err(Error::Validation { .. })));

    let created = engine
        .create_record(
            &phone,
            fields(&[
                (FieldName::CallerPhone, "+1 555 0100"),
                (FieldName::Subject, "No dial tone"),
            ]),
        )
        .unwrap();
    assert!(created.case_id.starts_with("PH-"));

    let read = engine.read_record(&phone, &created.case_id).unwrap();
    assert_eq!(read.text(FieldName::Subject).as_deref(), Some("No dial tone"));
    assert_eq!(read.text(FieldName::Channel).as_deref(), Some("Phone"));
    assert_eq!(read.status(), Some(CaseStatus::Open));
    assert_eq!(read.derived.row, 2);
}

/// Full lifecycle: create, assign, close, search.
#[test]
fn test_case_lifecycle() {
    let engine = create_engine();
    let chat = TableId::new("Chat Cases");

    let a = engine
        .create_record(
            &chat,
            fields(&[
                (FieldName::CaseId, "CH-1"),
                (FieldName::Subject, "Refund request"),
            ]),
        )
        .unwrap();
    engine
        .create_record(
            &chat,
            fields(&[
                (FieldName::CaseId, "CH-2"),
                (FieldName::Subject, "Login loop"),
            ]),
        )
        .unwrap();

    engine
        .update_record(
            &chat,
            &a.case_id,
            fields(&[
                (FieldName::Status, "Assigned"),
                (FieldName::Assignee, "sam@example.com"),
            ]),
        )
        .unwrap();
    let closed = engine
        .update_record(
            &chat,
            &a.case_id,
            fields(&[
                (FieldName::Status, "Closed"),
                (FieldName::ClosedAt, "2030-01-01T00:00:00Z"),
            ]),
        )
        .unwrap();
    assert!(closed.derived.is_closed);
    assert_eq!(closed.assignee().as_deref(), Some("sam@example.com"));

    let open = engine
        .search_records(&chat, &RecordFilter::new().closed(false), 10, 0)
        .unwrap();
    assert_eq!(open.total_matched, 1);
    assert_eq!(open.records[0].case_id, "CH-2");

    let by_subject = engine
        .search_records(&chat, &RecordFilter::new().contains(FieldName::Subject, "REFUND"), 10, 0)
        .unwrap();
    assert_eq!(by_subject.records[0].case_id, "CH-1");
}

/// Unknown tables and ids surface as typed errors.
#[test]
fn test_error_kinds() {
    let engine = create_engine();

    let unknown = engine.read_record(&TableId::new("Fax Cases"), "X-1");
    assert!(matches!(unknown, Err(Error::UnknownTable(_))));

    let missing = engine.read_record(&TableId::new("Email Cases"), "EM-404");
    assert!(matches!(missing, Err(Error::RecordNotFound { .. })));

    let bad_email = engine.create_record(
        &TableId::new("Email Cases"),
        fields(&[(FieldName::CustomerEmail, "not-an-address")]),
    );
    assert!(matches!(bad_email, Err(Error::Validation { .. })));
}

/// Concurrent creates on one table land on distinct rows.
#[test]
fn test_concurrent_creates_get_distinct_rows() {
    let mapper = SchemaMapper::standard().unwrap();
    let backend = Arc::new(InMemoryBackend::with_tables(mapper.tables().cloned()));
    let engine = Arc::new(
        CaseEngine::with_mapper(backend, mapper, config(), Arc::new(SystemClock)).unwrap(),
    );
    engine.initialize_tables().unwrap();
    let table = TableId::new("Email Cases");

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let table = table.clone();
            thread::spawn(move || {
                for i in 0..5 {
                    let id = format!("EM-{}-{}", t, i);
                    engine
                        .create_record(&table, fields(&[(FieldName::CaseId, id.as_str())]))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let snapshot = engine.scan_table(&table).unwrap();
    assert_eq!(snapshot.records.len(), 20);
    let mut rows: Vec<u32> = snapshot.records.iter().map(|r| r.derived.row).collect();
    rows.sort_unstable();
    rows.dedup();
    assert_eq!(rows.len(), 20);
    assert_eq!(engine.lock_status().held.len(), 0);
}

/// Holds one read of a chosen range after it has fetched its grid, so a
/// test can land mutations between the fetch and its return.
struct StallingBackend {
    inner: InMemoryBackend,
    gate: Mutex<Option<(CellRange, Sender<()>, Receiver<()>)>>,
}

impl StallingBackend {
    fn arm(&self, range: CellRange) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock() = Some((range, entered_tx, release_rx));
        (entered_rx, release_tx)
    }
}

impl TabularBackend for StallingBackend {
    fn batch_get(&self, table: &TableId, ranges: &[CellRange]) -> Result<Vec<Grid>, BackendError> {
        let grids = self.inner.batch_get(table, ranges)?;
        let gate = {
            let mut gate = self.gate.lock();
            match gate.as_ref() {
                Some((range, _, _)) if ranges.contains(range) => gate.take(),
                _ => None,
            }
        };
        if let Some((_, entered, release)) = gate {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        Ok(grids)
    }

    fn batch_write(&self, table: &TableId, writes: &[(CellRange, Grid)]) -> Result<(), BackendError> {
        self.inner.batch_write(table, writes)
    }

    fn batch_update(&self, table: &TableId, updates: &[RangeUpdate]) -> Result<(), BackendError> {
        self.inner.batch_update(table, updates)
    }

    fn batch_clear(&self, table: &TableId, ranges: &[CellRange]) -> Result<(), BackendError> {
        self.inner.batch_clear(table, ranges)
    }
}

/// A read that was in flight across a create must not hide that create
/// from the next one.
#[test]
fn test_create_after_interleaved_read_keeps_earlier_case() {
    let mapper = SchemaMapper::standard().unwrap();
    let backend = Arc::new(StallingBackend {
        inner: InMemoryBackend::with_tables(mapper.tables().cloned()),
        gate: Mutex::new(None),
    });
    let engine = Arc::new(
        CaseEngine::with_mapper(backend.clone(), mapper, config(), Arc::new(ManualClock::new()))
            .unwrap(),
    );
    engine.initialize_tables().unwrap();
    let table = TableId::new("Email Cases");
    engine
        .create_record(&table, fields(&[(FieldName::CaseId, "C-1")]))
        .unwrap();

    let data_range = engine.mapper().descriptor(&table).unwrap().data_range();
    let (entered, release) = backend.arm(data_range);
    let reader = {
        let engine = Arc::clone(&engine);
        let table = table.clone();
        thread::spawn(move || {
            engine
                .batch()
                .read(&[ReadRequest::new(table, data_range.to_string())])
        })
    };

    // The reader holds a grid with only C-1 while C-2 is appended
    entered.recv().unwrap();
    let second = engine
        .create_record(&table, fields(&[(FieldName::CaseId, "C-2")]))
        .unwrap();
    release.send(()).unwrap();
    let stale = reader.join().unwrap();
    assert_eq!(stale.items[0].outcome.as_ref().unwrap().len(), 1);

    let third = engine
        .create_record(&table, fields(&[(FieldName::CaseId, "C-3")]))
        .unwrap();
    assert_eq!(second.derived.row, 3);
    assert_eq!(third.derived.row, 4);
    assert_eq!(engine.read_record(&table, "C-2").unwrap().derived.row, 3);
    assert_eq!(engine.scan_table(&table).unwrap().records.len(), 3);
}

/// Cases survive an engine restart over the file backend.
#[test]
fn test_file_backend_persistence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cases.wb");
    let tables: Vec<TableId> = SchemaMapper::standard().unwrap().tables().cloned().collect();
    let table = TableId::new("Web Form Cases");

    {
        let backend = Arc::new(FileBackend::create(&path, tables.clone()).unwrap());
        let engine = CaseEngine::new(backend, config()).unwrap();
        engine.initialize_tables().unwrap();
        engine
            .create_record(
                &table,
                fields(&[
                    (FieldName::CaseId, "WF-7"),
                    (FieldName::Subject, "Broken form"),
                ]),
            )
            .unwrap();
        engine.shutdown();
    }

    {
        let backend = Arc::new(FileBackend::open(&path).unwrap());
        let engine = CaseEngine::new(backend, config()).unwrap();
        let record = engine.read_record(&table, "WF-7").unwrap();
        assert_eq!(record.text(FieldName::Subject).as_deref(), Some("Broken form"));
        assert_eq!(record.text(FieldName::Channel).as_deref(), Some("Web Form"));
    }
}

//! CaseEngine - the per-process entry point owning every component.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::batch::{BatchEngine, CacheStatistics};
use crate::common::{Clock, EngineConfig, Error, Result, SystemClock, TableId};
use crate::integrity::{IntegrityChecker, IntegrityOptions, IntegrityReport};
use crate::lock::{LockCoordinator, LockStatus};
use crate::record::{Record, RecordFilter, RecordModel, SearchPage, TableSnapshot};
use crate::schema::{FieldName, SchemaMapper};
use crate::storage::{CellValue, TabularBackend};

/// What one maintenance sweep removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepOutcome {
    pub expired_entries: usize,
    pub reaped_locks: usize,
}

struct Janitor {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// An explicit engine instance: schema, batch I/O, locks, records and
/// integrity checking over one backend.
///
/// # Architecture
/// ```text
/// ┌────────────────────────────────────────────────────────────┐
/// │                         CaseEngine                         │
/// │  ┌──────────────┐        ┌───────────────────────────────┐ │
/// │  │ RecordModel  │───────▶│ SchemaMapper (descriptors)    │ │
/// │  │              │───────▶│ LockCoordinator (named locks) │ │
/// │  │              │───────▶│ BatchEngine ─▶ TabularBackend │ │
/// │  └──────▲───────┘        └───────────────────────────────┘ │
/// │  ┌──────┴───────────┐    ┌───────────────────────────────┐ │
/// │  │ IntegrityChecker │    │ janitor thread (optional)     │ │
/// │  └──────────────────┘    └───────────────────────────────┘ │
/// └────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// Every component synchronizes internally with `parking_lot` locks, so
/// a `CaseEngine` may be shared behind an `Arc`. The janitor, when
/// enabled, periodically sweeps expired cache entries and reaps locks
/// past their hard ceiling.
///
/// # Usage
/// ```ignore
/// let backend = Arc::new(InMemoryBackend::with_tables(["Chat Cases"]));
/// let engine = CaseEngine::new(backend, EngineConfig::default())?;
/// engine.initialize_tables()?;
///
/// let case = engine.create_record(&"Chat Cases".into(), BTreeMap::new())?;
/// let report = engine.run_integrity_check(&IntegrityOptions::default())?;
/// engine.shutdown();
/// ```
pub struct CaseEngine {
    mapper: Arc<SchemaMapper>,
    batch: Arc<BatchEngine>,
    locks: Arc<LockCoordinator>,
    records: RecordModel,
    checker: IntegrityChecker,
    janitor: Mutex<Option<Janitor>>,
    shut_down: AtomicBool,
}

impl CaseEngine {
    /// Engine over the six standard tables, on the system clock.
    ///
    /// # Errors
    /// `Error::Configuration` if `config` fails validation.
    pub fn new(backend: Arc<dyn TabularBackend>, config: EngineConfig) -> Result<Self> {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        backend: Arc<dyn TabularBackend>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::with_mapper(backend, SchemaMapper::standard()?, config, clock)
    }

    /// Engine over custom table descriptors.
    pub fn with_mapper(
        backend: Arc<dyn TabularBackend>,
        mapper: SchemaMapper,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let mapper = Arc::new(mapper);
        let batch = Arc::new(BatchEngine::new(backend, &config, clock.clone()));
        let locks = Arc::new(LockCoordinator::new(&config, clock.clone()));
        let records = RecordModel::new(
            mapper.clone(),
            batch.clone(),
            locks.clone(),
            clock.clone(),
            config.lock_timeout,
        );
        let checker = IntegrityChecker::new(clock, config.report_ttl);

        let janitor = config
            .sweep_interval
            .map(|interval| Self::spawn_janitor(interval, batch.clone(), locks.clone()))
            .transpose()?;

        info!(
            tables = mapper.tables().count(),
            janitor = janitor.is_some(),
            "case engine started"
        );

        Ok(Self {
            mapper,
            batch,
            locks,
            records,
            checker,
            janitor: Mutex::new(janitor),
            shut_down: AtomicBool::new(false),
        })
    }

    // ========================================================================
    // Public API: Records
    // ========================================================================

    pub fn create_record(
        &self,
        table: &TableId,
        fields: BTreeMap<FieldName, CellValue>,
    ) -> Result<Record> {
        self.ensure_running()?;
        self.records.create_record(table, fields)
    }

    pub fn read_record(&self, table: &TableId, case_id: &str) -> Result<Record> {
        self.ensure_running()?;
        self.records.read_record(table, case_id)
    }

    pub fn update_record(
        &self,
        table: &TableId,
        case_id: &str,
        fields: BTreeMap<FieldName, CellValue>,
    ) -> Result<Record> {
        self.ensure_running()?;
        self.records.update_record(table, case_id, fields)
    }

    pub fn search_records(
        &self,
        table: &TableId,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage> {
        self.ensure_running()?;
        self.records.search_records(table, filter, limit, offset)
    }

    pub fn scan_table(&self, table: &TableId) -> Result<TableSnapshot> {
        self.ensure_running()?;
        self.records.scan_table(table)
    }

    // ========================================================================
    // Public API: Integrity
    // ========================================================================

    pub fn run_integrity_check(&self, options: &IntegrityOptions) -> Result<IntegrityReport> {
        self.ensure_running()?;
        self.checker.run(&self.records, options)
    }

    // ========================================================================
    // Public API: Administration
    // ========================================================================

    pub fn lock_status(&self) -> LockStatus {
        self.locks.status()
    }

    pub fn cache_statistics(&self) -> CacheStatistics {
        self.batch.statistics()
    }

    /// Drop every cached grid and the cached integrity report.
    ///
    /// Returns the number of grid entries dropped.
    pub fn clear_cache(&self) -> usize {
        self.checker.invalidate();
        let cleared = self.batch.clear_cache();
        info!(cleared, "caches cleared");
        cleared
    }

    /// Write the header row of every table.
    pub fn initialize_tables(&self) -> Result<usize> {
        self.ensure_running()?;
        self.records.initialize_tables()
    }

    /// One janitor pass, run inline.
    pub fn sweep(&self) -> SweepOutcome {
        Self::sweep_once(&self.batch, &self.locks)
    }

    pub fn mapper(&self) -> &SchemaMapper {
        &self.mapper
    }

    pub fn records(&self) -> &RecordModel {
        &self.records
    }

    pub fn locks(&self) -> &LockCoordinator {
        &self.locks
    }

    pub fn batch(&self) -> &BatchEngine {
        &self.batch
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Stop the janitor and refuse further record operations.
    ///
    /// Idempotent. Administrative views keep working.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(janitor) = self.janitor.lock().take() {
            // A send error means the thread already exited
            let _ = janitor.stop.send(());
            if janitor.handle.join().is_err() {
                warn!("janitor thread panicked");
            }
        }
        info!("case engine shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            Err(Error::ShutDown)
        } else {
            Ok(())
        }
    }

    fn sweep_once(batch: &BatchEngine, locks: &LockCoordinator) -> SweepOutcome {
        let outcome = SweepOutcome {
            expired_entries: batch.sweep_expired(),
            reaped_locks: locks.reap_expired(),
        };
        if outcome != SweepOutcome::default() {
            debug!(
                expired = outcome.expired_entries,
                reaped = outcome.reaped_locks,
                "janitor sweep"
            );
        }
        outcome
    }

    fn spawn_janitor(
        interval: Duration,
        batch: Arc<BatchEngine>,
        locks: Arc<LockCoordinator>,
    ) -> Result<Janitor> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("casegrid-janitor".into())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        Self::sweep_once(&batch, &locks);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        Ok(Janitor { stop, handle })
    }
}

impl Drop for CaseEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for CaseEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseEngine")
            .field("tables", &self.mapper.tables().collect::<Vec<_>>())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

//! In-memory backend with a call log and failure injection.
//!
//! Every physical call is recorded, which lets tests assert on call
//! counts, chunk sizes and ordering. Failures can be injected per table
//! or for the next N calls to exercise partial-failure handling.

use std::collections::HashSet;

use parking_lot::{Mutex, RwLock};

use crate::common::{BackendError, CellRange, CellRef, TableId};
use crate::storage::backend::{CellFormat, CellValue, Grid, RangeUpdate, TabularBackend};
use crate::storage::workbook::Workbook;

/// Kind of physical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOp {
    Get,
    Write,
    Update,
    Clear,
}

/// One recorded physical call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub op: BackendOp,
    pub table: TableId,
    pub ranges: Vec<CellRange>,
    pub failed: bool,
}

#[derive(Debug, Default)]
struct FailurePlan {
    tables: HashSet<TableId>,
    next_calls: usize,
}

/// A backend holding the whole workbook in memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    workbook: RwLock<Workbook>,
    calls: Mutex<Vec<CallRecord>>,
    failures: Mutex<FailurePlan>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend with an empty sheet for each table.
    pub fn with_tables<I, T>(tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TableId>,
    {
        let backend = Self::new();
        for table in tables {
            backend.add_table(&table.into());
        }
        backend
    }

    pub fn add_table(&self, table: &TableId) {
        self.workbook.write().add_sheet(table);
    }

    /// Make every call against `table` fail until healed.
    pub fn fail_table(&self, table: &TableId) {
        self.failures.lock().tables.insert(table.clone());
    }

    pub fn heal_table(&self, table: &TableId) {
        self.failures.lock().tables.remove(table);
    }

    /// Make the next `n` calls fail regardless of table.
    pub fn fail_next_calls(&self, n: usize) {
        self.failures.lock().next_calls = n;
    }

    /// All calls so far, in issue order.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, op: BackendOp) -> usize {
        self.calls.lock().iter().filter(|c| c.op == op).count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    /// Peek at a cell without going through the call log.
    pub fn cell(&self, table: &TableId, cell: CellRef) -> CellValue {
        self.workbook
            .read()
            .sheet("peek", table)
            .map(|s| s.cell(cell))
            .unwrap_or_default()
    }

    pub fn format_at(&self, table: &TableId, cell: CellRef) -> Option<CellFormat> {
        self.workbook
            .read()
            .sheet("peek", table)
            .ok()
            .and_then(|s| s.format(cell).cloned())
    }

    /// Record the call and decide whether it must fail.
    fn begin(
        &self,
        op: BackendOp,
        name: &'static str,
        table: &TableId,
        ranges: Vec<CellRange>,
    ) -> Result<(), BackendError> {
        let fail = {
            let mut plan = self.failures.lock();
            if plan.next_calls > 0 {
                plan.next_calls -= 1;
                true
            } else {
                plan.tables.contains(table)
            }
        };

        self.calls.lock().push(CallRecord {
            op,
            table: table.clone(),
            ranges,
            failed: fail,
        });

        if fail {
            Err(BackendError::new(name, table.as_str(), "service unavailable"))
        } else {
            Ok(())
        }
    }
}

impl TabularBackend for InMemoryBackend {
    fn batch_get(&self, table: &TableId, ranges: &[CellRange]) -> Result<Vec<Grid>, BackendError> {
        self.begin(BackendOp::Get, "batch_get", table, ranges.to_vec())?;
        self.workbook.read().get(table, ranges)
    }

    fn batch_write(&self, table: &TableId, writes: &[(CellRange, Grid)]) -> Result<(), BackendError> {
        let ranges = writes.iter().map(|(r, _)| *r).collect();
        self.begin(BackendOp::Write, "batch_write", table, ranges)?;
        self.workbook.write().write(table, writes)
    }

    fn batch_update(&self, table: &TableId, updates: &[RangeUpdate]) -> Result<(), BackendError> {
        let ranges = updates.iter().map(|u| u.range).collect();
        self.begin(BackendOp::Update, "batch_update", table, ranges)?;
        self.workbook.write().update(table, updates)
    }

    fn batch_clear(&self, table: &TableId, ranges: &[CellRange]) -> Result<(), BackendError> {
        self.begin(BackendOp::Clear, "batch_clear", table, ranges.to_vec())?;
        self.workbook.write().clear(table, ranges)
    }
}

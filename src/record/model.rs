//! Record Model - case-level operations composed from the lower layers.
//!
//! Fields resolve through the [`SchemaMapper`], multi-step mutations run
//! under the [`LockCoordinator`], and every physical read and write goes
//! through the [`BatchEngine`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use crate::batch::{BatchEngine, ItemResult, ReadRequest, UpdateRequest, WriteRequest};
use crate::common::{CellRange, Clock, Error, Result, TableId};
use crate::lock::{case_create_key, case_update_key, LockCoordinator};
use crate::record::filter::{RecordFilter, SearchPage};
use crate::record::row::Record;
use crate::schema::{
    CaseStatus, FieldName, SchemaMapper, TableDescriptor, FIRST_DATA_ROW, HEADER_ROW,
};
use crate::storage::{CellValue, Grid};

/// Header plus every data record of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    pub table: TableId,
    pub header: Vec<CellValue>,
    pub records: Vec<Record>,
}

/// Create/read/update/search over the case tables.
#[derive(Debug)]
pub struct RecordModel {
    mapper: Arc<SchemaMapper>,
    batch: Arc<BatchEngine>,
    locks: Arc<LockCoordinator>,
    clock: Arc<dyn Clock>,
    lock_timeout: Duration,
}

impl RecordModel {
    pub fn new(
        mapper: Arc<SchemaMapper>,
        batch: Arc<BatchEngine>,
        locks: Arc<LockCoordinator>,
        clock: Arc<dyn Clock>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            mapper,
            batch,
            locks,
            clock,
            lock_timeout,
        }
    }

    pub fn mapper(&self) -> &SchemaMapper {
        &self.mapper
    }

    // ========================================================================
    // Public API: Records
    // ========================================================================

    /// Append a new case to `table`.
    ///
    /// Missing `OpenedAt`, `Channel`, `Status` and `CaseId` are filled in
    /// with the current time, the table's channel, `Open` and a generated
    /// `{prefix}-{hex}` id.
    ///
    /// # Errors
    /// - `Error::Validation` if a value fails its field checks
    /// - `Error::DuplicateCase` if the id already exists in this table
    /// - `Error::LockTimeout` if the table's create lock is contended
    pub fn create_record(
        &self,
        table: &TableId,
        fields: BTreeMap<FieldName, CellValue>,
    ) -> Result<Record> {
        let descriptor = self.mapper.descriptor(table)?.clone();
        let fields = self.with_defaults(&descriptor, fields);
        self.mapper.validate_fields(table, &fields)?;
        Self::check_required(&descriptor, &fields)?;

        let case_id = fields
            .get(&FieldName::CaseId)
            .map(|v| v.render().trim().to_string())
            .unwrap_or_default();

        self.locks
            .with_lock(&case_create_key(table), self.lock_timeout, || {
                // The cache may predate another creator's append
                let data = self.read_one_fresh(table, descriptor.data_range())?;
                let id_index = Self::case_id_index(&descriptor)?;
                let taken = data.iter().any(|row| {
                    row.get(id_index)
                        .is_some_and(|v| v.render().trim() == case_id)
                });
                if taken {
                    return Err(Error::DuplicateCase {
                        table: table.clone(),
                        case_id: case_id.clone(),
                    });
                }

                let row = FIRST_DATA_ROW + data.len() as u32;
                let record = Record::from_fields(table.clone(), row, fields.clone())
                    .ok_or_else(|| Error::validation(FieldName::CaseId.display_name(), "empty"))?;

                let range = descriptor.row_range(row);
                let result = self.batch.write(&[WriteRequest::new(
                    table.clone(),
                    range.to_string(),
                    vec![record.to_row(&descriptor)],
                )]);
                Self::first_error(result.items, "batch_write")?;

                info!(table = %table, case_id = %record.case_id, row, "case created");
                Ok(record)
            })
    }

    /// Look up a case by id.
    ///
    /// # Errors
    /// `Error::RecordNotFound` if no row of `table` carries `case_id`.
    pub fn read_record(&self, table: &TableId, case_id: &str) -> Result<Record> {
        let descriptor = self.mapper.descriptor(table)?.clone();
        let row = self.locate(&descriptor, case_id)?;
        self.read_row(&descriptor, row)?
            .ok_or_else(|| Error::RecordNotFound {
                table: table.clone(),
                case_id: case_id.to_string(),
            })
    }

    /// Change some fields of a case under its update lock.
    ///
    /// Only cells whose value actually changes are written. The case id
    /// itself cannot be changed.
    pub fn update_record(
        &self,
        table: &TableId,
        case_id: &str,
        fields: BTreeMap<FieldName, CellValue>,
    ) -> Result<Record> {
        let descriptor = self.mapper.descriptor(table)?.clone();
        self.mapper.validate_fields(table, &fields)?;
        if let Some(id) = fields.get(&FieldName::CaseId) {
            if id.render().trim() != case_id {
                return Err(Error::validation(
                    FieldName::CaseId.display_name(),
                    "case id cannot be changed",
                ));
            }
        }

        self.locks
            .with_lock(&case_update_key(case_id), self.lock_timeout, || {
                let row = self.locate(&descriptor, case_id)?;
                let mut record = self.read_row(&descriptor, row)?.ok_or_else(|| {
                    Error::RecordNotFound {
                        table: table.clone(),
                        case_id: case_id.to_string(),
                    }
                })?;

                let mut requests = Vec::new();
                for (field, value) in fields {
                    if record.get(field) == &value {
                        continue;
                    }
                    if let Some(column) = descriptor.column(field) {
                        let cell = CellRange::cell(column, row);
                        requests.push(UpdateRequest::values(
                            table.clone(),
                            cell.to_string(),
                            vec![vec![value.clone()]],
                        ));
                    }
                    record.fields.insert(field, value);
                }
                record.refresh_derived();

                if requests.is_empty() {
                    debug!(table = %table, case_id, "update is a no-op");
                    return Ok(record);
                }

                let result = self.batch.update(&requests);
                Self::first_error(result.items, "batch_update")?;

                info!(table = %table, case_id, cells = requests.len(), "case updated");
                Ok(record)
            })
    }

    /// Filter the table's records and return one page.
    pub fn search_records(
        &self,
        table: &TableId,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Result<SearchPage> {
        let snapshot = self.scan_table(table)?;
        let matched: Vec<Record> = snapshot
            .records
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        let total_matched = matched.len();
        let records = matched.into_iter().skip(offset).take(limit).collect();

        Ok(SearchPage {
            records,
            total_matched,
            offset,
            limit,
        })
    }

    /// Header row and all records of a table, in one batch read.
    pub fn scan_table(&self, table: &TableId) -> Result<TableSnapshot> {
        let descriptor = self.mapper.descriptor(table)?.clone();
        let result = self.batch.read(&[
            ReadRequest::new(table.clone(), descriptor.row_range(HEADER_ROW).to_string()),
            ReadRequest::new(table.clone(), descriptor.data_range().to_string()),
        ]);

        let mut grids = Vec::with_capacity(2);
        for item in result.items {
            grids.push(item.into_result("batch_get")?);
        }
        let data = grids.pop().unwrap_or_default();
        let header = grids.pop().and_then(|g| g.into_iter().next()).unwrap_or_default();

        let records = data
            .iter()
            .enumerate()
            .filter_map(|(i, cells)| Record::from_row(&descriptor, FIRST_DATA_ROW + i as u32, cells))
            .collect();

        Ok(TableSnapshot {
            table: table.clone(),
            header,
            records,
        })
    }

    /// Write the header row of every registered table.
    ///
    /// Returns the number of tables initialized.
    pub fn initialize_tables(&self) -> Result<usize> {
        let requests: Vec<WriteRequest> = self
            .mapper
            .descriptors()
            .map(|d| {
                WriteRequest::new(
                    d.table_id().clone(),
                    d.row_range(HEADER_ROW).to_string(),
                    vec![d.header_row()],
                )
            })
            .collect();

        let result = self.batch.write(&requests);
        let written = result.successful;
        Self::first_error(result.items, "batch_write")?;
        info!(tables = written, "header rows written");
        Ok(written)
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn with_defaults(
        &self,
        descriptor: &TableDescriptor,
        mut fields: BTreeMap<FieldName, CellValue>,
    ) -> BTreeMap<FieldName, CellValue> {
        let mut fill = |field: FieldName, value: CellValue| {
            if descriptor.has_field(field) && fields.get(&field).map_or(true, |v| v.is_empty()) {
                fields.insert(field, value);
            }
        };

        let case_id = format!(
            "{}-{}",
            descriptor.case_prefix(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        fill(FieldName::CaseId, case_id.into());
        fill(FieldName::OpenedAt, self.clock.utc_now().to_rfc3339().into());
        fill(FieldName::Channel, descriptor.channel().label().into());
        fill(FieldName::Status, CaseStatus::Open.label().into());
        fields
    }

    fn check_required(
        descriptor: &TableDescriptor,
        fields: &BTreeMap<FieldName, CellValue>,
    ) -> Result<()> {
        let missing: Vec<&str> = descriptor
            .required_fields()
            .iter()
            .filter(|f| fields.get(f).map_or(true, |v| v.is_empty()))
            .map(|f| f.display_name())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::validation(missing.join(", "), "required field is missing"))
        }
    }

    fn case_id_index(descriptor: &TableDescriptor) -> Result<usize> {
        descriptor
            .column(FieldName::CaseId)
            .map(|c| c.index() as usize)
            .ok_or_else(|| {
                Error::Configuration(format!("table '{}' has no case id column", descriptor.table_id()))
            })
    }

    /// Physical row of `case_id`, from the cached case id column.
    fn locate(&self, descriptor: &TableDescriptor, case_id: &str) -> Result<u32> {
        let table = descriptor.table_id();
        let range = descriptor.case_id_range().ok_or_else(|| {
            Error::Configuration(format!("table '{}' has no case id column", table))
        })?;
        let ids = self.read_one(table, range)?;
        let needle = case_id.trim();

        ids.iter()
            .position(|row| row.first().is_some_and(|v| v.render().trim() == needle))
            .map(|i| FIRST_DATA_ROW + i as u32)
            .ok_or_else(|| Error::RecordNotFound {
                table: table.clone(),
                case_id: case_id.to_string(),
            })
    }

    fn read_row(&self, descriptor: &TableDescriptor, row: u32) -> Result<Option<Record>> {
        let grid = self.read_one(descriptor.table_id(), descriptor.row_range(row))?;
        let cells = grid.into_iter().next().unwrap_or_default();
        Ok(Record::from_row(descriptor, row, &cells))
    }

    fn read_one(&self, table: &TableId, range: CellRange) -> Result<Grid> {
        let result = self.batch.read(&[ReadRequest::new(table.clone(), range.to_string())]);
        match result.items.into_iter().next() {
            Some(item) => item.into_result("batch_get"),
            None => Ok(Grid::new()),
        }
    }

    fn read_one_fresh(&self, table: &TableId, range: CellRange) -> Result<Grid> {
        let result = self
            .batch
            .read_fresh(&[ReadRequest::new(table.clone(), range.to_string())]);
        match result.items.into_iter().next() {
            Some(item) => item.into_result("batch_get"),
            None => Ok(Grid::new()),
        }
    }

    fn first_error<T>(items: Vec<ItemResult<T>>, operation: &'static str) -> Result<()> {
        for item in items {
            item.into_result(operation)?;
        }
        Ok(())
    }
}

//! Storage layer - the physical tabular backend.
//!
//! This module handles persistent storage:
//! - [`TabularBackend`] - The rate-limited physical API every read and
//!   write ultimately goes through
//! - [`InMemoryBackend`] - Workbook in memory, with call log and failure
//!   injection
//! - [`FileBackend`] - Workbook persisted to a checksummed file

mod backend;
mod file;
mod memory;
mod workbook;

pub use backend::{CellFormat, CellValue, Grid, RangeUpdate, TabularBackend};
pub use file::FileBackend;
pub use memory::{BackendOp, CallRecord, InMemoryBackend};
pub use workbook::{check_shape, Sheet, Workbook};

//! Common types and utilities shared across casegrid.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`EngineConfig`]
//! - Error types
//! - Identifiers (TableId, ColumnRef) and A1 addresses
//! - The [`Clock`] abstraction

mod address;
pub mod clock;
mod column;
pub mod config;
pub mod error;
mod table_id;

pub use address::{CellRange, CellRef};
pub use clock::{Clock, ManualClock, SystemClock};
pub use column::{ColumnRef, MAX_COLUMNS};
pub use config::{ChunkLimits, EngineConfig};
pub use error::{BackendError, Error, ErrorKind, LockTimeout, Result};
pub use table_id::TableId;

//! Record-level access to support cases.
//!
//! - [`RecordModel`] - create/read/update/search, plus full-table scans
//! - [`Record`] - one case as stored in one table
//! - [`RecordFilter`] / [`SearchPage`] - search predicates and paging

mod filter;
mod model;
mod row;

pub use filter::{RecordFilter, SearchPage};
pub use model::{RecordModel, TableSnapshot};
pub use row::{DerivedFields, Record};

//! Logical requests and per-item batch outcomes.

use std::fmt;

use crate::common::{BackendError, Error, ErrorKind, TableId};
use crate::storage::{CellFormat, Grid};

/// Read one range.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub table: TableId,
    pub address: String,
}

impl ReadRequest {
    pub fn new(table: impl Into<TableId>, address: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            address: address.into(),
        }
    }
}

/// Overwrite one bounded range with `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub table: TableId,
    pub address: String,
    pub values: Grid,
}

impl WriteRequest {
    pub fn new(table: impl Into<TableId>, address: impl Into<String>, values: Grid) -> Self {
        Self {
            table: table.into(),
            address: address.into(),
            values,
        }
    }
}

/// Set values and/or formatting on one bounded range.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub table: TableId,
    pub address: String,
    pub values: Option<Grid>,
    pub format: Option<CellFormat>,
}

impl UpdateRequest {
    pub fn values(table: impl Into<TableId>, address: impl Into<String>, values: Grid) -> Self {
        Self {
            table: table.into(),
            address: address.into(),
            values: Some(values),
            format: None,
        }
    }

    pub fn format(
        table: impl Into<TableId>,
        address: impl Into<String>,
        format: CellFormat,
    ) -> Self {
        Self {
            table: table.into(),
            address: address.into(),
            values: None,
            format: Some(format),
        }
    }

    pub fn with_format(mut self, format: CellFormat) -> Self {
        self.format = Some(format);
        self
    }
}

/// Clear one bounded range.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub table: TableId,
    pub address: String,
}

impl DeleteRequest {
    pub fn new(table: impl Into<TableId>, address: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            address: address.into(),
        }
    }
}

/// Why one item of a batch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl ItemFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }
}

impl From<&Error> for ItemFailure {
    fn from(err: &Error) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<&BackendError> for ItemFailure {
    fn from(err: &BackendError) -> Self {
        Self::new(ErrorKind::BackendUnavailable, err.to_string())
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Outcome of one logical request.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult<T> {
    /// Position of the request in the submitted batch.
    pub index: usize,
    pub table: TableId,
    pub address: String,
    pub outcome: Result<T, ItemFailure>,
}

impl<T> ItemResult<T> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Lift the outcome into the crate error type.
    ///
    /// Admission failures become validation errors on the address; every
    /// other failure is reported as a backend error for `operation`.
    pub fn into_result(self, operation: &'static str) -> crate::common::Result<T> {
        match self.outcome {
            Ok(value) => Ok(value),
            Err(failure) if failure.kind == ErrorKind::Validation => {
                Err(Error::validation(self.address, failure.message))
            }
            Err(failure) => Err(Error::Backend(BackendError::new(
                operation,
                self.table.as_str(),
                failure.message,
            ))),
        }
    }
}

/// Per-item outcomes of a batch, in submission order.
///
/// Batches never fail as a whole; every failure is attached to the
/// items it affected.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult<T> {
    pub items: Vec<ItemResult<T>>,
    pub successful: usize,
    pub total: usize,
    pub physical_calls: usize,
}

impl<T> BatchResult<T> {
    pub(crate) fn from_items(mut items: Vec<ItemResult<T>>, physical_calls: usize) -> Self {
        items.sort_by_key(|item| item.index);
        let successful = items.iter().filter(|item| item.is_ok()).count();
        let total = items.len();
        Self {
            items,
            successful,
            total,
            physical_calls,
        }
    }

    /// Whether every item succeeded.
    pub fn is_complete(&self) -> bool {
        self.successful == self.total
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemResult<T>> {
        self.items.iter().filter(|item| !item.is_ok())
    }

    /// The first failure, if any.
    pub fn first_failure(&self) -> Option<&ItemFailure> {
        self.items.iter().find_map(|item| item.outcome.as_ref().err())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(index: usize, ok: bool) -> ItemResult<()> {
        ItemResult {
            index,
            table: TableId::new("Chat Cases"),
            address: format!("A{}", index + 2),
            outcome: if ok {
                Ok(())
            } else {
                Err(ItemFailure::validation("bad"))
            },
        }
    }

    #[test]
    fn test_batch_result_counts_and_order() {
        let result = BatchResult::from_items(vec![item(2, true), item(0, false), item(1, true)], 3);
        assert_eq!(result.total, 3);
        assert_eq!(result.successful, 2);
        assert!(!result.is_complete());
        assert_eq!(result.items[0].index, 0);
        assert_eq!(result.failures().count(), 1);
        assert_eq!(result.first_failure().unwrap().kind, ErrorKind::Validation);
    }

    #[test]
    fn test_failure_from_error() {
        let err = Error::MalformedAddress("1A".into());
        let failure = ItemFailure::from(&err);
        assert_eq!(failure.kind, ErrorKind::Validation);
        assert_eq!(failure.to_string(), "VALIDATION: malformed address '1A'");
    }
}

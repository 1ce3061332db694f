//! Table identifier type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one table (sheet) of the workbook.
///
/// Table names are the physical sheet names, e.g. `"Email Cases"`.
/// Ordering is lexicographic, which gives batches a deterministic
/// table order.
///
/// # Example
/// ```
/// use casegrid::TableId;
///
/// let table = TableId::new("Email Cases");
/// assert_eq!(table.as_str(), "Email Cases");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(String);

impl TableId {
    /// Create a new TableId.
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        TableId(name.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TableId {
    fn from(name: &str) -> Self {
        TableId::new(name)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

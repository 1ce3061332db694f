//! The physical tabular-data API and the values it moves.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{BackendError, CellRange, TableId};

/// A single cell value as stored by the backend.
///
/// Timestamps are stored as RFC 3339 text; typing happens in the schema
/// layer, not here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Empty cells and whitespace-only text both count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value the way a spreadsheet would display it.
    pub fn render(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// Row-major block of values; every row has the range's width.
pub type Grid = Vec<Vec<CellValue>>;

/// Presentation metadata an update may attach to a range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFormat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CellFormat {
    /// Overlay the fields set in `other` onto `self`.
    pub fn merge(&mut self, other: &CellFormat) {
        if other.background.is_some() {
            self.background = other.background.clone();
        }
        if other.bold.is_some() {
            self.bold = other.bold;
        }
        if other.note.is_some() {
            self.note = other.note.clone();
        }
    }
}

/// One range of an update call: new values, new formatting, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeUpdate {
    pub range: CellRange,
    pub values: Option<Grid>,
    pub format: Option<CellFormat>,
}

/// A shared, rate-limited, non-transactional tabular-data API.
///
/// Each method is one physical call. Calls are synchronous and run to
/// completion or failure; a failed call may have applied nothing or
/// everything, never part of one range.
pub trait TabularBackend: Send + Sync {
    /// Read several ranges of one table. Open-ended ranges stop at the
    /// last populated row of their columns.
    fn batch_get(&self, table: &TableId, ranges: &[CellRange]) -> Result<Vec<Grid>, BackendError>;

    /// Overwrite several bounded ranges of one table.
    fn batch_write(&self, table: &TableId, writes: &[(CellRange, Grid)]) -> Result<(), BackendError>;

    /// Apply values and/or formatting to several ranges of one table.
    fn batch_update(&self, table: &TableId, updates: &[RangeUpdate]) -> Result<(), BackendError>;

    /// Clear the values of several ranges of one table.
    fn batch_clear(&self, table: &TableId, ranges: &[CellRange]) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_value_empty() {
        assert!(CellValue::Empty.is_empty());
        assert!(CellValue::from("   ").is_empty());
        assert!(!CellValue::from("x").is_empty());
        assert!(!CellValue::Bool(false).is_empty());
    }

    #[test]
    fn test_render() {
        assert_eq!(CellValue::Number(12.0).render(), "12");
        assert_eq!(CellValue::Number(1.5).render(), "1.5");
        assert_eq!(CellValue::Bool(true).render(), "TRUE");
        assert_eq!(CellValue::Empty.render(), "");
    }

    #[test]
    fn test_format_merge() {
        let mut base = CellFormat {
            background: Some("#ffffff".into()),
            bold: Some(false),
            note: None,
        };
        base.merge(&CellFormat {
            bold: Some(true),
            note: Some("escalated".into()),
            ..CellFormat::default()
        });
        assert_eq!(base.background.as_deref(), Some("#ffffff"));
        assert_eq!(base.bold, Some(true));
        assert_eq!(base.note.as_deref(), Some("escalated"));
    }
}

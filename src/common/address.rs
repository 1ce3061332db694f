//! A1-notation cell addresses and ranges.
//!
//! Supported forms:
//! - `C5` - a single cell
//! - `A2:M2` - a rectangle
//! - `A2:M` - columns `A..=M` from row 2 to the last populated row

use std::fmt;
use std::str::FromStr;

use crate::common::{ColumnRef, Error, Result};

/// A single cell. Rows are 1-based, as in the backend.
///
/// Field order makes the derived ordering row-major, which is the
/// locality order batches are sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub column: ColumnRef,
}

impl CellRef {
    pub fn new(column: ColumnRef, row: u32) -> Self {
        Self { row, column }
    }

    fn parse(s: &str) -> Result<Self> {
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| Error::MalformedAddress(s.to_string()))?;
        let (letters, digits) = s.split_at(split);
        let column = ColumnRef::from_letters(letters)?;
        let row: u32 = digits
            .parse()
            .map_err(|_| Error::MalformedAddress(s.to_string()))?;
        if row == 0 {
            return Err(Error::MalformedAddress(s.to_string()));
        }
        Ok(Self { row, column })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

/// A rectangular range of cells, possibly open-ended downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRange {
    start: CellRef,
    end_column: ColumnRef,
    /// `None` means "through the last populated row".
    end_row: Option<u32>,
}

impl CellRange {
    /// A single cell range.
    pub fn cell(column: ColumnRef, row: u32) -> Self {
        Self {
            start: CellRef::new(column, row),
            end_column: column,
            end_row: Some(row),
        }
    }

    /// A bounded rectangle. Corners are normalized.
    pub fn rect(first: CellRef, last: CellRef) -> Self {
        Self {
            start: CellRef::new(first.column.min(last.column), first.row.min(last.row)),
            end_column: first.column.max(last.column),
            end_row: Some(first.row.max(last.row)),
        }
    }

    /// One row spanning `first..=last` columns.
    pub fn row_span(row: u32, first: ColumnRef, last: ColumnRef) -> Self {
        Self::rect(CellRef::new(first, row), CellRef::new(last, row))
    }

    /// Columns `first..=last` from `start_row` to the last populated row.
    pub fn open_rows(start_row: u32, first: ColumnRef, last: ColumnRef) -> Self {
        Self {
            start: CellRef::new(first.min(last), start_row),
            end_column: first.max(last),
            end_row: None,
        }
    }

    #[inline]
    pub fn start(&self) -> CellRef {
        self.start
    }

    #[inline]
    pub fn end_column(&self) -> ColumnRef {
        self.end_column
    }

    #[inline]
    pub fn end_row(&self) -> Option<u32> {
        self.end_row
    }

    #[inline]
    pub fn is_open_ended(&self) -> bool {
        self.end_row.is_none()
    }

    /// Number of columns covered.
    pub fn width(&self) -> usize {
        (self.end_column.index() - self.start.column.index() + 1) as usize
    }

    /// Number of rows covered, or `None` when open-ended.
    pub fn height(&self) -> Option<usize> {
        self.end_row.map(|end| (end - self.start.row + 1) as usize)
    }

    /// Whether the two ranges share at least one cell.
    pub fn intersects(&self, other: &CellRange) -> bool {
        let cols = self.start.column <= other.end_column && other.start.column <= self.end_column;
        let self_end = self.end_row.unwrap_or(u32::MAX);
        let other_end = other.end_row.unwrap_or(u32::MAX);
        let rows = self.start.row <= other_end && other.start.row <= self_end;
        cols && rows
    }

    /// If `other` continues this single-row range directly to the right,
    /// return the merged range.
    pub fn merge_right(&self, other: &CellRange) -> Option<CellRange> {
        let same_row = self.height() == Some(1)
            && other.height() == Some(1)
            && self.start.row == other.start.row;
        if same_row && self.end_column.next() == Some(other.start.column) {
            Some(CellRange::row_span(
                self.start.row,
                self.start.column,
                other.end_column,
            ))
        } else {
            None
        }
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once(':') {
            None => {
                let cell = CellRef::parse(s)?;
                Ok(CellRange::cell(cell.column, cell.row))
            }
            Some((first, last)) => {
                let first = CellRef::parse(first)?;
                if last.chars().all(|c| c.is_ascii_alphabetic()) {
                    let last_column = ColumnRef::from_letters(last)?;
                    if last_column < first.column {
                        return Err(Error::MalformedAddress(s.to_string()));
                    }
                    return Ok(CellRange::open_rows(first.row, first.column, last_column));
                }
                let last = CellRef::parse(last)?;
                if last.column < first.column || last.row < first.row {
                    return Err(Error::MalformedAddress(s.to_string()));
                }
                Ok(CellRange::rect(first, last))
            }
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end_row {
            Some(end) if end == self.start.row && self.end_column == self.start.column => {
                write!(f, "{}", self.start)
            }
            Some(end) => write!(f, "{}:{}{}", self.start, self.end_column, end),
            None => write!(f, "{}:{}", self.start, self.end_column),
        }
    }
}

//! In-memory workbook model shared by the storage backends.
//!
//! A [`Workbook`] is a set of named [`Sheet`]s. Each sheet is a dense
//! row-major grid plus per-cell formatting keyed by A1 address.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::{BackendError, CellRange, CellRef, ColumnRef, TableId};
use crate::storage::backend::{CellFormat, CellValue, Grid, RangeUpdate};

/// One table of the workbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    rows: Vec<Vec<CellValue>>,
    #[serde(default)]
    formats: BTreeMap<String, CellFormat>,
}

impl Sheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last row (1-based) holding a non-empty value within the given
    /// columns, or 0 if none does.
    pub fn last_row(&self, first: ColumnRef, last: ColumnRef) -> u32 {
        self.rows
            .iter()
            .rposition(|row| {
                (first.index()..=last.index())
                    .any(|c| row.get(c as usize).is_some_and(|v| !v.is_empty()))
            })
            .map(|i| i as u32 + 1)
            .unwrap_or(0)
    }

    pub fn cell(&self, cell: CellRef) -> CellValue {
        self.rows
            .get(cell.row as usize - 1)
            .and_then(|row| row.get(cell.column.index() as usize))
            .cloned()
            .unwrap_or_default()
    }

    pub fn format(&self, cell: CellRef) -> Option<&CellFormat> {
        self.formats.get(&cell.to_string())
    }

    /// Read a range, padding with `Empty` to the full range shape.
    pub fn read(&self, range: &CellRange) -> Grid {
        let first_row = range.start().row;
        let last_row = match range.end_row() {
            Some(end) => end,
            None => self.last_row(range.start().column, range.end_column()),
        };
        let first_col = range.start().column.index();
        let last_col = range.end_column().index();

        (first_row..=last_row)
            .map(|r| {
                (first_col..=last_col)
                    .map(|c| self.cell(CellRef::new(ColumnRef(c), r)))
                    .collect()
            })
            .collect()
    }

    fn set(&mut self, cell: CellRef, value: CellValue) {
        let r = cell.row as usize - 1;
        let c = cell.column.index() as usize;
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let row = &mut self.rows[r];
        if row.len() <= c {
            row.resize(c + 1, CellValue::Empty);
        }
        row[c] = value;
    }

    fn write(&mut self, range: &CellRange, values: &Grid) {
        let start = range.start();
        for (dr, row) in values.iter().enumerate() {
            for (dc, value) in row.iter().enumerate() {
                let cell = CellRef::new(
                    ColumnRef(start.column.index() + dc as u32),
                    start.row + dr as u32,
                );
                self.set(cell, value.clone());
            }
        }
    }

    fn apply_format(&mut self, range: &CellRange, format: &CellFormat) {
        let Some(end_row) = range.end_row() else {
            return;
        };
        for r in range.start().row..=end_row {
            for c in range.start().column.index()..=range.end_column().index() {
                let key = CellRef::new(ColumnRef(c), r).to_string();
                self.formats.entry(key).or_default().merge(format);
            }
        }
    }

    /// Blank the stored cells under `range`; nothing past the data grows.
    fn clear(&mut self, range: &CellRange) {
        let stored = self.rows.len() as u32;
        let end_row = range.end_row().unwrap_or(stored).min(stored);
        let first_col = range.start().column.index() as usize;
        let width = range.width();
        for r in range.start().row..=end_row {
            let Some(row) = self.rows.get_mut(r as usize - 1) else {
                break;
            };
            for cell in row.iter_mut().skip(first_col).take(width) {
                *cell = CellValue::Empty;
            }
        }
    }
}

/// Check that `values` exactly fills a bounded `range`.
pub fn check_shape(range: &CellRange, values: &Grid) -> Result<(), String> {
    let Some(height) = range.height() else {
        return Err(format!("range {} is open-ended", range));
    };
    if values.len() != height {
        return Err(format!(
            "range {} has {} rows but payload has {}",
            range,
            height,
            values.len()
        ));
    }
    if let Some(row) = values.iter().find(|row| row.len() != range.width()) {
        return Err(format!(
            "range {} has {} columns but a payload row has {}",
            range,
            range.width(),
            row.len()
        ));
    }
    Ok(())
}

/// A named collection of sheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    sheets: BTreeMap<String, Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty sheet if it does not exist yet.
    pub fn add_sheet(&mut self, table: &TableId) {
        self.sheets.entry(table.as_str().to_string()).or_default();
    }

    pub fn has_sheet(&self, table: &TableId) -> bool {
        self.sheets.contains_key(table.as_str())
    }

    pub fn sheet_names(&self) -> Vec<TableId> {
        self.sheets.keys().map(|k| TableId::new(k.as_str())).collect()
    }

    pub fn sheet(&self, op: &'static str, table: &TableId) -> Result<&Sheet, BackendError> {
        self.sheets
            .get(table.as_str())
            .ok_or_else(|| BackendError::new(op, table.as_str(), "no such sheet"))
    }

    fn sheet_mut(&mut self, op: &'static str, table: &TableId) -> Result<&mut Sheet, BackendError> {
        self.sheets
            .get_mut(table.as_str())
            .ok_or_else(|| BackendError::new(op, table.as_str(), "no such sheet"))
    }

    pub fn get(&self, table: &TableId, ranges: &[CellRange]) -> Result<Vec<Grid>, BackendError> {
        let sheet = self.sheet("batch_get", table)?;
        Ok(ranges.iter().map(|r| sheet.read(r)).collect())
    }

    /// Apply all writes, or none if any payload is malformed.
    pub fn write(&mut self, table: &TableId, writes: &[(CellRange, Grid)]) -> Result<(), BackendError> {
        for (range, values) in writes {
            check_shape(range, values)
                .map_err(|msg| BackendError::new("batch_write", table.as_str(), msg))?;
        }
        let sheet = self.sheet_mut("batch_write", table)?;
        for (range, values) in writes {
            sheet.write(range, values);
        }
        Ok(())
    }

    pub fn update(&mut self, table: &TableId, updates: &[RangeUpdate]) -> Result<(), BackendError> {
        for update in updates {
            if let Some(values) = &update.values {
                check_shape(&update.range, values)
                    .map_err(|msg| BackendError::new("batch_update", table.as_str(), msg))?;
            }
        }
        let sheet = self.sheet_mut("batch_update", table)?;
        for update in updates {
            if let Some(values) = &update.values {
                sheet.write(&update.range, values);
            }
            if let Some(format) = &update.format {
                sheet.apply_format(&update.range, format);
            }
        }
        Ok(())
    }

    pub fn clear(&mut self, table: &TableId, ranges: &[CellRange]) -> Result<(), BackendError> {
        let sheet = self.sheet_mut("batch_clear", table)?;
        for range in ranges {
            sheet.clear(range);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> CellRange {
        s.parse().unwrap()
    }

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    fn book() -> (Workbook, TableId) {
        let table = TableId::new("Email Cases");
        let mut wb = Workbook::new();
        wb.add_sheet(&table);
        (wb, table)
    }

    #[test]
    fn test_write_and_read_back() {
        let (mut wb, t) = book();
        wb.write(&t, &[(range("B2:C2"), vec![vec![text("x"), text("y")]])])
            .unwrap();

        let grids = wb.get(&t, &[range("A2:C2"), range("C2")]).unwrap();
        assert_eq!(grids[0], vec![vec![CellValue::Empty, text("x"), text("y")]]);
        assert_eq!(grids[1], vec![vec![text("y")]]);
    }

    #[test]
    fn test_open_ended_read_stops_at_last_row() {
        let (mut wb, t) = book();
        wb.write(&t, &[(range("A2:A4"), vec![vec![text("a")], vec![text("b")], vec![text("c")]])])
            .unwrap();
        wb.write(&t, &[(range("D9"), vec![vec![text("far")]])]).unwrap();

        let grid = &wb.get(&t, &[range("A2:A")]).unwrap()[0];
        assert_eq!(grid.len(), 3);

        let grid = &wb.get(&t, &[range("A2:D")]).unwrap()[0];
        assert_eq!(grid.len(), 8);
    }

    #[test]
    fn test_shape_mismatch_rejects_whole_call() {
        let (mut wb, t) = book();
        let result = wb.write(
            &t,
            &[
                (range("A2"), vec![vec![text("ok")]]),
                (range("A3:B3"), vec![vec![text("short")]]),
            ],
        );
        assert!(result.is_err());
        assert_eq!(wb.get(&t, &[range("A2")]).unwrap()[0][0][0], CellValue::Empty);
    }

    #[test]
    fn test_unknown_sheet() {
        let (wb, _) = book();
        let err = wb.get(&TableId::new("Nope"), &[range("A1")]).unwrap_err();
        assert_eq!(err.operation, "batch_get");
    }

    #[test]
    fn test_update_format_and_clear() {
        let (mut wb, t) = book();
        wb.update(
            &t,
            &[RangeUpdate {
                range: range("A2:B2"),
                values: Some(vec![vec![text("1"), text("2")]]),
                format: Some(CellFormat {
                    bold: Some(true),
                    ..CellFormat::default()
                }),
            }],
        )
        .unwrap();

        let sheet = wb.sheet("test", &t).unwrap();
        assert_eq!(sheet.format("B2".parse::<CellRange>().unwrap().start()).unwrap().bold, Some(true));

        wb.clear(&t, &[range("A2:B")]).unwrap();
        assert_eq!(wb.get(&t, &[range("A2:B2")]).unwrap()[0], vec![vec![CellValue::Empty; 2]]);
    }
    #[test]
    fn test_clear_far_past_data_touches_only_stored_cells() {
        let (mut wb, t) = book();
        wb.write(&t, &[(range("A2:B3"), vec![vec![text("a"), text("b")], vec![text("c"), text("d")]])])
            .unwrap();

        wb.clear(&t, &[range("B1:ZZ4000000")]).unwrap();

        let sheet = wb.sheet("test", &t).unwrap();
        assert_eq!(sheet.rows.len(), 3);
        assert!(sheet.rows.iter().all(|row| row.len() <= 2));
        assert_eq!(
            wb.get(&t, &[range("A2:B3")]).unwrap()[0],
            vec![vec![text("a"), CellValue::Empty], vec![text("c"), CellValue::Empty]]
        );
    }
}

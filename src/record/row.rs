//! The typed view of one table row.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::common::TableId;
use crate::schema::{
    parse_datetime, parse_flag, CaseStatus, ChannelTag, FieldName, TableDescriptor,
};
use crate::storage::CellValue;

static EMPTY: CellValue = CellValue::Empty;

/// Values computed from the row rather than stored in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedFields {
    /// 1-based physical row.
    pub row: u32,
    pub is_closed: bool,
}

/// One support case as stored in one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub case_id: String,
    pub table_id: TableId,
    pub fields: BTreeMap<FieldName, CellValue>,
    pub derived: DerivedFields,
}

impl Record {
    /// Decode a physical row. Rows without a case id are not records.
    pub(crate) fn from_row(descriptor: &TableDescriptor, row: u32, cells: &[CellValue]) -> Option<Self> {
        let mut fields = BTreeMap::new();
        for (field, column) in descriptor.fields() {
            let value = cells.get(column.index() as usize).cloned().unwrap_or_default();
            fields.insert(field, value);
        }
        Self::from_fields(descriptor.table_id().clone(), row, fields)
    }

    pub(crate) fn from_fields(
        table_id: TableId,
        row: u32,
        fields: BTreeMap<FieldName, CellValue>,
    ) -> Option<Self> {
        let case_id = fields
            .get(&FieldName::CaseId)
            .filter(|v| !v.is_empty())
            .map(|v| v.render().trim().to_string())?;

        let mut record = Self {
            case_id,
            table_id,
            fields,
            derived: DerivedFields {
                row,
                is_closed: false,
            },
        };
        record.refresh_derived();
        Some(record)
    }

    /// Encode as a full-width physical row.
    pub(crate) fn to_row(&self, descriptor: &TableDescriptor) -> Vec<CellValue> {
        let mut cells = vec![CellValue::Empty; descriptor.width()];
        for (field, column) in descriptor.fields() {
            cells[column.index() as usize] = self.get(field).clone();
        }
        cells
    }

    pub(crate) fn refresh_derived(&mut self) {
        let closed_status = self.status().is_some_and(|s| s.is_closed());
        self.derived.is_closed = closed_status || !self.get(FieldName::ClosedAt).is_empty();
    }

    /// The stored value, `Empty` when absent.
    pub fn get(&self, field: FieldName) -> &CellValue {
        self.fields.get(&field).unwrap_or(&EMPTY)
    }

    /// Trimmed display text, `None` when empty.
    pub fn text(&self, field: FieldName) -> Option<String> {
        let value = self.get(field);
        if value.is_empty() {
            None
        } else {
            Some(value.render().trim().to_string())
        }
    }

    pub fn datetime(&self, field: FieldName) -> Option<DateTime<Utc>> {
        self.get(field).as_text().and_then(parse_datetime)
    }

    pub fn flag(&self, field: FieldName) -> Option<bool> {
        parse_flag(self.get(field))
    }

    pub fn status(&self) -> Option<CaseStatus> {
        self.get(FieldName::Status).as_text()?.parse().ok()
    }

    pub fn channel(&self) -> Option<ChannelTag> {
        self.get(FieldName::Channel).as_text()?.parse().ok()
    }

    pub fn assignee(&self) -> Option<String> {
        self.text(FieldName::Assignee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::standard_descriptors;

    #[test]
    fn test_row_round_trip_and_accessors() {
        let email = &standard_descriptors().unwrap()[0];
        let mut cells = vec![CellValue::Empty; email.width()];
        cells[0] = "EM-1".into();
        cells[1] = "2026-03-01T09:00:00Z".into();
        cells[2] = "Email".into();
        cells[5] = "Resolved".into();
        cells[10] = CellValue::Bool(true);

        let record = Record::from_row(email, 7, &cells).unwrap();
        assert_eq!(record.case_id, "EM-1");
        assert_eq!(record.derived.row, 7);
        assert!(record.derived.is_closed);
        assert_eq!(record.status(), Some(CaseStatus::Resolved));
        assert_eq!(record.channel(), Some(ChannelTag::Email));
        assert_eq!(record.flag(FieldName::ExcludeFromSla), Some(true));
        assert!(record.datetime(FieldName::OpenedAt).is_some());
        assert_eq!(record.assignee(), None);
        assert_eq!(record.to_row(email), cells);
    }

    #[test]
    fn test_row_without_case_id_is_skipped() {
        let email = &standard_descriptors().unwrap()[0];
        let mut cells = vec![CellValue::Empty; email.width()];
        cells[5] = "Open".into();
        assert!(Record::from_row(email, 3, &cells).is_none());
        assert!(Record::from_row(email, 3, &[]).is_none());
    }
}

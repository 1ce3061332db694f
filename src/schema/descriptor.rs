//! Table descriptors and the standard channel layouts.

use std::collections::{BTreeMap, BTreeSet};

use crate::common::{CellRange, ColumnRef, Error, Result, TableId};
use crate::schema::field::{ChannelTag, FieldName};
use crate::storage::CellValue;

/// Row holding the column headers.
pub const HEADER_ROW: u32 = 1;

/// First row holding case data.
pub const FIRST_DATA_ROW: u32 = 2;

/// Immutable description of one table's physical layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    table_id: TableId,
    channel: ChannelTag,
    case_prefix: String,
    field_to_column: BTreeMap<FieldName, ColumnRef>,
    required: BTreeSet<FieldName>,
    last_column: ColumnRef,
}

impl TableDescriptor {
    pub fn builder(
        table_id: impl Into<TableId>,
        channel: ChannelTag,
        case_prefix: impl Into<String>,
    ) -> DescriptorBuilder {
        DescriptorBuilder {
            table_id: table_id.into(),
            channel,
            case_prefix: case_prefix.into(),
            columns: Vec::new(),
            required: BTreeSet::new(),
        }
    }

    pub fn table_id(&self) -> &TableId {
        &self.table_id
    }

    pub fn channel(&self) -> ChannelTag {
        self.channel
    }

    /// Prefix for generated case ids, e.g. `EM` for `EM-1a2b3c4d`.
    pub fn case_prefix(&self) -> &str {
        &self.case_prefix
    }

    pub fn column(&self, field: FieldName) -> Option<ColumnRef> {
        self.field_to_column.get(&field).copied()
    }

    pub fn has_field(&self, field: FieldName) -> bool {
        self.field_to_column.contains_key(&field)
    }

    pub fn required_fields(&self) -> &BTreeSet<FieldName> {
        &self.required
    }

    /// Fields in physical column order.
    pub fn fields(&self) -> Vec<(FieldName, ColumnRef)> {
        let mut fields: Vec<_> = self.field_to_column.iter().map(|(f, c)| (*f, *c)).collect();
        fields.sort_by_key(|(_, c)| *c);
        fields
    }

    pub fn last_column(&self) -> ColumnRef {
        self.last_column
    }

    /// Number of physical columns, `A` through the last mapped column.
    pub fn width(&self) -> usize {
        self.last_column.index() as usize + 1
    }

    /// Full-width range of one row.
    pub fn row_range(&self, row: u32) -> CellRange {
        CellRange::row_span(row, ColumnRef(0), self.last_column)
    }

    /// Every data row, open-ended.
    pub fn data_range(&self) -> CellRange {
        CellRange::open_rows(FIRST_DATA_ROW, ColumnRef(0), self.last_column)
    }

    /// The case id column from the first data row down.
    pub fn case_id_range(&self) -> Option<CellRange> {
        self.column(FieldName::CaseId)
            .map(|c| CellRange::open_rows(FIRST_DATA_ROW, c, c))
    }

    /// Expected header row contents.
    pub fn header_row(&self) -> Vec<CellValue> {
        let mut row = vec![CellValue::Empty; self.width()];
        for (field, column) in &self.field_to_column {
            row[column.index() as usize] = CellValue::from(field.display_name());
        }
        row
    }
}

/// Builds a [`TableDescriptor`] from letter-addressed columns.
#[derive(Debug)]
pub struct DescriptorBuilder {
    table_id: TableId,
    channel: ChannelTag,
    case_prefix: String,
    columns: Vec<(String, FieldName)>,
    required: BTreeSet<FieldName>,
}

impl DescriptorBuilder {
    /// Map `field` to the column named by `letters`.
    pub fn column(mut self, letters: &str, field: FieldName) -> Self {
        self.columns.push((letters.to_string(), field));
        self
    }

    pub fn required(mut self, fields: &[FieldName]) -> Self {
        self.required.extend(fields.iter().copied());
        self
    }

    /// Decode the letters and check the mapping is one-to-one.
    pub fn build(self) -> Result<TableDescriptor> {
        let mut field_to_column = BTreeMap::new();
        let mut used = BTreeSet::new();

        for (letters, field) in &self.columns {
            let column = ColumnRef::from_letters(letters).map_err(|_| {
                Error::Configuration(format!(
                    "table '{}': bad column '{}' for {}",
                    self.table_id, letters, field
                ))
            })?;
            if !used.insert(column) {
                return Err(Error::Configuration(format!(
                    "table '{}': column {} mapped twice",
                    self.table_id, letters
                )));
            }
            if field_to_column.insert(*field, column).is_some() {
                return Err(Error::Configuration(format!(
                    "table '{}': field {} mapped twice",
                    self.table_id, field
                )));
            }
        }

        if let Some(missing) = self.required.iter().find(|f| !field_to_column.contains_key(f)) {
            return Err(Error::Configuration(format!(
                "table '{}': required field {} has no column",
                self.table_id, missing
            )));
        }
        if !field_to_column.contains_key(&FieldName::CaseId) {
            return Err(Error::Configuration(format!(
                "table '{}': no {} column",
                self.table_id,
                FieldName::CaseId
            )));
        }

        let last_column = used.iter().next_back().copied().unwrap_or(ColumnRef(0));

        Ok(TableDescriptor {
            table_id: self.table_id,
            channel: self.channel,
            case_prefix: self.case_prefix,
            field_to_column,
            required: self.required,
            last_column,
        })
    }
}

/// Messaging layout: Email, Web Form, Chat and Social tables, `A..M`.
fn messaging(table: &str, channel: ChannelTag, prefix: &str) -> Result<TableDescriptor> {
    TableDescriptor::builder(table, channel, prefix)
        .column("A", FieldName::CaseId)
        .column("B", FieldName::OpenedAt)
        .column("C", FieldName::Channel)
        .column("D", FieldName::CustomerEmail)
        .column("E", FieldName::Subject)
        .column("F", FieldName::Status)
        .column("G", FieldName::Assignee)
        .column("H", FieldName::FirstResponseAt)
        .column("I", FieldName::ResponseDeadline)
        .column("J", FieldName::ClosedAt)
        .column("K", FieldName::ExcludeFromSla)
        .column("L", FieldName::Spam)
        .column("M", FieldName::Notes)
        .required(&[
            FieldName::CaseId,
            FieldName::OpenedAt,
            FieldName::Channel,
            FieldName::Status,
        ])
        .build()
}

/// Voice layout: Phone and Voicemail tables, `A..O`.
///
/// `CallerPhone` and `CallMinutes` sit after `Channel`, shifting every
/// later column two places right of the messaging layout.
fn voice(table: &str, channel: ChannelTag, prefix: &str) -> Result<TableDescriptor> {
    TableDescriptor::builder(table, channel, prefix)
        .column("A", FieldName::CaseId)
        .column("B", FieldName::OpenedAt)
        .column("C", FieldName::Channel)
        .column("D", FieldName::CallerPhone)
        .column("E", FieldName::CallMinutes)
        .column("F", FieldName::CustomerEmail)
        .column("G", FieldName::Subject)
        .column("H", FieldName::Status)
        .column("I", FieldName::Assignee)
        .column("J", FieldName::FirstResponseAt)
        .column("K", FieldName::ResponseDeadline)
        .column("L", FieldName::ClosedAt)
        .column("M", FieldName::ExcludeFromSla)
        .column("N", FieldName::Spam)
        .column("O", FieldName::Notes)
        .required(&[
            FieldName::CaseId,
            FieldName::OpenedAt,
            FieldName::Channel,
            FieldName::CallerPhone,
            FieldName::Status,
        ])
        .build()
}

/// The six standard channel tables.
pub fn standard_descriptors() -> Result<Vec<TableDescriptor>> {
    Ok(vec![
        messaging("Email Cases", ChannelTag::Email, "EM")?,
        messaging("Web Form Cases", ChannelTag::WebForm, "WF")?,
        messaging("Chat Cases", ChannelTag::Chat, "CH")?,
        messaging("Social Cases", ChannelTag::Social, "SO")?,
        voice("Phone Cases", ChannelTag::Phone, "PH")?,
        voice("Voicemail Cases", ChannelTag::Voicemail, "VM")?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_layouts() {
        let descriptors = standard_descriptors().unwrap();
        assert_eq!(descriptors.len(), 6);

        let email = &descriptors[0];
        let phone = &descriptors[4];
        assert_eq!(email.width(), 13);
        assert_eq!(phone.width(), 15);

        // Shared prefix, then a two-column shift
        assert_eq!(email.column(FieldName::Channel), phone.column(FieldName::Channel));
        assert_eq!(
            phone.column(FieldName::Status).unwrap().index(),
            email.column(FieldName::Status).unwrap().index() + 2
        );
        assert_eq!(email.column(FieldName::CallerPhone), None);
    }

    #[test]
    fn test_header_row() {
        let email = &standard_descriptors().unwrap()[0];
        let header = email.header_row();
        assert_eq!(header[0], CellValue::from("Case ID"));
        assert_eq!(header[12], CellValue::from("Notes"));
    }

    #[test]
    fn test_ranges() {
        let email = &standard_descriptors().unwrap()[0];
        assert_eq!(email.row_range(7).to_string(), "A7:M7");
        assert_eq!(email.data_range().to_string(), "A2:M");
        assert_eq!(email.case_id_range().unwrap().to_string(), "A2:A");
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let dup_column = TableDescriptor::builder("T", ChannelTag::Chat, "T")
            .column("A", FieldName::CaseId)
            .column("A", FieldName::Status)
            .build();
        assert!(matches!(dup_column, Err(Error::Configuration(_))));

        let dup_field = TableDescriptor::builder("T", ChannelTag::Chat, "T")
            .column("A", FieldName::CaseId)
            .column("B", FieldName::CaseId)
            .build();
        assert!(matches!(dup_field, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_builder_requires_case_id_and_required_columns() {
        let no_id = TableDescriptor::builder("T", ChannelTag::Chat, "T")
            .column("A", FieldName::Status)
            .build();
        assert!(no_id.is_err());

        let missing_required = TableDescriptor::builder("T", ChannelTag::Chat, "T")
            .column("A", FieldName::CaseId)
            .required(&[FieldName::Status])
            .build();
        assert!(missing_required.is_err());
    }
}

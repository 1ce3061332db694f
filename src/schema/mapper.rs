//! Schema Mapper - typed, named-field access to untyped tables.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::common::{ColumnRef, Error, Result, TableId};
use crate::schema::descriptor::{standard_descriptors, TableDescriptor};
use crate::schema::field::{ChannelTag, FieldName};
use crate::storage::CellValue;

/// Registry of table descriptors.
///
/// Unknown tables are configuration errors; unknown fields are not,
/// because variants share most but not all fields.
#[derive(Debug, Clone)]
pub struct SchemaMapper {
    tables: BTreeMap<TableId, Arc<TableDescriptor>>,
}

impl SchemaMapper {
    /// Build a mapper from descriptors.
    ///
    /// # Errors
    /// `Error::Configuration` if two descriptors share a table id.
    pub fn new(descriptors: impl IntoIterator<Item = TableDescriptor>) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for descriptor in descriptors {
            let id = descriptor.table_id().clone();
            if tables.insert(id.clone(), Arc::new(descriptor)).is_some() {
                return Err(Error::Configuration(format!("table '{}' registered twice", id)));
            }
        }
        Ok(Self { tables })
    }

    /// Mapper over the six standard channel tables.
    pub fn standard() -> Result<Self> {
        Self::new(standard_descriptors()?)
    }

    pub fn descriptor(&self, table: &TableId) -> Result<&Arc<TableDescriptor>> {
        self.tables
            .get(table)
            .ok_or_else(|| Error::UnknownTable(table.clone()))
    }

    /// Registered tables in id order.
    pub fn tables(&self) -> impl Iterator<Item = &TableId> {
        self.tables.keys()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<TableDescriptor>> {
        self.tables.values()
    }

    /// Column of `field` in `table`, or `None` if that variant lacks it.
    pub fn resolve(&self, table: &TableId, field: FieldName) -> Result<Option<ColumnRef>> {
        Ok(self.descriptor(table)?.column(field))
    }

    pub fn required_fields(&self, table: &TableId) -> Result<BTreeSet<FieldName>> {
        Ok(self.descriptor(table)?.required_fields().clone())
    }

    pub fn channel_of(&self, table: &TableId) -> Result<ChannelTag> {
        Ok(self.descriptor(table)?.channel())
    }

    /// Expected contents of row 1.
    pub fn header_row(&self, table: &TableId) -> Result<Vec<CellValue>> {
        Ok(self.descriptor(table)?.header_row())
    }

    /// Type/domain check of one value.
    ///
    /// A field the table does not carry is a validation failure naming
    /// the field. `Empty` passes for optional fields only.
    pub fn validate(&self, table: &TableId, field: FieldName, value: &CellValue) -> Result<()> {
        let descriptor = self.descriptor(table)?;
        if !descriptor.has_field(field) {
            return Err(Error::validation(
                field.display_name(),
                format!("table '{}' has no such field", table),
            ));
        }

        if value.is_empty() {
            if descriptor.required_fields().contains(&field) {
                return Err(Error::validation(field.display_name(), "required field is empty"));
            }
            return Ok(());
        }

        field
            .kind()
            .check(value)
            .map_err(|reason| Error::validation(field.display_name(), reason))
    }

    /// Validate every field of a partial record.
    pub fn validate_fields(
        &self,
        table: &TableId,
        fields: &BTreeMap<FieldName, CellValue>,
    ) -> Result<()> {
        for (field, value) in fields {
            self.validate(table, *field, value)?;
        }
        Ok(())
    }
}

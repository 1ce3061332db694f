//! Schema mapping for heterogeneous case tables.
//!
//! # Components
//! - [`SchemaMapper`] - field → column resolution and value validation
//! - [`TableDescriptor`] - one table variant's immutable layout
//! - [`FieldName`] / [`FieldKind`] - the closed field model
//! - [`ChannelTag`] / [`CaseStatus`] - closed value domains

mod descriptor;
mod field;
mod mapper;

pub use descriptor::{
    standard_descriptors, DescriptorBuilder, TableDescriptor, FIRST_DATA_ROW, HEADER_ROW,
};
pub use field::{
    parse_datetime, parse_flag, parse_number, CaseStatus, ChannelTag, FieldKind, FieldName,
};
pub use mapper::SchemaMapper;

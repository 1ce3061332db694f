//! Findings produced by integrity passes.

use std::fmt;

use serde::Serialize;

use crate::common::TableId;
use crate::schema::FieldName;
use crate::storage::CellValue;

/// How bad a finding is. Orders most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        })
    }
}

/// The integrity passes, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pass {
    Uniqueness,
    CrossField,
    Temporal,
    StatusAssignment,
    ChannelCoherence,
    ExclusionFlags,
    Completeness,
    Duplicates,
    SchemaDrift,
}

impl Pass {
    pub const ALL: [Pass; 9] = [
        Pass::Uniqueness,
        Pass::CrossField,
        Pass::Temporal,
        Pass::StatusAssignment,
        Pass::ChannelCoherence,
        Pass::ExclusionFlags,
        Pass::Completeness,
        Pass::Duplicates,
        Pass::SchemaDrift,
    ];

    /// Passes whose fixes may be applied automatically.
    pub fn auto_correctable(&self) -> bool {
        matches!(self, Pass::ChannelCoherence)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pass::Uniqueness => "uniqueness",
            Pass::CrossField => "cross-field consistency",
            Pass::Temporal => "temporal ordering",
            Pass::StatusAssignment => "status/assignment coherence",
            Pass::ChannelCoherence => "channel coherence",
            Pass::ExclusionFlags => "exclusion flags",
            Pass::Completeness => "completeness",
            Pass::Duplicates => "fuzzy duplicates",
            Pass::SchemaDrift => "schema drift",
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A record location a finding points at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RecordRef {
    pub table: TableId,
    pub case_id: String,
    pub row: u32,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{} ({})", self.table, self.row, self.case_id)
    }
}

/// A single-field repair a finding proposes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldFix {
    pub field: FieldName,
    pub value: CellValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub pass: Pass,
    pub severity: Severity,
    pub record_refs: Vec<RecordRef>,
    pub message: String,
    /// Set when the repair is mechanical; applies to `record_refs[0]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<FieldFix>,
}

impl Finding {
    pub fn new(pass: Pass, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            pass,
            severity,
            record_refs: Vec::new(),
            message: message.into(),
            fix: None,
        }
    }

    pub fn with_ref(mut self, record: RecordRef) -> Self {
        self.record_refs.push(record);
        self
    }

    pub fn with_refs(mut self, records: impl IntoIterator<Item = RecordRef>) -> Self {
        self.record_refs.extend(records);
        self
    }

    pub fn with_fix(mut self, field: FieldName, value: CellValue) -> Self {
        self.fix = Some(FieldFix { field, value });
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.pass, self.message)
    }
}

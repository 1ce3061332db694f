//! Integrity report and options.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::common::{Result, TableId};
use crate::integrity::finding::{Finding, Pass, Severity};
use crate::schema::FieldName;
use crate::storage::CellValue;

/// Default similarity at which two records are potential duplicates.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Default ceiling on scored record pairs per run.
pub const DEFAULT_MAX_DUPLICATE_COMPARISONS: usize = 250_000;

/// Knobs for one integrity run.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityOptions {
    /// Apply whitelisted fixes through the record model.
    pub auto_correct: bool,
    pub similarity_threshold: f64,
    pub max_duplicate_comparisons: usize,
    /// Reference time for future-date checks; the engine clock if `None`.
    pub as_of: Option<DateTime<Utc>>,
    /// Ignore a cached report.
    pub force_refresh: bool,
}

impl Default for IntegrityOptions {
    fn default() -> Self {
        Self {
            auto_correct: false,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_duplicate_comparisons: DEFAULT_MAX_DUPLICATE_COMPARISONS,
            as_of: None,
            force_refresh: false,
        }
    }
}

impl IntegrityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_correct(mut self, enabled: bool) -> Self {
        self.auto_correct = enabled;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_max_duplicate_comparisons(mut self, max: usize) -> Self {
        self.max_duplicate_comparisons = max;
        self
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// The options a cached report is keyed by.
    pub(crate) fn cache_key(&self) -> IntegrityOptions {
        IntegrityOptions {
            force_refresh: false,
            ..self.clone()
        }
    }
}

/// Finding counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryCounts {
    pub tables_checked: usize,
    pub records_checked: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl SummaryCounts {
    pub fn total(&self) -> usize {
        self.critical + self.warning + self.info
    }

    pub(crate) fn count(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum CorrectionOutcome {
    Applied,
    Failed(String),
}

/// One attempted automatic repair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correction {
    pub table: TableId,
    pub case_id: String,
    pub field: FieldName,
    pub from: CellValue,
    pub to: CellValue,
    pub outcome: CorrectionOutcome,
}

/// Everything one integrity run found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub summary: SummaryCounts,
    pub findings_by_pass: BTreeMap<Pass, Vec<Finding>>,
    pub corrections: Vec<Correction>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub duplicate_comparisons: usize,
    pub duplicate_truncated: bool,
}

impl IntegrityReport {
    /// All findings in pass order.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings_by_pass.values().flatten()
    }

    pub fn findings_for(&self, pass: Pass) -> &[Finding] {
        self.findings_by_pass.get(&pass).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.findings().filter(move |f| f.severity == severity)
    }

    pub fn is_clean(&self) -> bool {
        self.summary.total() == 0
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntegrityReport {{ tables: {}, records: {}, critical: {}, warning: {}, info: {}, corrections: {} }}",
            self.summary.tables_checked,
            self.summary.records_checked,
            self.summary.critical,
            self.summary.warning,
            self.summary.info,
            self.corrections.len()
        )
    }
}

//! Search filters over records.

use crate::record::row::Record;
use crate::schema::{CaseStatus, FieldName};

/// Conjunction of simple predicates. An empty filter matches everything.
///
/// Text comparisons are case-insensitive on the trimmed display text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    equals: Vec<(FieldName, String)>,
    contains: Vec<(FieldName, String)>,
    statuses: Vec<CaseStatus>,
    closed: Option<bool>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field` equals `value`; an empty `value` matches empty fields.
    pub fn equals(mut self, field: FieldName, value: impl Into<String>) -> Self {
        self.equals.push((field, value.into().trim().to_lowercase()));
        self
    }

    pub fn contains(mut self, field: FieldName, needle: impl Into<String>) -> Self {
        self.contains.push((field, needle.into().trim().to_lowercase()));
        self
    }

    /// Status is one of `statuses`.
    pub fn status_in(mut self, statuses: impl IntoIterator<Item = CaseStatus>) -> Self {
        self.statuses.extend(statuses);
        self
    }

    pub fn closed(mut self, closed: bool) -> Self {
        self.closed = Some(closed);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        let text = |field: FieldName| record.text(field).unwrap_or_default().to_lowercase();

        self.equals.iter().all(|(field, value)| text(*field) == *value)
            && self.contains.iter().all(|(field, needle)| text(*field).contains(needle.as_str()))
            && (self.statuses.is_empty()
                || record.status().is_some_and(|s| self.statuses.contains(&s)))
            && self.closed.map_or(true, |closed| record.derived.is_closed == closed)
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub records: Vec<Record>,
    /// Matches before paging.
    pub total_matched: usize,
    pub offset: usize,
    pub limit: usize,
}

impl SearchPage {
    pub fn has_more(&self) -> bool {
        self.offset + self.records.len() < self.total_matched
    }
}

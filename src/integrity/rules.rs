//! The individual integrity passes.
//!
//! Each pass is a pure function of the table snapshots; none touches
//! the backend.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};

use crate::common::{ColumnRef, Result};
use crate::integrity::finding::{Finding, Pass, RecordRef, Severity};
use crate::integrity::similarity::{blocking_key, record_similarity};
use crate::record::{Record, TableSnapshot};
use crate::schema::{FieldName, SchemaMapper};
use crate::storage::CellValue;

/// Allowance for clock skew between writers when checking `OpenedAt`.
pub const FUTURE_SKEW_MINUTES: i64 = 5;

/// Scores at or above this count as an exact duplicate.
const EXACT_SCORE: f64 = 1.0 - 1e-9;

fn reference(record: &Record) -> RecordRef {
    RecordRef {
        table: record.table_id.clone(),
        case_id: record.case_id.clone(),
        row: record.derived.row,
    }
}

fn locations(refs: &[RecordRef]) -> String {
    refs.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
}

fn all_records(snapshots: &[TableSnapshot]) -> impl Iterator<Item = &Record> {
    snapshots.iter().flat_map(|s| s.records.iter())
}

/// Every location of every case id, in table then row order.
fn locations_by_id(snapshots: &[TableSnapshot]) -> BTreeMap<&str, Vec<&Record>> {
    let mut by_id: BTreeMap<&str, Vec<&Record>> = BTreeMap::new();
    for record in all_records(snapshots) {
        by_id.entry(record.case_id.as_str()).or_default().push(record);
    }
    by_id
}

/// Pass 1: a case id must appear exactly once across all tables.
pub fn uniqueness(snapshots: &[TableSnapshot]) -> Vec<Finding> {
    locations_by_id(snapshots)
        .into_iter()
        .filter(|(_, records)| records.len() > 1)
        .map(|(case_id, records)| {
            let refs: Vec<RecordRef> = records.iter().map(|r| reference(r)).collect();
            Finding::new(
                Pass::Uniqueness,
                Severity::Critical,
                format!(
                    "case id '{}' appears {} times: {}",
                    case_id,
                    refs.len(),
                    locations(&refs)
                ),
            )
            .with_refs(refs)
        })
        .collect()
}

/// Pass 2: copies of one case must agree on the assignee.
pub fn cross_field(snapshots: &[TableSnapshot]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (case_id, records) in locations_by_id(snapshots) {
        if records.len() < 2 {
            continue;
        }
        let assignees: BTreeSet<String> = records
            .iter()
            .filter_map(|r| r.assignee())
            .map(|a| a.to_lowercase())
            .collect();
        if assignees.len() > 1 {
            let detail: Vec<String> = records
                .iter()
                .filter_map(|r| r.assignee().map(|a| format!("'{}' at {}", a, reference(r))))
                .collect();
            findings.push(
                Finding::new(
                    Pass::CrossField,
                    Severity::Warning,
                    format!("case '{}' has conflicting assignees: {}", case_id, detail.join(", ")),
                )
                .with_refs(records.iter().map(|r| reference(r))),
            );
        }
    }
    findings
}

/// Pass 3: closed before opened, or opened in the future.
pub fn temporal(snapshots: &[TableSnapshot], as_of: DateTime<Utc>) -> Vec<Finding> {
    let mut findings = Vec::new();
    for record in all_records(snapshots) {
        let opened = record.datetime(FieldName::OpenedAt);
        let closed = record.datetime(FieldName::ClosedAt);

        if let (Some(opened), Some(closed)) = (opened, closed) {
            if closed < opened {
                findings.push(
                    Finding::new(
                        Pass::Temporal,
                        Severity::Critical,
                        format!(
                            "case '{}' closed at {} before it was opened at {}",
                            record.case_id,
                            closed.to_rfc3339(),
                            opened.to_rfc3339()
                        ),
                    )
                    .with_ref(reference(record)),
                );
            }
        }
        if let Some(opened) = opened {
            if opened > as_of + Duration::minutes(FUTURE_SKEW_MINUTES) {
                findings.push(
                    Finding::new(
                        Pass::Temporal,
                        Severity::Warning,
                        format!("case '{}' opened in the future at {}", record.case_id, opened.to_rfc3339()),
                    )
                    .with_ref(reference(record)),
                );
            }
        }
    }
    findings
}

/// Pass 4: status and assignee must agree.
pub fn status_assignment(snapshots: &[TableSnapshot]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for record in all_records(snapshots) {
        let Some(status) = record.status() else {
            continue;
        };
        match record.assignee() {
            Some(assignee) if status.is_unassigned() => findings.push(
                Finding::new(
                    Pass::StatusAssignment,
                    Severity::Warning,
                    format!(
                        "case '{}' is '{}' but assigned to '{}'",
                        record.case_id, status, assignee
                    ),
                )
                .with_ref(reference(record)),
            ),
            None if status.requires_assignee() => findings.push(
                Finding::new(
                    Pass::StatusAssignment,
                    Severity::Critical,
                    format!("case '{}' is '{}' but has no assignee", record.case_id, status),
                )
                .with_ref(reference(record)),
            ),
            _ => {}
        }
    }
    findings
}

/// Pass 5: the stored channel must be the table's channel.
pub fn channel_coherence(snapshots: &[TableSnapshot], mapper: &SchemaMapper) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();
    for snapshot in snapshots {
        let expected = mapper.channel_of(&snapshot.table)?;
        for record in &snapshot.records {
            let Some(stored) = record.text(FieldName::Channel) else {
                continue;
            };
            if record.channel() != Some(expected) {
                findings.push(
                    Finding::new(
                        Pass::ChannelCoherence,
                        Severity::Critical,
                        format!(
                            "case '{}' has channel '{}' in the {} table",
                            record.case_id, stored, expected
                        ),
                    )
                    .with_ref(reference(record))
                    .with_fix(FieldName::Channel, CellValue::from(expected.label())),
                );
            }
        }
    }
    Ok(findings)
}

/// Pass 6: spam cases should be excluded from SLA and not worked.
pub fn exclusion_flags(snapshots: &[TableSnapshot]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for record in all_records(snapshots) {
        if record.flag(FieldName::Spam) != Some(true) {
            continue;
        }
        if record.flag(FieldName::ExcludeFromSla) != Some(true) {
            findings.push(
                Finding::new(
                    Pass::ExclusionFlags,
                    Severity::Warning,
                    format!("spam case '{}' is not excluded from SLA", record.case_id),
                )
                .with_ref(reference(record)),
            );
        }
        if let Some(status) = record.status() {
            if !status.is_unassigned() && !status.is_closed() {
                findings.push(
                    Finding::new(
                        Pass::ExclusionFlags,
                        Severity::Warning,
                        format!("spam case '{}' is under active handling ('{}')", record.case_id, status),
                    )
                    .with_ref(reference(record)),
                );
            }
        }
    }
    findings
}

/// Pass 7: required fields must be filled. One finding per record.
pub fn completeness(snapshots: &[TableSnapshot], mapper: &SchemaMapper) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();
    for snapshot in snapshots {
        let required = mapper.required_fields(&snapshot.table)?;
        for record in &snapshot.records {
            let missing: Vec<&str> = required
                .iter()
                .filter(|f| record.get(**f).is_empty())
                .map(|f| f.display_name())
                .collect();
            if !missing.is_empty() {
                findings.push(
                    Finding::new(
                        Pass::Completeness,
                        Severity::Warning,
                        format!("case '{}' is missing {}", record.case_id, missing.join(", ")),
                    )
                    .with_ref(reference(record)),
                );
            }
        }
    }
    Ok(findings)
}

/// Result of the bounded duplicate pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateScan {
    pub findings: Vec<Finding>,
    pub comparisons: usize,
    pub truncated: bool,
}

/// Pass 8: weighted fuzzy duplicates, compared within blocking buckets.
///
/// Stops once `max_comparisons` pairs have been scored.
pub fn duplicates(snapshots: &[TableSnapshot], threshold: f64, max_comparisons: usize) -> DuplicateScan {
    let mut buckets: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    for record in all_records(snapshots) {
        if let Some(key) = blocking_key(record) {
            buckets.entry(key).or_default().push(record);
        }
    }

    let mut scan = DuplicateScan {
        findings: Vec::new(),
        comparisons: 0,
        truncated: false,
    };

    'buckets: for bucket in buckets.values() {
        for (i, a) in bucket.iter().enumerate() {
            for b in &bucket[i + 1..] {
                if scan.comparisons >= max_comparisons {
                    scan.truncated = true;
                    break 'buckets;
                }
                scan.comparisons += 1;

                let score = record_similarity(a, b);
                let (severity, label) = if score >= EXACT_SCORE {
                    (Severity::Warning, "exact duplicate")
                } else if score >= threshold {
                    (Severity::Info, "potential duplicate")
                } else {
                    continue;
                };
                scan.findings.push(
                    Finding::new(
                        Pass::Duplicates,
                        severity,
                        format!(
                            "{}: '{}' and '{}' (similarity {:.2})",
                            label, a.case_id, b.case_id, score
                        ),
                    )
                    .with_ref(reference(a))
                    .with_ref(reference(b)),
                );
            }
        }
    }
    scan
}

/// Pass 9: the header row must carry the descriptor's display names.
pub fn schema_drift(snapshots: &[TableSnapshot], mapper: &SchemaMapper) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();
    for snapshot in snapshots {
        let expected = mapper.header_row(&snapshot.table)?;

        if snapshot.header.iter().all(|v| v.is_empty()) {
            findings.push(Finding::new(
                Pass::SchemaDrift,
                Severity::Warning,
                format!("table '{}' has no header row", snapshot.table),
            ));
            continue;
        }

        let mismatches: Vec<String> = expected
            .iter()
            .enumerate()
            .filter_map(|(i, want)| {
                let found = snapshot.header.get(i).cloned().unwrap_or_default();
                let same = want.render().trim().eq_ignore_ascii_case(found.render().trim());
                (!same).then(|| {
                    format!(
                        "{}: expected '{}', found '{}'",
                        ColumnRef(i as u32),
                        want,
                        found
                    )
                })
            })
            .collect();

        if !mismatches.is_empty() {
            findings.push(Finding::new(
                Pass::SchemaDrift,
                Severity::Warning,
                format!("table '{}' header drifted: {}", snapshot.table, mismatches.join("; ")),
            ));
        }
    }
    Ok(findings)
}

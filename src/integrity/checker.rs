//! Integrity Checker - cross-table audits over a full snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::common::{Clock, Result};
use crate::integrity::finding::{Finding, Pass, Severity};
use crate::integrity::report::{
    Correction, CorrectionOutcome, IntegrityOptions, IntegrityReport, SummaryCounts,
};
use crate::integrity::rules;
use crate::record::{RecordModel, TableSnapshot};
use crate::storage::CellValue;

#[derive(Debug)]
struct CachedReport {
    key: IntegrityOptions,
    at: Instant,
    report: IntegrityReport,
}

/// Runs the integrity passes and caches the latest report briefly.
#[derive(Debug)]
pub struct IntegrityChecker {
    clock: Arc<dyn Clock>,
    report_ttl: Duration,
    cached: Mutex<Option<CachedReport>>,
}

impl IntegrityChecker {
    pub fn new(clock: Arc<dyn Clock>, report_ttl: Duration) -> Self {
        Self {
            clock,
            report_ttl,
            cached: Mutex::new(None),
        }
    }

    /// Audit every table the model's mapper knows.
    ///
    /// A report for the same options younger than the report TTL is
    /// returned as-is unless `force_refresh` is set. A run that applies
    /// corrections is never cached, and drops any cached report.
    ///
    /// # Errors
    /// Fails only if a table cannot be read; findings are data.
    pub fn run(&self, model: &RecordModel, options: &IntegrityOptions) -> Result<IntegrityReport> {
        let key = options.cache_key();
        if !options.force_refresh {
            if let Some(report) = self.cached_report(&key) {
                debug!("integrity report served from cache");
                return Ok(report);
            }
        }

        let mapper = model.mapper();
        let snapshots: Vec<TableSnapshot> = mapper
            .tables()
            .map(|table| model.scan_table(table))
            .collect::<Result<_>>()?;

        let as_of = options.as_of.unwrap_or_else(|| self.clock.utc_now());
        let duplicates = rules::duplicates(
            &snapshots,
            options.similarity_threshold,
            options.max_duplicate_comparisons,
        );

        let mut findings_by_pass: BTreeMap<Pass, Vec<Finding>> = BTreeMap::new();
        findings_by_pass.insert(Pass::Uniqueness, rules::uniqueness(&snapshots));
        findings_by_pass.insert(Pass::CrossField, rules::cross_field(&snapshots));
        findings_by_pass.insert(Pass::Temporal, rules::temporal(&snapshots, as_of));
        findings_by_pass.insert(Pass::StatusAssignment, rules::status_assignment(&snapshots));
        findings_by_pass.insert(Pass::ChannelCoherence, rules::channel_coherence(&snapshots, mapper)?);
        findings_by_pass.insert(Pass::ExclusionFlags, rules::exclusion_flags(&snapshots));
        findings_by_pass.insert(Pass::Completeness, rules::completeness(&snapshots, mapper)?);
        findings_by_pass.insert(Pass::Duplicates, duplicates.findings);
        findings_by_pass.insert(Pass::SchemaDrift, rules::schema_drift(&snapshots, mapper)?);
        findings_by_pass.retain(|_, findings| !findings.is_empty());

        let mut summary = SummaryCounts {
            tables_checked: snapshots.len(),
            records_checked: snapshots.iter().map(|s| s.records.len()).sum(),
            ..SummaryCounts::default()
        };
        for finding in findings_by_pass.values().flatten() {
            summary.count(finding.severity);
        }

        let corrections = if options.auto_correct {
            self.apply_corrections(model, &findings_by_pass)
        } else {
            Vec::new()
        };

        let recommendations = Self::recommendations(
            &findings_by_pass,
            duplicates.truncated,
            duplicates.comparisons,
        );

        let report = IntegrityReport {
            summary,
            findings_by_pass,
            corrections,
            recommendations,
            generated_at: self.clock.utc_now(),
            duplicate_comparisons: duplicates.comparisons,
            duplicate_truncated: duplicates.truncated,
        };

        info!(
            tables = summary.tables_checked,
            records = summary.records_checked,
            critical = summary.critical,
            warning = summary.warning,
            info = summary.info,
            corrections = report.corrections.len(),
            "integrity check complete"
        );

        let mut cached = self.cached.lock();
        if report.corrections.is_empty() {
            *cached = Some(CachedReport {
                key,
                at: self.clock.now(),
                report: report.clone(),
            });
        } else {
            *cached = None;
        }
        Ok(report)
    }

    /// Drop the cached report.
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    fn cached_report(&self, key: &IntegrityOptions) -> Option<IntegrityReport> {
        let now = self.clock.now();
        let cached = self.cached.lock();
        cached
            .as_ref()
            .filter(|c| &c.key == key && now.saturating_duration_since(c.at) < self.report_ttl)
            .map(|c| c.report.clone())
    }

    /// Apply every fix proposed by an auto-correctable pass.
    fn apply_corrections(
        &self,
        model: &RecordModel,
        findings_by_pass: &BTreeMap<Pass, Vec<Finding>>,
    ) -> Vec<Correction> {
        let mut corrections = Vec::new();
        for (pass, findings) in findings_by_pass {
            if !pass.auto_correctable() {
                continue;
            }
            for finding in findings {
                let (Some(fix), Some(target)) = (&finding.fix, finding.record_refs.first()) else {
                    continue;
                };

                let from = model
                    .read_record(&target.table, &target.case_id)
                    .map(|r| r.get(fix.field).clone())
                    .unwrap_or(CellValue::Empty);
                let mut fields = BTreeMap::new();
                fields.insert(fix.field, fix.value.clone());

                let outcome = match model.update_record(&target.table, &target.case_id, fields) {
                    Ok(_) => {
                        info!(table = %target.table, case_id = %target.case_id, field = %fix.field, "integrity correction applied");
                        CorrectionOutcome::Applied
                    }
                    Err(err) => {
                        warn!(table = %target.table, case_id = %target.case_id, error = %err, "integrity correction failed");
                        CorrectionOutcome::Failed(err.to_string())
                    }
                };
                corrections.push(Correction {
                    table: target.table.clone(),
                    case_id: target.case_id.clone(),
                    field: fix.field,
                    from,
                    to: fix.value.clone(),
                    outcome,
                });
            }
        }
        corrections
    }

    fn recommendations(
        findings_by_pass: &BTreeMap<Pass, Vec<Finding>>,
        truncated: bool,
        comparisons: usize,
    ) -> Vec<String> {
        let mut out = Vec::new();
        for (pass, findings) in findings_by_pass {
            let critical = findings.iter().filter(|f| f.severity == Severity::Critical).count();
            let text = match pass {
                Pass::Uniqueness => "Merge or re-key cases whose id appears in more than one place.",
                Pass::CrossField => "Reconcile the assignee of cases copied across tables.",
                Pass::Temporal => "Correct timestamps that are out of order or in the future.",
                Pass::StatusAssignment => "Assign an owner to worked cases and clear owners of open ones.",
                Pass::ChannelCoherence => "Run with auto-correction to restore each table's channel.",
                Pass::ExclusionFlags => "Exclude spam cases from SLA and stop working them.",
                Pass::Completeness => "Fill in missing required fields.",
                Pass::Duplicates => "Review likely duplicate cases and merge where appropriate.",
                Pass::SchemaDrift => "Restore header rows with initialize_tables.",
            };
            if critical > 0 {
                out.push(format!("{} ({} critical)", text, critical));
            } else {
                out.push(text.to_string());
            }
        }
        if truncated {
            out.push(format!(
                "Duplicate detection stopped after {} comparisons; raise max_duplicate_comparisons for a complete scan.",
                comparisons
            ));
        }
        out
    }
}

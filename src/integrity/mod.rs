//! Cross-table integrity checking.
//!
//! # Components
//! - [`IntegrityChecker`] - Runs the passes, applies fixes, caches reports
//! - [`rules`] - The passes themselves, pure over table snapshots
//! - [`similarity`] - Edit distance and weighted record similarity
//! - [`IntegrityReport`] - Findings, corrections and recommendations

mod checker;
mod finding;
mod report;
pub mod rules;
pub mod similarity;

pub use checker::IntegrityChecker;
pub use finding::{FieldFix, Finding, Pass, RecordRef, Severity};
pub use report::{
    Correction, CorrectionOutcome, IntegrityOptions, IntegrityReport, SummaryCounts,
    DEFAULT_MAX_DUPLICATE_COMPARISONS, DEFAULT_SIMILARITY_THRESHOLD,
};

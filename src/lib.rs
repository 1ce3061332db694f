//! casegrid - A data engine for support cases stored in rate-limited tabular workbooks.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           CaseEngine                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │          Integrity Layer (integrity/)                    │   │
//! │  │   Nine passes → findings → optional auto-correction      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │          Record Layer (record/)                          │   │
//! │  │     create / read / update / search over case rows       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │               ↓                              ↓                  │
//! │  ┌─────────────────────────┐   ┌───────────────────────────┐   │
//! │  │ Schema (schema/)        │   │ Locks (lock/)              │   │
//! │  │ logical fields ↔ columns│   │ named, timed, hard ceiling │   │
//! │  └─────────────────────────┘   └───────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │          Batch I/O (batch/)                              │   │
//! │  │   TTL cache + coalescing + chunking + throttling         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │          Storage Layer (storage/)                        │   │
//! │  │     TabularBackend: in-memory or checksummed file        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (TableId, A1 addresses, Error, config, clock)
//! - [`storage`] - The physical tabular backend
//! - [`schema`] - Table descriptors and field validation
//! - [`batch`] - Cached, batched, throttled backend access
//! - [`lock`] - Named exclusive locks
//! - [`record`] - Support-case records
//! - [`integrity`] - Cross-table audits
//!
//! # Quick Start
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! use casegrid::storage::InMemoryBackend;
//! use casegrid::{CaseEngine, EngineConfig, FieldName, IntegrityOptions, SchemaMapper};
//!
//! let mapper = SchemaMapper::standard().unwrap();
//! let backend = Arc::new(InMemoryBackend::with_tables(mapper.tables().cloned()));
//! let engine = CaseEngine::new(backend, EngineConfig::default()).unwrap();
//! engine.initialize_tables().unwrap();
//!
//! let mut fields = BTreeMap::new();
//! fields.insert(FieldName::Subject, "Password reset fails".into());
//! fields.insert(FieldName::CustomerEmail, "ana@example.com".into());
//! let case = engine.create_record(&"Chat Cases".into(), fields).unwrap();
//!
//! let report = engine.run_integrity_check(&IntegrityOptions::default()).unwrap();
//! println!("{} -> {}", case.case_id, report);
//! ```

pub mod batch;
pub mod common;
pub mod engine;
pub mod integrity;
pub mod lock;
pub mod record;
pub mod schema;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::{CellRange, EngineConfig, Error, ErrorKind, Result, TableId};

pub use batch::{BatchEngine, CacheStatistics};
pub use engine::{CaseEngine, SweepOutcome};
pub use integrity::{IntegrityOptions, IntegrityReport, Severity};
pub use lock::{LockCoordinator, LockStatus};
pub use record::{Record, RecordFilter, RecordModel};
pub use schema::{FieldName, SchemaMapper};
pub use storage::{CellValue, TabularBackend};

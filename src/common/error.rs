//! Error types for casegrid.

use std::fmt;
use std::time::Duration;

use crate::common::TableId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every layer of the engine.
///
/// `RateLimit` and `IntegrityViolation` exist for classification only:
/// throttling is absorbed by the batch engine and integrity findings are
/// returned as data, so no `Error` ever reports either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Validation,
    BackendUnavailable,
    RateLimit,
    LockTimeout,
    IntegrityViolation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::BackendUnavailable => "BACKEND_UNAVAILABLE",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::LockTimeout => "LOCK_TIMEOUT",
            ErrorKind::IntegrityViolation => "INTEGRITY_VIOLATION",
        };
        f.write_str(s)
    }
}

/// A failed physical call against the tabular backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} on '{table}' failed: {message}")]
pub struct BackendError {
    pub operation: &'static str,
    pub table: String,
    pub message: String,
}

impl BackendError {
    pub fn new(
        operation: &'static str,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            table: table.into(),
            message: message.into(),
        }
    }
}

/// Returned when a lock could not be acquired within the requested timeout.
///
/// Callers decide their own retry policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("timed out after {waited:?} waiting for lock '{key}'")]
pub struct LockTimeout {
    pub key: String,
    pub waited: Duration,
}

/// All possible errors in casegrid.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The table is not registered with the schema mapper.
    #[error("unknown table '{0}'")]
    UnknownTable(TableId),

    /// Engine misconfiguration (bad limits, inconsistent descriptors).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A value failed type or domain checks.
    #[error("invalid value for field '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// A cell address could not be parsed or is out of range.
    #[error("malformed address '{0}'")]
    MalformedAddress(String),

    #[error("case '{case_id}' not found in table '{table}'")]
    RecordNotFound { table: TableId, case_id: String },

    #[error("case '{case_id}' already exists in table '{table}'")]
    DuplicateCase { table: TableId, case_id: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    LockTimeout(#[from] LockTimeout),

    /// Persisted workbook failed its checksum.
    #[error("workbook corrupt: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("engine has been shut down")]
    ShutDown,
}

impl Error {
    /// Shorthand for a validation failure on a named field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error in the engine taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownTable(_) | Error::Configuration(_) | Error::ShutDown => {
                ErrorKind::Configuration
            }
            Error::Validation { .. }
            | Error::MalformedAddress(_)
            | Error::RecordNotFound { .. }
            | Error::DuplicateCase { .. } => ErrorKind::Validation,
            Error::Backend(_) | Error::Corrupt(_) | Error::Io(_) | Error::Serialization(_) => {
                ErrorKind::BackendUnavailable
            }
            Error::LockTimeout(_) => ErrorKind::LockTimeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownTable(TableId::new("Fax Cases"));
        assert_eq!(format!("{}", err), "unknown table 'Fax Cases'");

        let err = Error::validation("Status", "'Pending' is not an allowed value");
        assert_eq!(
            format!("{}", err),
            "invalid value for field 'Status': 'Pending' is not an allowed value"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::UnknownTable(TableId::new("x")).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::MalformedAddress("1A".into()).kind(),
            ErrorKind::Validation
        );
        let backend = BackendError::new("batch_get", "Email Cases", "quota exceeded");
        assert_eq!(Error::from(backend).kind(), ErrorKind::BackendUnavailable);
        let timeout = LockTimeout {
            key: "case_update_C-1".into(),
            waited: Duration::from_millis(50),
        };
        assert_eq!(Error::from(timeout).kind(), ErrorKind::LockTimeout);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::BackendUnavailable.to_string(), "BACKEND_UNAVAILABLE");
        assert_eq!(ErrorKind::LockTimeout.to_string(), "LOCK_TIMEOUT");
    }
}

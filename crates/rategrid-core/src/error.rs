//! Core error types for rategrid-core.
//!
//! Every failure the core can report falls into one of the enums below and
//! is surfaced to the operator as a single readable message. Nothing here is
//! retried automatically.

use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::{CellKey, RowKind};
use crate::reconcile::CommitReport;
use crate::sync::DisabledReason;

/// Core error type for rategrid-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Record store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Grid assembly errors
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Commit errors
    #[error("Save failed: {0}")]
    Commit(#[from] CommitError),

    /// Channel-manager sync errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Record-store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Referenced entity or record does not exist
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// A second record for the same (owner, date) slot
    #[error("{kind} record for {owner} on {date} already exists")]
    DuplicateRecord {
        kind: RowKind,
        owner: String,
        date: NaiveDate,
    },

    /// Backend could not be reached or refused the call
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

/// Grid assembly errors. Any of these means no grid was produced.
#[derive(Error, Debug)]
pub enum GridError {
    /// The store failed to supply data the grid needs
    #[error("Failed to load {what} for '{owner}': {source}")]
    Fetch {
        what: &'static str,
        owner: String,
        #[source]
        source: StoreError,
    },

    /// The store returned two records for one slot
    #[error("Store returned more than one {kind} record for '{owner}' on {date}")]
    DuplicateRecord {
        kind: RowKind,
        owner: String,
        date: NaiveDate,
    },

    /// The requested range is unusable
    #[error(transparent)]
    Range(#[from] ValidationError),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// End date before start date
    #[error("Invalid date range: end ({end}) is before start ({start})")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Date range longer than allowed
    #[error("Date range of {days} days exceeds the maximum of {max}")]
    RangeTooLong { days: usize, max: usize },

    /// Input is not a whole base-10 number
    #[error("'{input}' is not a whole number")]
    NotAnInteger { input: String },

    /// Value outside the accepted domain
    #[error("{value} is outside the allowed range {min}..={max}")]
    OutOfRange { value: i64, min: u32, max: u32 },

    /// Cell not present in the loaded grid
    #[error("No grid cell for {key}")]
    UnknownCell { key: CellKey },

    /// Value of the wrong kind for the row
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// One rejected cell inside an aggregate commit validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct CellIssue {
    pub key: CellKey,
    pub error: ValidationError,
}

impl fmt::Display for CellIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.error)
    }
}

fn join_issues(issues: &[CellIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Commit (save) errors.
#[derive(Error, Debug)]
pub enum CommitError {
    /// At least one edit failed validation; nothing was sent to the store
    #[error("{} cell(s) failed validation, nothing was saved: {}", .issues.len(), join_issues(.issues))]
    Invalid { issues: Vec<CellIssue> },

    /// Some operations failed; the successful ones were kept
    #[error(
        "{} of {} change(s) could not be saved; {} saved change(s) were kept, save again to retry",
        .report.failure_count(),
        .report.len(),
        .report.success_count()
    )]
    Partial { report: Box<CommitReport> },

    /// A save for this session is still running
    #[error("Another save is still in progress")]
    CommitInFlight,
}

/// Channel-manager sync errors.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Sync preconditions are not met
    #[error("Sync disabled: {0}")]
    Disabled(DisabledReason),

    /// The row is not part of the loaded grid
    #[error("Unknown row: {0}")]
    UnknownRow(String),

    /// Channel manager refused the payload
    #[error("Channel manager rejected the update (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid channel manager URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No API key in the keyring or environment
    #[error("Channel manager API key is not configured")]
    MissingCredentials,

    /// Channel manager connection settings are incomplete
    #[error("Channel manager not configured: {0}")]
    NotConfigured(String),

    /// Keyring access failed
    #[error("Credential store error: {0}")]
    Credential(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<keyring::Error> for SyncError {
    fn from(err: keyring::Error) -> Self {
        SyncError::Credential(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn aggregate_validation_message_lists_every_cell() {
        let err = CommitError::Invalid {
            issues: vec![
                CellIssue {
                    key: CellKey::new(RowKind::Availability, "R1", d("2024-06-01")),
                    error: ValidationError::OutOfRange { value: 0, min: 1, max: 12 },
                },
                CellIssue {
                    key: CellKey::new(RowKind::Availability, "R2", d("2024-06-02")),
                    error: ValidationError::OutOfRange { value: 13, min: 1, max: 12 },
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 cell(s) failed validation"));
        assert!(msg.contains("availability R1 2024-06-01"));
        assert!(msg.contains("availability R2 2024-06-02"));
    }

    #[test]
    fn store_errors_wrap_into_core_error() {
        let err: CoreError = StoreError::Unavailable("offline".into()).into();
        assert_eq!(err.to_string(), "Store error: Record store unavailable: offline");
    }

    #[test]
    fn disabled_sync_message_carries_reason() {
        let err = SyncError::Disabled(DisabledReason::NoChanges);
        assert_eq!(err.to_string(), "Sync disabled: no changes to sync");
    }
}

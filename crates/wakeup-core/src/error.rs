//! Core error types for wakeup-core.
//!
//! Only [`CoreError::PermissionDenied`] aborts a resync. Registration and
//! cancellation failures are recovered inside the coordinator and surface
//! as counts in its reports.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Core error type for wakeup-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The external scheduler did not grant authorization.
    #[error("Scheduler authorization denied for alarm {alarm_id}")]
    PermissionDenied { alarm_id: Uuid },

    /// The alarm is not known to the alarm store.
    #[error("Unknown alarm: {0}")]
    UnknownAlarm(Uuid),

    /// External scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Holiday dataset errors
    #[error("Holiday data error: {0}")]
    Holiday(#[from] HolidayError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reported by an external scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler rejected a single registration.
    #[error("Registration of {id} failed: {reason}")]
    RegistrationFailed { id: String, reason: String },

    /// The scheduler could not cancel a registration.
    #[error("Cancellation of {id} failed: {reason}")]
    CancellationFailed { id: String, reason: String },

    /// The scheduler could not be reached at all.
    #[error("Scheduler unavailable: {0}")]
    Unavailable(String),
}

/// SQLite failures.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Cannot open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Schema migration failed: {0}")]
    MigrationFailed(String),

    /// Stored row could not be decoded
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: String, message: String },

    /// Another process holds the write lock (SQLITE_BUSY / SQLITE_LOCKED).
    #[error("Database busy")]
    Locked,
}

/// `config.toml` failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Cannot write {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// The value does not fit the key's type or allowed range.
    #[error("Bad value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Holiday dataset errors.
#[derive(Error, Debug)]
pub enum HolidayError {
    /// HTTP transport failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Holiday data for {year} unavailable (HTTP {status})")]
    Status { year: i32, status: u16 },

    /// Payload could not be parsed
    #[error("Failed to parse holiday data: {0}")]
    Parse(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Value outside of its allowed range
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    pub(crate) fn out_of_range(field: &str, value: i64, min: i64, max: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.to_string(),
            value,
            min,
            max,
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// All errors produced by the attendance report crates.
#[derive(Error, Debug)]
pub enum AttendanceError {
    /// A file could not be opened, read or written.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A date string was not in `YYYY-MM-DD` form.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A status string is not one of the recognised attendance statuses.
    #[error("Invalid attendance status: {0}")]
    InvalidStatus(String),

    /// Meeting records were supplied out of chronological order.
    #[error("Meeting records out of order: {later} follows {earlier}")]
    UnorderedRecords { earlier: NaiveDate, later: NaiveDate },

    /// Two meeting records share the same date.
    #[error("Duplicate meeting record for {0}")]
    DuplicateDate(NaiveDate),

    /// The attendance store directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the attendance crates.
pub type Result<T> = std::result::Result<T, AttendanceError>;

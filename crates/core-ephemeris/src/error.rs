//! Error types for ephemeris lookups

use chrono::NaiveDate;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for ephemeris operations
pub type Result<T> = std::result::Result<T, EphemerisError>;

/// Errors that can occur while loading or querying the tables
#[derive(Error, Debug)]
pub enum EphemerisError {
    /// I/O error occurred while reading a table file
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Table content is malformed
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    /// Time or date string could not be parsed
    #[error("Invalid time '{value}': expected {expected}")]
    InvalidTime { value: String, expected: &'static str },

    /// The tables do not cover the requested instant
    #[error("Astronomical data exhausted: {0}")]
    DataExhausted(String),
}

impl EphemerisError {
    /// Whether this error means the tables cannot answer for "now"
    pub fn is_data_exhausted(&self) -> bool {
        matches!(self, EphemerisError::DataExhausted(_))
    }
}

/// A sun table has no row for the requested reference date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupMiss {
    /// Reference date that was looked up
    pub date: NaiveDate,
}

impl std::fmt::Display for LookupMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no sun data for {}", self.date.format("%m-%d"))
    }
}

impl std::error::Error for LookupMiss {}

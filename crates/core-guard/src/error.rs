//! Error types for the guard primitives

use thiserror::Error;

/// Errors that can occur when configuring or addressing guard primitives
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GuardError {
    /// Channel name did not match any monitored channel
    #[error("Unknown thermal channel: {0}")]
    UnknownChannel(String),

    /// Ceiling must be a positive temperature
    #[error("Invalid ceiling for {channel}: {ceiling} (must be > 0)")]
    InvalidCeiling { channel: String, ceiling: f64 },

    /// Margin must be non-negative and leave a positive release point
    #[error("Invalid hysteresis margin for {channel}: {margin} (ceiling {ceiling})")]
    InvalidMargin {
        channel: String,
        ceiling: f64,
        margin: f64,
    },
}

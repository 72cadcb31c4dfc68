/*!
 * Error types for the supervisor
 */

use skywarden_core_ephemeris::EphemerisError;
use skywarden_core_guard::{GuardError, ThermalChannel};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::hardware::HardwareError;

/// Process exit codes
pub mod exit_code {
    /// Clean shutdown
    pub const SUCCESS: i32 = 0;
    /// Configuration or ephemeris tables rejected before startup
    pub const CONFIG: i32 = 2;
    /// Ephemeris tables do not cover the current date
    pub const DATA_EXHAUSTED: i32 = 3;
    /// Anything else that stopped the supervisor
    pub const FATAL: i32 = 1;
}

/// Result alias for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Errors raised by the supervisor itself
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Configuration missing, unreadable or inconsistent
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Config file could not be read
    #[error("Cannot read {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Ephemeris tables could not be loaded
    #[error("Ephemeris tables: {0}")]
    Ephemeris(EphemerisError),

    /// Ephemeris tables ran out for the current instant
    #[error("Astronomical data exhausted: {0}")]
    DataExhausted(String),

    /// Sensor read failed or timed out
    #[error("Sensor {channel} unavailable: {reason}")]
    SensorUnavailable { channel: ThermalChannel, reason: String },

    /// Actuator write failed
    #[error("Actuator write failed: {0}")]
    ActuatorWriteFailure(#[source] HardwareError),

    /// Socket or file I/O outside the hardware adapters
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SupervisorError {
    /// Whether the supervisor must stop
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SupervisorError::ConfigInvalid(_)
                | SupervisorError::ConfigRead { .. }
                | SupervisorError::Ephemeris(_)
                | SupervisorError::DataExhausted(_)
        )
    }

    /// Exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::ConfigInvalid(_)
            | SupervisorError::ConfigRead { .. }
            | SupervisorError::Ephemeris(_) => exit_code::CONFIG,
            SupervisorError::DataExhausted(_) => exit_code::DATA_EXHAUSTED,
            _ => exit_code::FATAL,
        }
    }

    /// Short category name for structured logs
    pub fn category(&self) -> &'static str {
        match self {
            SupervisorError::ConfigInvalid(_) | SupervisorError::ConfigRead { .. } => "config",
            SupervisorError::Ephemeris(_) | SupervisorError::DataExhausted(_) => "ephemeris",
            SupervisorError::SensorUnavailable { .. } => "sensor",
            SupervisorError::ActuatorWriteFailure(_) => "actuator",
            SupervisorError::Io(_) => "io",
        }
    }
}

impl From<EphemerisError> for SupervisorError {
    fn from(err: EphemerisError) -> Self {
        match err {
            EphemerisError::DataExhausted(msg) => SupervisorError::DataExhausted(msg),
            other => SupervisorError::Ephemeris(other),
        }
    }
}

impl From<HardwareError> for SupervisorError {
    fn from(err: HardwareError) -> Self {
        match err {
            HardwareError::Sensor { channel, reason } => SupervisorError::SensorUnavailable { channel, reason },
            other => SupervisorError::ActuatorWriteFailure(other),
        }
    }
}

impl From<GuardError> for SupervisorError {
    fn from(err: GuardError) -> Self {
        SupervisorError::ConfigInvalid(err.to_string())
    }
}

/// Errors returned to a remote command; logged and dropped by the loop
#[derive(Debug, Error)]
pub enum CommandError {
    /// Name did not match any command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Argument missing or out of range
    #[error("Invalid argument for {command}: {reason}")]
    InvalidArgument { command: &'static str, reason: String },

    /// Command would energize hardware while a thermal latch is tripped
    #[error("{command} rejected: thermal lockout on {}", format_channels(.channels))]
    ThermalLockout {
        command: &'static str,
        channels: Vec<ThermalChannel>,
    },

    /// An actuator write failed while executing the command
    #[error("{command} failed: {source}")]
    Hardware {
        command: &'static str,
        #[source]
        source: HardwareError,
    },
}

fn format_channels(channels: &[ThermalChannel]) -> String {
    channels
        .iter()
        .map(ThermalChannel::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

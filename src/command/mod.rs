/*!
 * Remote commands
 *
 * Commands form a closed set addressed by name. They arrive as OSC messages
 * on UDP, are decoded by the [`listener`], and are queued to the supervisor
 * task through a [`CommandHandle`]. The supervisor runs each one to
 * completion between ticks using the [`handlers`] table.
 */

pub mod handlers;
pub mod listener;

use skywarden_core_guard::ThermalChannel;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::CommandError;
use crate::osc::{OscArg, OscMessage};

pub use listener::CommandListener;

/// Queue depth between the listener and the supervisor
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Every command name the supervisor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    PowerOn,
    PowerOff,
    Test,
    FullTestCycle,
    OverrideTemperature,
    SetRunIndex,
    ForceStartupSequence,
    ForceShutdownSequence,
}

impl CommandKind {
    pub const ALL: [CommandKind; 8] = [
        CommandKind::PowerOn,
        CommandKind::PowerOff,
        CommandKind::Test,
        CommandKind::FullTestCycle,
        CommandKind::OverrideTemperature,
        CommandKind::SetRunIndex,
        CommandKind::ForceStartupSequence,
        CommandKind::ForceShutdownSequence,
    ];

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::PowerOn => "power_on",
            CommandKind::PowerOff => "power_off",
            CommandKind::Test => "test",
            CommandKind::FullTestCycle => "full_test_cycle",
            CommandKind::OverrideTemperature => "override_temperature",
            CommandKind::SetRunIndex => "set_run_index",
            CommandKind::ForceStartupSequence => "force_startup_sequence",
            CommandKind::ForceShutdownSequence => "force_shutdown_sequence",
        }
    }

    /// Look up a name or OSC address (`/power_on`), including the legacy
    /// `/poweron` and `/poweroff` aliases
    pub fn from_name(name: &str) -> Result<Self, CommandError> {
        let key = name.trim().trim_start_matches('/').to_ascii_lowercase();
        match key.as_str() {
            "poweron" => return Ok(CommandKind::PowerOn),
            "poweroff" => return Ok(CommandKind::PowerOff),
            _ => {}
        }

        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.name() == key)
            .ok_or_else(|| CommandError::UnknownCommand(name.trim().to_string()))
    }

    /// Whether this command may energize the lights
    pub fn energizes(&self) -> bool {
        matches!(
            self,
            CommandKind::PowerOn | CommandKind::Test | CommandKind::FullTestCycle | CommandKind::ForceStartupSequence
        )
    }

    /// Whether a successful run suspends the schedule for the override TTL
    pub fn starts_hold(&self) -> bool {
        !matches!(self, CommandKind::OverrideTemperature | CommandKind::FullTestCycle)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded command with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PowerOn,
    PowerOff,
    Test { position: u8 },
    FullTestCycle,
    OverrideTemperature { channel: ThermalChannel, value: f64 },
    SetRunIndex { index: i32 },
    ForceStartupSequence,
    ForceShutdownSequence,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::PowerOn => CommandKind::PowerOn,
            Command::PowerOff => CommandKind::PowerOff,
            Command::Test { .. } => CommandKind::Test,
            Command::FullTestCycle => CommandKind::FullTestCycle,
            Command::OverrideTemperature { .. } => CommandKind::OverrideTemperature,
            Command::SetRunIndex { .. } => CommandKind::SetRunIndex,
            Command::ForceStartupSequence => CommandKind::ForceStartupSequence,
            Command::ForceShutdownSequence => CommandKind::ForceShutdownSequence,
        }
    }

    /// Build a command from a name and positional arguments
    pub fn parse(name: &str, args: &[OscArg]) -> Result<Self, CommandError> {
        let kind = CommandKind::from_name(name)?;
        let command = kind.name();
        let arg = |idx: usize, what: &str| {
            args.get(idx).ok_or_else(|| CommandError::InvalidArgument {
                command,
                reason: format!("missing {}", what),
            })
        };
        let invalid = |reason: String| CommandError::InvalidArgument { command, reason };

        Ok(match kind {
            CommandKind::PowerOn => Command::PowerOn,
            CommandKind::PowerOff => Command::PowerOff,
            CommandKind::FullTestCycle => Command::FullTestCycle,
            CommandKind::ForceStartupSequence => Command::ForceStartupSequence,
            CommandKind::ForceShutdownSequence => Command::ForceShutdownSequence,
            CommandKind::Test => {
                let raw = arg(0, "phase index")?;
                let position = raw
                    .as_int()
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(|| invalid(format!("phase index {} is not 0..=255", raw)))?;
                Command::Test { position }
            }
            CommandKind::OverrideTemperature => {
                let raw = arg(0, "channel")?;
                let channel = raw
                    .as_str()
                    .ok_or_else(|| invalid(format!("channel {} is not a string", raw)))?
                    .parse::<ThermalChannel>()
                    .map_err(|e| invalid(e.to_string()))?;
                let raw = arg(1, "temperature")?;
                let value = raw
                    .as_float()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| invalid(format!("temperature {} is not a number", raw)))?;
                Command::OverrideTemperature { channel, value }
            }
            CommandKind::SetRunIndex => {
                let raw = arg(0, "run index")?;
                let index = raw
                    .as_int()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| invalid(format!("run index {} is not an integer", raw)))?;
                Command::SetRunIndex { index }
            }
        })
    }

    /// Decode an OSC message addressed by command name
    pub fn from_message(message: &OscMessage) -> Result<Self, CommandError> {
        Self::parse(&message.address, &message.args)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Test { position } => write!(f, "test({})", position),
            Command::OverrideTemperature { channel, value } => {
                write!(f, "override_temperature({}, {})", channel, value)
            }
            Command::SetRunIndex { index } => write!(f, "set_run_index({})", index),
            other => f.write_str(other.kind().name()),
        }
    }
}

/// Queue submission failures
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("command queue is full")]
    Full,
    #[error("supervisor is not accepting commands")]
    Closed,
}

/// Sending side of the supervisor's command queue
#[derive(Debug, Clone)]
pub struct CommandHandle {
    tx: mpsc::Sender<Command>,
}

impl CommandHandle {
    /// Submit a command, waiting for queue space
    pub async fn submit(&self, command: Command) -> Result<(), SubmitError> {
        self.tx.send(command).await.map_err(|_| SubmitError::Closed)
    }

    /// Submit without waiting
    pub fn try_submit(&self, command: Command) -> Result<(), SubmitError> {
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }
}

/// Create a bounded command queue
pub fn command_queue(capacity: usize) -> (CommandHandle, mpsc::Receiver<Command>) {
    let (tx, rx) = mpsc::channel(capacity);
    (CommandHandle { tx }, rx)
}

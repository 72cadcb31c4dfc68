/*!
 * Skywarden - supervisor for unattended outdoor lighting
 *
 * Drives a main power relay and an eight-position lunar phase array:
 * - Sun-tracked lit window with on-time offsets and an optional hard-off
 * - Lunar phase selection from tabulated phase boundaries
 * - Per-channel thermal cut-out with hysteresis
 * - Remote OSC commands with a time-limited manual hold
 * - Hardware watchdog keep-alive
 *
 * The pure scheduling and thermal logic lives in `skywarden-core-ephemeris`
 * and `skywarden-core-guard`; this crate wires it to hardware.
 */

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod osc;
pub mod phase;
pub mod power;
pub mod supervisor;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{command_queue, Command, CommandHandle, CommandKind, CommandListener};
pub use config::SupervisionConfig;
pub use error::{CommandError, Result, SupervisorError};
pub use hardware::{Actuators, Hardware, HardwareError, MockHardware, Sensors};
pub use supervisor::{Supervisor, SupervisorState, TickOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}

/*!
 * Main power relay and display player sequencing
 *
 * Startup and shutdown are ordered so the display player never sees the LED
 * supply disappear mid-frame:
 *
 * ```text
 *   startup:   run index := default, mode := startup, relay on,
 *              settle (short), mode := steady
 *   shutdown:  run index := default, settle (long), mode := off, relay off
 * ```
 */

use std::fmt;
use std::time::Duration;

use crate::config::{DisplayConfig, SupervisionConfig};
use crate::hardware::{display, settle, Actuators, HardwareError};

/// Power state of the main lights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Stopped => write!(f, "STOPPED"),
            PowerState::Running => write!(f, "RUNNING"),
        }
    }
}

/// What a call to [`PowerController::stop`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Full shutdown sequence ran
    Sequenced,
    /// Already stopped, but the relay was energized and has been cut
    RelayReasserted,
    /// Nothing to do
    AlreadyStopped,
}

/// Two-state power controller
///
/// The state only advances once a whole sequence has succeeded; a failed
/// write leaves it where it was so the next tick retries.
#[derive(Debug, Clone)]
pub struct PowerController {
    state: PowerState,
    relay_energized: bool,
    display: DisplayConfig,
    startup_settle: Duration,
    shutdown_settle: Duration,
    keepalive: Option<Duration>,
}

impl PowerController {
    pub fn new(config: &SupervisionConfig) -> Self {
        Self {
            state: PowerState::Stopped,
            // Unknown until the first write, so treat as live
            relay_energized: true,
            display: config.display,
            startup_settle: Duration::from_secs(config.startup_settle_secs),
            shutdown_settle: Duration::from_secs(config.shutdown_settle_secs),
            keepalive: config.watchdog_keepalive(),
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PowerState::Running
    }

    /// Last relay level successfully written (true before the first write)
    pub fn relay_energized(&self) -> bool {
        self.relay_energized
    }

    /// STOPPED→RUNNING; returns false when already running
    pub async fn start(&mut self, hw: &dyn Actuators) -> Result<bool, HardwareError> {
        if self.is_running() {
            return Ok(false);
        }
        self.startup_sequence(hw).await?;
        Ok(true)
    }

    /// RUNNING→STOPPED, or cut a stray energized relay while STOPPED
    pub async fn stop(&mut self, hw: &dyn Actuators) -> Result<StopOutcome, HardwareError> {
        if self.is_running() {
            self.shutdown_sequence(hw).await?;
            return Ok(StopOutcome::Sequenced);
        }

        if self.relay_energized {
            self.set_relay(hw, false).await?;
            return Ok(StopOutcome::RelayReasserted);
        }

        Ok(StopOutcome::AlreadyStopped)
    }

    /// Run the startup sequence regardless of state
    pub async fn startup_sequence(&mut self, hw: &dyn Actuators) -> Result<(), HardwareError> {
        tracing::debug!("power startup sequence");
        hw.send_display_command(display::BACKGROUND_RUN_INDEX, self.display.default_run_index)
            .await?;
        hw.send_display_command(display::BACKGROUND_MODE, self.display.startup_mode)
            .await?;
        self.write_relay(hw, true).await?;
        settle(hw, self.startup_settle, self.keepalive).await;
        hw.send_display_command(display::BACKGROUND_MODE, self.display.steady_mode)
            .await?;

        self.state = PowerState::Running;
        Ok(())
    }

    /// Run the shutdown sequence regardless of state
    pub async fn shutdown_sequence(&mut self, hw: &dyn Actuators) -> Result<(), HardwareError> {
        tracing::debug!("power shutdown sequence");
        hw.send_display_command(display::BACKGROUND_RUN_INDEX, self.display.default_run_index)
            .await?;
        settle(hw, self.shutdown_settle, self.keepalive).await;
        hw.send_display_command(display::BACKGROUND_MODE, self.display.off_mode)
            .await?;
        self.write_relay(hw, false).await?;

        self.state = PowerState::Stopped;
        Ok(())
    }

    /// Drive the relay directly; cutting it also marks the lights stopped
    pub async fn set_relay(&mut self, hw: &dyn Actuators, on: bool) -> Result<(), HardwareError> {
        self.write_relay(hw, on).await?;
        if !on {
            self.state = PowerState::Stopped;
        }
        Ok(())
    }

    async fn write_relay(&mut self, hw: &dyn Actuators, on: bool) -> Result<(), HardwareError> {
        hw.set_power_relay(on).await?;
        self.relay_energized = on;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::minimal;
    use crate::hardware::{ActuatorWrite, MockHardware};

    fn display(address: &str, arg: i32) -> ActuatorWrite {
        ActuatorWrite::Display {
            address: address.to_string(),
            arg,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_sequence_order() {
        let hw = MockHardware::new();
        let mut power = PowerController::new(&minimal());

        let start = tokio::time::Instant::now();
        assert!(power.start(&hw).await.unwrap());

        assert_eq!(
            hw.writes(),
            vec![
                display(display::BACKGROUND_RUN_INDEX, 0),
                display(display::BACKGROUND_MODE, 1),
                ActuatorWrite::Relay(true),
                display(display::BACKGROUND_MODE, 2),
            ]
        );
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(power.state(), PowerState::Running);
        assert_eq!(hw.keepalive_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_when_running_is_noop() {
        let hw = MockHardware::new();
        let mut power = PowerController::new(&minimal());
        power.start(&hw).await.unwrap();
        hw.take_writes();

        assert!(!power.start(&hw).await.unwrap());
        assert!(hw.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_sequence_order() {
        let hw = MockHardware::new();
        let mut power = PowerController::new(&minimal());
        power.start(&hw).await.unwrap();
        hw.take_writes();

        let start = tokio::time::Instant::now();
        assert_eq!(power.stop(&hw).await.unwrap(), StopOutcome::Sequenced);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(
            hw.writes(),
            vec![
                display(display::BACKGROUND_RUN_INDEX, 0),
                display(display::BACKGROUND_MODE, 0),
                ActuatorWrite::Relay(false),
            ]
        );
        assert_eq!(power.state(), PowerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_stopped_reasserts_relay_only() {
        let hw = MockHardware::new();
        let mut power = PowerController::new(&minimal());

        // Relay level is unknown at boot
        assert_eq!(power.stop(&hw).await.unwrap(), StopOutcome::RelayReasserted);
        assert_eq!(hw.take_writes(), vec![ActuatorWrite::Relay(false)]);

        assert_eq!(power.stop(&hw).await.unwrap(), StopOutcome::AlreadyStopped);
        assert!(hw.writes().is_empty());

        // Manually energized while stopped
        power.set_relay(&hw, true).await.unwrap();
        assert_eq!(power.state(), PowerState::Stopped);
        hw.take_writes();
        assert_eq!(power.stop(&hw).await.unwrap(), StopOutcome::RelayReasserted);
        assert_eq!(hw.writes(), vec![ActuatorWrite::Relay(false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_startup_keeps_state() {
        let hw = MockHardware::new();
        let mut power = PowerController::new(&minimal());
        hw.fail_actuators(true);

        assert!(power.start(&hw).await.is_err());
        assert_eq!(power.state(), PowerState::Stopped);

        hw.fail_actuators(false);
        assert!(power.start(&hw).await.unwrap());
        assert!(power.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_relay_off_stops() {
        let hw = MockHardware::new();
        let mut power = PowerController::new(&minimal());
        power.start(&hw).await.unwrap();

        power.set_relay(&hw, false).await.unwrap();
        assert_eq!(power.state(), PowerState::Stopped);
        assert!(!power.relay_energized());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_mode_skips_watchdog() {
        let hw = MockHardware::new();
        let mut config = minimal();
        config.debug = true;
        let mut power = PowerController::new(&config);

        power.start(&hw).await.unwrap();
        assert_eq!(hw.keepalive_count(), 0);
    }
}

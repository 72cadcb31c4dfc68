//! Recording hardware backend for tests and simulation
//!
//! Every successful actuator write is appended to a log that tests can
//! inspect; watchdog keep-alives are only counted so they never clutter
//! assertions about relay and phase traffic.

use async_trait::async_trait;
use skywarden_core_guard::ThermalChannel;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use super::{Actuators, HardwareError, Sensors};

/// Reading every channel reports until told otherwise
pub const AMBIENT_TEMPERATURE: f64 = 25.0;

/// One recorded actuator write
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorWrite {
    Relay(bool),
    PhasePin { position: u8, on: bool },
    Display { address: String, arg: i32 },
}

#[derive(Debug, Default)]
struct MockState {
    temperatures: HashMap<ThermalChannel, Option<f64>>,
    sensor_delay: Option<Duration>,
    writes: Vec<ActuatorWrite>,
    relay: bool,
    energized: BTreeSet<u8>,
    keepalives: usize,
    fail_actuators: bool,
    fail_watchdog: bool,
    hang_watchdog: bool,
}

/// In-memory hardware that records what the supervisor does
///
/// # Example
///
/// ```rust
/// use skywarden::hardware::{Actuators, ActuatorWrite, MockHardware};
///
/// # async fn example() {
/// let hw = MockHardware::new();
/// hw.set_phase_pin(3, true).await.unwrap();
///
/// assert_eq!(hw.energized_positions(), vec![3]);
/// assert_eq!(hw.writes(), vec![ActuatorWrite::PhasePin { position: 3, on: true }]);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHardware {
    state: Arc<RwLock<MockState>>,
}

impl MockHardware {
    /// Create a backend with every channel at ambient temperature
    pub fn new() -> Self {
        let mock = Self::default();
        for channel in ThermalChannel::ALL {
            mock.set_temperature(channel, Some(AMBIENT_TEMPERATURE));
        }
        mock
    }

    fn read_state(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the reading for `channel`; `None` makes the sensor fail
    pub fn set_temperature(&self, channel: ThermalChannel, value: Option<f64>) {
        self.write_state().temperatures.insert(channel, value);
    }

    /// Delay every sensor read, to exercise read timeouts
    pub fn set_sensor_delay(&self, delay: Option<Duration>) {
        self.write_state().sensor_delay = delay;
    }

    /// Make relay, phase and display writes fail
    pub fn fail_actuators(&self, fail: bool) {
        self.write_state().fail_actuators = fail;
    }

    /// Make watchdog keep-alives fail
    pub fn fail_watchdog(&self, fail: bool) {
        self.write_state().fail_watchdog = fail;
    }

    /// Make watchdog keep-alives never complete
    pub fn hang_watchdog(&self, hang: bool) {
        self.write_state().hang_watchdog = hang;
    }

    /// Every successful actuator write so far
    pub fn writes(&self) -> Vec<ActuatorWrite> {
        self.read_state().writes.clone()
    }

    /// Return and forget the recorded writes
    pub fn take_writes(&self) -> Vec<ActuatorWrite> {
        std::mem::take(&mut self.write_state().writes)
    }

    /// Display commands sent so far, as (address, arg)
    pub fn display_commands(&self) -> Vec<(String, i32)> {
        self.read_state()
            .writes
            .iter()
            .filter_map(|w| match w {
                ActuatorWrite::Display { address, arg } => Some((address.clone(), *arg)),
                _ => None,
            })
            .collect()
    }

    pub fn relay_energized(&self) -> bool {
        self.read_state().relay
    }

    /// Positions currently energized, ascending
    pub fn energized_positions(&self) -> Vec<u8> {
        self.read_state().energized.iter().copied().collect()
    }

    pub fn keepalive_count(&self) -> usize {
        self.read_state().keepalives
    }

    fn record(&self, target: &str, write: ActuatorWrite) -> Result<(), HardwareError> {
        let mut state = self.write_state();
        if state.fail_actuators {
            return Err(HardwareError::actuator(target, "injected failure"));
        }

        match &write {
            ActuatorWrite::Relay(on) => state.relay = *on,
            ActuatorWrite::PhasePin { position, on: true } => {
                state.energized.insert(*position);
            }
            ActuatorWrite::PhasePin { position, on: false } => {
                state.energized.remove(position);
            }
            ActuatorWrite::Display { .. } => {}
        }

        tracing::debug!(write = ?write, "mock actuator write");
        state.writes.push(write);
        Ok(())
    }

    async fn read_temperature(&self, channel: ThermalChannel) -> Result<f64, HardwareError> {
        let delay = self.read_state().sensor_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.read_state()
            .temperatures
            .get(&channel)
            .copied()
            .flatten()
            .ok_or_else(|| HardwareError::sensor(channel, "no reading"))
    }
}

#[async_trait]
impl Sensors for MockHardware {
    async fn read_cpu_temperature(&self) -> Result<f64, HardwareError> {
        self.read_temperature(ThermalChannel::Cpu).await
    }

    async fn read_channel_temperature(&self, channel: ThermalChannel) -> Result<f64, HardwareError> {
        self.read_temperature(channel).await
    }
}

#[async_trait]
impl Actuators for MockHardware {
    async fn set_power_relay(&self, on: bool) -> Result<(), HardwareError> {
        self.record("power relay", ActuatorWrite::Relay(on))
    }

    async fn set_phase_pin(&self, position: u8, on: bool) -> Result<(), HardwareError> {
        self.record("phase pin", ActuatorWrite::PhasePin { position, on })
    }

    async fn send_display_command(&self, address: &str, arg: i32) -> Result<(), HardwareError> {
        self.record(
            "display",
            ActuatorWrite::Display {
                address: address.to_string(),
                arg,
            },
        )
    }

    async fn watchdog_keepalive(&self) -> Result<(), HardwareError> {
        if self.read_state().hang_watchdog {
            std::future::pending::<()>().await;
        }

        let mut state = self.write_state();
        if state.fail_watchdog {
            return Err(HardwareError::Watchdog("injected failure".to_string()));
        }
        state.keepalives += 1;
        Ok(())
    }
}

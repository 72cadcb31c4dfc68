/*!
 * Hardware seam: sensors and actuators behind async traits
 *
 * The supervisor only ever talks to [`Sensors`] and [`Actuators`]. The Linux
 * adapter drives sysfs GPIO, sysfs temperature files, a watchdog device and
 * the display player over OSC; [`MockHardware`] records every write for tests
 * and `--simulate`.
 */

pub mod linux;
pub mod mock;

use async_trait::async_trait;
use skywarden_core_guard::ThermalChannel;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use linux::LinuxHardware;
pub use mock::{ActuatorWrite, MockHardware};

/// Display player OSC addresses
pub mod display {
    pub const BACKGROUND_RUN_INDEX: &str = "/LEDPlay/player/backgroundRunIndex";
    pub const BACKGROUND_MODE: &str = "/LEDPlay/player/backgroundMode";
    pub const FOREGROUND_RUN_INDEX: &str = "/LEDPlay/player/foregroundRunIndex";
}

/// Hardware adapter failures
#[derive(Debug, Error)]
pub enum HardwareError {
    /// Sensor missing, unreadable or out of range
    #[error("Sensor {channel} unavailable: {reason}")]
    Sensor { channel: ThermalChannel, reason: String },

    /// Actuator write rejected
    #[error("{target}: {reason}")]
    Actuator { target: String, reason: String },

    /// Watchdog device could not be signalled
    #[error("Watchdog unreachable: {0}")]
    Watchdog(String),
}

impl HardwareError {
    pub fn actuator(target: impl Into<String>, reason: impl ToString) -> Self {
        HardwareError::Actuator {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn sensor(channel: ThermalChannel, reason: impl ToString) -> Self {
        HardwareError::Sensor {
            channel,
            reason: reason.to_string(),
        }
    }
}

/// Temperature inputs, in °C
#[async_trait]
pub trait Sensors: Send + Sync {
    async fn read_cpu_temperature(&self) -> Result<f64, HardwareError>;

    async fn read_channel_temperature(&self, channel: ThermalChannel) -> Result<f64, HardwareError>;

    /// Read any channel, routing the CPU to its dedicated probe
    async fn read(&self, channel: ThermalChannel) -> Result<f64, HardwareError> {
        match channel {
            ThermalChannel::Cpu => self.read_cpu_temperature().await,
            other => self.read_channel_temperature(other).await,
        }
    }
}

/// Outputs the supervisor drives
#[async_trait]
pub trait Actuators: Send + Sync {
    async fn set_power_relay(&self, on: bool) -> Result<(), HardwareError>;

    /// Drive phase position `position` (1-based)
    async fn set_phase_pin(&self, position: u8, on: bool) -> Result<(), HardwareError>;

    async fn send_display_command(&self, address: &str, arg: i32) -> Result<(), HardwareError>;

    async fn watchdog_keepalive(&self) -> Result<(), HardwareError>;
}

/// The two halves of a hardware backend
#[derive(Clone)]
pub struct Hardware {
    pub sensors: Arc<dyn Sensors>,
    pub actuators: Arc<dyn Actuators>,
}

impl Hardware {
    /// Share one backend that implements both traits
    pub fn from_backend<T>(backend: Arc<T>) -> Self
    where
        T: Sensors + Actuators + 'static,
    {
        Self {
            sensors: backend.clone(),
            actuators: backend,
        }
    }
}

/// Signal the watchdog, giving up after `timeout`
///
/// A hung device write must not stall the tick, so an elapsed timeout is
/// reported like any other keep-alive failure.
pub async fn keepalive(actuators: &dyn Actuators, timeout: Duration) -> Result<(), HardwareError> {
    match tokio::time::timeout(timeout, actuators.watchdog_keepalive()).await {
        Ok(result) => result,
        Err(_) => Err(HardwareError::Watchdog(format!(
            "keep-alive timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Sleep for `duration` in slices of at most one second, signalling the
/// watchdog after each slice
///
/// `keepalive_timeout` bounds each signal; `None` leaves the watchdog alone.
pub async fn settle(actuators: &dyn Actuators, duration: Duration, keepalive_timeout: Option<Duration>) {
    const SLICE: Duration = Duration::from_secs(1);

    let mut remaining = duration;
    while !remaining.is_zero() {
        let step = remaining.min(SLICE);
        tokio::time::sleep(step).await;
        remaining -= step;

        if let Some(timeout) = keepalive_timeout {
            if let Err(e) = keepalive(actuators, timeout).await {
                tracing::warn!(error = %e, "watchdog keep-alive failed during settle");
            }
        }
    }
}

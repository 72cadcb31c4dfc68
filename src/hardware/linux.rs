//! Linux hardware backend
//!
//! - GPIO through the sysfs class interface (`export`, `direction`, `value`)
//! - Temperatures from sysfs files holding millidegrees Celsius
//! - Watchdog keep-alive by writing one byte to the device
//! - Display player commands as OSC over UDP

use async_trait::async_trait;
use skywarden_core_guard::ThermalChannel;
use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use super::{Actuators, HardwareError, Sensors};
use crate::config::{SensorPaths, SupervisionConfig};
use crate::osc::{OscArg, OscMessage};

/// Sysfs GPIO lines, exported as outputs on first use
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    exported: Mutex<HashSet<u32>>,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exported: Mutex::new(HashSet::new()),
        }
    }

    fn line_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    async fn ensure_output(&self, pin: u32) -> io::Result<()> {
        let mut exported = self.exported.lock().await;
        if exported.contains(&pin) {
            return Ok(());
        }

        if fs::metadata(self.line_dir(pin)).await.is_err() {
            fs::write(self.root.join("export"), pin.to_string()).await?;
        }
        fs::write(self.line_dir(pin).join("direction"), "out").await?;

        exported.insert(pin);
        Ok(())
    }

    /// Drive `pin` high or low
    pub async fn set(&self, pin: u32, high: bool) -> io::Result<()> {
        self.ensure_output(pin).await?;
        fs::write(self.line_dir(pin).join("value"), if high { "1" } else { "0" }).await
    }
}

/// Watchdog device kept open between keep-alives
#[derive(Debug)]
struct Watchdog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl Watchdog {
    async fn keepalive(&self) -> io::Result<()> {
        let mut slot = self.file.lock().await;
        if slot.is_none() {
            *slot = Some(OpenOptions::new().write(true).open(&self.path).await?);
        }

        let result = match slot.as_mut() {
            Some(file) => async {
                file.write_all(b"1").await?;
                file.flush().await
            }
            .await,
            None => Ok(()),
        };

        // Reopen on the next attempt
        if result.is_err() {
            *slot = None;
        }
        result
    }
}

/// Fire-and-forget OSC sender for the display player
#[derive(Debug)]
pub struct DisplayClient {
    socket: UdpSocket,
    target: SocketAddr,
}

impl DisplayClient {
    pub async fn connect(target: SocketAddr) -> io::Result<Self> {
        let bind: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind).await?;
        Ok(Self { socket, target })
    }

    pub async fn send(&self, message: &OscMessage) -> io::Result<()> {
        let packet = message
            .encode()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.socket.send_to(&packet, self.target).await.map(|_| ())
    }
}

/// Read a millidegree sysfs temperature file
pub async fn read_millidegrees(path: &Path) -> io::Result<f64> {
    let raw = fs::read_to_string(path).await?;
    let millis: f64 = raw
        .trim()
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, format!("not a number: {:?}", raw.trim())))?;

    if !millis.is_finite() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "non-finite reading"));
    }
    Ok(millis / 1000.0)
}

/// Real hardware on a Linux single-board computer
#[derive(Debug)]
pub struct LinuxHardware {
    gpio: SysfsGpio,
    power_pin: u32,
    phase_pins: Vec<u32>,
    sensors: SensorPaths,
    watchdog: Option<Watchdog>,
    display: DisplayClient,
}

impl LinuxHardware {
    /// Build the backend described by `config`
    pub async fn new(config: &SupervisionConfig) -> io::Result<Self> {
        let display = DisplayClient::connect(config.display_addr).await?;
        tracing::info!(
            gpio_root = %config.gpio_root.display(),
            display = %config.display_addr,
            watchdog = ?config.watchdog_device,
            "hardware backend ready"
        );

        Ok(Self {
            gpio: SysfsGpio::new(&config.gpio_root),
            power_pin: config.power_pin,
            phase_pins: config.phase_pins.clone(),
            sensors: config.sensors.clone(),
            watchdog: config.watchdog_device.as_ref().map(|path| Watchdog {
                path: path.clone(),
                file: Mutex::new(None),
            }),
            display,
        })
    }

    fn phase_pin(&self, position: u8) -> Result<u32, HardwareError> {
        usize::from(position)
            .checked_sub(1)
            .and_then(|idx| self.phase_pins.get(idx))
            .copied()
            .ok_or_else(|| HardwareError::actuator(format!("phase {}", position), "no such position"))
    }
}

#[async_trait]
impl Sensors for LinuxHardware {
    async fn read_cpu_temperature(&self) -> Result<f64, HardwareError> {
        self.read_channel_temperature(ThermalChannel::Cpu).await
    }

    async fn read_channel_temperature(&self, channel: ThermalChannel) -> Result<f64, HardwareError> {
        read_millidegrees(self.sensors.path(channel))
            .await
            .map_err(|e| HardwareError::sensor(channel, e))
    }
}

#[async_trait]
impl Actuators for LinuxHardware {
    async fn set_power_relay(&self, on: bool) -> Result<(), HardwareError> {
        self.gpio
            .set(self.power_pin, on)
            .await
            .map_err(|e| HardwareError::actuator(format!("power relay (gpio{})", self.power_pin), e))
    }

    async fn set_phase_pin(&self, position: u8, on: bool) -> Result<(), HardwareError> {
        let pin = self.phase_pin(position)?;
        self.gpio
            .set(pin, on)
            .await
            .map_err(|e| HardwareError::actuator(format!("phase {} (gpio{})", position, pin), e))
    }

    async fn send_display_command(&self, address: &str, arg: i32) -> Result<(), HardwareError> {
        let message = OscMessage::new(address, vec![OscArg::Int(arg)]);
        self.display
            .send(&message)
            .await
            .map_err(|e| HardwareError::actuator(format!("display {}", address), e))
    }

    async fn watchdog_keepalive(&self) -> Result<(), HardwareError> {
        match &self.watchdog {
            Some(watchdog) => watchdog
                .keepalive()
                .await
                .map_err(|e| HardwareError::Watchdog(format!("{}: {}", watchdog.path.display(), e))),
            None => Ok(()),
        }
    }
}

/*!
 * Configuration types for Skywarden
 */

use serde::{Deserialize, Serialize};
use skywarden_core_ephemeris::{parse_time_of_day, PHASE_COUNT};
use skywarden_core_guard::{ThermalChannel, ThermalLimits};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveTime, Timelike};

use crate::error::{Result, SupervisorError};

/// Largest on-time offset accepted, in minutes either way
pub const MAX_OFFSET_MINUTES: i64 = 12 * 60;

/// Earliest accepted hard-off; the main window opens at sunset', so an
/// earlier hard-off would keep the lights off all day
pub const EARLIEST_HARD_OFF: (u32, u32) = (12, 0);

/// Supervisor configuration, loaded from JSON or TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisionConfig {
    /// GPIO line driving the main power relay
    pub power_pin: u32,

    /// GPIO lines for phase positions 1..=N, in position order
    pub phase_pins: Vec<u32>,

    /// Main lights on-time offset from sunrise/sunset, in minutes
    pub lights_on: i64,

    /// Optional hard-off wall-clock time for the main lights ("HH:MM")
    #[serde(default)]
    pub lights_off: Option<String>,

    /// Phase array on-time offset, in minutes
    pub phase_lights_on: i64,

    /// CPU trip ceiling in °C
    pub max_cpu_temp: f64,

    /// LED channel trip ceiling in °C
    pub max_led_temp: f64,

    /// CPU release margin below the ceiling
    pub cpu_hysteresis: f64,

    /// LED release margin below the ceiling
    pub led_hysteresis: f64,

    /// Lowest phase position the automatic schedule will energize
    #[serde(default = "default_phase_min_position")]
    pub phase_min_position: u8,

    /// How long manual commands and temperature overrides stay in force
    #[serde(default = "default_override_ttl_secs")]
    pub override_ttl_secs: u64,

    /// Supervisor tick period
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Upper bound on a single sensor read
    #[serde(default = "default_sensor_timeout_ms")]
    pub sensor_timeout_ms: u64,

    /// Upper bound on a single watchdog keep-alive
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,

    /// Settle time between relay on and steady display mode
    #[serde(default = "default_startup_settle_secs")]
    pub startup_settle_secs: u64,

    /// Settle time before the relay is cut
    #[serde(default = "default_shutdown_settle_secs")]
    pub shutdown_settle_secs: u64,

    /// Dwell per position during the full test cycle
    #[serde(default = "default_test_step_secs")]
    pub test_step_secs: u64,

    /// Days of ephemeris coverage required at startup
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    /// Local wall-clock offset from UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,

    /// Ephemeris table file (relative paths resolve against the config file)
    #[serde(default)]
    pub tables: Option<PathBuf>,

    /// Display player commands
    #[serde(default)]
    pub display: DisplayConfig,

    /// Temperature sensor files
    #[serde(default)]
    pub sensors: SensorPaths,

    /// Channels the thermal guard watches
    #[serde(default = "default_monitored_channels")]
    pub monitored_channels: Vec<ThermalChannel>,

    /// Hardware watchdog device (None = no watchdog)
    #[serde(default)]
    pub watchdog_device: Option<PathBuf>,

    /// Sysfs GPIO class directory
    #[serde(default = "default_gpio_root")]
    pub gpio_root: PathBuf,

    /// Remote command listener address
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Display player address
    #[serde(default = "default_display_addr")]
    pub display_addr: SocketAddr,

    /// Delay before the first tick, letting the display player boot
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,

    /// Skip the sun schedule and keep everything lit
    #[serde(default)]
    pub disable_sun: bool,

    /// Debug mode: no watchdog keep-alive, debug logging
    #[serde(default)]
    pub debug: bool,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stdout)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Size at which the log file is rotated
    #[serde(default = "default_log_max_bytes")]
    pub log_max_bytes: u64,

    /// Rotated log files kept beside the live one
    #[serde(default = "default_log_backups")]
    pub log_backups: usize,
}

/// Display player settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Background run index selected on startup and shutdown
    #[serde(default)]
    pub default_run_index: i32,

    /// Background mode while the relay settles
    #[serde(default = "default_startup_mode")]
    pub startup_mode: i32,

    /// Background mode once running
    #[serde(default = "default_steady_mode")]
    pub steady_mode: i32,

    /// Background mode before the relay is cut
    #[serde(default)]
    pub off_mode: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_run_index: 0,
            startup_mode: default_startup_mode(),
            steady_mode: default_steady_mode(),
            off_mode: 0,
        }
    }
}

/// Sysfs temperature files, in millidegrees Celsius
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorPaths {
    #[serde(default = "default_cpu_sensor")]
    pub cpu: PathBuf,
    #[serde(default = "default_led_a_sensor")]
    pub led_a: PathBuf,
    #[serde(default = "default_led_b_sensor")]
    pub led_b: PathBuf,
}

impl SensorPaths {
    /// File for `channel`
    pub fn path(&self, channel: ThermalChannel) -> &Path {
        match channel {
            ThermalChannel::Cpu => &self.cpu,
            ThermalChannel::LedA => &self.led_a,
            ThermalChannel::LedB => &self.led_b,
        }
    }
}

impl Default for SensorPaths {
    fn default() -> Self {
        Self {
            cpu: default_cpu_sensor(),
            led_a: default_led_a_sensor(),
            led_b: default_led_b_sensor(),
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_phase_min_position() -> u8 {
    1
}

fn default_override_ttl_secs() -> u64 {
    60
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_sensor_timeout_ms() -> u64 {
    500
}

fn default_watchdog_timeout_ms() -> u64 {
    500
}

fn default_log_max_bytes() -> u64 {
    1024 * 1024
}

fn default_log_backups() -> usize {
    5
}

fn default_startup_settle_secs() -> u64 {
    5
}

fn default_shutdown_settle_secs() -> u64 {
    10
}

fn default_test_step_secs() -> u64 {
    2
}

fn default_horizon_days() -> u32 {
    30
}

fn default_startup_mode() -> i32 {
    1
}

fn default_steady_mode() -> i32 {
    2
}

fn default_cpu_sensor() -> PathBuf {
    PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
}

fn default_led_a_sensor() -> PathBuf {
    PathBuf::from("/sys/class/hwmon/hwmon1/temp1_input")
}

fn default_led_b_sensor() -> PathBuf {
    PathBuf::from("/sys/class/hwmon/hwmon1/temp2_input")
}

fn default_monitored_channels() -> Vec<ThermalChannel> {
    ThermalChannel::ALL.to_vec()
}

fn default_gpio_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9999))
}

fn default_display_addr() -> SocketAddr {
    SocketAddr::from(([192, 168, 4, 1], 1234))
}

fn default_warmup_secs() -> u64 {
    60
}

impl SupervisionConfig {
    /// Load configuration from a file; `.toml` files are TOML, anything else JSON
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| SupervisorError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::from_toml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        }
    }

    /// Parse JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SupervisorError::ConfigInvalid(e.to_string()))
    }

    /// Parse TOML configuration
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SupervisorError::ConfigInvalid(e.to_string()))
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SupervisorError::ConfigInvalid(msg));

        if self.phase_pins.len() < usize::from(PHASE_COUNT) {
            return invalid(format!(
                "phase_pins needs at least {} pins, got {}",
                PHASE_COUNT,
                self.phase_pins.len()
            ));
        }
        if self.phase_pins.len() > usize::from(u8::MAX) {
            return invalid(format!("phase_pins has {} pins, at most 255 allowed", self.phase_pins.len()));
        }

        let mut seen = HashSet::new();
        for pin in &self.phase_pins {
            if !seen.insert(*pin) {
                return invalid(format!("phase pin {} listed twice", pin));
            }
        }
        if seen.contains(&self.power_pin) {
            return invalid(format!("power_pin {} is also a phase pin", self.power_pin));
        }

        if self.phase_min_position == 0 || self.phase_min_position > self.position_count() {
            return invalid(format!(
                "phase_min_position {} outside 1..={}",
                self.phase_min_position,
                self.position_count()
            ));
        }

        for (name, minutes) in [("lights_on", self.lights_on), ("phase_lights_on", self.phase_lights_on)] {
            if minutes.abs() > MAX_OFFSET_MINUTES {
                return invalid(format!("{} offset {} exceeds ±{} minutes", name, minutes, MAX_OFFSET_MINUTES));
            }
        }

        if let Some(off) = self.hard_off()? {
            let (h, m) = EARLIEST_HARD_OFF;
            if off.hour() < h || (off.hour() == h && off.minute() < m) {
                return invalid(format!(
                    "lights_off {} is before {:02}:{:02}; the main lights open at sunset and would never come on",
                    off.format("%H:%M"),
                    h,
                    m
                ));
            }
        }

        for (channel, limits) in self.thermal_limits() {
            limits.validate(channel)?;
        }
        if self.monitored_channels.is_empty() {
            return invalid("monitored_channels is empty".to_string());
        }

        for (name, value) in [
            ("tick_ms", self.tick_ms),
            ("sensor_timeout_ms", self.sensor_timeout_ms),
            ("watchdog_timeout_ms", self.watchdog_timeout_ms),
            ("override_ttl_secs", self.override_ttl_secs),
            ("log_max_bytes", self.log_max_bytes),
        ] {
            if value == 0 {
                return invalid(format!("{} must be greater than zero", name));
            }
        }

        Ok(())
    }

    /// Number of phase positions
    pub fn position_count(&self) -> u8 {
        u8::try_from(self.phase_pins.len()).unwrap_or(u8::MAX)
    }

    /// Parsed hard-off time for the main lights
    pub fn hard_off(&self) -> Result<Option<NaiveTime>> {
        self.lights_off
            .as_deref()
            .map(|value| {
                parse_time_of_day(value)
                    .map_err(|e| SupervisorError::ConfigInvalid(format!("lights_off: {}", e)))
            })
            .transpose()
    }

    /// Ceiling and margin per monitored channel
    pub fn thermal_limits(&self) -> Vec<(ThermalChannel, ThermalLimits)> {
        self.monitored_channels
            .iter()
            .map(|&channel| {
                let limits = match channel {
                    ThermalChannel::Cpu => ThermalLimits::new(self.max_cpu_temp, self.cpu_hysteresis),
                    ThermalChannel::LedA | ThermalChannel::LedB => {
                        ThermalLimits::new(self.max_led_temp, self.led_hysteresis)
                    }
                };
                (channel, limits)
            })
            .collect()
    }

    /// Ephemeris table path, resolved against the config file's directory
    pub fn tables_path(&self, config_path: &Path) -> PathBuf {
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        match &self.tables {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => base.join(path),
            None => base.join("ephemeris.json"),
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }

    /// Keep-alive timeout, or `None` in debug mode where the watchdog is left alone
    pub fn watchdog_keepalive(&self) -> Option<Duration> {
        (!self.debug).then(|| Duration::from_millis(self.watchdog_timeout_ms))
    }

    pub fn override_ttl(&self) -> Duration {
        Duration::from_secs(self.override_ttl_secs)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }
}

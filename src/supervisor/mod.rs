//! Supervisor: the tick loop that owns every actuator
//!
//! One task owns [`SupervisorState`] and alternates between two event
//! sources: the tick timer and the command queue. Each tick runs, in order:
//!
//! 1. **Watchdog** keep-alive (skipped in debug mode)
//! 2. **Readings** per channel: a fresh override, else a bounded sensor read
//! 3. **Thermal latches**: a new trip drives everything off and ends the tick
//! 4. **Thermal hold**: while anything is tripped, nothing else runs
//! 5. **Manual hold**, then the main and phase **schedules**
//!
//! Missed ticks are delayed rather than replayed in a burst.

pub mod state;

use skywarden_core_ephemeris::{AstronomicalOracle, ScheduleEvaluator};
use skywarden_core_guard::{ThermalChannel, Transition};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use chrono::NaiveTime;

use crate::clock::Clock;
use crate::command::{handlers, Command, CommandKind};
use crate::config::SupervisionConfig;
use crate::error::{CommandError, Result, SupervisorError};
use crate::hardware::{display, keepalive, settle, Actuators, Hardware};
use crate::power::StopOutcome;

pub use state::{SupervisorState, TickOutcome};

/// Tick-loop settings derived from the configuration
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub lights_on: i64,
    pub phase_lights_on: i64,
    pub hard_off: Option<NaiveTime>,
    pub override_ttl: Duration,
    pub tick: Duration,
    pub sensor_timeout: Duration,
    pub test_step: Duration,
    pub warmup: Duration,
    pub off_mode: i32,
    pub watchdog: Option<Duration>,
    pub disable_sun: bool,
}

impl Settings {
    fn from_config(config: &SupervisionConfig) -> Result<Self> {
        Ok(Self {
            lights_on: config.lights_on,
            phase_lights_on: config.phase_lights_on,
            hard_off: config.hard_off()?,
            override_ttl: config.override_ttl(),
            tick: config.tick(),
            sensor_timeout: config.sensor_timeout(),
            test_step: Duration::from_secs(config.test_step_secs),
            warmup: config.warmup(),
            off_mode: config.display.off_mode,
            watchdog: config.watchdog_keepalive(),
            disable_sun: config.disable_sun,
        })
    }
}

/// Lighting supervisor
pub struct Supervisor {
    pub(crate) settings: Settings,
    pub(crate) oracle: AstronomicalOracle,
    pub(crate) hardware: Hardware,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) state: SupervisorState,
}

impl Supervisor {
    /// Create a supervisor; the configuration must already be validated
    pub fn new(
        config: &SupervisionConfig,
        oracle: AstronomicalOracle,
        hardware: Hardware,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            oracle,
            hardware,
            clock,
            state: SupervisorState::new(config)?,
        })
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub(crate) fn actuators(&self) -> Arc<dyn Actuators> {
        self.hardware.actuators.clone()
    }

    /// Drive the relay off and clear the phase array, then log today's
    /// ephemeris. Fails only if the tables do not cover today.
    pub async fn initialize(&mut self) -> Result<()> {
        let hw = self.actuators();

        match self.state.power.stop(&*hw).await {
            Ok(_) => debug!("relay driven off at startup"),
            Err(e) => warn!(error = %e, "could not drive relay off at startup; retrying on first tick"),
        }
        if let Err(e) = self.state.phase.select(&*hw, 0).await {
            warn!(error = %e, "could not clear phase array at startup; retrying on first tick");
        }

        let now = self.clock.now();
        let sun = self.oracle.sun_times(now)?;
        let phase = self.oracle.phase_at(now)?;
        info!(
            "☀️  Sunrise {} | Sunset {} | Moon: {} ({})",
            sun.sunrise.format("%H:%M"),
            sun.sunset.format("%H:%M"),
            phase,
            phase.index()
        );

        Ok(())
    }

    /// Run until `shutdown` resolves or a fatal error occurs
    ///
    /// Performs [`initialize`](Self::initialize) and the warm-up delay first.
    /// Either way out, the actuators are left safe.
    pub async fn run<F>(mut self, mut commands: mpsc::Receiver<Command>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if let Err(e) = self.initialize().await {
            error!(error = %e, "startup check failed");
            self.safe_off().await;
            return Err(e);
        }

        info!(warmup_secs = self.settings.warmup.as_secs(), "waiting for display player");
        let hw = self.actuators();
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested during warm-up");
                self.safe_off().await;
                return Ok(());
            }
            _ = settle(&*hw, self.settings.warmup, self.settings.watchdog) => {}
        }

        info!(
            "🛡️  Supervisor Active | Tick: {}ms | Override TTL: {}s | Watchdog: {}",
            self.settings.tick.as_millis(),
            self.settings.override_ttl.as_secs(),
            if self.settings.watchdog.is_some() { "on" } else { "off (debug)" }
        );

        let mut interval = tokio::time::interval(self.settings.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut accepting = true;

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown requested");
                    self.safe_off().await;
                    return Ok(());
                }

                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, category = e.category(), "fatal supervisor error; driving everything off");
                        self.safe_off().await;
                        return Err(e);
                    }
                }

                command = commands.recv(), if accepting => match command {
                    Some(command) => {
                        if let Err(e) = self.handle(command).await {
                            warn!(error = %e, "command rejected");
                        }
                    }
                    None => {
                        debug!("command queue closed");
                        accepting = false;
                    }
                },
            }
        }
    }

    /// One supervision pass; an `Err` is always fatal
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let hw = self.actuators();

        if let Some(timeout) = self.settings.watchdog {
            if let Err(e) = keepalive(&*hw, timeout).await {
                warn!(error = %e, "watchdog keep-alive failed");
            }
        }

        let now = Instant::now();
        self.expire_overrides(now);

        let tripped_now = self.observe_thermal(now).await;
        if !tripped_now.is_empty() {
            self.force_off(&*hw).await;
            return Ok(TickOutcome::ThermalShutdown { channels: tripped_now });
        }

        let tripped = self.state.thermal.tripped_channels();
        if !tripped.is_empty() {
            // A failed trip shutdown is retried until it sticks
            if !self.state.is_safe() {
                self.force_off(&*hw).await;
            }
            return Ok(TickOutcome::ThermalHold { channels: tripped });
        }

        if let Some(until) = self.state.manual_hold_until {
            if now < until {
                return Ok(TickOutcome::ManualHold);
            }
            info!("manual override expired; schedule resumes");
            self.state.manual_hold_until = None;
        }

        self.apply_schedule(&*hw).await
    }

    /// Run a remote command to completion
    pub async fn handle(&mut self, command: Command) -> std::result::Result<(), CommandError> {
        let kind = command.kind();
        let handler = handlers::handler_for(kind)
            .ok_or_else(|| CommandError::UnknownCommand(kind.name().to_string()))?;

        info!(command = %command, "📡 remote command");
        handler(self, &command).await?;

        if kind.starts_hold() {
            self.state.manual_hold_until = Some(Instant::now() + self.settings.override_ttl);
            debug!(ttl_secs = self.settings.override_ttl.as_secs(), "manual hold started");
        }
        Ok(())
    }

    /// Reject commands that would energize anything during a thermal trip
    pub(crate) fn check_lockout(&self, kind: CommandKind) -> std::result::Result<(), CommandError> {
        let channels = self.state.thermal.tripped_channels();
        if kind.energizes() && !channels.is_empty() {
            return Err(CommandError::ThermalLockout {
                command: kind.name(),
                channels,
            });
        }
        Ok(())
    }

    /// Display off, relay off, phase array clear; failures are only logged
    pub async fn safe_off(&mut self) {
        let hw = self.actuators();

        if let Err(e) = hw.send_display_command(display::BACKGROUND_MODE, self.settings.off_mode).await {
            warn!(error = %e, "display off failed during safe shutdown");
        }
        if let Err(e) = self.state.power.set_relay(&*hw, false).await {
            warn!(error = %e, "relay off failed during safe shutdown");
        }
        if let Err(e) = self.state.phase.select(&*hw, 0).await {
            warn!(error = %e, "phase clear failed during safe shutdown");
        }

        info!("🌑 Lights safe: relay off, phase array clear");
    }

    fn expire_overrides(&mut self, now: Instant) {
        for channel in self.state.overrides.expire(now.into_std(), self.settings.override_ttl) {
            info!(channel = %channel, "temperature override expired; sensor polling resumes");
        }
    }

    /// Feed every channel's reading to its latch; returns channels that tripped
    async fn observe_thermal(&mut self, now: Instant) -> Vec<ThermalChannel> {
        let at = now.into_std();
        let channels: Vec<ThermalChannel> = self.state.thermal.channels().collect();
        let mut tripped = Vec::new();

        for channel in channels {
            let Some(reading) = self.reading(channel, now).await else {
                continue;
            };

            match self.state.thermal.observe(channel, reading, at) {
                Some(Transition::Tripped) => {
                    error!(channel = %channel, reading, "🔥 Thermal trip: lights forced off");
                    tripped.push(channel);
                }
                Some(Transition::Released) => {
                    info!(channel = %channel, reading, "❄️  Thermal latch released");
                }
                None => {}
            }
        }

        tripped
    }

    /// Current reading for `channel`, or `None` if the sensor failed
    async fn reading(&self, channel: ThermalChannel, now: Instant) -> Option<f64> {
        if let Some(value) = self
            .state
            .overrides
            .fresh_value(channel, now.into_std(), self.settings.override_ttl)
        {
            debug!(channel = %channel, value, "using temperature override");
            return Some(value);
        }

        let result = match tokio::time::timeout(self.settings.sensor_timeout, self.hardware.sensors.read(channel)).await {
            Ok(result) => result.map_err(SupervisorError::from),
            Err(_) => Err(SupervisorError::SensorUnavailable {
                channel,
                reason: format!("read timed out after {}ms", self.settings.sensor_timeout.as_millis()),
            }),
        };

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, category = e.category(), "keeping last reading");
                None
            }
        }
    }

    async fn force_off(&mut self, hw: &dyn Actuators) {
        match self.state.power.stop(hw).await {
            Ok(StopOutcome::Sequenced) => info!("power shutdown sequence complete"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "thermal shutdown incomplete; retrying next tick"),
        }
        if let Err(e) = self.state.phase.select(hw, 0).await {
            warn!(error = %e, "phase clear failed; retrying next tick");
        }
    }

    async fn apply_schedule(&mut self, hw: &dyn Actuators) -> Result<TickOutcome> {
        let now = self.clock.now();

        let (main_dark, phase_dark) = if self.settings.disable_sun {
            (false, false)
        } else {
            let evaluator = ScheduleEvaluator::new(&self.oracle);
            (
                evaluator.is_dark(now, self.settings.lights_on, self.settings.hard_off)?,
                evaluator.is_dark(now, self.settings.phase_lights_on, None)?,
            )
        };

        if main_dark {
            match self.state.power.stop(hw).await {
                Ok(StopOutcome::Sequenced) => info!("🌅 Main lights off"),
                Ok(StopOutcome::RelayReasserted) => info!("relay found energized while stopped; cut"),
                Ok(StopOutcome::AlreadyStopped) => {}
                Err(e) => warn!(error = %e, "power shutdown failed; retrying next tick"),
            }
        } else {
            match self.state.power.start(hw).await {
                Ok(true) => info!("🌃 Main lights on"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "power startup failed; retrying next tick"),
            }
        }

        let target = if phase_dark {
            0
        } else {
            self.oracle.phase_at(now)?.index()
        };

        let previous = self.state.phase.position();
        match self.state.phase.select(hw, target).await {
            Ok(true) => info!(
                from = previous,
                to = self.state.phase.position(),
                "🌙 Phase position changed"
            ),
            Ok(false) => {}
            Err(e) => warn!(error = %e, target, "phase select failed; retrying next tick"),
        }

        Ok(TickOutcome::Scheduled {
            main_dark,
            phase_dark,
            position: self.state.phase.position(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::tests::minimal;
    use crate::hardware::{ActuatorWrite, MockHardware};
    use crate::power::PowerState;
    use chrono::{NaiveDate, NaiveDateTime};

    const TABLES: &str = r#"{
        "sun": [
            { "date": "10-18", "sunrise": "06:00", "sunset": "18:00" },
            { "date": "10-19", "sunrise": "06:00", "sunset": "18:00" },
            { "date": "10-20", "sunrise": "06:00", "sunset": "18:00" }
        ],
        "phases": [
            { "at": "2026-10-19T00:00:00", "phase": 1 },
            { "at": "2026-10-19T20:00:00", "phase": 2 },
            { "at": "2026-10-21T00:00:00", "phase": 3 }
        ]
    }"#;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn supervisor(start: NaiveDateTime) -> (Supervisor, MockHardware, ManualClock) {
        let mut config = minimal();
        config.debug = true;
        let hw = MockHardware::new();
        let clock = ManualClock::new(start);
        let sup = Supervisor::new(
            &config,
            AstronomicalOracle::from_json_str(TABLES).unwrap(),
            Hardware::from_backend(Arc::new(hw.clone())),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (sup, hw, clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_drives_everything_off() {
        let (mut sup, hw, _clock) = supervisor(at(12, 0));
        sup.initialize().await.unwrap();

        assert!(!hw.relay_energized());
        assert!(hw.energized_positions().is_empty());
        assert_eq!(hw.writes()[0], ActuatorWrite::Relay(false));
        assert!(sup.state().is_safe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lit_tick_starts_and_selects_phase() {
        let (mut sup, hw, _clock) = supervisor(at(12, 0));
        sup.initialize().await.unwrap();

        let outcome = sup.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Scheduled {
                main_dark: false,
                phase_dark: false,
                position: 2
            }
        );
        assert_eq!(sup.state().power_state(), PowerState::Running);
        assert!(hw.relay_energized());
        assert_eq!(hw.energized_positions(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dark_tick_stays_off() {
        let (mut sup, hw, _clock) = supervisor(at(19, 0));
        sup.initialize().await.unwrap();
        hw.take_writes();

        let outcome = sup.tick().await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Scheduled {
                main_dark: true,
                phase_dark: true,
                position: 0
            }
        );
        assert!(hw.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_timeout_leaves_latch_alone() {
        let (mut sup, hw, _clock) = supervisor(at(12, 0));
        sup.initialize().await.unwrap();
        hw.set_sensor_delay(Some(Duration::from_secs(2)));
        hw.set_temperature(ThermalChannel::Cpu, Some(200.0));

        let outcome = sup.tick().await.unwrap();
        assert!(matches!(outcome, TickOutcome::Scheduled { .. }));
        assert!(!sup.state().thermal.any_tripped());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_pinged_outside_debug() {
        let mut config = minimal();
        config.debug = false;
        let hw = MockHardware::new();
        let mut sup = Supervisor::new(
            &config,
            AstronomicalOracle::from_json_str(TABLES).unwrap(),
            Hardware::from_backend(Arc::new(hw.clone())),
            Arc::new(ManualClock::new(at(19, 0))),
        )
        .unwrap();

        sup.tick().await.unwrap();
        assert_eq!(hw.keepalive_count(), 1);

        // An unreachable watchdog is not fatal
        hw.fail_watchdog(true);
        assert!(sup.tick().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_watchdog_does_not_stall_thermal_protection() {
        let mut config = minimal();
        config.debug = false;
        let hw = MockHardware::new();
        let mut sup = Supervisor::new(
            &config,
            AstronomicalOracle::from_json_str(TABLES).unwrap(),
            Hardware::from_backend(Arc::new(hw.clone())),
            Arc::new(ManualClock::new(at(12, 0))),
        )
        .unwrap();
        sup.initialize().await.unwrap();
        sup.tick().await.unwrap();

        hw.hang_watchdog(true);
        hw.set_temperature(ThermalChannel::Cpu, Some(95.0));
        let outcome = tokio::time::timeout(Duration::from_secs(3600), sup.tick())
            .await
            .expect("tick blocked on the watchdog")
            .unwrap();

        assert!(matches!(outcome, TickOutcome::ThermalShutdown { .. }));
        assert!(!hw.relay_energized());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_tables_are_fatal() {
        let later = NaiveDate::from_ymd_opt(2026, 10, 25)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let (mut sup, _hw, _clock) = supervisor(later);

        let err = sup.tick().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, SupervisorError::DataExhausted(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_safe_off() {
        let (mut sup, hw, _clock) = supervisor(at(12, 0));
        sup.initialize().await.unwrap();
        sup.tick().await.unwrap();

        sup.safe_off().await;
        assert!(!hw.relay_energized());
        assert!(hw.energized_positions().is_empty());
        assert_eq!(sup.state().power_state(), PowerState::Stopped);
        assert!(hw
            .display_commands()
            .contains(&(display::BACKGROUND_MODE.to_string(), 0)));
    }
}

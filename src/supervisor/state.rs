//! Supervisor state and tick results

use skywarden_core_guard::{OverrideTracker, ThermalChannel, ThermalGuard};
use tokio::time::Instant;

use crate::config::SupervisionConfig;
use crate::error::Result;
use crate::phase::PhaseSelector;
use crate::power::{PowerController, PowerState};

/// Everything the supervisor owns; a single task mutates it
#[derive(Debug, Clone)]
pub struct SupervisorState {
    pub power: PowerController,
    pub phase: PhaseSelector,
    pub thermal: ThermalGuard,
    pub overrides: OverrideTracker<ThermalChannel>,
    /// Schedule suspended until this instant after a manual command
    pub manual_hold_until: Option<Instant>,
}

impl SupervisorState {
    pub fn new(config: &SupervisionConfig) -> Result<Self> {
        Ok(Self {
            power: PowerController::new(config),
            phase: PhaseSelector::new(config.position_count(), config.phase_min_position),
            thermal: ThermalGuard::try_new(config.thermal_limits())?,
            overrides: OverrideTracker::new(),
            manual_hold_until: None,
        })
    }

    pub fn power_state(&self) -> PowerState {
        self.power.state()
    }

    /// Converged phase position, 0 for none
    pub fn phase_position(&self) -> u8 {
        self.phase.position()
    }

    pub fn hold_active(&self, now: Instant) -> bool {
        self.manual_hold_until.is_some_and(|until| now < until)
    }

    /// Relay off, lights stopped, and no phase position energized
    pub fn is_safe(&self) -> bool {
        !self.power.is_running()
            && !self.power.relay_energized()
            && self.phase.is_converged()
            && self.phase.position() == 0
    }
}

/// What a single tick decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// These channels tripped this tick; everything was driven off
    ThermalShutdown { channels: Vec<ThermalChannel> },
    /// Still tripped from an earlier tick; scheduling skipped
    ThermalHold { channels: Vec<ThermalChannel> },
    /// A manual command is holding the actuators
    ManualHold,
    /// Schedules were evaluated and applied
    Scheduled {
        main_dark: bool,
        phase_dark: bool,
        position: u8,
    },
}

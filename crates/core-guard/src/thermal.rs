//! Thermal guard: per-channel hysteresis latches
//!
//! Each monitored channel owns a two-state latch:
//! - Normal: readings are within limits
//! - Tripped: the ceiling was exceeded; the channel holds the installation off
//!   until the reading falls below `ceiling - margin`
//!
//! The guard never trips a latch from missing data. Callers that fail to read
//! a sensor simply skip [`ThermalGuard::observe`] for that tick, which leaves
//! the latch (and its last reading) untouched.

use super::error::GuardError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// A monitored temperature channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermalChannel {
    /// Controller CPU temperature
    Cpu,
    /// Phase-array sensor A
    LedA,
    /// Phase-array sensor B
    LedB,
}

impl ThermalChannel {
    /// Every channel, in evaluation order
    pub const ALL: [ThermalChannel; 3] = [ThermalChannel::Cpu, ThermalChannel::LedA, ThermalChannel::LedB];

    /// String representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ThermalChannel::Cpu => "cpu",
            ThermalChannel::LedA => "led_a",
            ThermalChannel::LedB => "led_b",
        }
    }
}

impl fmt::Display for ThermalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThermalChannel {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(ThermalChannel::Cpu),
            "led_a" | "a" => Ok(ThermalChannel::LedA),
            "led_b" | "b" => Ok(ThermalChannel::LedB),
            other => Err(GuardError::UnknownChannel(other.to_string())),
        }
    }
}

/// Ceiling and hysteresis margin for one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalLimits {
    /// Temperature above which the latch trips
    pub ceiling: f64,
    /// Gap below the ceiling that must be reached before release
    pub margin: f64,
}

impl ThermalLimits {
    /// Create limits from a ceiling and a hysteresis margin
    pub fn new(ceiling: f64, margin: f64) -> Self {
        Self { ceiling, margin }
    }

    /// Reading below which a tripped latch releases
    pub fn release_point(&self) -> f64 {
        self.ceiling - self.margin
    }

    /// Validate the limits for the named channel
    pub fn validate(&self, channel: ThermalChannel) -> Result<(), GuardError> {
        if !self.ceiling.is_finite() || self.ceiling <= 0.0 {
            return Err(GuardError::InvalidCeiling {
                channel: channel.to_string(),
                ceiling: self.ceiling,
            });
        }

        if !self.margin.is_finite() || self.margin < 0.0 || self.margin >= self.ceiling {
            return Err(GuardError::InvalidMargin {
                channel: channel.to_string(),
                ceiling: self.ceiling,
                margin: self.margin,
            });
        }

        Ok(())
    }
}

/// State of a single latch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatchState {
    /// Reading within limits
    #[default]
    Normal,
    /// Ceiling exceeded, holding the installation off
    Tripped,
}

/// Latch transition reported by [`ThermalGuard::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Normal -> Tripped
    Tripped,
    /// Tripped -> Normal
    Released,
}

/// Runtime state of one monitored channel
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalChannelState {
    /// Channel id
    pub channel: ThermalChannel,
    /// Last successfully observed reading
    pub last_reading: Option<f64>,
    /// Current latch state
    pub state: LatchState,
    /// When the latch last tripped
    pub tripped_at: Option<Instant>,
}

impl ThermalChannelState {
    /// Create an untripped state with no reading yet
    pub fn new(channel: ThermalChannel) -> Self {
        Self {
            channel,
            last_reading: None,
            state: LatchState::Normal,
            tripped_at: None,
        }
    }

    /// Whether the latch is currently tripped
    pub fn is_tripped(&self) -> bool {
        self.state == LatchState::Tripped
    }

    /// Feed a reading through the hysteresis latch
    pub fn observe(&mut self, reading: f64, limits: &ThermalLimits, at: Instant) -> Option<Transition> {
        self.last_reading = Some(reading);

        match self.state {
            LatchState::Normal if reading > limits.ceiling => {
                self.state = LatchState::Tripped;
                self.tripped_at = Some(at);
                Some(Transition::Tripped)
            }
            LatchState::Tripped if reading < limits.release_point() => {
                self.state = LatchState::Normal;
                Some(Transition::Released)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Latch {
    limits: ThermalLimits,
    state: ThermalChannelState,
}

/// Set of hysteresis latches, one per monitored channel
#[derive(Debug, Clone, Default)]
pub struct ThermalGuard {
    latches: BTreeMap<ThermalChannel, Latch>,
}

impl ThermalGuard {
    /// Create a guard monitoring the given channels
    pub fn new(channels: impl IntoIterator<Item = (ThermalChannel, ThermalLimits)>) -> Self {
        let latches = channels
            .into_iter()
            .map(|(channel, limits)| {
                (
                    channel,
                    Latch {
                        limits,
                        state: ThermalChannelState::new(channel),
                    },
                )
            })
            .collect();

        Self { latches }
    }

    /// Create a guard after validating every channel's limits
    pub fn try_new(
        channels: impl IntoIterator<Item = (ThermalChannel, ThermalLimits)>,
    ) -> Result<Self, GuardError> {
        let guard = Self::new(channels);
        for (channel, latch) in &guard.latches {
            latch.limits.validate(*channel)?;
        }
        Ok(guard)
    }

    /// Feed a reading for `channel`
    ///
    /// Returns the transition, if any. Readings for channels that are not
    /// monitored are ignored.
    pub fn observe(&mut self, channel: ThermalChannel, reading: f64, at: Instant) -> Option<Transition> {
        let latch = self.latches.get_mut(&channel)?;
        let transition = latch.state.observe(reading, &latch.limits, at);

        match transition {
            Some(Transition::Tripped) => tracing::debug!(
                channel = %channel,
                reading,
                ceiling = latch.limits.ceiling,
                "thermal latch tripped"
            ),
            Some(Transition::Released) => tracing::debug!(
                channel = %channel,
                reading,
                release_point = latch.limits.release_point(),
                "thermal latch released"
            ),
            None => {}
        }

        transition
    }

    /// Whether any channel is tripped
    pub fn any_tripped(&self) -> bool {
        self.latches.values().any(|l| l.state.is_tripped())
    }

    /// Channels currently tripped
    pub fn tripped_channels(&self) -> Vec<ThermalChannel> {
        self.latches
            .iter()
            .filter(|(_, l)| l.state.is_tripped())
            .map(|(c, _)| *c)
            .collect()
    }

    /// Monitored channels, in evaluation order
    pub fn channels(&self) -> impl Iterator<Item = ThermalChannel> + '_ {
        self.latches.keys().copied()
    }

    /// State of a monitored channel
    pub fn state(&self, channel: ThermalChannel) -> Option<&ThermalChannelState> {
        self.latches.get(&channel).map(|l| &l.state)
    }

    /// Limits of a monitored channel
    pub fn limits(&self, channel: ThermalChannel) -> Option<&ThermalLimits> {
        self.latches.get(&channel).map(|l| &l.limits)
    }
}

//! Skywarden Core Guard: Pure-logic protection primitives
//!
//! # Overview
//!
//! This crate holds the parts of the supervisor that protect the installation
//! without touching any hardware:
//!
//! - **Thermal Guard**: one hysteresis latch per monitored channel
//! - **Override Tracker**: short-lived externally supplied readings that
//!   preempt sensor polling until they go stale
//!
//! # Key Principles
//!
//! This crate is **pure logic**. Callers feed it readings and instants and
//! act on the transitions it reports. It knows nothing about sensors, GPIO,
//! or the display subsystem.
//!
//! # Latch lifecycle
//!
//! ```text
//!              reading > ceiling
//!     ┌────────┐ ───────────────────────> ┌─────────┐
//!     │ NORMAL │                          │ TRIPPED │
//!     └────────┘ <─────────────────────── └─────────┘
//!          reading < ceiling - margin
//!
//!   ceiling - margin <= reading <= ceiling: no change (hysteresis band)
//! ```
//!
//! # Example
//!
//! ```
//! use skywarden_core_guard::{ThermalChannel, ThermalGuard, ThermalLimits, Transition};
//! use std::time::Instant;
//!
//! let mut guard = ThermalGuard::new([
//!     (ThermalChannel::Cpu, ThermalLimits::new(80.0, 5.0)),
//! ]);
//!
//! let now = Instant::now();
//! assert_eq!(guard.observe(ThermalChannel::Cpu, 81.0, now), Some(Transition::Tripped));
//! assert_eq!(guard.observe(ThermalChannel::Cpu, 77.0, now), None);
//! assert_eq!(guard.observe(ThermalChannel::Cpu, 74.9, now), Some(Transition::Released));
//! ```

pub mod error;
pub mod override_tracker;
pub mod thermal;

pub use error::GuardError;
pub use override_tracker::{Override, OverrideTracker};
pub use thermal::{
    LatchState, ThermalChannel, ThermalChannelState, ThermalGuard, ThermalLimits, Transition,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::error::GuardError;
    pub use super::override_tracker::OverrideTracker;
    pub use super::thermal::{ThermalChannel, ThermalGuard, ThermalLimits, Transition};
}

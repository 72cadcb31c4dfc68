//! Skywarden Core Ephemeris: tabulated astronomy for the lighting schedule
//!
//! This crate answers two questions for the supervisor, without any I/O
//! beyond loading its tables:
//!
//! - **When is the lit window?** Sunrise/sunset per calendar day, shifted by
//!   an on-time offset; with a hard-off, sunset' until that wall-clock time.
//! - **Which phase is active?** The lunar phase (1..=8) at an instant.
//!
//! # Key Concepts
//!
//! - **Reference date**: sun data is date-agnostic, so every instant is
//!   normalized onto the year 2000 before comparison.
//! - **Fallback**: a missing calendar day falls back to the previous day
//!   once; a second miss is `DataExhausted`.
//! - **Horizon**: phase boundaries are real instants; the table must cover
//!   the supervisor's operating horizon, checked at startup.
//!
//! # Example
//!
//! ```no_run
//! use skywarden_core_ephemeris::{AstronomicalOracle, ScheduleEvaluator};
//! use chrono::Local;
//!
//! # fn example() -> skywarden_core_ephemeris::Result<()> {
//! let oracle = AstronomicalOracle::load("ephemeris.json")?;
//! let now = Local::now().naive_local();
//!
//! let dark = ScheduleEvaluator::new(&oracle).is_dark(now, 0, None)?;
//! let phase = oracle.phase_at(now)?;
//! println!("dark: {}, phase: {} ({})", dark, phase.index(), phase.name());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod oracle;
pub mod phase;
pub mod schedule;
pub mod sun;

pub use error::{EphemerisError, LookupMiss, Result};
pub use oracle::AstronomicalOracle;
pub use phase::{MoonPhase, PhaseBoundary, PhaseTable, PHASE_COUNT};
pub use schedule::{is_dark_for, parse_time_of_day, ScheduleEvaluator};
pub use sun::{normalize, SunTable, SunTimes, REFERENCE_YEAR};

//! Astronomical oracle: sun and phase lookups over loaded tables
//!
//! # Table file format
//!
//! ```json
//! {
//!   "sun": [
//!     { "date": "06-21", "sunrise": "05:19", "sunset": "19:42" }
//!   ],
//!   "phases": [
//!     { "at": "2026-10-02T00:00:00", "phase": 5 }
//!   ]
//! }
//! ```
//!
//! Sun dates may be `MM-DD` or a full `YYYY-MM-DD` (the year is discarded).
//! Phase indices run 1 (New Moon) to 8 (Waning Crescent).

use crate::error::{EphemerisError, Result};
use crate::phase::{MoonPhase, PhaseBoundary, PhaseTable};
use crate::schedule::parse_time_of_day;
use crate::sun::{SunTable, SunTimes, REFERENCE_YEAR};
use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TableFile {
    sun: Vec<SunRow>,
    phases: Vec<PhaseBoundary>,
}

#[derive(Debug, Deserialize)]
struct SunRow {
    date: String,
    sunrise: String,
    sunset: String,
}

/// Pure lookup over loaded sun and phase tables
#[derive(Debug, Clone)]
pub struct AstronomicalOracle {
    sun: SunTable,
    phases: PhaseTable,
}

impl AstronomicalOracle {
    /// Create an oracle from already-built tables
    pub fn new(sun: SunTable, phases: PhaseTable) -> Self {
        Self { sun, phases }
    }

    /// Load the tables from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| EphemerisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Parse the tables from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: TableFile = serde_json::from_str(json)?;

        let mut sun = SunTable::new();
        for row in &file.sun {
            let date = parse_table_date(&row.date)?;
            sun.insert(date, parse_time_of_day(&row.sunrise)?, parse_time_of_day(&row.sunset)?)?;
        }

        if sun.is_empty() {
            return Err(EphemerisError::InvalidTable("sun table is empty".to_string()));
        }

        let phases = PhaseTable::new(file.phases)?;
        if phases.is_empty() {
            return Err(EphemerisError::InvalidTable("phase table is empty".to_string()));
        }

        Ok(Self::new(sun, phases))
    }

    /// Sunrise/sunset for the calendar day of `now`, on the reference date
    pub fn sun_times(&self, now: NaiveDateTime) -> Result<SunTimes> {
        self.sun.sun_times(now)
    }

    /// Lunar phase active at `now`
    pub fn phase_at(&self, now: NaiveDateTime) -> Result<MoonPhase> {
        self.phases.phase_at(now)
    }

    /// Check that both tables answer for every day from `now` to `now + days`
    pub fn validate_horizon(&self, now: NaiveDateTime, days: u32) -> Result<()> {
        for offset in 0..=u64::from(days) {
            let day = now
                .checked_add_days(Days::new(offset))
                .ok_or_else(|| EphemerisError::DataExhausted(format!("{} + {} days overflows", now, offset)))?;
            self.sun.sun_times(day)?;
        }

        let horizon = now
            .checked_add_days(Days::new(u64::from(days)))
            .ok_or_else(|| EphemerisError::DataExhausted(format!("{} + {} days overflows", now, days)))?;
        self.phases.phase_at(horizon)?;

        Ok(())
    }

    /// Last instant the phase table can answer for
    pub fn phase_coverage_end(&self) -> Option<NaiveDateTime> {
        self.phases.last_boundary()
    }

    /// Number of tabulated sun days
    pub fn sun_days(&self) -> usize {
        self.sun.len()
    }
}

fn parse_table_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-{}", REFERENCE_YEAR, value), "%Y-%m-%d"))
        .map_err(|_| EphemerisError::InvalidTime {
            value: value.to_string(),
            expected: "MM-DD or YYYY-MM-DD",
        })
}

//! Sunrise/sunset table keyed by calendar day
//!
//! Sun data is date-agnostic: only the month, day and time of day matter.
//! Every instant is normalized onto [`REFERENCE_YEAR`] before it is compared,
//! so a single table serves every year the installation runs.

use crate::error::{EphemerisError, LookupMiss, Result};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;

/// Canonical year all sun data and "now" are normalized onto.
///
/// 2000 is a leap year, so 29 February has a home.
pub const REFERENCE_YEAR: i32 = 2000;

/// Sunrise and sunset for one day, on the reference date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    /// Sunrise instant
    pub sunrise: NaiveDateTime,
    /// Sunset instant
    pub sunset: NaiveDateTime,
}

impl SunTimes {
    /// Build sun times for `date`, validating that sunrise precedes sunset
    pub fn new(date: NaiveDate, sunrise: NaiveTime, sunset: NaiveTime) -> Result<Self> {
        if sunrise >= sunset {
            return Err(EphemerisError::InvalidTable(format!(
                "sunrise {} is not before sunset {} on {}",
                sunrise,
                sunset,
                date.format("%m-%d")
            )));
        }

        let date = normalize_date(date)?;
        Ok(Self {
            sunrise: date.and_time(sunrise),
            sunset: date.and_time(sunset),
        })
    }
}

/// Move a date onto the reference year
pub fn normalize_date(date: NaiveDate) -> Result<NaiveDate> {
    date.with_year(REFERENCE_YEAR).ok_or_else(|| {
        EphemerisError::InvalidTable(format!("date {} has no reference-year equivalent", date))
    })
}

/// Move an instant onto the reference year, keeping month, day and time
pub fn normalize(now: NaiveDateTime) -> Result<NaiveDateTime> {
    Ok(normalize_date(now.date())?.and_time(now.time()))
}

/// Tabulated sun times, one row per reference-year day
#[derive(Debug, Clone, Default)]
pub struct SunTable {
    days: BTreeMap<NaiveDate, SunTimes>,
}

impl SunTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row; the date is normalized onto the reference year
    pub fn insert(&mut self, date: NaiveDate, sunrise: NaiveTime, sunset: NaiveTime) -> Result<()> {
        let times = SunTimes::new(date, sunrise, sunset)?;
        self.days.insert(times.sunrise.date(), times);
        Ok(())
    }

    /// Exact lookup for a reference-year date
    pub fn lookup(&self, date: NaiveDate) -> std::result::Result<SunTimes, LookupMiss> {
        let date = normalize_date(date).map_err(|_| LookupMiss { date })?;
        self.days.get(&date).copied().ok_or(LookupMiss { date })
    }

    /// Sun times for the calendar day of `now`
    ///
    /// Falls back to the previous day exactly once when the day itself is
    /// missing; a second miss means the table cannot answer.
    pub fn sun_times(&self, now: NaiveDateTime) -> Result<SunTimes> {
        let today = normalize(now)?.date();

        match self.lookup(today) {
            Ok(times) => Ok(times),
            Err(miss) => {
                let yesterday = previous_day(today)
                    .ok_or_else(|| EphemerisError::DataExhausted(miss.to_string()))?;

                let fallback = self
                    .lookup(yesterday)
                    .map_err(|second| EphemerisError::DataExhausted(format!("{}, {}", miss, second)))?;

                // Keep the previous day's times but place them on today's date
                let shift = |t: NaiveDateTime| today.and_time(t.time());
                Ok(SunTimes {
                    sunrise: shift(fallback.sunrise),
                    sunset: shift(fallback.sunset),
                })
            }
        }
    }

    /// Number of tabulated days
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Previous calendar day, wrapping 1 January onto 31 December of the reference year
fn previous_day(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 1 && date.day() == 1 {
        NaiveDate::from_ymd_opt(REFERENCE_YEAR, 12, 31)
    } else {
        date.checked_sub_days(Days::new(1))
    }
}

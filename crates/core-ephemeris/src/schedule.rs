//! Lit-window scheduling
//!
//! A lighting channel is lit inside a right-open window derived from the
//! day's sun times shifted by an on-time offset:
//!
//! ```text
//!   no hard-off:    lit = [sunrise', sunset')
//!   with hard-off:  lit = [sunset', hard_off)
//!
//!   sunrise' = sunrise + offset      sunset' = sunset + offset
//! ```
//!
//! With a hard-off the channel is an evening channel: it opens at sunset'
//! and closes at the hard-off wall-clock time. Instants after midnight are
//! before that day's sunset', so the window never reopens overnight. A
//! hard-off at or before sunset' leaves the channel dark all day.

use crate::error::{EphemerisError, Result};
use crate::oracle::AstronomicalOracle;
use crate::sun::{normalize, SunTimes};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

/// Parse an `HH:MM` or `HH:MM:SS` wall-clock time
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| EphemerisError::InvalidTime {
            value: value.to_string(),
            expected: "HH:MM or HH:MM:SS",
        })
}

/// Decide whether the lit window is closed at `now` for the given sun times
///
/// `now` must already be normalized onto the reference date.
pub fn is_dark_for(
    sun: &SunTimes,
    now: NaiveDateTime,
    on_offset_minutes: i64,
    hard_off: Option<NaiveTime>,
) -> bool {
    let offset = TimeDelta::minutes(on_offset_minutes);
    let sunrise = sun.sunrise + offset;
    let sunset = sun.sunset + offset;

    match hard_off {
        Some(off) => now < sunset || now.time() >= off,
        None => now < sunrise || now >= sunset,
    }
}

/// Day/night decisions over an [`AstronomicalOracle`]
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEvaluator<'a> {
    oracle: &'a AstronomicalOracle,
}

impl<'a> ScheduleEvaluator<'a> {
    /// Create an evaluator over `oracle`
    pub fn new(oracle: &'a AstronomicalOracle) -> Self {
        Self { oracle }
    }

    /// Whether a channel with the given offset and hard-off should be dark at `now`
    pub fn is_dark(
        &self,
        now: NaiveDateTime,
        on_offset_minutes: i64,
        hard_off: Option<NaiveTime>,
    ) -> Result<bool> {
        let sun = self.oracle.sun_times(now)?;
        Ok(is_dark_for(&sun, normalize(now)?, on_offset_minutes, hard_off))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::PhaseTable;
    use crate::sun::SunTable;
    use chrono::NaiveDate;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn on(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, 3, day).unwrap().and_time(hm(h, m))
    }

    fn sun() -> SunTimes {
        SunTimes::new(NaiveDate::from_ymd_opt(2000, 3, 10).unwrap(), hm(6, 0), hm(18, 0)).unwrap()
    }

    #[test]
    fn test_right_open_window() {
        let sun = sun();
        assert!(is_dark_for(&sun, on(10, 5, 59), 0, None));
        assert!(!is_dark_for(&sun, on(10, 6, 0), 0, None));
        assert!(!is_dark_for(&sun, on(10, 17, 59), 0, None));
        assert!(is_dark_for(&sun, on(10, 18, 0), 0, None));
        assert!(is_dark_for(&sun, on(10, 23, 30), 0, None));
    }

    #[test]
    fn test_offset_shifts_both_edges() {
        let sun = sun();
        assert!(is_dark_for(&sun, on(10, 6, 10), 15, None));
        assert!(!is_dark_for(&sun, on(10, 6, 15), 15, None));
        assert!(!is_dark_for(&sun, on(10, 18, 14), 15, None));
        assert!(is_dark_for(&sun, on(10, 18, 15), 15, None));

        // Negative offsets open early
        assert!(!is_dark_for(&sun, on(10, 5, 30), -30, None));
    }

    #[test]
    fn test_hard_off_window_runs_from_sunset() {
        let sun = sun();
        let off = Some(hm(22, 0));

        assert!(is_dark_for(&sun, on(10, 12, 0), 0, off));
        assert!(is_dark_for(&sun, on(10, 17, 59), 0, off));
        assert!(!is_dark_for(&sun, on(10, 18, 0), 0, off));
        assert!(!is_dark_for(&sun, on(10, 21, 59), 0, off));
        assert!(is_dark_for(&sun, on(10, 22, 0), 0, off));
        assert!(is_dark_for(&sun, on(10, 23, 59), 0, off));

        // After midnight the time of day is early again; still before sunset'
        assert!(is_dark_for(&sun, on(10, 0, 30), 0, off));
        assert!(is_dark_for(&sun, on(10, 5, 59), 0, off));
        assert!(is_dark_for(&sun, on(10, 6, 0), 0, off));
    }

    #[test]
    fn test_hard_off_follows_offset_sunset() {
        let sun = sun();
        let off = Some(hm(22, 0));
        assert!(is_dark_for(&sun, on(10, 18, 29), 30, off));
        assert!(!is_dark_for(&sun, on(10, 18, 30), 30, off));
    }

    #[test]
    fn test_hard_off_at_or_before_sunset_never_lights() {
        let sun = sun();
        for off in [hm(15, 0), hm(18, 0)] {
            for h in 0..24 {
                assert!(is_dark_for(&sun, on(10, h, 0), 0, Some(off)), "{}:00 lit", h);
            }
        }
    }

    #[test]
    fn test_evaluator_uses_oracle() {
        let mut table = SunTable::new();
        table
            .insert(NaiveDate::from_ymd_opt(2000, 3, 10).unwrap(), hm(6, 0), hm(18, 0))
            .unwrap();
        let oracle = AstronomicalOracle::new(table, PhaseTable::default());
        let evaluator = ScheduleEvaluator::new(&oracle);

        let real = |h, m| NaiveDate::from_ymd_opt(2031, 3, 10).unwrap().and_time(hm(h, m));
        assert!(evaluator.is_dark(real(5, 59), 0, None).unwrap());
        assert!(!evaluator.is_dark(real(12, 0), 0, None).unwrap());

        // 11 March falls back to the 10th; 12 March has nothing
        let later = NaiveDate::from_ymd_opt(2031, 3, 12).unwrap().and_time(hm(12, 0));
        assert!(evaluator.is_dark(later, 0, None).unwrap_err().is_data_exhausted());
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("22:00").unwrap(), hm(22, 0));
        assert_eq!(parse_time_of_day(" 06:05:30 ").unwrap(), NaiveTime::from_hms_opt(6, 5, 30).unwrap());
        assert!(parse_time_of_day("25:00").is_err());
        assert!(parse_time_of_day("ten").is_err());
    }
}

/*!
 * Wall-clock source for schedule decisions
 *
 * Schedules compare against local wall-clock time, so the supervisor never
 * calls `Utc::now()` directly; tests drive a [`ManualClock`] instead.
 */

use chrono::{NaiveDateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// System time shifted by a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: TimeDelta,
}

impl SystemClock {
    pub fn new(utc_offset_minutes: i32) -> Self {
        Self {
            offset: TimeDelta::minutes(i64::from(utc_offset_minutes)),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc() + self.offset
    }
}

/// Settable clock shared between a test and the supervisor
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_manual_clock_is_shared() {
        let start = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(17, 59, 0)
            .unwrap();
        let clock = ManualClock::new(start);
        let handle = clock.clone();

        handle.advance(TimeDelta::minutes(1));
        assert_eq!(clock.now().format("%H:%M").to_string(), "18:00");

        handle.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_system_clock_offset() {
        let utc = SystemClock::new(0).now();
        let ahead = SystemClock::new(120).now();
        let diff = ahead - utc;
        assert!(diff >= TimeDelta::minutes(119) && diff <= TimeDelta::minutes(121));
    }
}

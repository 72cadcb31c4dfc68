//! Override tracker: externally supplied readings with a time-to-live
//!
//! A remote operator can push a reading for a channel (for example to test
//! the thermal cut-out without heating the hardware). While that reading is
//! fresh it replaces the sensor poll for its channel; once it goes stale the
//! caller resumes polling on its own.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// A recorded override
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Override {
    /// Supplied value
    pub value: f64,
    /// When it was supplied
    pub at: Instant,
}

impl Override {
    /// Whether the override is still within `ttl` at `at_check`
    pub fn is_fresh(&self, at_check: Instant, ttl: Duration) -> bool {
        at_check.saturating_duration_since(self.at) < ttl
    }
}

/// Most recent override per channel
#[derive(Debug, Clone)]
pub struct OverrideTracker<K> {
    overrides: HashMap<K, Override>,
}

impl<K> Default for OverrideTracker<K> {
    fn default() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy> OverrideTracker<K> {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` as the latest override for `channel`, stamped `at`
    pub fn record(&mut self, channel: K, value: f64, at: Instant) {
        self.overrides.insert(channel, Override { value, at });
    }

    /// Whether `channel` has an override younger than `ttl`
    pub fn is_fresh(&self, channel: K, at_check: Instant, ttl: Duration) -> bool {
        self.overrides
            .get(&channel)
            .is_some_and(|o| o.is_fresh(at_check, ttl))
    }

    /// Value of a fresh override for `channel`
    pub fn fresh_value(&self, channel: K, at_check: Instant, ttl: Duration) -> Option<f64> {
        self.overrides
            .get(&channel)
            .filter(|o| o.is_fresh(at_check, ttl))
            .map(|o| o.value)
    }

    /// Last override for `channel`, fresh or not
    pub fn get(&self, channel: K) -> Option<&Override> {
        self.overrides.get(&channel)
    }

    /// Drop stale overrides and return the channels that expired
    pub fn expire(&mut self, at_check: Instant, ttl: Duration) -> Vec<K> {
        let expired: Vec<K> = self
            .overrides
            .iter()
            .filter(|(_, o)| !o.is_fresh(at_check, ttl))
            .map(|(k, _)| *k)
            .collect();

        for channel in &expired {
            self.overrides.remove(channel);
        }

        expired
    }

    /// Forget every override
    pub fn clear(&mut self) {
        self.overrides.clear();
    }

    /// Number of recorded overrides
    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    /// Whether no overrides are recorded
    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}

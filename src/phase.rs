/*!
 * Phase array selector
 *
 * Exactly zero or one phase position is energized at any time. Switching is
 * break-before-make: every position is de-energized before the new one is
 * driven.
 */

use crate::hardware::{Actuators, HardwareError};

/// Break-before-make selector over positions `1..=count`
#[derive(Debug, Clone)]
pub struct PhaseSelector {
    count: u8,
    lower: u8,
    /// Last converged position; `None` until the first successful select
    /// and after any failed write
    current: Option<u8>,
}

impl PhaseSelector {
    pub fn new(count: u8, lower: u8) -> Self {
        Self {
            count,
            lower,
            current: None,
        }
    }

    /// Position that `select(position)` converges to
    pub fn target(&self, position: u8) -> u8 {
        if (self.lower..=self.count).contains(&position) {
            position
        } else {
            0
        }
    }

    /// Converged position, 0 for none or unknown
    pub fn position(&self) -> u8 {
        self.current.unwrap_or(0)
    }

    pub fn is_converged(&self) -> bool {
        self.current.is_some()
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn lower(&self) -> u8 {
        self.lower
    }

    /// Energize exactly `position`, or nothing when it is out of range
    ///
    /// Returns whether any write was made. Every position is driven off even
    /// if one write fails; the first failure is returned.
    pub async fn select(&mut self, hw: &dyn Actuators, position: u8) -> Result<bool, HardwareError> {
        let target = self.target(position);
        if self.current == Some(target) {
            return Ok(false);
        }

        self.current = None;

        let mut first_error = None;
        for p in 1..=self.count {
            if let Err(e) = hw.set_phase_pin(p, false).await {
                tracing::warn!(position = p, error = %e, "failed to de-energize phase position");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        if target != 0 {
            hw.set_phase_pin(target, true).await?;
        }

        self.current = Some(target);
        Ok(true)
    }
}

//! Lunar phase table
//!
//! The table is a list of phase-boundary instants, each tagged with the phase
//! that is active at that boundary. Unlike sun data, phase boundaries are real
//! calendar instants and are never normalized.

use crate::error::{EphemerisError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of discrete phases in the cycle
pub const PHASE_COUNT: u8 = 8;

/// One of the eight lunar phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MoonPhase {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl MoonPhase {
    /// Phase for a 1-based index
    pub fn from_index(index: u8) -> Option<Self> {
        use MoonPhase::*;
        Some(match index {
            1 => NewMoon,
            2 => WaxingCrescent,
            3 => FirstQuarter,
            4 => WaxingGibbous,
            5 => FullMoon,
            6 => WaningGibbous,
            7 => LastQuarter,
            8 => WaningCrescent,
            _ => return None,
        })
    }

    /// 1-based index in the cycle
    pub fn index(&self) -> u8 {
        *self as u8 + 1
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            MoonPhase::NewMoon => "New Moon",
            MoonPhase::WaxingCrescent => "Waxing Crescent",
            MoonPhase::FirstQuarter => "First Quarter",
            MoonPhase::WaxingGibbous => "Waxing Gibbous",
            MoonPhase::FullMoon => "Full Moon",
            MoonPhase::WaningGibbous => "Waning Gibbous",
            MoonPhase::LastQuarter => "Last Quarter",
            MoonPhase::WaningCrescent => "Waning Crescent",
        }
    }
}

impl fmt::Display for MoonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for MoonPhase {
    type Error = String;

    fn try_from(index: u8) -> std::result::Result<Self, Self::Error> {
        MoonPhase::from_index(index)
            .ok_or_else(|| format!("phase index {} outside 1..={}", index, PHASE_COUNT))
    }
}

impl From<MoonPhase> for u8 {
    fn from(phase: MoonPhase) -> u8 {
        phase.index()
    }
}

/// A tabulated phase boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseBoundary {
    /// Boundary instant
    pub at: NaiveDateTime,
    /// Phase active at this boundary
    pub phase: MoonPhase,
}

/// Boundaries sorted by instant
#[derive(Debug, Clone, Default)]
pub struct PhaseTable {
    boundaries: Vec<PhaseBoundary>,
}

impl PhaseTable {
    /// Build a table, sorting boundaries and rejecting duplicate instants
    pub fn new(mut boundaries: Vec<PhaseBoundary>) -> Result<Self> {
        boundaries.sort_by_key(|b| b.at);

        if let Some(pair) = boundaries.windows(2).find(|w| w[0].at == w[1].at) {
            return Err(EphemerisError::InvalidTable(format!(
                "duplicate phase boundary at {}",
                pair[0].at
            )));
        }

        Ok(Self { boundaries })
    }

    /// Phase for `now`: the phase of the first boundary strictly after it
    pub fn phase_at(&self, now: NaiveDateTime) -> Result<MoonPhase> {
        let idx = self.boundaries.partition_point(|b| b.at <= now);

        self.boundaries.get(idx).map(|b| b.phase).ok_or_else(|| {
            EphemerisError::DataExhausted(match self.last_boundary() {
                Some(last) => format!("{} is beyond the last phase boundary ({})", now, last),
                None => "phase table is empty".to_string(),
            })
        })
    }

    /// Instant of the last tabulated boundary
    pub fn last_boundary(&self) -> Option<NaiveDateTime> {
        self.boundaries.last().map(|b| b.at)
    }

    /// Number of boundaries
    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn table() -> PhaseTable {
        PhaseTable::new(vec![
            PhaseBoundary { at: at(10, 0), phase: MoonPhase::LastQuarter },
            PhaseBoundary { at: at(2, 0), phase: MoonPhase::FullMoon },
            PhaseBoundary { at: at(6, 0), phase: MoonPhase::WaningGibbous },
        ])
        .unwrap()
    }

    #[test]
    fn test_phase_is_next_boundary() {
        let table = table();

        assert_eq!(table.phase_at(at(1, 12)).unwrap(), MoonPhase::FullMoon);
        assert_eq!(table.phase_at(at(3, 0)).unwrap(), MoonPhase::WaningGibbous);
        assert_eq!(table.phase_at(at(9, 23)).unwrap(), MoonPhase::LastQuarter);
    }

    #[test]
    fn test_boundary_itself_is_not_after() {
        // Exactly on a boundary, the next one applies
        assert_eq!(table().phase_at(at(6, 0)).unwrap(), MoonPhase::LastQuarter);
    }

    #[test]
    fn test_beyond_last_boundary_is_exhausted() {
        let table = table();
        assert!(table.phase_at(at(10, 0)).unwrap_err().is_data_exhausted());
        assert!(table.phase_at(at(20, 0)).unwrap_err().is_data_exhausted());
        assert!(PhaseTable::default().phase_at(at(1, 0)).is_err());
    }

    #[test]
    fn test_duplicate_boundary_rejected() {
        let result = PhaseTable::new(vec![
            PhaseBoundary { at: at(2, 0), phase: MoonPhase::FullMoon },
            PhaseBoundary { at: at(2, 0), phase: MoonPhase::NewMoon },
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_phase_index_names() {
        for index in 1..=PHASE_COUNT {
            let phase = MoonPhase::from_index(index).unwrap();
            assert_eq!(phase.index(), index);
        }
        assert_eq!(MoonPhase::from_index(1).unwrap().name(), "New Moon");
        assert_eq!(MoonPhase::from_index(5).unwrap().to_string(), "Full Moon");
        assert!(MoonPhase::from_index(0).is_none());
        assert!(MoonPhase::from_index(9).is_none());
        assert!(MoonPhase::try_from(12u8).is_err());
    }
}

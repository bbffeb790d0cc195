//! Water condition assessment
//!
//! Maps the ordinal turbidity level produced by a classifier onto a named
//! water condition and its display label.

use serde::{Deserialize, Serialize};

/// Level reported when a reading falls outside every classification band.
pub const UNKNOWN_LEVEL: u8 = 0;

/// Highest (cleanest) level on the ordinal scale.
pub const MAX_LEVEL: u8 = 5;

/// Water condition derived from a turbidity level
///
/// Levels run from 1 (very turbid) to 5 (very clean). Level 0 and anything
/// above 5 are reported as [`Condition::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// Reading could not be classified
    Unknown,
    /// Level 1
    VeryTurbid,
    /// Level 2
    Turbid,
    /// Level 3
    SlightlyTurbid,
    /// Level 4
    Clean,
    /// Level 5
    VeryClean,
}

impl Condition {
    /// Resolve the condition for a classifier level
    ///
    /// Total over `u8`: every level outside `1..=5` is `Unknown`.
    pub const fn from_level(level: u8) -> Self {
        match level {
            1 => Self::VeryTurbid,
            2 => Self::Turbid,
            3 => Self::SlightlyTurbid,
            4 => Self::Clean,
            5 => Self::VeryClean,
            _ => Self::Unknown,
        }
    }

    /// Ordinal level of this condition (0 for `Unknown`)
    pub const fn level(self) -> u8 {
        match self {
            Self::Unknown => UNKNOWN_LEVEL,
            Self::VeryTurbid => 1,
            Self::Turbid => 2,
            Self::SlightlyTurbid => 3,
            Self::Clean => 4,
            Self::VeryClean => MAX_LEVEL,
        }
    }

    /// Get the display label for this condition
    ///
    /// Labels are in the deployment language (Indonesian) and are what the
    /// uplink reports in the `condition` field.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Tidak Diketahui",
            Self::VeryTurbid => "Sangat Keruh",
            Self::Turbid => "Keruh",
            Self::SlightlyTurbid => "Agak Keruh",
            Self::Clean => "Bersih",
            Self::VeryClean => "Sangat Bersih",
        }
    }

    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Label lookup keyed directly by level
pub const fn condition_label(level: u8) -> &'static str {
    Condition::from_level(level).label()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_cover_every_level() {
        for level in 0..=MAX_LEVEL {
            assert!(!condition_label(level).is_empty(), "level {level} has no label");
        }
    }

    #[test]
    fn test_known_labels() {
        assert_eq!(condition_label(5), "Sangat Bersih");
        assert_eq!(condition_label(4), "Bersih");
        assert_eq!(condition_label(3), "Agak Keruh");
        assert_eq!(condition_label(2), "Keruh");
        assert_eq!(condition_label(1), "Sangat Keruh");
    }

    #[test]
    fn test_out_of_band_levels_are_unknown() {
        assert_eq!(condition_label(0), "Tidak Diketahui");
        assert_eq!(condition_label(6), "Tidak Diketahui");
        assert_eq!(condition_label(u8::MAX), "Tidak Diketahui");
        assert!(!Condition::from_level(0).is_known());
    }

    #[test]
    fn test_level_round_trips_through_condition() {
        for level in 0..=MAX_LEVEL {
            assert_eq!(Condition::from_level(level).level(), level);
        }
    }
}

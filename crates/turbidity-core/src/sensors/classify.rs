//! Classification strategies turning a raw sample into an ordinal level

use heapless::Vec;
use serde::{Deserialize, Serialize};

use super::{Calibration, CalibrationError};
use crate::metrics::{MAX_LEVEL, UNKNOWN_LEVEL};
use crate::remap::map_clamped;

/// Maximum number of bands a [`LookupBands`] table can hold
pub const MAX_BANDS: usize = 8;

/// Bands matching the reference deployment: 10-bit ADC calibrated over
/// `[447, 650]`, where a low reading means clear water.
pub const DEFAULT_BANDS: [Band; 5] = [
    Band::new(447, 487, 5),
    Band::new(488, 528, 4),
    Band::new(529, 569, 3),
    Band::new(570, 609, 2),
    Band::new(610, 650, 1),
];

/// Strategy that maps a raw sample onto the `1..=5` level scale.
///
/// Implementations return [`UNKNOWN_LEVEL`] when they cannot place a sample.
pub trait Classifier {
    fn level(&self, raw: u16) -> u8;
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn level(&self, raw: u16) -> u8 {
        (**self).level(raw)
    }
}

/// Which classification strategy a sensor is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClassificationPolicy {
    /// Clamp into the calibration range and interpolate onto `1..=5`
    #[default]
    LinearRemap,
    /// Five inclusive bands over the calibration range (the reference
    /// table for the reference calibration), anything outside is unknown
    LookupBands,
}

/// Continuous classification: clamp, then interpolate onto `1..=5`.
///
/// Never yields the unknown level; out-of-range samples take the level of
/// the nearest calibration bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRemap {
    calibration: Calibration,
    ascending: bool,
}

impl LinearRemap {
    /// `ascending == true` maps `raw_min -> 1` and `raw_max -> 5`;
    /// otherwise `raw_min -> 5` and `raw_max -> 1`.
    pub const fn new(calibration: Calibration, ascending: bool) -> Self {
        Self {
            calibration,
            ascending,
        }
    }
}

impl Classifier for LinearRemap {
    fn level(&self, raw: u16) -> u8 {
        let (to_low, to_high) = if self.ascending {
            (1.0, MAX_LEVEL as f32)
        } else {
            (MAX_LEVEL as f32, 1.0)
        };
        map_clamped(
            raw as f32,
            self.calibration.raw_min() as f32,
            self.calibration.raw_max() as f32,
            to_low,
            to_high,
        )
    }
}

/// Inclusive raw-value range mapped to a fixed level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub low: u16,
    pub high: u16,
    pub level: u8,
}

impl Band {
    pub const fn new(low: u16, high: u16, level: u8) -> Self {
        Self { low, high, level }
    }

    pub const fn contains(&self, raw: u16) -> bool {
        raw >= self.low && raw <= self.high
    }
}

/// Table-driven classification with an explicit unknown fallback.
///
/// Bands are checked in order and the first match wins.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupBands {
    bands: Vec<Band, MAX_BANDS>,
}

impl LookupBands {
    pub fn new(bands: &[Band]) -> Result<Self, CalibrationError> {
        let bands =
            Vec::from_slice(bands).map_err(|_| CalibrationError::TooManyBands(bands.len()))?;
        Ok(Self { bands })
    }

    /// Split the calibration range into five contiguous inclusive bands.
    ///
    /// Level numbering follows the same direction rule as [`LinearRemap`].
    /// Ranges narrower than five raw values yield fewer bands.
    pub fn evenly_spaced(calibration: Calibration, ascending: bool) -> Self {
        let min = calibration.raw_min() as u32;
        let count = calibration.raw_max() as u32 - min + 1;
        let levels = MAX_LEVEL as u32;

        let mut bands = Vec::new();
        for i in 0..levels {
            let low = min + i * count / levels;
            let next = min + (i + 1) * count / levels;
            if next <= low {
                continue;
            }
            let level = if ascending { i + 1 } else { levels - i };
            // At most five bands, well under MAX_BANDS
            let _ = bands.push(Band::new(low as u16, (next - 1) as u16, level as u8));
        }
        Self { bands }
    }

    /// Band table for a calibration: the reference table when the sensor
    /// is calibrated like the reference deployment, evenly spaced bands
    /// otherwise.
    pub fn for_calibration(calibration: Calibration, ascending: bool) -> Self {
        let reference = DEFAULT_BANDS[0].low == calibration.raw_min()
            && DEFAULT_BANDS[DEFAULT_BANDS.len() - 1].high == calibration.raw_max();
        if reference && !ascending {
            Self::default()
        } else {
            Self::evenly_spaced(calibration, ascending)
        }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }
}

impl Default for LookupBands {
    fn default() -> Self {
        Self {
            bands: Vec::from_iter(DEFAULT_BANDS),
        }
    }
}

impl Classifier for LookupBands {
    fn level(&self, raw: u16) -> u8 {
        self.bands
            .iter()
            .find(|band| band.contains(raw))
            .map_or(UNKNOWN_LEVEL, |band| band.level)
    }
}

/// Runtime-selected classifier built from a [`ClassificationPolicy`]
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Linear(LinearRemap),
    Bands(LookupBands),
}

impl Classification {
    pub fn from_policy(
        policy: ClassificationPolicy,
        calibration: Calibration,
        ascending: bool,
    ) -> Self {
        match policy {
            ClassificationPolicy::LinearRemap => {
                Self::Linear(LinearRemap::new(calibration, ascending))
            }
            ClassificationPolicy::LookupBands => {
                Self::Bands(LookupBands::for_calibration(calibration, ascending))
            }
        }
    }

    pub const fn policy(&self) -> ClassificationPolicy {
        match self {
            Self::Linear(_) => ClassificationPolicy::LinearRemap,
            Self::Bands(_) => ClassificationPolicy::LookupBands,
        }
    }
}

impl Classifier for Classification {
    fn level(&self, raw: u16) -> u8 {
        match self {
            Self::Linear(linear) => linear.level(raw),
            Self::Bands(bands) => bands.level(raw),
        }
    }
}

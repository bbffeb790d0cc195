mod classify;
mod turbidity;

pub use classify::*;
pub use turbidity::*;

use thiserror_no_std::Error;

/// Source of raw analog samples.
///
/// Implemented by the firmware's ADC adapter and by the simulator's synthetic
/// signal. A read is assumed to always succeed and to return a value in
/// `[0, AdcSpec::max_raw()]`; adapters deal with transient driver errors
/// themselves.
pub trait AnalogSource {
    /// Read one raw sample from the bound input.
    fn read_raw(&mut self) -> u16;
}

impl<T: AnalogSource + ?Sized> AnalogSource for &mut T {
    fn read_raw(&mut self) -> u16 {
        (**self).read_raw()
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CalibrationError {
    #[error("Calibration bounds inverted: raw_min {raw_min} > raw_max {raw_max}")]
    InvertedBounds { raw_min: u16, raw_max: u16 },
    #[error("Unsupported ADC resolution: {0} bits")]
    UnsupportedResolution(u8),
    #[error("Reference voltage must be positive")]
    InvalidReferenceVoltage,
    #[error("Too many classification bands: {0}")]
    TooManyBands(usize),
}

/// Calibration bounds in raw-sample units.
///
/// `raw_min <= raw_max` always holds; which end means "clean" is decided by
/// the sensor's `ascending` flag, not by the order of the bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    raw_min: u16,
    raw_max: u16,
}

impl Calibration {
    pub const fn new(raw_min: u16, raw_max: u16) -> Result<Self, CalibrationError> {
        if raw_min > raw_max {
            return Err(CalibrationError::InvertedBounds { raw_min, raw_max });
        }
        Ok(Self { raw_min, raw_max })
    }

    pub const fn raw_min(&self) -> u16 {
        self.raw_min
    }

    pub const fn raw_max(&self) -> u16 {
        self.raw_max
    }

    pub const fn contains(&self, raw: u16) -> bool {
        raw >= self.raw_min && raw <= self.raw_max
    }
}

/// ADC characteristics used to convert raw samples into volts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcSpec {
    resolution_bits: u8,
    reference_voltage: f32,
}

impl AdcSpec {
    pub fn new(resolution_bits: u8, reference_voltage: f32) -> Result<Self, CalibrationError> {
        if resolution_bits == 0 || resolution_bits > 16 {
            return Err(CalibrationError::UnsupportedResolution(resolution_bits));
        }
        if !(reference_voltage > 0.0) {
            return Err(CalibrationError::InvalidReferenceVoltage);
        }
        Ok(Self {
            resolution_bits,
            reference_voltage,
        })
    }

    pub const fn resolution_bits(&self) -> u8 {
        self.resolution_bits
    }

    pub const fn reference_voltage(&self) -> f32 {
        self.reference_voltage
    }

    /// Largest representable raw value, `2^bits - 1`
    pub const fn max_raw(&self) -> u16 {
        ((1u32 << self.resolution_bits) - 1) as u16
    }

    /// Convert a raw sample into volts: `raw / max_raw * v_ref`
    pub fn voltage(&self, raw: u16) -> f32 {
        raw as f32 / self.max_raw() as f32 * self.reference_voltage
    }
}

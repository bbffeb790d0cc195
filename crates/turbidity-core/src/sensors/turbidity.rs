use log::debug;

use super::{AdcSpec, AnalogSource, Calibration, CalibrationError, Classification, Classifier};
use crate::config::SensorConfig;
use crate::metrics::Condition;
use crate::remap::map_clamped;

/// Quadratic regression coefficients of the NTU estimate, `a·v² + b·v + c`
pub const NTU_COEFF_A: f32 = -1120.42;
pub const NTU_COEFF_B: f32 = 5742.3;
pub const NTU_COEFF_C: f32 = -4352.9;

/// Estimate turbidity in NTU from the sensor output voltage.
///
/// Experimental. The regression has no validity bounds and produces
/// meaningless (including negative) values outside the voltage range the
/// probe was characterised over.
pub fn ntu_from_voltage(voltage: f32) -> f32 {
    NTU_COEFF_A * voltage * voltage + NTU_COEFF_B * voltage + NTU_COEFF_C
}

/// Last sampled state. Raw value and voltage are always updated together.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    pub raw: u16,
    pub voltage: f32,
}

/// Analog turbidity probe with a fixed calibration
///
/// Reading accessors only look at the last [`Snapshot`]; nothing touches the
/// ADC except [`TurbiditySensor::sample`]. Before the first sample every
/// accessor reports on a zero reading.
pub struct TurbiditySensor<A, C = Classification> {
    source: A,
    channel: u8,
    calibration: Calibration,
    adc: AdcSpec,
    ascending: bool,
    classifier: C,
    snapshot: Snapshot,
}

impl<A: AnalogSource> TurbiditySensor<A, Classification> {
    /// Build a sensor whose classifier is chosen by `config.policy`
    pub fn from_config(source: A, config: &SensorConfig) -> Result<Self, CalibrationError> {
        let classifier =
            Classification::from_policy(config.policy, config.calibration()?, config.ascending);
        Self::with_classifier(source, config, classifier)
    }
}

impl<A: AnalogSource, C: Classifier> TurbiditySensor<A, C> {
    pub fn with_classifier(
        source: A,
        config: &SensorConfig,
        classifier: C,
    ) -> Result<Self, CalibrationError> {
        Ok(Self {
            source,
            channel: config.channel,
            calibration: config.calibration()?,
            adc: config.adc_spec()?,
            ascending: config.ascending,
            classifier,
            snapshot: Snapshot::default(),
        })
    }

    /// Read one sample from the ADC and recompute the voltage.
    ///
    /// Values above the ADC's representable maximum are clamped to it.
    pub fn sample(&mut self) -> Snapshot {
        let raw = self.source.read_raw().min(self.adc.max_raw());
        self.snapshot = Snapshot {
            raw,
            voltage: self.adc.voltage(raw),
        };
        debug!(
            "turbidity[ch{}]: raw={} voltage={}",
            self.channel, self.snapshot.raw, self.snapshot.voltage
        );
        if !self.calibration.contains(raw) {
            debug!(
                "turbidity[ch{}]: raw {} outside calibration [{}, {}]",
                self.channel,
                raw,
                self.calibration.raw_min(),
                self.calibration.raw_max()
            );
        }
        self.snapshot
    }

    pub const fn snapshot(&self) -> Snapshot {
        self.snapshot
    }

    pub const fn raw_value(&self) -> u16 {
        self.snapshot.raw
    }

    pub const fn voltage(&self) -> f32 {
        self.snapshot.voltage
    }

    pub const fn channel(&self) -> u8 {
        self.channel
    }

    /// Ordinal level of the last sample, `1..=5`, or 0 when unclassifiable
    pub fn level(&self) -> u8 {
        self.classifier.level(self.snapshot.raw)
    }

    /// Clarity of the last sample on `[0, 100]`, 100 being the clean end
    /// of the calibration range.
    pub fn percentage(&self) -> f32 {
        let (to_low, to_high) = if self.ascending {
            (0.0, 100.0)
        } else {
            (100.0, 0.0)
        };
        map_clamped(
            self.snapshot.raw as f32,
            self.calibration.raw_min() as f32,
            self.calibration.raw_max() as f32,
            to_low,
            to_high,
        )
    }

    pub fn condition(&self) -> Condition {
        Condition::from_level(self.level())
    }

    pub fn condition_label(&self) -> &'static str {
        self.condition().label()
    }

    /// See [`ntu_from_voltage`]
    pub fn estimated_ntu(&self) -> f32 {
        ntu_from_voltage(self.snapshot.voltage)
    }
}

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::sensors::{AdcSpec, Calibration, CalibrationError, ClassificationPolicy};
use crate::uplink::TlsMode;

/// Raw reading of the reference probe in clear water (10-bit ADC)
pub const DEFAULT_RAW_MIN: u16 = 447;
/// Raw reading of the reference probe at the turbid calibration point
pub const DEFAULT_RAW_MAX: u16 = 650;
pub const DEFAULT_RESOLUTION_BITS: u8 = 10;
pub const DEFAULT_REFERENCE_VOLTAGE: f32 = 5.0;

pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 10_000;

pub const DEFAULT_WIFI_ATTEMPTS: u8 = 5;
pub const DEFAULT_WIFI_RETRY_DELAY_MS: u32 = 500;

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub uplink: UplinkConfig<'a>,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Config<'_> {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sensor.validate()?;
        self.uplink.validate()?;
        self.schedule.validate()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    #[serde(default = "default_wifi_attempts")]
    pub max_attempts: u8,
    #[serde(default = "default_wifi_retry_delay")]
    pub retry_delay_ms: u32,
}

impl Default for InternetConfig<'_> {
    fn default() -> Self {
        Self {
            ssid: "",
            password: "",
            max_attempts: DEFAULT_WIFI_ATTEMPTS,
            retry_delay_ms: DEFAULT_WIFI_RETRY_DELAY_MS,
        }
    }
}

fn default_wifi_attempts() -> u8 {
    DEFAULT_WIFI_ATTEMPTS
}

fn default_wifi_retry_delay() -> u32 {
    DEFAULT_WIFI_RETRY_DELAY_MS
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy)]
pub struct UplinkConfig<'a> {
    pub endpoint: &'a str,
    #[serde(default)]
    pub tls: TlsMode,
}

impl UplinkConfig<'_> {
    pub fn is_https(&self) -> bool {
        self.endpoint.starts_with("https://")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_https() && !self.endpoint.starts_with("http://") {
            return Err(ConfigError::InvalidEndpoint);
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub channel: u8,
    pub raw_min: u16,
    pub raw_max: u16,
    pub resolution_bits: u8,
    pub reference_voltage: f32,
    /// `true` when a higher raw reading means cleaner water
    pub ascending: bool,
    pub policy: ClassificationPolicy,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            raw_min: DEFAULT_RAW_MIN,
            raw_max: DEFAULT_RAW_MAX,
            resolution_bits: DEFAULT_RESOLUTION_BITS,
            reference_voltage: DEFAULT_REFERENCE_VOLTAGE,
            ascending: false,
            policy: ClassificationPolicy::LinearRemap,
        }
    }
}

impl SensorConfig {
    pub fn calibration(&self) -> Result<Calibration, CalibrationError> {
        Calibration::new(self.raw_min, self.raw_max)
    }

    pub fn adc_spec(&self) -> Result<AdcSpec, CalibrationError> {
        AdcSpec::new(self.resolution_bits, self.reference_voltage)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.calibration()?;
        self.adc_spec()?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub sample_interval_ms: u64,
    pub report_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_ms == 0 || self.report_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("Invalid sensor calibration: {0}")]
    Calibration(CalibrationError),
    #[error("Uplink endpoint must start with http:// or https://")]
    InvalidEndpoint,
    #[error("Schedule intervals must be non-zero")]
    ZeroInterval,
}

impl From<CalibrationError> for ConfigError {
    fn from(err: CalibrationError) -> Self {
        Self::Calibration(err)
    }
}

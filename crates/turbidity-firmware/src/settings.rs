//! Build-time device settings
//!
//! Secrets come from the environment or a `.env` file read by `build.rs`
//! and are baked into the image.

use turbidity_core::config::{
    Config, InternetConfig, ScheduleConfig, SensorConfig, UplinkConfig,
};
use turbidity_core::uplink::TlsMode;

include!(concat!(env!("OUT_DIR"), "/settings.rs"));

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");
pub const UPLINK_ENDPOINT: &str = env!("UPLINK_ENDPOINT");

/// GPIO the probe's analog output is wired to (ADC1 channel 0)
pub const TURBIDITY_GPIO: u8 = 1;
pub const ADC_RESOLUTION_BITS: u8 = 12;
/// Full-scale input voltage at 11 dB attenuation
pub const ADC_REFERENCE_VOLTAGE: f32 = 3.3;

pub fn device_config() -> Config<'static> {
    Config {
        internet: InternetConfig {
            ssid: WIFI_SSID,
            password: WIFI_PASSWORD,
            ..InternetConfig::default()
        },
        uplink: UplinkConfig {
            endpoint: UPLINK_ENDPOINT,
            tls: if UPLINK_INSECURE_TLS {
                TlsMode::InsecureSkipVerify
            } else {
                TlsMode::Verify
            },
        },
        sensor: SensorConfig {
            channel: TURBIDITY_GPIO,
            raw_min: TURBIDITY_RAW_MIN,
            raw_max: TURBIDITY_RAW_MAX,
            resolution_bits: ADC_RESOLUTION_BITS,
            reference_voltage: ADC_REFERENCE_VOLTAGE,
            ..SensorConfig::default()
        },
        schedule: ScheduleConfig::default(),
    }
}

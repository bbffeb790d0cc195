//! One-shot ADC reads for the turbidity probe

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::peripherals::{ADC1, GPIO1};
use log::warn;
use turbidity_core::sensors::AnalogSource;

pub type ProbeAdc = Adc<'static, ADC1<'static>, Blocking>;
pub type ProbePin = AdcPin<GPIO1<'static>, ADC1<'static>>;

/// Probe on GPIO1 sampled by ADC1 at 11 dB attenuation
///
/// A failed conversion keeps the previous raw value.
pub struct EspAdcSource {
    adc: ProbeAdc,
    pin: ProbePin,
    last: u16,
}

impl EspAdcSource {
    pub fn new(adc1: ADC1<'static>, gpio: GPIO1<'static>) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(gpio, Attenuation::_11dB);
        let adc = Adc::new(adc1, config);
        Self { adc, pin, last: 0 }
    }
}

impl AnalogSource for EspAdcSource {
    fn read_raw(&mut self) -> u16 {
        match nb::block!(self.adc.read_oneshot(&mut self.pin)) {
            Ok(raw) => {
                self.last = raw;
                raw
            }
            Err(e) => {
                warn!("adc: conversion failed ({:?}), keeping {}", e, self.last);
                self.last
            }
        }
    }
}

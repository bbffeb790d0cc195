#![no_std]

extern crate alloc;

pub mod adc;
pub mod http;
pub mod network;
pub mod settings;
pub mod wifi_driver;

//! Hardware-independent core library for the turbidity monitor
//!
//! This crate contains all platform-agnostic logic of the water turbidity
//! monitor: the raw-sample to classification pipeline, the non-blocking
//! periodic timer, WiFi association retry logic, and the JSON uplink.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both
//! embedded targets (ESP32-S3) and desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod app_state;
pub mod config;
pub mod metrics;
pub mod monitor;
pub mod remap;
pub mod sensors;
pub mod timer;
pub mod uplink;
pub mod wifi;

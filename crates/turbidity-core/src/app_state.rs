//! Application-wide state and error types for the turbidity monitor

use core::fmt::Write;

use log::{info, warn};
use thiserror_no_std::Error;

use crate::config::ConfigError;
use crate::uplink::{TransportError, UplinkError};
use crate::wifi::WifiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    WifiConnecting,
    WifiConnected,
    Monitoring,
    Error,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration invalid: {0}")]
    Config(heapless::String<64>),
    #[error("WiFi connection failed: {0}")]
    Wifi(heapless::String<64>),
    #[error("Uplink failed: {0}")]
    Uplink(heapless::String<64>),
    #[error("Unknown error")]
    Unknown,
}

/// Render `value` into a bounded string, truncating when it does not fit
fn bounded<const N: usize>(value: impl core::fmt::Display) -> heapless::String<N> {
    let mut out = heapless::String::new();
    let _ = write!(out, "{}", value);
    out
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        Self::Config(bounded(err))
    }
}

impl From<WifiError> for AppError {
    fn from(err: WifiError) -> Self {
        Self::Wifi(bounded(err))
    }
}

impl<E: TransportError> From<UplinkError<E>> for AppError {
    fn from(err: UplinkError<E>) -> Self {
        Self::Uplink(bounded(format_args!("{} (code {})", err, err.code())))
    }
}

/// Main application state container
///
/// Tracks the run state and delivery counters shared by the firmware and
/// simulator main loops.
#[derive(Debug)]
pub struct AppState {
    pub run_state: AppRunState,
    pub wifi_connected: bool,
    pub reports_sent: u32,
    pub reports_failed: u32,
    pub last_response_code: Option<i32>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub const fn new() -> Self {
        Self {
            run_state: AppRunState::Uninitialized,
            wifi_connected: false,
            reports_sent: 0,
            reports_failed: 0,
            last_response_code: None,
        }
    }

    pub fn transition(&mut self, next: AppRunState) {
        if self.run_state != next {
            info!("app: {:?} -> {:?}", self.run_state, next);
            self.run_state = next;
        }
    }

    pub fn set_wifi_connected(&mut self, connected: bool) {
        self.wifi_connected = connected;
        self.transition(if connected {
            AppRunState::WifiConnected
        } else {
            AppRunState::Error
        });
    }

    /// Record the integer response code of one report attempt.
    ///
    /// 2xx codes count as delivered; everything else (including the `-1`
    /// no-connectivity sentinel) counts as failed.
    pub fn record_report(&mut self, code: i32) {
        self.last_response_code = Some(code);
        if (200..300).contains(&code) {
            self.reports_sent += 1;
        } else {
            self.reports_failed += 1;
            warn!("app: report failed with code {}", code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::CalibrationError;

    #[derive(Debug)]
    struct Code(i32);

    impl TransportError for Code {
        fn code(&self) -> i32 {
            self.0
        }
    }

    #[test]
    fn test_new_state_is_uninitialized() {
        let state = AppState::new();
        assert_eq!(state.run_state, AppRunState::Uninitialized);
        assert!(!state.wifi_connected);
        assert_eq!(state.last_response_code, None);
    }

    #[test]
    fn test_wifi_result_drives_run_state() {
        let mut state = AppState::new();
        state.transition(AppRunState::WifiConnecting);
        state.set_wifi_connected(true);
        assert_eq!(state.run_state, AppRunState::WifiConnected);
        state.set_wifi_connected(false);
        assert_eq!(state.run_state, AppRunState::Error);
    }

    #[test]
    fn test_record_report_counts() {
        let mut state = AppState::new();
        state.record_report(200);
        state.record_report(204);
        state.record_report(500);
        state.record_report(-1);
        assert_eq!(state.reports_sent, 2);
        assert_eq!(state.reports_failed, 2);
        assert_eq!(state.last_response_code, Some(-1));
    }

    #[test]
    fn test_error_conversions_keep_message() {
        let err: AppError = WifiError::Timeout { attempts: 5 }.into();
        assert!(
            matches!(&err, AppError::Wifi(msg) if msg.as_str() == "Not associated after 5 attempts")
        );

        let err: AppError = ConfigError::from(CalibrationError::InvalidReferenceVoltage).into();
        assert!(matches!(err, AppError::Config(_)));

        let err: AppError = UplinkError::<Code>::NoConnectivity.into();
        assert!(matches!(
            &err,
            AppError::Uplink(msg) if msg.as_str() == "No network connectivity (code -1)"
        ));
    }
}

//! WiFi station association with a bounded, blocking retry loop

use core::future::Future;

use embassy_futures::select::{Either, select};
use embedded_hal::delay::DelayNs;
use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::config::{DEFAULT_WIFI_ATTEMPTS, DEFAULT_WIFI_RETRY_DELAY_MS, InternetConfig};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    #[error("SSID is empty")]
    EmptySsid,
    #[error("Radio driver rejected the request")]
    Driver,
    #[error("Not associated after {attempts} attempts")]
    Timeout { attempts: u8 },
    #[error("Associated but no IP address was assigned in time")]
    NoAddress,
}

/// Radio-side operations the manager needs.
///
/// Implemented by the firmware on top of the esp-radio controller and by
/// the simulator's fake radio.
pub trait WifiDriver {
    /// Drop any current association. Must be harmless when not associated.
    fn disconnect(&mut self);

    /// Configure credentials and start associating. Does not wait.
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), WifiError>;

    fn is_connected(&mut self) -> bool;
}

/// Link state query used as the precondition for network egress
pub trait Connectivity {
    fn is_connected(&mut self) -> bool;
}

/// Owns the radio handle and the retry policy
pub struct WifiManager<W, D> {
    driver: W,
    delay: D,
    max_attempts: u8,
    retry_delay_ms: u32,
}

impl<W: WifiDriver, D: DelayNs> WifiManager<W, D> {
    pub fn new(driver: W, delay: D) -> Self {
        Self {
            driver,
            delay,
            max_attempts: DEFAULT_WIFI_ATTEMPTS,
            retry_delay_ms: DEFAULT_WIFI_RETRY_DELAY_MS,
        }
    }

    pub fn with_retry(mut self, max_attempts: u8, retry_delay_ms: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    pub fn from_config(driver: W, delay: D, config: &InternetConfig<'_>) -> Self {
        Self::new(driver, delay).with_retry(config.max_attempts, config.retry_delay_ms)
    }

    /// Disconnect, then associate with `ssid`, checking the link up to
    /// `max_attempts` times with `retry_delay_ms` between checks.
    ///
    /// Blocks the calling thread for at most
    /// `max_attempts * retry_delay_ms` and cannot be cancelled.
    pub fn connect(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        if ssid.is_empty() {
            error!("wifi: SSID is empty, not connecting");
            return Err(WifiError::EmptySsid);
        }

        self.driver.disconnect();
        info!("wifi: connecting to '{}'", ssid);
        self.driver.begin(ssid, password).inspect_err(|e| {
            error!("wifi: begin failed: {}", e);
        })?;

        for attempt in 1..=self.max_attempts {
            self.delay.delay_ms(self.retry_delay_ms);
            if self.driver.is_connected() {
                info!("wifi: connected after {} attempt(s)", attempt);
                return Ok(());
            }
            warn!("wifi: not connected yet ({}/{})", attempt, self.max_attempts);
        }

        error!("wifi: giving up after {} attempts", self.max_attempts);
        Err(WifiError::Timeout {
            attempts: self.max_attempts,
        })
    }

    /// Make sure the link can carry traffic before a report goes out.
    ///
    /// Reassociates (blocking, see [`WifiManager::connect`]) when the radio
    /// dropped the link, then waits for `address_ready` to complete, giving
    /// up when `timeout` completes first. The address wait always runs, so
    /// a network stack that lost its lease during the outage gets a chance
    /// to renew it.
    pub async fn ensure_link<A, T>(
        &mut self,
        ssid: &str,
        password: &str,
        address_ready: A,
        timeout: T,
    ) -> Result<(), WifiError>
    where
        A: Future<Output = ()>,
        T: Future<Output = ()>,
    {
        if !self.driver.is_connected() {
            warn!("wifi: link down, reconnecting");
            self.connect(ssid, password)?;
        }

        match select(address_ready, timeout).await {
            Either::First(()) => Ok(()),
            Either::Second(()) => {
                warn!("wifi: associated but no address yet");
                Err(WifiError::NoAddress)
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.driver.disconnect();
    }

    pub fn driver_mut(&mut self) -> &mut W {
        &mut self.driver
    }
}

impl<W: WifiDriver, D: DelayNs> Connectivity for WifiManager<W, D> {
    fn is_connected(&mut self) -> bool {
        self.driver.is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::future::{pending, ready};
    use embassy_futures::block_on;

    /// Associates after a fixed number of link checks
    struct FakeRadio {
        checks_until_up: u32,
        checks: u32,
        disconnects: u32,
        begun: bool,
        reject_begin: bool,
    }

    impl FakeRadio {
        fn new(checks_until_up: u32) -> Self {
            Self {
                checks_until_up,
                checks: 0,
                disconnects: 0,
                begun: false,
                reject_begin: false,
            }
        }
    }

    impl WifiDriver for FakeRadio {
        fn disconnect(&mut self) {
            self.disconnects += 1;
            self.begun = false;
        }

        fn begin(&mut self, _ssid: &str, _password: &str) -> Result<(), WifiError> {
            if self.reject_begin {
                return Err(WifiError::Driver);
            }
            self.begun = true;
            Ok(())
        }

        fn is_connected(&mut self) -> bool {
            self.checks += 1;
            self.begun && self.checks >= self.checks_until_up
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        total_ms: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ms += u64::from(ns) / 1_000_000;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += u64::from(ms);
        }
    }

    #[test]
    fn test_connect_succeeds_within_bound() {
        let mut wifi = WifiManager::new(FakeRadio::new(3), RecordingDelay::default());
        assert_eq!(wifi.connect("lab", "secret"), Ok(()));
        assert_eq!(wifi.driver.disconnects, 1);
        assert_eq!(wifi.driver.checks, 3);
        assert_eq!(wifi.delay.total_ms, 1500);
    }

    #[test]
    fn test_connect_gives_up_after_five_attempts() {
        let mut wifi = WifiManager::new(FakeRadio::new(100), RecordingDelay::default());
        assert_eq!(
            wifi.connect("lab", "secret"),
            Err(WifiError::Timeout { attempts: 5 })
        );
        assert_eq!(wifi.driver.checks, 5);
        assert_eq!(wifi.delay.total_ms, 2500);
    }

    #[test]
    fn test_connect_rejects_empty_ssid() {
        let mut wifi = WifiManager::new(FakeRadio::new(1), RecordingDelay::default());
        assert_eq!(wifi.connect("", "secret"), Err(WifiError::EmptySsid));
        assert_eq!(wifi.driver.disconnects, 0);
    }

    #[test]
    fn test_driver_error_propagates() {
        let mut radio = FakeRadio::new(1);
        radio.reject_begin = true;
        let mut wifi = WifiManager::new(radio, RecordingDelay::default());
        assert_eq!(wifi.connect("lab", "secret"), Err(WifiError::Driver));
        assert_eq!(wifi.delay.total_ms, 0);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = InternetConfig {
            max_attempts: 2,
            retry_delay_ms: 100,
            ..InternetConfig::default()
        };
        let mut wifi =
            WifiManager::from_config(FakeRadio::new(100), RecordingDelay::default(), &config);
        assert_eq!(
            wifi.connect("lab", "secret"),
            Err(WifiError::Timeout { attempts: 2 })
        );
        assert_eq!(wifi.delay.total_ms, 200);
    }

    #[test]
    fn test_ensure_link_reconnects_then_waits_for_address() {
        let mut wifi = WifiManager::new(FakeRadio::new(2), RecordingDelay::default());
        let result = block_on(wifi.ensure_link("lab", "secret", ready(()), pending()));
        assert_eq!(result, Ok(()));
        assert_eq!(wifi.driver.disconnects, 1);
        assert!(wifi.driver.begun);
    }

    #[test]
    fn test_ensure_link_skips_connect_when_associated() {
        let mut wifi = WifiManager::new(FakeRadio::new(1), RecordingDelay::default());
        wifi.connect("lab", "secret").unwrap();
        let result = block_on(wifi.ensure_link("lab", "secret", ready(()), pending()));
        assert_eq!(result, Ok(()));
        assert_eq!(wifi.driver.disconnects, 1);
    }

    #[test]
    fn test_ensure_link_times_out_without_address() {
        let mut wifi = WifiManager::new(FakeRadio::new(1), RecordingDelay::default());
        let result = block_on(wifi.ensure_link("lab", "secret", pending(), ready(())));
        assert_eq!(result, Err(WifiError::NoAddress));
    }

    #[test]
    fn test_ensure_link_reports_failed_reconnect() {
        let mut wifi = WifiManager::new(FakeRadio::new(100), RecordingDelay::default());
        let result = block_on(wifi.ensure_link("lab", "secret", ready(()), pending()));
        assert_eq!(result, Err(WifiError::Timeout { attempts: 5 }));
    }

    #[test]
    fn test_connectivity_reflects_driver() {
        let mut wifi = WifiManager::new(FakeRadio::new(1), RecordingDelay::default());
        assert!(!Connectivity::is_connected(&mut wifi));
        wifi.connect("lab", "secret").unwrap();
        assert!(Connectivity::is_connected(&mut wifi));
    }
}

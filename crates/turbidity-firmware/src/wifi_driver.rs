//! esp-radio station controller behind the core `WifiDriver` trait

use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};
use log::{debug, error};
use turbidity_core::wifi::{WifiDriver, WifiError};

pub struct EspWifiDriver<'d> {
    controller: WifiController<'d>,
    started: bool,
}

impl<'d> EspWifiDriver<'d> {
    pub fn new(controller: WifiController<'d>) -> Self {
        Self {
            controller,
            started: false,
        }
    }
}

impl WifiDriver for EspWifiDriver<'_> {
    fn disconnect(&mut self) {
        if !self.started {
            return;
        }
        if let Err(e) = self.controller.disconnect() {
            debug!("wifi: disconnect: {:?}", e);
        }
    }

    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        let client = ClientConfig::default()
            .with_ssid(ssid.into())
            .with_password(password.into());

        self.controller
            .set_config(&ModeConfig::Client(client))
            .map_err(|e| {
                error!("wifi: set_config failed: {:?}", e);
                WifiError::Driver
            })?;

        if !self.started {
            self.controller.start().map_err(|e| {
                error!("wifi: start failed: {:?}", e);
                WifiError::Driver
            })?;
            self.started = true;
        }

        self.controller.connect().map_err(|e| {
            error!("wifi: connect failed: {:?}", e);
            WifiError::Driver
        })
    }

    fn is_connected(&mut self) -> bool {
        self.controller.is_connected().unwrap_or(false)
    }
}

use embassy_net::Stack;
use embedded_hal::delay::DelayNs;
use turbidity_core::wifi::{Connectivity, WifiDriver, WifiManager};

/// Link is up once the station is associated and DHCP handed out an address
pub struct NetworkLink<'a, W, D> {
    wifi: &'a mut WifiManager<W, D>,
    stack: Stack<'a>,
}

impl<'a, W, D> NetworkLink<'a, W, D> {
    pub fn new(wifi: &'a mut WifiManager<W, D>, stack: Stack<'a>) -> Self {
        Self { wifi, stack }
    }
}

impl<W: WifiDriver, D: DelayNs> Connectivity for NetworkLink<'_, W, D> {
    fn is_connected(&mut self) -> bool {
        self.wifi.is_connected() && self.stack.is_config_up()
    }
}

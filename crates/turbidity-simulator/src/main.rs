//! Desktop simulator for the turbidity monitor.
//!
//! Runs the same monitor, WiFi manager and uplink as the firmware against a
//! synthetic probe, a fake radio and a transport that logs each JSON body
//! instead of sending it.
//!
//! ```text
//! turbidity-simulator [CONFIG.json] [MAX_REPORTS]
//! ```
//!
//! Set `RUST_LOG=debug` to see every sample.

use std::f32::consts::TAU;
use std::time::Duration as StdDuration;

use embassy_futures::block_on;
use embassy_time::Instant;
use embedded_hal::delay::DelayNs;
use log::{error, info, warn};
use thiserror_no_std::Error;

use turbidity_core::app_state::{AppError, AppRunState, AppState};
use turbidity_core::config::{Config, InternetConfig, UplinkConfig};
use turbidity_core::monitor::Monitor;
use turbidity_core::sensors::{AnalogSource, TurbiditySensor};
use turbidity_core::uplink::{
    HttpTransport, PostRequest, TransportError, Uplink, format_uptime, response_code,
};
use turbidity_core::wifi::{Connectivity, WifiDriver, WifiError, WifiManager};

/// Main loop poll period, same as the firmware
const POLL_PERIOD: StdDuration = StdDuration::from_millis(50);

/// Period of the synthetic turbidity swing
const PROBE_PERIOD_SECS: f32 = 90.0;

/// Every n-th report finds the link down
const LINK_DROP_EVERY: u32 = 7;

const DEFAULT_SSID: &str = "simulated-ap";
const DEFAULT_ENDPOINT: &str = "http://localhost:8080/api/turbidity";

// ---------------------------------------------------------------------------
// Simulated hardware
// ---------------------------------------------------------------------------

/// Raw readings sweeping slowly across `[low, high]` and back
struct SineProbe {
    low: f32,
    high: f32,
    started: std::time::Instant,
}

impl SineProbe {
    fn new(low: u16, high: u16) -> Self {
        Self {
            low: f32::from(low),
            high: f32::from(high),
            started: std::time::Instant::now(),
        }
    }
}

impl AnalogSource for SineProbe {
    fn read_raw(&mut self) -> u16 {
        let t = self.started.elapsed().as_secs_f32();
        let phase = (t / PROBE_PERIOD_SECS * TAU).sin() * 0.5 + 0.5;
        (self.low + (self.high - self.low) * phase) as u16
    }
}

/// Associates after a couple of link checks; can be knocked offline
#[derive(Default)]
struct SimRadio {
    associated: bool,
    pending_checks: u8,
}

impl SimRadio {
    fn drop_link(&mut self) {
        self.associated = false;
    }
}

impl WifiDriver for SimRadio {
    fn disconnect(&mut self) {
        self.associated = false;
        self.pending_checks = 0;
    }

    fn begin(&mut self, ssid: &str, _password: &str) -> Result<(), WifiError> {
        info!("radio: associating with '{}'", ssid);
        self.pending_checks = 2;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        if !self.associated && self.pending_checks > 0 {
            self.pending_checks -= 1;
            self.associated = self.pending_checks == 0;
        }
        self.associated
    }
}

struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(StdDuration::from_nanos(u64::from(ns)));
    }
}

#[derive(Error, Debug, PartialEq)]
enum SimError {
    #[error("Body is not valid UTF-8")]
    InvalidBody,
}

impl TransportError for SimError {
    fn code(&self) -> i32 {
        match self {
            Self::InvalidBody => -9,
        }
    }
}

/// Logs the request and answers `200 OK`
struct LoggingTransport;

impl HttpTransport for LoggingTransport {
    type Error = SimError;

    async fn post(&mut self, request: &PostRequest<'_>) -> Result<u16, SimError> {
        let body = core::str::from_utf8(request.body).map_err(|_| SimError::InvalidBody)?;
        info!(
            "POST {} [{}] tls={:?} {}",
            request.url, request.content_type, request.tls, body
        );
        Ok(200)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn default_config() -> Config<'static> {
    Config {
        internet: InternetConfig {
            ssid: DEFAULT_SSID,
            password: "",
            ..InternetConfig::default()
        },
        uplink: UplinkConfig {
            endpoint: DEFAULT_ENDPOINT,
            ..UplinkConfig::default()
        },
        ..Config::default()
    }
}

fn load_config(text: Option<&str>) -> Result<Config<'_>, serde_json::Error> {
    match text {
        Some(text) => serde_json::from_str(text),
        None => Ok(default_config()),
    }
}

fn main() {
    env_logger::init();
    info!("Starting turbidity simulator");

    let mut args = std::env::args().skip(1);
    let config_text = match args.next() {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(text) => {
                info!("Loaded config from {}", path);
                Some(text)
            }
            Err(e) => {
                warn!("Could not read {} ({}), using defaults", path, e);
                None
            }
        },
        None => None,
    };
    let max_reports: Option<u32> = args.next().and_then(|n| n.parse().ok());

    let mut app = AppState::new();

    let config = match load_config(config_text.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid config file: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        error!("{}", AppError::from(e));
        app.transition(AppRunState::Error);
        std::process::exit(1);
    }

    let probe = SineProbe::new(config.sensor.raw_min, config.sensor.raw_max);
    let sensor = match TurbiditySensor::from_config(probe, &config.sensor) {
        Ok(sensor) => sensor,
        Err(e) => {
            error!("sensor: {}", e);
            std::process::exit(1);
        }
    };

    let mut wifi = WifiManager::from_config(SimRadio::default(), StdDelay, &config.internet);
    app.transition(AppRunState::WifiConnecting);
    let connected = wifi
        .connect(config.internet.ssid, config.internet.password)
        .inspect_err(|e| warn!("{}", AppError::from(*e)))
        .is_ok();
    app.set_wifi_connected(connected);

    let uplink = Uplink::new(&config.uplink);
    let mut transport = LoggingTransport;
    let mut monitor = Monitor::new(sensor, &config.schedule);
    monitor.start(Instant::now());
    app.transition(AppRunState::Monitoring);

    let mut reports: u32 = 0;
    loop {
        let now = Instant::now();
        let outcome = monitor.tick(now);

        if let Some(snapshot) = outcome.sampled {
            let reading = monitor.reading();
            log::debug!(
                "sample raw={} voltage={:.3}V level={} {:.1}% ntu={:.1} ({})",
                snapshot.raw,
                snapshot.voltage,
                reading.level,
                reading.percentage,
                reading.ntu,
                reading.condition.label()
            );
        }

        if outcome.report_due {
            reports += 1;
            if reports % LINK_DROP_EVERY == 0 {
                warn!("radio: simulating link loss");
                wifi.driver_mut().drop_link();
            }

            let payload = monitor.payload(format_uptime(monitor.uptime(now)));
            let result = block_on(uplink.send(&mut wifi, &mut transport, &payload));
            let code = response_code(&result);
            info!("uplink: response code {}", code);
            app.record_report(code);

            if !wifi.is_connected() {
                app.transition(AppRunState::WifiConnecting);
                // The simulated stack has its address as soon as it associates
                let reconnected = block_on(wifi.ensure_link(
                    config.internet.ssid,
                    config.internet.password,
                    core::future::ready(()),
                    core::future::pending(),
                ))
                .inspect_err(|e| warn!("{}", AppError::from(*e)))
                .is_ok();
                app.set_wifi_connected(reconnected);
                app.transition(AppRunState::Monitoring);
            }

            if max_reports.is_some_and(|max| reports >= max) {
                break;
            }
        }

        std::thread::sleep(POLL_PERIOD);
    }

    info!(
        "Simulator exiting: {} sent, {} failed",
        app.reports_sent, app.reports_failed
    );
}

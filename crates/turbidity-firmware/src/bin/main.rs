#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_time::{Duration, Instant, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_radio::wifi::WifiDevice;
use log::{error, info, warn};
use static_cell::StaticCell;

use turbidity_core::app_state::{AppError, AppRunState, AppState};
use turbidity_core::monitor::Monitor;
use turbidity_core::sensors::TurbiditySensor;
use turbidity_core::uplink::{Uplink, format_uptime, response_code};
use turbidity_core::wifi::{Connectivity, WifiManager};
use turbidity_firmware::adc::EspAdcSource;
use turbidity_firmware::http::ReqwlessTransport;
use turbidity_firmware::network::NetworkLink;
use turbidity_firmware::settings;
use turbidity_firmware::wifi_driver::EspWifiDriver;

/// How often the main loop polls the monitor
const POLL_PERIOD: Duration = Duration::from_millis(50);

/// How long to wait for a DHCP lease after (re)association
const DHCP_TIMEOUT: Duration = Duration::from_secs(10);

static RADIO: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let device = settings::device_config();
    let mut app = AppState::new();
    if let Err(e) = device.validate() {
        let e = AppError::from(e);
        error!("{}", e);
        app.transition(AppRunState::Error);
        halt().await;
    }

    let sensor = match TurbiditySensor::from_config(
        EspAdcSource::new(peripherals.ADC1, peripherals.GPIO1),
        &device.sensor,
    ) {
        Ok(sensor) => sensor,
        Err(e) => {
            error!("sensor: {}", e);
            app.transition(AppRunState::Error);
            halt().await
        }
    };

    let radio = RADIO.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));
    let (controller, interfaces) = esp_radio::wifi::new(radio, peripherals.WIFI, Default::default())
        .expect("Failed to initialize Wi-Fi controller");

    let rng = Rng::new();
    let seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STACK_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.must_spawn(net_task(runner));

    let mut wifi = WifiManager::from_config(
        EspWifiDriver::new(controller),
        Delay::new(),
        &device.internet,
    );

    app.transition(AppRunState::WifiConnecting);
    let connected = wifi
        .ensure_link(
            device.internet.ssid,
            device.internet.password,
            stack.wait_config_up(),
            Timer::after(DHCP_TIMEOUT),
        )
        .await
        .inspect_err(|e| warn!("{}", AppError::from(*e)))
        .is_ok();
    app.set_wifi_connected(connected);

    let uplink = Uplink::new(&device.uplink);
    let mut transport = ReqwlessTransport::new(stack, seed);
    let mut monitor = Monitor::new(sensor, &device.schedule);

    let first = monitor.start(Instant::now());
    info!("sensor: initial raw={} voltage={}", first.raw, first.voltage);
    app.transition(AppRunState::Monitoring);

    loop {
        let now = Instant::now();
        let outcome = monitor.tick(now);

        if let Some(snapshot) = outcome.sampled {
            let sensor = monitor.sensor();
            info!(
                "sensor: raw={} voltage={:.2}V level={} {:.0}% ({})",
                snapshot.raw,
                snapshot.voltage,
                sensor.level(),
                sensor.percentage(),
                sensor.condition_label()
            );
        }

        if outcome.report_due {
            if !NetworkLink::new(&mut wifi, stack).is_connected() {
                app.transition(AppRunState::WifiConnecting);
                let reconnected = wifi
                    .ensure_link(
                        device.internet.ssid,
                        device.internet.password,
                        stack.wait_config_up(),
                        Timer::after(DHCP_TIMEOUT),
                    )
                    .await
                    .inspect_err(|e| warn!("{}", AppError::from(*e)))
                    .is_ok();
                app.set_wifi_connected(reconnected);
                app.transition(AppRunState::Monitoring);
            }

            let payload = monitor.payload(format_uptime(monitor.uptime(now)));
            let mut link = NetworkLink::new(&mut wifi, stack);
            let result = uplink.send(&mut link, &mut transport, &payload).await;
            let code = response_code(&result);
            info!("uplink: response code {}", code);
            app.record_report(code);

            if let Err(e) = result {
                warn!("{}", AppError::from(e));
            }
        }

        Timer::after(POLL_PERIOD).await;
    }
}

/// Park forever after an unrecoverable startup error
async fn halt() -> ! {
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

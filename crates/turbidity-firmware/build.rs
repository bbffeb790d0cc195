use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Clear-water and turbid calibration points of the reference probe
/// rescaled from a 10-bit/5 V reading to the ESP32-S3 12-bit/3.3 V ADC.
const DEFAULT_RAW_MIN: u16 = 2711;
const DEFAULT_RAW_MAX: u16 = 3942;

fn main() {
    let insecure_tls = load_env_config();
    write_settings(insecure_tls);

    linker_be_nice();
    // make sure linkall.x is the last linker script (otherwise might cause problems with flip-link)
    println!("cargo:rustc-link-arg=-Tlinkall.x");
}

/// Load device secrets from `.env` (crate dir first, then workspace root).
/// Variables already set in the environment take priority.
fn load_env_config() -> bool {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    let candidates = [manifest_dir.join(".env"), manifest_dir.join("../../.env")];

    for key in [
        "WIFI_SSID",
        "WIFI_PASSWORD",
        "UPLINK_ENDPOINT",
        "UPLINK_INSECURE_TLS",
        "TURBIDITY_RAW_MIN",
        "TURBIDITY_RAW_MAX",
    ] {
        println!("cargo:rerun-if-env-changed={key}");
    }

    for path in &candidates {
        println!("cargo:rerun-if-changed={}", path.display());
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(()) => println!("cargo:warning=Loaded {}", path.display()),
                Err(e) => println!("cargo:warning=Failed to load {}: {}", path.display(), e),
            }
            break;
        }
    }

    let wifi_ssid = var_trimmed("WIFI_SSID");
    let wifi_password = var_trimmed("WIFI_PASSWORD");
    let endpoint = var_trimmed("UPLINK_ENDPOINT");
    let insecure = matches!(
        var_trimmed("UPLINK_INSECURE_TLS").to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    );

    println!("cargo:rustc-env=WIFI_SSID={wifi_ssid}");
    println!("cargo:rustc-env=WIFI_PASSWORD={wifi_password}");
    println!("cargo:rustc-env=UPLINK_ENDPOINT={endpoint}");

    if wifi_ssid.is_empty() {
        println!("cargo:warning=WIFI_SSID is empty - WiFi will not be configured");
    } else {
        println!("cargo:warning=WIFI_SSID configured: {wifi_ssid}");
    }
    if endpoint.is_empty() {
        println!("cargo:warning=UPLINK_ENDPOINT is empty - reports will fail to send");
    }
    if insecure {
        println!(
            "cargo:warning=UPLINK_INSECURE_TLS set - server certificates will NOT be verified"
        );
    }

    insecure
}

/// Emit build-time settings; invalid calibration fails the build.
fn write_settings(insecure_tls: bool) {
    let raw_min = parse_u16("TURBIDITY_RAW_MIN", DEFAULT_RAW_MIN);
    let raw_max = parse_u16("TURBIDITY_RAW_MAX", DEFAULT_RAW_MAX);
    if raw_min > raw_max || raw_max > 4095 {
        panic!(
            "TURBIDITY_RAW_MIN ({raw_min}) must not exceed TURBIDITY_RAW_MAX ({raw_max}) <= 4095"
        );
    }

    let mut settings = String::new();
    let _ = writeln!(settings, "pub const UPLINK_INSECURE_TLS: bool = {insecure_tls};");
    let _ = writeln!(settings, "pub const TURBIDITY_RAW_MIN: u16 = {raw_min};");
    let _ = writeln!(settings, "pub const TURBIDITY_RAW_MAX: u16 = {raw_max};");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(Path::new(&out_dir).join("settings.rs"), settings)
        .expect("failed to write generated settings");
}

fn var_trimmed(key: &str) -> String {
    env::var(key).unwrap_or_default().trim().to_string()
}

fn parse_u16(key: &str, default: u16) -> u16 {
    let value = var_trimmed(key);
    if value.is_empty() {
        return default;
    }
    value
        .parse()
        .unwrap_or_else(|e| panic!("{key}={value:?} is not a valid raw ADC value: {e}"))
}

fn linker_be_nice() {
    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        let kind = &args[1];
        let what = &args[2];

        match kind.as_str() {
            "undefined-symbol" => match what.as_str() {
                "_stack_start" => {
                    eprintln!();
                    eprintln!("Is the linker script `linkall.x` missing?");
                    eprintln!();
                }
                "esp_rtos_initialized" | "esp_rtos_yield_task" | "esp_rtos_task_create" => {
                    eprintln!();
                    eprintln!(
                        "`esp-radio` has no scheduler enabled. \
                         Make sure `esp-rtos` is started before initializing the radio."
                    );
                    eprintln!();
                }
                _ => (),
            },
            _ => {
                std::process::exit(1);
            }
        }

        std::process::exit(0);
    }

    if let Ok(exe) = env::current_exe() {
        println!(
            "cargo:rustc-link-arg=--error-handling-script={}",
            exe.display()
        );
    }
}

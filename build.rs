//! Build script
//!
//! - Bakes WiFi and backend settings from the environment into the firmware
//!   (read back with `option_env!` by `Config::from_build_env` and
//!   `WifiConfig::from_build_env`)
//! - For the RP2350 target, puts `memory.x` on the linker search path and
//!   passes the cortex-m-rt and defmt linker scripts

use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Settings read at compile time
const BAKED_VARS: &[&str] = &[
    "WIFI_SSID",
    "WIFI_PASSWORD",
    "WIFI_DHCP",
    "WIFI_IP",
    "WIFI_GATEWAY",
    "PARKING_BACKEND_URL",
    "PARKING_AI_SERVICE_URL",
    "PARKING_CAMERA_ID",
    "PARKING_CAMERA_ONLY",
];

fn main() {
    for var in BAKED_VARS {
        println!("cargo:rerun-if-env-changed={}", var);
        match env::var(var) {
            Ok(_) if var.contains("PASSWORD") => {
                println!("cargo:warning=Using {} from environment (hidden)", var)
            }
            Ok(value) => println!("cargo:warning=Using {} from environment: {}", var, value),
            Err(_) => {}
        }
    }

    check_len("WIFI_SSID", 32);
    check_len("WIFI_PASSWORD", 63);

    let target = env::var("TARGET").unwrap_or_default();
    if !target.starts_with("thumbv8m") {
        return;
    }

    let out = PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(include_bytes!("memory.x"))
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed=memory.x");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
}

/// Fail the build instead of baking a value the firmware would drop
fn check_len(var: &str, max: usize) {
    if let Ok(value) = env::var(var) {
        if value.len() > max {
            panic!("{} is {} bytes, at most {} fit", var, value.len(), max);
        }
    }
}

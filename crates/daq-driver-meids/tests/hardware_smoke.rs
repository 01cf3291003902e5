//! ME-iDS hardware smoke tests.
//!
//! Runs against the installed driver through the native transport.
//!
//! # Environment Variables
//!
//! Required:
//! - `MEIDS_HARDWARE_TEST=1` - Enable the test suite
//!
//! ```bash
//! export MEIDS_HARDWARE_TEST=1
//! cargo test --features hardware -p daq-driver-meids --test hardware_smoke
//! ```
//!
//! # Test Coverage
//!
//! | Test | Description |
//! |------|-------------|
//! | `device_discovery_test` | Open, count devices, read names and versions |
//! | `analog_input_single_read_test` | Read one sample from the first analog input |
//! | `lock_probe_test` | Probing the driver lock leaves it acquirable |

#![cfg(feature = "hardware")]

use std::env;
use std::sync::Arc;

use daq_driver_meids::{
    CloseFlags, LockMode, ModuleType, NativeDriver, Session, SubdeviceSubtype, SubdeviceType,
};

// =============================================================================
// Test Configuration
// =============================================================================

fn hardware_test_enabled() -> bool {
    env::var("MEIDS_HARDWARE_TEST")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

macro_rules! skip_if_disabled {
    () => {
        if !hardware_test_enabled() {
            println!("ME-iDS hardware test skipped (set MEIDS_HARDWARE_TEST=1 to enable)");
            return;
        }
    };
}

fn open() -> Session {
    Session::open(Arc::new(NativeDriver::new()))
        .expect("Failed to open ME-iDS driver - check that the driver package is installed")
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn device_discovery_test() {
    skip_if_disabled!();
    let session = open();

    let versions = session.versions().unwrap();
    println!("Library 0x{:08X}, main driver 0x{:08X}", versions.library, versions.main_driver);

    let devices = session.number_devices().unwrap();
    assert!(devices > 0, "no ME-iDS devices registered");
    for device in 0..devices {
        println!(
            "  [{}] {} ({})",
            device,
            session.device_name(device).unwrap(),
            session.device_driver_name(device).unwrap()
        );
    }

    session.close(CloseFlags::empty()).unwrap();
}

#[test]
fn analog_input_single_read_test() {
    skip_if_disabled!();
    let session = open();

    let Ok(ai) = session.find_subdevice(0, 0, SubdeviceType::AnalogInput, SubdeviceSubtype::Any)
    else {
        println!("device 0 has no analog input, skipping");
        return;
    };
    let range = session.range_info(0, ai, 0).unwrap();
    let raw = session.read_single(0, ai, 0).unwrap();
    let volts = daq_driver_meids::digital_to_physical(
        range.min,
        range.max,
        range.max_data,
        raw,
        ModuleType::None,
        0.0,
    )
    .unwrap();
    println!("  AI0: {raw} -> {volts:+.6} V");
    assert!(volts >= range.min && volts <= range.max);

    session.close(CloseFlags::empty()).unwrap();
}

#[test]
fn lock_probe_test() {
    skip_if_disabled!();
    let session = open();

    assert!(session.probe_driver_lock().unwrap());
    session.lock_driver(LockMode::Set).unwrap();
    session.lock_driver(LockMode::Release).unwrap();

    session.close(CloseFlags::empty()).unwrap();
}

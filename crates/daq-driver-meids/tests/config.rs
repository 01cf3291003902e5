//! Configuration loading and backend selection.
//!
//! # Test Coverage
//!
//! | Test | Description |
//! |------|-------------|
//! | `test_load_from_file` | TOML file replaces the default board |
//! | `test_env_override` | `MEIDS_` variables override top-level keys |
//! | `test_parse_errors` | Bad TOML and inconsistent systems are rejected |
//! | `test_session_from_config` | Simulated backend built from a `DriverConfig` |
//! | `test_native_backend_needs_feature` | Native backend without `hardware` |

use std::io::Write;

use daq_driver_meids::{
    load_system_config, Backend, ConfigError, DriverConfig, Session, SubdeviceSubtype,
    SubdeviceType, SystemConfig, Timer, Unit,
};
use tempfile::NamedTempFile;

const TWO_BOARDS: &str = r#"
main_driver_version = 0x00020000

[[devices]]
name = "ME-4660"
description = "Analog input board"
driver_name = "me4600"
driver_version = 0x00020000
info = { vendor_id = 0x1402, device_id = 0x4660, serial_number = 7, bus_type = "pci", bus_number = 2, device_number = 0, function_number = 0, plugged = "in" }

[[devices.subdevices]]
type = "analog_input"
subtype = "streaming"
channels = 16
burst_size = 256
ranges = [{ unit = "volt", min = -10.0, max = 10.0, max_data = 65535 }]
timers = [{ timer = "conv_start", base_frequency = 33e6, min_ticks = 66, max_ticks = 4294967295 }]

[[devices]]
name = "ME-1400"
driver_name = "me1400"
info = { vendor_id = 0x1402, device_id = 0x1400, serial_number = 8, bus_type = "usb", bus_number = 1, device_number = 3, function_number = 0, plugged = "out" }

[[devices.subdevices]]
type = "counter"
subtype = "counter8254"
channels = 3
"#;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn test_load_from_file() {
    let file = write_config(TWO_BOARDS);
    let config = load_system_config(file.path()).unwrap();

    assert_eq!(config.main_driver_version, 0x0002_0000);
    assert_eq!(config.devices.len(), 2);
    assert_eq!(config.devices[0].subdevices[0].channels, 16);
    assert_eq!(config.devices[0].subdevices[0].burst_size, 256);
    assert!(config.devices[0].subdevices[0].timer(Timer::ConvStart).is_some());
    assert!(config.devices[0].subdevices[0].timer(Timer::ScanStart).is_none());
    // Defaults for omitted keys
    assert_eq!(config.devices[1].subdevices[0].burst_size, 512);
    assert!(config.devices[1].description.is_empty());
}

#[test]
fn test_env_override() {
    let file = write_config("library_version = 5\n");
    figment::Jail::expect_with(|jail| {
        jail.set_env("MEIDS_UNAVAILABLE", "true");
        let config = load_system_config(file.path()).map_err(|e| e.to_string())?;
        assert!(config.unavailable);
        assert_eq!(config.library_version, 5);
        Ok(())
    });
}

#[test]
fn test_parse_errors() {
    let file = write_config("devices = 3");
    assert!(matches!(
        load_system_config(file.path()),
        Err(ConfigError::Parse(_))
    ));

    let broken = TWO_BOARDS.replace("channels = 16", "channels = 0");
    assert!(matches!(
        SystemConfig::from_toml_str(&broken),
        Err(ConfigError::Invalid(_))
    ));

    let wildcard = TWO_BOARDS.replace("subtype = \"streaming\"", "subtype = \"any\"");
    assert!(matches!(
        SystemConfig::from_toml_str(&wildcard),
        Err(ConfigError::Invalid(_))
    ));
}

// =============================================================================
// Backends
// =============================================================================

#[test]
fn test_session_from_config() {
    let config = DriverConfig {
        backend: Backend::Simulated,
        system: SystemConfig::from_toml_str(TWO_BOARDS).unwrap(),
    };
    let session = Session::from_config(&config).unwrap();
    assert_eq!(session.number_devices().unwrap(), 2);
    assert_eq!(session.device_name(1).unwrap(), "ME-1400");
    assert_eq!(
        session
            .find_subdevice(1, 0, SubdeviceType::Counter, SubdeviceSubtype::Counter8254)
            .unwrap(),
        0
    );
    assert_eq!(session.number_ranges(0, 0, Unit::Volt).unwrap(), 1);
}

#[cfg(not(feature = "hardware"))]
#[test]
fn test_native_backend_needs_feature() {
    let config = DriverConfig {
        backend: Backend::Native,
        ..DriverConfig::default()
    };
    assert!(Session::from_config(&config)
        .unwrap_err()
        .is_invalid_argument());
}

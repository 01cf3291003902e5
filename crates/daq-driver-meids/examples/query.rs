//! Device inventory example.
//!
//! Lists every device, subdevice and range the driver system reports.
//!
//! # Usage
//!
//! ```bash
//! # Simulated board
//! cargo run -p daq-driver-meids --example query
//!
//! # Simulated system described by a TOML file
//! cargo run -p daq-driver-meids --example query -- boards.toml
//!
//! # Installed ME-iDS driver
//! cargo run -p daq-driver-meids --features hardware --example query -- --native
//! ```

use std::env;
use std::path::Path;

use daq_driver_meids::{load_system_config, Backend, CloseFlags, DriverConfig, Session};

fn main() -> anyhow::Result<()> {
    let mut config = DriverConfig::default();
    for arg in env::args().skip(1) {
        if arg == "--native" {
            config.backend = Backend::Native;
        } else {
            config.system = load_system_config(Path::new(&arg))?;
        }
    }

    let session = Session::from_config(&config)?;
    let inventory = session.inventory()?;

    println!("Transport: {}", session.transport_name());
    println!(
        "Library 0x{:08X}, main driver 0x{:08X}",
        inventory.versions.library, inventory.versions.main_driver
    );

    for device in &inventory.devices {
        println!(
            "\n[{}] {} ({}) driver {} 0x{:08X}",
            device.index, device.name, device.description, device.driver_name, device.driver_version
        );
        println!(
            "    vendor 0x{:04X} device 0x{:04X} serial {} bus {:?} {}:{}.{} plugged {:?}",
            device.info.vendor_id,
            device.info.device_id,
            device.info.serial_number,
            device.info.bus_type,
            device.info.bus_number,
            device.info.device_number,
            device.info.function_number,
            device.info.plugged
        );

        for sub in &device.subdevices {
            println!(
                "    [{}] {:?}/{:?}, {} channels, caps {:?}",
                sub.index, sub.subdevice_type, sub.subtype, sub.channels, sub.caps
            );
            for range in &sub.ranges {
                println!(
                    "        range {}: {:+} .. {:+} {:?} ({} codes)",
                    range.index,
                    range.min,
                    range.max,
                    range.unit,
                    u64::from(range.max_data) + 1
                );
            }
        }
    }

    session.close(CloseFlags::empty())?;
    Ok(())
}

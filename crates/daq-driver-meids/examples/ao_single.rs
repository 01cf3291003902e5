//! Single-value analog output example.
//!
//! Sweeps the first analog output channel through a few voltages and
//! reads back the first analog input channel after each step.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p daq-driver-meids --example ao_single
//! ```

use std::sync::Arc;

use daq_driver_meids::simulated::SimulatedDriver;
use daq_driver_meids::{
    physical_to_digital, CloseFlags, ModuleType, Session, SingleConfig, SingleConfigMode,
    SubdeviceSubtype, SubdeviceType, Unit,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let system = SimulatedDriver::default();
    let session = Session::open(Arc::new(system.connect()))?;

    let ao = session.find_subdevice(0, 0, SubdeviceType::AnalogOutput, SubdeviceSubtype::Any)?;
    let ai = session.find_subdevice(0, 0, SubdeviceType::AnalogInput, SubdeviceSubtype::Any)?;

    let out_range = session.range_by_min_max(0, ao, Unit::Volt, -10.0, 10.0)?;
    let in_range = session.range_by_min_max(0, ai, Unit::Volt, -10.0, 10.0)?;
    println!("Output range {}: {} .. {} V", out_range.index, out_range.min, out_range.max);
    println!("Input range {}: {} .. {} V", in_range.index, in_range.min, in_range.max);

    session.single_config(&SingleConfig::new(0, ao, 0, SingleConfigMode::Range(out_range.index)))?;
    session.single_config(&SingleConfig::new(0, ai, 0, SingleConfigMode::Range(in_range.index)))?;

    for volts in [-5.0, -1.0, 0.0, 2.5, 7.5] {
        let code = physical_to_digital(out_range.min, out_range.max, out_range.max_data, volts)?;
        session.write_single(0, ao, 0, code)?;

        // Simulated loopback: drive the input with the output code
        system.set_input_level(0, ai, 0, code)?;
        let raw = session.read_single(0, ai, 0)?;
        let measured = daq_driver_meids::digital_to_physical(
            in_range.min,
            in_range.max,
            in_range.max_data,
            raw,
            ModuleType::None,
            0.0,
        )?;
        println!("  set {volts:+.3} V -> code {code:5} -> read {measured:+.4} V");
    }

    session.close(CloseFlags::empty())?;
    Ok(())
}

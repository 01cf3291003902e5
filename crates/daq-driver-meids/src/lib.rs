//! Safe Rust client for Meilhaus ME-iDS data acquisition devices.
//!
//! This crate provides a typed interface to the ME-iDS driver system: a
//! session with advisory locks, device and subdevice discovery, single-shot
//! and streaming I/O, timer tick conversion and physical unit conversion.
//! Every raw selector of the driver interface is a closed enum or flag set,
//! so malformed requests are rejected before they reach the driver.
//!
//! # Architecture
//!
//! ## Session
//! - [`Session`] - Open handle with RAII close and driver/device/subdevice locks
//! - [`DriverTransport`] - Capability interface the session talks to
//! - [`simulated::SimulatedDriver`] - In-process driver model, always available
//! - `NativeDriver` - Bindings to the installed driver (feature `hardware`)
//!
//! ## Catalog
//! - [`Session::find_subdevice`] - Search by type and subtype
//! - [`Session::range_info`] / [`Session::range_by_min_max`] - Range queries
//! - [`Inventory`] - Cached snapshot of every device and subdevice
//!
//! ## I/O
//! - [`Session::single`] - Batched single-value reads and writes
//! - [`Session::stream_config`] and friends - Hardware-timed streaming
//! - [`StreamTrigger`] - Five-stage trigger, built with [`StreamTriggerBuilder`]
//! - [`StreamReader`] - Background reader forwarding batches over a channel
//!
//! ## Conversion
//! - [`Session::time_to_ticks`] / [`Session::frequency_to_ticks`] - Timer ticks
//! - [`digital_to_physical`] / [`physical_to_digital`] - Unit conversion
//! - [`extract_values`] - De-interleave a multi-channel stream buffer
//!
//! # Examples
//!
//! ## Single-Shot Output
//!
//! ```no_run
//! use daq_driver_meids::{physical_to_digital, Session, SubdeviceSubtype, SubdeviceType, Unit};
//! use daq_driver_meids::simulated::SimulatedDriver;
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let session = Session::open(Arc::new(SimulatedDriver::default()))?;
//! let ao = session.find_subdevice(0, 0, SubdeviceType::AnalogOutput, SubdeviceSubtype::Any)?;
//!
//! let range = session.range_by_min_max(0, ao, Unit::Volt, -10.0, 10.0)?;
//! let code = physical_to_digital(range.min, range.max, range.max_data, 2.5)?;
//! session.write_single(0, ao, 0, code)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming
//!
//! See the [`streaming`] module.

pub mod catalog;
pub mod config;
pub mod conversion;
pub mod error;
pub mod linearization;
#[cfg(feature = "hardware")]
pub mod native;
pub mod reader;
pub mod session;
pub mod simulated;
pub mod single;
pub mod streaming;
pub mod timing;
pub mod transport;
pub mod types;

pub use catalog::{DeviceSummary, Inventory, SubdeviceSummary, Versions};
pub use config::{
    load_system_config, Backend, CapArgConfig, ConfigError, DeviceConfig, DriverConfig,
    RangeConfig, SubdeviceConfig, SystemConfig,
};
pub use conversion::{
    digital_to_physical, digital_to_physical_slice, extract_values, physical_to_digital,
    physical_to_digital_slice, MAX_DATA_LIMIT,
};
pub use error::{ErrorCode, MeidsError, Result};
pub use linearization::Thermocouple;
#[cfg(feature = "hardware")]
pub use native::NativeDriver;
pub use reader::{ReaderConfig, ReaderStats, SampleBatch, StreamReader};
pub use session::Session;
pub use single::{BatchReport, SingleConfig, SingleOutcome, SingleRequest};
pub use streaming::{
    AcqStartStage, AcquisitionLength, StartRequest, StartStage, StopRequest, StopStage,
    StreamChannelConfig, StreamEntryOutcome, StreamTrigger, StreamTriggerBuilder, TriggerArgs,
    TRIGGER_ARGS_COUNT,
};
pub use timing::{Ticks, TimerSpec};
pub use transport::{connect, DeviceInfo, DriverTransport, RangeInfo, StatusReport};
pub use types::*;

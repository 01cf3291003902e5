//! The driver transport capability.
//!
//! [`DriverTransport`] is the seam between the safe client API and whatever
//! actually executes requests: the vendor library through FFI, or the
//! in-process [`SimulatedDriver`](crate::simulated::SimulatedDriver) used by
//! tests and demos. Arguments arrive already validated and typed; failures
//! come back as the driver's raw [`ErrorCode`].
//!
//! Batched operations return one outcome per request instead of failing the
//! whole call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{Backend, DriverConfig};
use crate::error::{ErrorCode, Result};
use crate::single::{SingleConfig, SingleOutcome, SingleRequest};
use crate::streaming::{StartRequest, StopRequest, StreamChannelConfig, StreamEntryOutcome, StreamTrigger};
use crate::timing::Ticks;
use crate::types::{
    BusType, CapabilityArg, CloseFlags, LockMode, PlugState, ReadMode, SingleBatchFlags,
    StreamConfigFlags, StreamStatus, SubdeviceCaps, SubdeviceSubtype, SubdeviceType, Timer, Unit,
    WaitMode, WriteMode,
};

/// Result of a raw transport call.
/// Result of a transport call, failing with the driver's error code.
pub type TransportResult<T> = std::result::Result<T, ErrorCode>;

/// Hardware identification of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// PCI vendor id
    pub vendor_id: u32,
    /// PCI device id
    pub device_id: u32,
    /// Board serial number
    pub serial_number: u32,
    /// Bus the board sits on
    pub bus_type: BusType,
    /// Bus number
    pub bus_number: u32,
    /// Device (slot) number on the bus
    pub device_number: u32,
    /// PCI function number
    pub function_number: u32,
    /// Whether the board is currently present
    pub plugged: PlugState,
}

/// Description of one range of a subdevice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeInfo {
    /// Range index within the subdevice
    pub index: u32,
    /// Physical unit of `min` and `max`
    pub unit: Unit,
    /// Physical value of code 0
    pub min: f64,
    /// Physical value of `max_data`
    pub max: f64,
    /// Largest digital code (e.g. 65535 for 16 bit)
    pub max_data: u32,
}

impl RangeInfo {
    /// Width of the range in physical units.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Check if `[min, max]` lies inside this range.
    pub fn covers(&self, min: f64, max: f64) -> bool {
        self.min <= min && self.max >= max
    }

    /// Check if the range includes negative values.
    pub fn is_bipolar(&self) -> bool {
        self.min < 0.0
    }

    /// Physical size of one digital step.
    pub fn resolution(&self) -> f64 {
        if self.max_data == 0 {
            self.span()
        } else {
            self.span() / f64::from(self.max_data)
        }
    }
}

/// Stream state together with the number of values ready for transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// Run state of the stream
    pub status: StreamStatus,
    /// Values ready to read, or free slots to write
    pub values: usize,
}

/// Executes driver requests.
///
/// Implementations must be safe to share between threads; every method takes
/// `&self`.
pub trait DriverTransport: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    // Lifecycle and locks

    fn open(&self) -> TransportResult<()>;
    fn close(&self, flags: CloseFlags) -> TransportResult<()>;
    fn lock_driver(&self, mode: LockMode) -> TransportResult<()>;
    fn lock_device(&self, device: u32, mode: LockMode) -> TransportResult<()>;
    fn lock_subdevice(&self, device: u32, subdevice: u32, mode: LockMode) -> TransportResult<()>;
    fn reset_device(&self, device: u32) -> TransportResult<()>;
    fn reset_subdevice(&self, device: u32, subdevice: u32) -> TransportResult<()>;

    // Queries

    fn number_devices(&self) -> TransportResult<u32>;
    fn number_subdevices(&self, device: u32) -> TransportResult<u32>;
    fn number_channels(&self, device: u32, subdevice: u32) -> TransportResult<u32>;
    fn number_ranges(&self, device: u32, subdevice: u32, unit: Unit) -> TransportResult<u32>;
    fn range_info(&self, device: u32, subdevice: u32, range: u32) -> TransportResult<RangeInfo>;
    fn range_by_min_max(
        &self,
        device: u32,
        subdevice: u32,
        unit: Unit,
        min: f64,
        max: f64,
    ) -> TransportResult<RangeInfo>;
    fn device_name(&self, device: u32) -> TransportResult<String>;
    fn device_driver_name(&self, device: u32) -> TransportResult<String>;
    fn device_description(&self, device: u32) -> TransportResult<String>;
    fn device_info(&self, device: u32) -> TransportResult<DeviceInfo>;
    fn subdevice_type(
        &self,
        device: u32,
        subdevice: u32,
    ) -> TransportResult<(SubdeviceType, SubdeviceSubtype)>;
    /// First matching subdevice at or after `start`; `NOMORE_SUBDEVICE_TYPE`
    /// when the search is exhausted.
    fn subdevice_by_type(
        &self,
        device: u32,
        start: u32,
        subdevice_type: SubdeviceType,
        subtype: SubdeviceSubtype,
    ) -> TransportResult<u32>;
    fn subdevice_caps(&self, device: u32, subdevice: u32) -> TransportResult<SubdeviceCaps>;
    fn subdevice_caps_args(
        &self,
        device: u32,
        subdevice: u32,
        cap: CapabilityArg,
        count: usize,
    ) -> TransportResult<Vec<i32>>;
    fn version_library(&self) -> TransportResult<u32>;
    fn version_main_driver(&self) -> TransportResult<u32>;
    fn version_device_driver(&self, device: u32) -> TransportResult<u32>;

    // Single I/O

    fn single_config(&self, config: &SingleConfig) -> TransportResult<()>;
    /// One outcome per request, in request order.
    fn single(
        &self,
        requests: &[SingleRequest],
        flags: SingleBatchFlags,
    ) -> TransportResult<Vec<SingleOutcome>>;

    // Streaming

    fn stream_config(
        &self,
        device: u32,
        subdevice: u32,
        channels: &[StreamChannelConfig],
        trigger: &StreamTrigger,
        fifo_threshold: u32,
        flags: StreamConfigFlags,
    ) -> TransportResult<()>;
    fn stream_start(&self, requests: &[StartRequest]) -> TransportResult<Vec<StreamEntryOutcome>>;
    fn stream_stop(&self, requests: &[StopRequest]) -> TransportResult<Vec<StreamEntryOutcome>>;
    /// Fill `buffer` from the front, returning how many values were stored.
    fn stream_read(
        &self,
        device: u32,
        subdevice: u32,
        mode: ReadMode,
        buffer: &mut [i32],
    ) -> TransportResult<usize>;
    /// Returns how many values were accepted.
    fn stream_write(
        &self,
        device: u32,
        subdevice: u32,
        mode: WriteMode,
        values: &[i32],
    ) -> TransportResult<usize>;
    fn stream_status(
        &self,
        device: u32,
        subdevice: u32,
        wait: WaitMode,
    ) -> TransportResult<StatusReport>;
    fn stream_new_values(&self, device: u32, subdevice: u32, timeout_ms: u32)
        -> TransportResult<usize>;
    fn stream_time_to_ticks(
        &self,
        device: u32,
        subdevice: u32,
        timer: Timer,
        seconds: f64,
    ) -> TransportResult<Ticks>;
    fn stream_frequency_to_ticks(
        &self,
        device: u32,
        subdevice: u32,
        timer: Timer,
        hertz: f64,
    ) -> TransportResult<Ticks>;
}

/// Create the transport selected by `config`.
///
/// The native backend is only available with the `hardware` feature.
pub fn connect(config: &DriverConfig) -> Result<Arc<dyn DriverTransport>> {
    match config.backend {
        Backend::Simulated => Ok(Arc::new(crate::simulated::SimulatedDriver::new(
            config.system.clone(),
        )?)),
        #[cfg(feature = "hardware")]
        Backend::Native => Ok(Arc::new(crate::native::NativeDriver::new())),
        #[cfg(not(feature = "hardware"))]
        Backend::Native => Err(crate::error::MeidsError::invalid(
            "native backend requires the `hardware` feature",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_helpers() {
        let range = RangeInfo {
            index: 0,
            unit: Unit::Volt,
            min: -10.0,
            max: 10.0,
            max_data: 65535,
        };
        assert_eq!(range.span(), 20.0);
        assert!(range.is_bipolar());
        assert!(range.covers(-5.0, 5.0));
        assert!(!range.covers(-5.0, 11.0));
        assert!((range.resolution() - 20.0 / 65535.0).abs() < 1e-12);
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn test_native_backend_requires_feature() {
        let config = DriverConfig {
            backend: Backend::Native,
            ..DriverConfig::default()
        };
        assert!(connect(&config).is_err());
    }
}

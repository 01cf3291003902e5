//! Read-only queries about installed devices.
//!
//! All queries go through an open [`Session`]. [`Session::inventory`]
//! collects the whole tree once and caches it for the lifetime of the
//! session.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ErrorCode, IoContext, MeidsError, Result};
use crate::session::Session;
use crate::transport::{DeviceInfo, RangeInfo};
use crate::types::{CapabilityArg, SubdeviceCaps, SubdeviceSubtype, SubdeviceType, Unit};

/// Driver and library versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versions {
    /// Version of the user-space library
    pub library: u32,
    /// Version of the main kernel driver
    pub main_driver: u32,
}

/// Snapshot of one subdevice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdeviceSummary {
    /// Subdevice index
    pub index: u32,
    /// Kind of I/O unit
    pub subdevice_type: SubdeviceType,
    /// Single or streaming, or counter kind
    pub subtype: SubdeviceSubtype,
    /// Number of channels
    pub channels: u32,
    /// Capability flags
    pub caps: SubdeviceCaps,
    /// Every range, in index order
    pub ranges: Vec<RangeInfo>,
}

/// Snapshot of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// Device index
    pub index: u32,
    /// Device name
    pub name: String,
    /// Name of the device driver
    pub driver_name: String,
    /// Free-text description
    pub description: String,
    /// Version of the device driver
    pub driver_version: u32,
    /// Bus identification
    pub info: DeviceInfo,
    /// Subdevices in index order
    pub subdevices: Vec<SubdeviceSummary>,
}

impl DeviceSummary {
    /// Subdevices matching a type and subtype pattern.
    pub fn subdevices_of(
        &self,
        subdevice_type: SubdeviceType,
        subtype: SubdeviceSubtype,
    ) -> impl Iterator<Item = &SubdeviceSummary> {
        self.subdevices
            .iter()
            .filter(move |s| s.subdevice_type == subdevice_type && subtype.matches(s.subtype))
    }
}

/// Snapshot of the whole driver system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    /// Library and driver versions
    pub versions: Versions,
    /// Devices in index order
    pub devices: Vec<DeviceSummary>,
}

impl Session {
    /// Number of devices known to the driver.
    pub fn number_devices(&self) -> Result<u32> {
        self.transport()?.number_devices().io("number_devices")
    }

    /// Number of subdevices of a device.
    pub fn number_subdevices(&self, device: u32) -> Result<u32> {
        self.transport()?
            .number_subdevices(device)
            .io("number_subdevices")
    }

    /// Number of channels of a subdevice.
    pub fn number_channels(&self, device: u32, subdevice: u32) -> Result<u32> {
        self.transport()?
            .number_channels(device, subdevice)
            .io("number_channels")
    }

    /// Number of ranges of a subdevice with the given unit (`Any` for all).
    pub fn number_ranges(&self, device: u32, subdevice: u32, unit: Unit) -> Result<u32> {
        self.transport()?
            .number_ranges(device, subdevice, unit)
            .io("number_ranges")
    }

    /// Device name (e.g. "ME-4680").
    pub fn device_name(&self, device: u32) -> Result<String> {
        self.transport()?.device_name(device).io("device_name")
    }

    /// Name of the kernel driver serving a device.
    pub fn device_driver_name(&self, device: u32) -> Result<String> {
        self.transport()?
            .device_driver_name(device)
            .io("device_driver_name")
    }

    /// Free-text device description.
    pub fn device_description(&self, device: u32) -> Result<String> {
        self.transport()?
            .device_description(device)
            .io("device_description")
    }

    /// Bus location and identification.
    pub fn device_info(&self, device: u32) -> Result<DeviceInfo> {
        self.transport()?.device_info(device).io("device_info")
    }

    /// Type and subtype of a subdevice.
    pub fn subdevice_type(
        &self,
        device: u32,
        subdevice: u32,
    ) -> Result<(SubdeviceType, SubdeviceSubtype)> {
        self.transport()?
            .subdevice_type(device, subdevice)
            .io("subdevice_type")
    }

    /// Find the first subdevice of a type at or after `start`.
    ///
    /// `SubdeviceSubtype::Any` matches single and streaming subdevices.
    ///
    /// # Errors
    ///
    /// [`MeidsError::NotFound`] when no further subdevice matches.
    pub fn find_subdevice(
        &self,
        device: u32,
        start: u32,
        subdevice_type: SubdeviceType,
        subtype: SubdeviceSubtype,
    ) -> Result<u32> {
        let transport = self.transport()?;
        match transport.subdevice_by_type(device, start, subdevice_type, subtype) {
            Ok(index) => {
                debug!(device, start, ?subdevice_type, ?subtype, index, "Found subdevice");
                Ok(index)
            }
            Err(ErrorCode::NOMORE_SUBDEVICE_TYPE) => Err(MeidsError::NotFound {
                device,
                start,
                subdevice_type,
                subtype,
            }),
            Err(code) => Err(MeidsError::Io {
                operation: "find_subdevice",
                code,
            }),
        }
    }

    /// Metadata of one range.
    pub fn range_info(&self, device: u32, subdevice: u32, range: u32) -> Result<RangeInfo> {
        self.transport()?
            .range_info(device, subdevice, range)
            .io("range_info")
    }

    /// Narrowest range of `unit` covering `[min, max]`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `min > max`; I/O error `NO_RANGE` if nothing covers
    /// the interval.
    pub fn range_by_min_max(
        &self,
        device: u32,
        subdevice: u32,
        unit: Unit,
        min: f64,
        max: f64,
    ) -> Result<RangeInfo> {
        let transport = self.transport()?;
        if min.is_nan() || max.is_nan() || min > max {
            return Err(MeidsError::invalid(format!(
                "range request min {} exceeds max {}",
                min, max
            )));
        }
        transport
            .range_by_min_max(device, subdevice, unit, min, max)
            .io("range_by_min_max")
    }

    /// All ranges of a subdevice.
    pub fn ranges(&self, device: u32, subdevice: u32) -> Result<Vec<RangeInfo>> {
        let count = self.number_ranges(device, subdevice, Unit::Any)?;
        (0..count)
            .map(|range| self.range_info(device, subdevice, range))
            .collect()
    }

    /// Capability bits of a subdevice.
    pub fn subdevice_caps(&self, device: u32, subdevice: u32) -> Result<SubdeviceCaps> {
        self.transport()?
            .subdevice_caps(device, subdevice)
            .io("subdevice_caps")
    }

    /// Arguments of one capability (e.g. FIFO size).
    pub fn subdevice_caps_args(
        &self,
        device: u32,
        subdevice: u32,
        cap: CapabilityArg,
        count: usize,
    ) -> Result<Vec<i32>> {
        let transport = self.transport()?;
        if count == 0 {
            return Err(MeidsError::invalid("capability argument count must be > 0"));
        }
        transport
            .subdevice_caps_args(device, subdevice, cap, count)
            .io("subdevice_caps_args")
    }

    /// Library and main driver versions.
    pub fn versions(&self) -> Result<Versions> {
        let transport = self.transport()?;
        Ok(Versions {
            library: transport.version_library().io("version_library")?,
            main_driver: transport.version_main_driver().io("version_main_driver")?,
        })
    }

    /// Version of the driver serving one device.
    pub fn version_device_driver(&self, device: u32) -> Result<u32> {
        self.transport()?
            .version_device_driver(device)
            .io("version_device_driver")
    }

    /// Snapshot of all devices (cached after first call).
    pub fn inventory(&self) -> Result<Inventory> {
        self.transport()?;
        if let Some(inventory) = self.inventory_cache().read().as_ref() {
            return Ok(inventory.clone());
        }

        let versions = self.versions()?;
        let n_devices = self.number_devices()?;
        let mut devices = Vec::with_capacity(n_devices as usize);

        for device in 0..n_devices {
            let n_subdevices = self.number_subdevices(device)?;
            let mut subdevices = Vec::with_capacity(n_subdevices as usize);
            for subdevice in 0..n_subdevices {
                let (subdevice_type, subtype) = self.subdevice_type(device, subdevice)?;
                subdevices.push(SubdeviceSummary {
                    index: subdevice,
                    subdevice_type,
                    subtype,
                    channels: self.number_channels(device, subdevice)?,
                    caps: self.subdevice_caps(device, subdevice)?,
                    ranges: self.ranges(device, subdevice)?,
                });
            }

            devices.push(DeviceSummary {
                index: device,
                name: self.device_name(device)?,
                driver_name: self.device_driver_name(device)?,
                description: self.device_description(device)?,
                driver_version: self.version_device_driver(device)?,
                info: self.device_info(device)?,
                subdevices,
            });
        }

        let inventory = Inventory { versions, devices };
        info!(devices = inventory.devices.len(), "Collected inventory");

        *self.inventory_cache().write() = Some(inventory.clone());
        Ok(inventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedDriver;
    use std::sync::Arc;

    #[test]
    fn test_inventory_of_default_system() {
        let session = Session::open(Arc::new(SimulatedDriver::default())).unwrap();
        let inventory = session.inventory().unwrap();
        assert_eq!(inventory.devices.len(), 1);

        let device = &inventory.devices[0];
        let ai: Vec<_> = device
            .subdevices_of(SubdeviceType::AnalogInput, SubdeviceSubtype::Any)
            .collect();
        assert_eq!(ai.len(), 1);
        assert_eq!(ai[0].channels, 2);
        assert!(!ai[0].ranges.is_empty());

        // Second call is served from the cache
        assert_eq!(session.inventory().unwrap(), inventory);
    }

    #[test]
    fn test_range_by_min_max_rejects_inverted_interval() {
        let session = Session::open(Arc::new(SimulatedDriver::default())).unwrap();
        let err = session
            .range_by_min_max(0, 0, Unit::Volt, 5.0, -5.0)
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }
}

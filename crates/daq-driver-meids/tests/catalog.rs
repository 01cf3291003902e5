//! Device catalog queries against the default simulated board.
//!
//! # Test Coverage
//!
//! | Test | Description |
//! |------|-------------|
//! | `test_device_identity` | Names, driver, bus info, versions |
//! | `test_find_subdevice` | Type search, start index, wildcard subtype, exhaustion |
//! | `test_ranges` | Range count per unit, range metadata, invalid index |
//! | `test_range_by_min_max` | Smallest covering range, `NO_RANGE` |
//! | `test_caps` | Capability flags and capability arguments |
//! | `test_inventory_is_cached` | Snapshot survives a reset |

use std::sync::Arc;

use daq_driver_meids::simulated::SimulatedDriver;
use daq_driver_meids::{
    BusType, CapabilityArg, ErrorCode, MeidsError, PlugState, Session, SubdeviceCaps,
    SubdeviceSubtype, SubdeviceType, Unit,
};

fn session() -> Session {
    Session::open(Arc::new(SimulatedDriver::default())).unwrap()
}

// =============================================================================
// Identity
// =============================================================================

#[test]
fn test_device_identity() {
    let s = session();
    assert_eq!(s.device_name(0).unwrap(), "ME-4680");
    assert_eq!(s.device_driver_name(0).unwrap(), "me4600");
    assert!(!s.device_description(0).unwrap().is_empty());

    let info = s.device_info(0).unwrap();
    assert_eq!(info.vendor_id, 0x1402);
    assert_eq!(info.device_id, 0x4680);
    assert_eq!(info.bus_type, BusType::Pci);
    assert_eq!(info.plugged, PlugState::In);

    let versions = s.versions().unwrap();
    assert_eq!(versions.library, 0x0001_0300);
    assert_eq!(versions.main_driver, 0x0001_0300);
    assert_eq!(s.version_device_driver(0).unwrap(), 0x0001_0300);

    assert_eq!(s.number_subdevices(0).unwrap(), 4);
    assert_eq!(s.number_channels(0, 0).unwrap(), 2);
    assert_eq!(s.number_channels(0, 2).unwrap(), 8);

    let err = s.device_name(3).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::INVALID_DEVICE));
}

// =============================================================================
// Subdevice search
// =============================================================================

#[test]
fn test_find_subdevice() {
    let s = session();
    let ai = s
        .find_subdevice(0, 0, SubdeviceType::AnalogInput, SubdeviceSubtype::Streaming)
        .unwrap();
    assert_eq!(ai, 0);
    assert_eq!(
        s.find_subdevice(0, 0, SubdeviceType::AnalogOutput, SubdeviceSubtype::Any)
            .unwrap(),
        1
    );
    assert_eq!(
        s.find_subdevice(0, 0, SubdeviceType::Counter, SubdeviceSubtype::Counter8254)
            .unwrap(),
        3
    );
    assert_eq!(
        s.subdevice_type(0, 2).unwrap(),
        (SubdeviceType::DigitalIo, SubdeviceSubtype::Single)
    );

    // Searching past the only match
    let err = s
        .find_subdevice(0, 1, SubdeviceType::AnalogInput, SubdeviceSubtype::Any)
        .unwrap_err();
    assert!(matches!(err, MeidsError::NotFound { start: 1, .. }));

    // Wildcard does not match counter subtypes
    assert!(matches!(
        s.find_subdevice(0, 0, SubdeviceType::Counter, SubdeviceSubtype::Any),
        Err(MeidsError::NotFound { .. })
    ));
}

// =============================================================================
// Ranges
// =============================================================================

#[test]
fn test_ranges() {
    let s = session();
    assert_eq!(s.number_ranges(0, 0, Unit::Any).unwrap(), 4);
    assert_eq!(s.number_ranges(0, 0, Unit::Volt).unwrap(), 4);
    assert_eq!(s.number_ranges(0, 0, Unit::Ampere).unwrap(), 0);

    let range = s.range_info(0, 0, 0).unwrap();
    assert_eq!(range.unit, Unit::Volt);
    assert_eq!((range.min, range.max), (-10.0, 10.0));
    assert_eq!(range.max_data, 65535);

    let all = s.ranges(0, 0).unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[3].max, 2.5);

    let err = s.range_info(0, 0, 9).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::INVALID_RANGE));
}

#[test]
fn test_range_by_min_max() {
    let s = session();
    let range = s.range_by_min_max(0, 0, Unit::Volt, -1.0, 1.0).unwrap();
    assert_eq!(range.index, 1);

    let range = s.range_by_min_max(0, 0, Unit::Volt, 0.0, 2.0).unwrap();
    assert_eq!(range.index, 3);

    let range = s.range_by_min_max(0, 0, Unit::Any, -5.0, 5.0).unwrap();
    assert_eq!(range.index, 0);

    let err = s.range_by_min_max(0, 0, Unit::Volt, -20.0, 20.0).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NO_RANGE));
}

// =============================================================================
// Capabilities
// =============================================================================

#[test]
fn test_caps() {
    let s = session();
    let caps = s.subdevice_caps(0, 0).unwrap();
    assert!(caps.contains(SubdeviceCaps::AI_FIFO | SubdeviceCaps::TRIG_DIGITAL));
    assert!(s.subdevice_caps(0, 2).unwrap().is_empty());

    assert_eq!(
        s.subdevice_caps_args(0, 0, CapabilityArg::AiFifoSize, 1).unwrap(),
        vec![2048]
    );
    assert_eq!(
        s.subdevice_caps_args(0, 3, CapabilityArg::CounterWidth, 4).unwrap(),
        vec![16]
    );

    let err = s
        .subdevice_caps_args(0, 2, CapabilityArg::AiFifoSize, 1)
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::INVALID_CAP));
}

#[test]
fn test_inventory_is_cached() {
    let s = session();
    let first = s.inventory().unwrap();
    assert_eq!(first.devices.len(), 1);

    let device = &first.devices[0];
    assert_eq!(device.subdevices.len(), 4);
    assert_eq!(
        device
            .subdevices_of(SubdeviceType::AnalogInput, SubdeviceSubtype::Any)
            .count(),
        1
    );
    assert_eq!(device.subdevices[0].ranges.len(), 4);

    let second = s.inventory().unwrap();
    assert_eq!(first, second);
}

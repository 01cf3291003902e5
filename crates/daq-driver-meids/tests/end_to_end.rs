//! Full acquisition cycle: discover, configure, acquire, convert, close.
//!
//! # Test Coverage
//!
//! | Test | Description |
//! |------|-------------|
//! | `test_two_channel_acquisition` | 10000 scans of two channels read in one blocking call |
//! | `test_closed_session_is_unusable` | Queries and the cached inventory report `NotOpen` after close |

use std::sync::Arc;

use daq_driver_meids::simulated::SimulatedDriver;
use daq_driver_meids::{
    digital_to_physical_slice, extract_values, CloseFlags, MeidsError, ModuleType, ReadMode,
    Session, StartMode, StopMode, StreamChannelConfig, StreamConfigFlags, StreamTrigger,
    SubdeviceSubtype, SubdeviceType, Unit,
};

#[test]
fn test_two_channel_acquisition() {
    let system = SimulatedDriver::default();
    let session = Session::open(Arc::new(system.connect())).unwrap();

    assert_eq!(session.number_devices().unwrap(), 1);
    let ai = session
        .find_subdevice(0, 0, SubdeviceType::AnalogInput, SubdeviceSubtype::Streaming)
        .unwrap();
    assert_eq!(session.number_channels(0, ai).unwrap(), 2);

    let range = session.range_info(0, ai, 0).unwrap();
    assert_eq!(range.unit, Unit::Volt);
    assert_eq!((range.min, range.max, range.max_data), (-10.0, 10.0, 65535));

    let channels = [StreamChannelConfig::new(0, 0), StreamChannelConfig::new(1, 0)];
    let trigger = StreamTrigger::builder()
        .software_start()
        .scan_follow()
        .conv_timer(66)
        .stop_after_scans(10000)
        .build()
        .unwrap();
    session
        .stream_config(0, ai, &channels, &trigger, 0, StreamConfigFlags::empty())
        .unwrap();
    session.start_stream(0, ai, StartMode::Blocking, 0).unwrap();

    let raw = session.stream_read(0, ai, ReadMode::Blocking, 20000).unwrap();
    assert_eq!(raw.len(), 20000);

    let first = extract_values(0, &raw, &channels);
    let second = extract_values(1, &raw, &channels);
    assert_eq!(first.len(), 10000);
    assert_eq!(second.len(), 10000);
    assert_eq!(first[1], 97);
    assert_eq!(second[0], 4099);

    let volts = digital_to_physical_slice(&range, &first[..4], ModuleType::None, 0.0).unwrap();
    assert_eq!(volts[0], -10.0);
    assert!(volts.windows(2).all(|w| w[1] > w[0]));

    session.stop_stream(0, ai, StopMode::LastValue).unwrap();
    session.close(CloseFlags::empty()).unwrap();
}

#[test]
fn test_closed_session_is_unusable() {
    let session = Session::open(Arc::new(SimulatedDriver::default())).unwrap();
    let clone = session.clone();
    assert!(session.inventory().is_ok());
    session.close(CloseFlags::empty()).unwrap();

    assert!(!clone.is_open());
    assert!(matches!(clone.number_devices(), Err(MeidsError::NotOpen)));
    assert!(matches!(clone.inventory(), Err(MeidsError::NotOpen)));
    assert!(clone.close(CloseFlags::empty()).is_err());
}

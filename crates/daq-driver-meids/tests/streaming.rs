//! Streaming I/O against the simulated driver.
//!
//! The simulated analog input delivers a sawtooth per channel:
//! `code(scan, channel) = (scan * 97 + channel * 4099) % 65536`.
//!
//! # Test Coverage
//!
//! | Test | Description |
//! |------|-------------|
//! | `test_finite_blocking_acquisition` | Count stop, blocking read, end of data |
//! | `test_value_count_stop` | Scan-stop count with acquisition follow |
//! | `test_non_blocking_reads_are_bounded` | Non-blocking reads return at most one burst |
//! | `test_continuous_stop_preserving_buffers` | Continuous run, status wait, preserved tail |
//! | `test_config_rejections` | Channel list, range, timing, flags, FIFO threshold |
//! | `test_start_stop_batches` | Per-entry outcomes of start and stop lists |
//! | `test_busy_while_running` | Single I/O and reconfiguration refused while running |
//! | `test_output_stream` | Preload, start, write, stop modes |
//! | `test_fault_reports_overflow` | Error state surfaces as `HW_BUFFER_OVERFLOW` |
//! | `test_tick_conversion` | Time and frequency to ticks on the 33 MHz timers |
//! | `test_reader_delivers_whole_acquisition` | Background reader forwards every value |
//! | `test_reader_stop_on_continuous_stream` | Reader stops on request |

use std::sync::Arc;
use std::time::Duration;

use daq_driver_meids::simulated::SimulatedDriver;
use daq_driver_meids::{
    extract_values, ErrorCode, ReadMode, Reference, ReaderConfig, Session, StartMode, StartRequest,
    StopFlags, StopMode, StopRequest, StreamChannelConfig, StreamConfigFlags, StreamReader,
    StreamStatus, StreamTrigger, StreamTriggerBuilder, Timer, WaitMode, WriteMode,
};

const AI: u32 = 0;
const AO: u32 = 1;
const DIO: u32 = 2;

// =============================================================================
// Helpers
// =============================================================================

fn setup() -> (SimulatedDriver, Session) {
    let system = SimulatedDriver::default();
    let session = Session::open(Arc::new(system.connect())).unwrap();
    (system, session)
}

fn two_channels() -> [StreamChannelConfig; 2] {
    [StreamChannelConfig::new(0, 0), StreamChannelConfig::new(1, 0)]
}

fn timed() -> StreamTriggerBuilder {
    StreamTrigger::builder()
        .software_start()
        .scan_follow()
        .conv_timer(3300)
}

fn sawtooth(position: u64, channels: u64) -> i32 {
    let scan = position / channels;
    let channel = position % channels;
    ((scan * 97 + channel * 4099) % 65536) as i32
}

fn configure(s: &Session, trigger: &StreamTrigger) {
    s.stream_config(0, AI, &two_channels(), trigger, 0, StreamConfigFlags::empty())
        .unwrap();
}

// =============================================================================
// Acquisition length
// =============================================================================

#[test]
fn test_finite_blocking_acquisition() {
    let (_system, s) = setup();
    configure(&s, &timed().stop_after_scans(100).build().unwrap());
    s.start_stream(0, AI, StartMode::Blocking, 0).unwrap();

    let values = s.stream_read(0, AI, ReadMode::Blocking, 1000).unwrap();
    assert_eq!(values.len(), 200);
    for (i, v) in values.iter().enumerate() {
        assert_eq!(*v, sawtooth(i as u64, 2), "value {i}");
    }

    let err = s.stream_read(0, AI, ReadMode::Blocking, 10).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SUBDEVICE_NOT_RUNNING));
    assert_eq!(
        s.stream_status(0, AI, WaitMode::None).unwrap().status,
        StreamStatus::Idle
    );

    let ch1 = extract_values(1, &values, &two_channels());
    assert_eq!(ch1.len(), 100);
    assert_eq!(ch1[0], 4099);
    assert_eq!(ch1[1], 4099 + 97);
}

#[test]
fn test_value_count_stop() {
    let (_system, s) = setup();
    configure(&s, &timed().stop_after_values(151).build().unwrap());
    s.start_stream(0, AI, StartMode::NonBlocking, 0).unwrap();

    let values = s.stream_read(0, AI, ReadMode::Blocking, 500).unwrap();
    assert_eq!(values.len(), 151);
    s.stop_stream(0, AI, StopMode::LastValue).unwrap();
}

#[test]
fn test_non_blocking_reads_are_bounded() {
    let (_system, s) = setup();
    configure(&s, &timed().stop_after_scans(1000).build().unwrap());
    s.start_stream(0, AI, StartMode::Blocking, 0).unwrap();

    assert_eq!(s.stream_new_values(0, AI, 0).unwrap(), 512);
    let first = s.stream_read(0, AI, ReadMode::NonBlocking, 2000).unwrap();
    assert_eq!(first.len(), 512);

    let mut total = first.len();
    while total < 2000 {
        total += s.stream_read(0, AI, ReadMode::NonBlocking, 2000).unwrap().len();
    }
    assert_eq!(total, 2000);
    assert_eq!(s.stream_new_values(0, AI, 0).unwrap(), 0);
}

#[test]
fn test_continuous_stop_preserving_buffers() {
    let (_system, s) = setup();
    configure(&s, &timed().continuous().build().unwrap());
    s.start_stream(0, AI, StartMode::Blocking, 0).unwrap();

    assert_eq!(s.stream_read(0, AI, ReadMode::Blocking, 10_000).unwrap().len(), 10_000);
    let status = s.stream_status(0, AI, WaitMode::None).unwrap();
    assert_eq!(status.status, StreamStatus::Busy);

    let err = s.stream_status(0, AI, WaitMode::Idle).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::TIMEOUT));

    let outcomes = s
        .stream_stop(&[StopRequest::new(0, AI, StopMode::LastValue)
            .with_flags(StopFlags::PRESERVE_BUFFERS)])
        .unwrap();
    assert!(outcomes[0].is_ok());

    let tail = s.stream_read(0, AI, ReadMode::Blocking, 10_000).unwrap();
    assert_eq!(tail.len(), 512);
    assert_eq!(tail[0], sawtooth(10_000, 2));
    assert!(s.stream_read(0, AI, ReadMode::Blocking, 1).is_err());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_rejections() {
    let (_system, s) = setup();
    let trigger = timed().stop_after_scans(10).build().unwrap();
    let flags = StreamConfigFlags::empty();

    assert!(s
        .stream_config(0, AI, &[], &trigger, 0, flags)
        .unwrap_err()
        .is_invalid_argument());

    let code = |channels: &[StreamChannelConfig], trigger: &StreamTrigger, threshold, flags| {
        s.stream_config(0, AI, channels, trigger, threshold, flags)
            .unwrap_err()
            .code()
    };

    assert_eq!(
        code(&[StreamChannelConfig::new(5, 0)], &trigger, 0, flags),
        Some(ErrorCode::INVALID_CHANNEL)
    );
    assert_eq!(
        code(&[StreamChannelConfig::new(0, 7)], &trigger, 0, flags),
        Some(ErrorCode::INVALID_STREAM_CONFIG)
    );
    assert_eq!(
        code(&two_channels(), &trigger, 5000, flags),
        Some(ErrorCode::INVALID_FIFO_IRQ_THRESHOLD)
    );
    assert_eq!(
        code(&two_channels(), &trigger, 0, StreamConfigFlags::WRAPAROUND),
        Some(ErrorCode::INVALID_FLAGS)
    );

    // Conversion period below the timer minimum
    let fast = StreamTrigger::builder()
        .software_start()
        .scan_follow()
        .conv_timer(10)
        .stop_after_scans(10)
        .build()
        .unwrap();
    assert_eq!(
        code(&two_channels(), &fast, 0, flags),
        Some(ErrorCode::INVALID_CONV_START_ARG)
    );

    // Scan period shorter than two conversions
    let tight = StreamTrigger::builder()
        .software_start()
        .scan_timer(100)
        .conv_timer(66)
        .stop_after_scans(10)
        .build()
        .unwrap();
    assert_eq!(
        code(&two_channels(), &tight, 0, flags),
        Some(ErrorCode::INVALID_SCAN_START_ARG)
    );

    // Zero acquisition-stop count
    let empty = timed().stop_after_scans(0).build().unwrap();
    assert_eq!(
        code(&two_channels(), &empty, 0, flags),
        Some(ErrorCode::INVALID_ACQ_STOP_ARG)
    );

    let err = s
        .stream_config(0, DIO, &two_channels(), &trigger, 0, flags)
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NOT_SUPPORTED));
}

#[test]
fn test_start_stop_batches() {
    let (_system, s) = setup();
    let err = s.start_stream(0, AI, StartMode::Blocking, 0).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::PREVIOUS_CONFIG));

    configure(&s, &timed().continuous().build().unwrap());
    let outcomes = s
        .stream_start(&[
            StartRequest::new(0, AI, StartMode::Blocking, 100),
            StartRequest::new(0, AO, StartMode::Blocking, 100),
            StartRequest::new(0, DIO, StartMode::Blocking, 100),
        ])
        .unwrap();
    let codes: Vec<_> = outcomes.iter().map(|o| o.code).collect();
    assert_eq!(
        codes,
        vec![
            ErrorCode::SUCCESS,
            ErrorCode::PREVIOUS_CONFIG,
            ErrorCode::NOT_SUPPORTED
        ]
    );

    let outcomes = s
        .stream_stop(&[
            StopRequest::new(0, AI, StopMode::Immediate),
            StopRequest::new(0, AO, StopMode::Immediate),
        ])
        .unwrap();
    assert!(outcomes.iter().all(|o| o.is_ok()));
    assert!(s.stream_start(&[]).unwrap_err().is_invalid_argument());
}

#[test]
fn test_busy_while_running() {
    let (_system, s) = setup();
    let trigger = timed().continuous().build().unwrap();
    configure(&s, &trigger);
    s.start_stream(0, AI, StartMode::Blocking, 0).unwrap();

    let err = s.read_single(0, AI, 0).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SUBDEVICE_BUSY));
    let err = s
        .stream_config(0, AI, &two_channels(), &trigger, 0, StreamConfigFlags::empty())
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SUBDEVICE_BUSY));
    let err = s.start_stream(0, AI, StartMode::Blocking, 0).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SUBDEVICE_BUSY));

    s.stop_stream(0, AI, StopMode::Immediate).unwrap();
    assert!(s.read_single(0, AI, 0).is_ok());
}

#[test]
fn test_output_stream() {
    let (system, s) = setup();
    let trigger = timed().continuous().build().unwrap();
    s.stream_config(
        0,
        AO,
        &[StreamChannelConfig::new(0, 0).with_reference(Reference::AoGround)],
        &trigger,
        0,
        StreamConfigFlags::empty(),
    )
    .unwrap();

    let err = s.stream_write(0, AO, WriteMode::Blocking, &[1, 2]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::SUBDEVICE_NOT_RUNNING));

    let ramp: Vec<i32> = (0..100).map(|i| i * 100).collect();
    assert_eq!(s.stream_write(0, AO, WriteMode::Preload, &ramp).unwrap(), 100);
    assert_eq!(s.stream_new_values(0, AO, 0).unwrap(), 4096 - 100);

    s.start_stream(0, AO, StartMode::Blocking, 0).unwrap();
    assert_eq!(system.output_level(0, AO, 0), Some(9900));

    let burst = vec![20_000; 600];
    assert_eq!(s.stream_write(0, AO, WriteMode::NonBlocking, &burst).unwrap(), 512);
    assert_eq!(s.stream_write(0, AO, WriteMode::Blocking, &[30_000]).unwrap(), 1);
    assert_eq!(system.output_level(0, AO, 0), Some(30_000));

    let err = s.stream_write(0, AO, WriteMode::Blocking, &[70_000]).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::VALUE_OUT_OF_RANGE));

    let err = s.stream_read(0, AO, ReadMode::Blocking, 1).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NOT_SUPPORTED));

    s.stop_stream(0, AO, StopMode::Immediate).unwrap();
    assert_eq!(system.output_level(0, AO, 0), Some(32768));
}

#[test]
fn test_fault_reports_overflow() {
    let (system, s) = setup();
    configure(&s, &timed().continuous().build().unwrap());
    s.start_stream(0, AI, StartMode::Blocking, 0).unwrap();
    system.inject_fault(0, AI).unwrap();

    let err = s.stream_read(0, AI, ReadMode::NonBlocking, 10).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::HW_BUFFER_OVERFLOW));
    assert_eq!(
        s.stream_status(0, AI, WaitMode::None).unwrap().status,
        StreamStatus::Error
    );

    // A restart clears the error
    s.stop_stream(0, AI, StopMode::Immediate).unwrap();
    s.start_stream(0, AI, StartMode::Blocking, 0).unwrap();
    assert_eq!(s.stream_read(0, AI, ReadMode::Blocking, 4).unwrap().len(), 4);
}

// =============================================================================
// Timing
// =============================================================================

#[test]
fn test_tick_conversion() {
    let (_system, s) = setup();
    let ticks = s.time_to_ticks(0, AI, Timer::ConvStart, 1e-4).unwrap();
    assert_eq!(ticks.ticks, 3300);
    assert!((ticks.time - 1e-4).abs() < 1e-12);

    let ticks = s.frequency_to_ticks(0, AI, Timer::ConvStart, 7000.0).unwrap();
    assert_eq!(ticks.ticks, 4714);
    assert!((ticks.frequency() - 33e6 / 4714.0).abs() < 1e-6);

    // Faster than the timer allows clamps to the minimum
    let ticks = s.frequency_to_ticks(0, AI, Timer::ConvStart, 1e9).unwrap();
    assert_eq!(ticks.ticks, 66);

    assert!(s
        .time_to_ticks(0, AI, Timer::ConvStart, -1.0)
        .unwrap_err()
        .is_invalid_argument());
    let err = s.time_to_ticks(0, DIO, Timer::ConvStart, 1e-3).unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NOT_SUPPORTED));
}

// =============================================================================
// Background reader
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reader_delivers_whole_acquisition() {
    let (_system, s) = setup();
    configure(&s, &timed().stop_after_scans(5000).build().unwrap());
    s.start_stream(0, AI, StartMode::Blocking, 0).unwrap();

    let (reader, mut rx) = StreamReader::spawn(&s, 0, AI, 2, ReaderConfig::default()).unwrap();

    let mut values = Vec::new();
    let mut expected_sequence = 0;
    while let Some(batch) = rx.recv().await {
        assert_eq!(batch.sequence, expected_sequence);
        assert_eq!(batch.channels, 2);
        expected_sequence += 1;
        values.extend(batch.values);
    }

    assert_eq!(values.len(), 10_000);
    assert_eq!(values[9_999], sawtooth(9_999, 2));
    reader.stop();
    let stats = reader.stats();
    assert_eq!(stats.values_read, 10_000);
    assert_eq!(stats.values_dropped, 0);
    assert_eq!(stats.batches, expected_sequence);
    assert!(!reader.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reader_stop_on_continuous_stream() {
    let (_system, s) = setup();
    configure(&s, &timed().continuous().build().unwrap());
    s.start_stream(0, AI, StartMode::Blocking, 0).unwrap();

    let config = ReaderConfig {
        buffer_size: 4,
        poll_interval: Duration::from_millis(1),
        ..ReaderConfig::default()
    };
    let (reader, mut rx) = StreamReader::spawn(&s, 0, AI, 2, config).unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.values.len(), 512);
    assert_eq!(first.n_scans(), 256);

    reader.stop();
    assert!(!reader.is_running());
    s.stop_stream(0, AI, StopMode::Immediate).unwrap();
}

#[test]
fn test_reader_rejects_zero_batch() {
    let (_system, s) = setup();
    let config = ReaderConfig {
        batch_values: 0,
        ..ReaderConfig::default()
    };
    assert!(StreamReader::spawn(&s, 0, AI, 2, config)
        .unwrap_err()
        .is_invalid_argument());
}

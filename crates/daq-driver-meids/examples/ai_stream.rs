//! Hardware-timed analog input streaming example.
//!
//! Acquires a fixed number of scans on two channels and drains them
//! through the background [`StreamReader`].
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run -p daq-driver-meids --example ai_stream -- 5000
//! ```

use std::env;
use std::sync::Arc;
use std::time::Instant;

use daq_driver_meids::simulated::SimulatedDriver;
use daq_driver_meids::{
    digital_to_physical_slice, CloseFlags, ModuleType, ReaderConfig, Session, StartMode,
    StopMode, StreamChannelConfig, StreamConfigFlags, StreamReader, StreamTrigger,
    SubdeviceSubtype, SubdeviceType, Timer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let scans: u32 = env::args().nth(1).map(|s| s.parse()).transpose()?.unwrap_or(10_000);

    println!("=== ME-iDS Streaming Acquisition Example ===\n");

    let session = Session::open(Arc::new(SimulatedDriver::default()))?;
    let ai = session.find_subdevice(0, 0, SubdeviceType::AnalogInput, SubdeviceSubtype::Streaming)?;
    let range = session.range_info(0, ai, 0)?;

    // 100 kS/s aggregate conversion rate
    let conv = session.frequency_to_ticks(0, ai, Timer::ConvStart, 100_000.0)?;
    println!("Conversion timer: {} ticks ({:.1} Hz)", conv.ticks, conv.frequency());
    println!("Range: {} .. {} V", range.min, range.max);

    let channels = [StreamChannelConfig::new(0, range.index), StreamChannelConfig::new(1, range.index)];
    let trigger = StreamTrigger::builder()
        .software_start()
        .scan_follow()
        .conv_timer(conv.ticks)
        .stop_after_scans(scans)
        .build()?;

    session.stream_config(0, ai, &channels, &trigger, 0, StreamConfigFlags::empty())?;
    session.start_stream(0, ai, StartMode::Blocking, 0)?;

    let (reader, mut rx) = StreamReader::spawn(&session, 0, ai, channels.len(), ReaderConfig::default())?;

    let start = Instant::now();
    let mut total_scans = 0usize;
    let mut last = Vec::new();
    while let Some(batch) = rx.recv().await {
        total_scans += batch.n_scans();
        last = batch.values;
    }
    let elapsed = start.elapsed();
    reader.stop();

    let stats = reader.stats();
    println!("\nResults:");
    println!("  Batches: {}", stats.batches);
    println!("  Scans: {total_scans}");
    println!("  Values read: {}, dropped: {}", stats.values_read, stats.values_dropped);
    println!("  Elapsed: {:.3} s", elapsed.as_secs_f64());

    if let Some(scan) = last.rchunks_exact(channels.len()).next() {
        let volts = digital_to_physical_slice(&range, scan, ModuleType::None, 0.0)?;
        println!("  Last scan: {volts:+.4?} V");
    }

    session.stop_stream(0, ai, StopMode::Immediate)?;
    session.close(CloseFlags::empty())?;
    Ok(())
}

//! Background stream reader feeding an async channel.
//!
//! [`StreamReader`] polls a running input stream from a dedicated thread
//! with non-blocking reads and forwards the raw codes in [`SampleBatch`]es
//! through a tokio mpsc channel. It ends by itself when the acquisition
//! finishes, when the receiver is dropped, or on [`StreamReader::stop`].
//!
//! ```no_run
//! use daq_driver_meids::{ReaderConfig, Session, StreamReader};
//! use daq_driver_meids::simulated::SimulatedDriver;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let session = Session::open(Arc::new(SimulatedDriver::default()))?;
//! // ... stream_config and start_stream on subdevice 0 ...
//! let (reader, mut rx) = StreamReader::spawn(&session, 0, 0, 2, ReaderConfig::default())?;
//! while let Some(batch) = rx.recv().await {
//!     println!("batch {} with {} scans", batch.sequence, batch.n_scans());
//! }
//! reader.stop();
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::error::{ErrorCode, MeidsError, Result};
use crate::session::Session;
use crate::types::{ReadMode, StreamStatus, WaitMode};

/// Raw codes read in one poll, interleaved in channel-list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBatch {
    /// Raw codes, interleaved by channel list
    pub values: Vec<i32>,
    /// Channel-list length of the stream
    pub channels: usize,
    /// Position of this batch in the stream, starting at 0
    pub sequence: u64,
}

impl SampleBatch {
    /// Number of complete scans in this batch.
    pub fn n_scans(&self) -> usize {
        if self.channels > 0 {
            self.values.len() / self.channels
        } else {
            0
        }
    }
}

/// Reader thread settings.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Largest read per poll
    pub batch_values: usize,
    /// Channel capacity in batches
    pub buffer_size: usize,
    /// Drop batches when the receiver lags instead of waiting for it
    pub drop_on_overflow: bool,
    /// Sleep between polls that returned nothing
    pub poll_interval: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            batch_values: 4096,
            buffer_size: 64,
            drop_on_overflow: false,
            poll_interval: Duration::from_micros(200),
        }
    }
}

/// Counters of a reader thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Batches delivered to the receiver
    pub batches: u64,
    /// Values read from the driver
    pub values_read: u64,
    /// Values discarded because the receiver lagged
    pub values_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    batches: AtomicU64,
    values_read: AtomicU64,
    values_dropped: AtomicU64,
}

/// Handle to a background reader thread.
#[derive(Debug)]
pub struct StreamReader {
    running: Arc<AtomicBool>,
    counters: Arc<Counters>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StreamReader {
    /// Start polling `subdevice` of `device`.
    ///
    /// The subdevice should already be configured and started.
    pub fn spawn(
        session: &Session,
        device: u32,
        subdevice: u32,
        channels: usize,
        config: ReaderConfig,
    ) -> Result<(Self, mpsc::Receiver<SampleBatch>)> {
        if config.batch_values == 0 || config.buffer_size == 0 {
            return Err(MeidsError::invalid("reader batch and buffer sizes must be non-zero"));
        }
        if !session.is_open() {
            return Err(MeidsError::NotOpen);
        }

        let (tx, rx) = mpsc::channel(config.buffer_size);
        let running = Arc::new(AtomicBool::new(true));
        let counters = Arc::new(Counters::default());

        let thread_running = Arc::clone(&running);
        let thread_counters = Arc::clone(&counters);
        let session = session.clone();

        let handle = thread::Builder::new()
            .name(format!("meids-reader-{}-{}", device, subdevice))
            .spawn(move || {
                read_loop(
                    &session,
                    device,
                    subdevice,
                    channels,
                    &config,
                    &tx,
                    &thread_running,
                    &thread_counters,
                );
                thread_running.store(false, Ordering::SeqCst);
                debug!(device, subdevice, "Reader thread exiting");
            })
            .map_err(|e| MeidsError::invalid(format!("cannot spawn reader thread: {}", e)))?;

        info!(device, subdevice, channels, "Started stream reader");

        Ok((
            Self {
                running,
                counters,
                handle: Mutex::new(Some(handle)),
            },
            rx,
        ))
    }

    /// Ask the thread to finish and wait for it.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            if let Err(e) = handle.join() {
                error!("Reader thread panicked: {:?}", e);
            }
        }
        let stats = self.stats();
        info!(
            batches = stats.batches,
            values = stats.values_read,
            dropped = stats.values_dropped,
            "Stopped stream reader"
        );
    }

    /// Check whether the thread is still polling.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current counters.
    pub fn stats(&self) -> ReaderStats {
        ReaderStats {
            batches: self.counters.batches.load(Ordering::SeqCst),
            values_read: self.counters.values_read.load(Ordering::SeqCst),
            values_dropped: self.counters.values_dropped.load(Ordering::SeqCst),
        }
    }
}

impl Drop for StreamReader {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn read_loop(
    session: &Session,
    device: u32,
    subdevice: u32,
    channels: usize,
    config: &ReaderConfig,
    tx: &mpsc::Sender<SampleBatch>,
    running: &AtomicBool,
    counters: &Counters,
) {
    let mut buffer = vec![0; config.batch_values];
    let mut sequence = 0;

    while running.load(Ordering::SeqCst) {
        let n = match session.stream_read_into(device, subdevice, ReadMode::NonBlocking, &mut buffer) {
            Ok(n) => n,
            Err(e) if e.code() == Some(ErrorCode::SUBDEVICE_NOT_RUNNING) => {
                debug!(device, subdevice, "Acquisition finished");
                break;
            }
            Err(e) => {
                error!(device, subdevice, error = %e, "Stream read failed");
                break;
            }
        };

        if n == 0 {
            match session.stream_status(device, subdevice, WaitMode::None) {
                Ok(report) if report.status == StreamStatus::Busy || report.values > 0 => {}
                Ok(report) => {
                    debug!(device, subdevice, status = ?report.status, "Stream no longer running");
                    break;
                }
                Err(e) => {
                    error!(device, subdevice, error = %e, "Stream status failed");
                    break;
                }
            }
            thread::sleep(config.poll_interval);
            continue;
        }

        counters.values_read.fetch_add(n as u64, Ordering::SeqCst);
        let batch = SampleBatch {
            values: buffer[..n].to_vec(),
            channels,
            sequence,
        };
        sequence += 1;

        match send_batch(tx, batch, config, running) {
            Delivery::Sent => {}
            Delivery::Dropped => {
                counters.values_dropped.fetch_add(n as u64, Ordering::SeqCst);
                trace!(device, subdevice, "Dropped batch (receiver full)");
                continue;
            }
            Delivery::Closed => {
                debug!(device, subdevice, "Receiver closed");
                break;
            }
        }
        counters.batches.fetch_add(1, Ordering::SeqCst);
    }
}

enum Delivery {
    Sent,
    Dropped,
    Closed,
}

/// Hand a batch to the receiver, waiting for room unless dropping is enabled.
/// Waiting gives up once `running` is cleared.
fn send_batch(
    tx: &mpsc::Sender<SampleBatch>,
    batch: SampleBatch,
    config: &ReaderConfig,
    running: &AtomicBool,
) -> Delivery {
    let mut pending = batch;
    loop {
        match tx.try_send(pending) {
            Ok(()) => return Delivery::Sent,
            Err(mpsc::error::TrySendError::Closed(_)) => return Delivery::Closed,
            Err(mpsc::error::TrySendError::Full(_)) if config.drop_on_overflow => {
                return Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Full(batch)) => {
                if !running.load(Ordering::SeqCst) {
                    return Delivery::Closed;
                }
                pending = batch;
                thread::sleep(config.poll_interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_scans() {
        let batch = SampleBatch {
            values: vec![1, 2, 3, 4, 5],
            channels: 2,
            sequence: 0,
        };
        assert_eq!(batch.n_scans(), 2);

        let empty = SampleBatch {
            values: vec![1],
            channels: 0,
            sequence: 0,
        };
        assert_eq!(empty.n_scans(), 0);
    }

    #[test]
    fn test_default_config_is_lossless() {
        let config = ReaderConfig::default();
        assert!(!config.drop_on_overflow);
        assert!(config.batch_values > 0);
    }
}

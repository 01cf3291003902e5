//! Single-shot I/O.
//!
//! A channel is first programmed with [`Session::single_config`], then
//! transferred with [`Session::single`]. A batch is submitted as a slice of
//! immutable [`SingleRequest`]s and answered by a [`BatchReport`] holding
//! one [`SingleOutcome`] per request. A failing entry does not fail the
//! batch; check [`BatchReport::failures`].
//!
//! # Example
//!
//! ```no_run
//! use daq_driver_meids::{Session, SingleBatchFlags, SingleConfig, SingleConfigMode, SingleRequest};
//! use daq_driver_meids::simulated::SimulatedDriver;
//! use std::sync::Arc;
//!
//! # fn example() -> daq_driver_meids::Result<()> {
//! let session = Session::open(Arc::new(SimulatedDriver::default()))?;
//! session.single_config(&SingleConfig::new(0, 2, 0, SingleConfigMode::DioOutput))?;
//!
//! let report = session.single(
//!     &[SingleRequest::write(0, 2, 0, 0xA5), SingleRequest::read(0, 0, 1)],
//!     SingleBatchFlags::empty(),
//! )?;
//! for (index, code) in report.failures() {
//!     eprintln!("entry {} failed: {}", index, code);
//! }
//! # Ok(())
//! # }
//! ```

use tracing::{debug, trace, warn};

use crate::error::{ErrorCode, IoContext, MeidsError, Result};
use crate::session::Session;
use crate::types::{
    check_dio_width, Direction, Reference, SingleBatchFlags, SingleConfigFlags, SingleConfigMode,
    SingleFlags, TriggerChannel, TriggerEdge, TriggerType,
};

/// Channel programming for single-shot transfers.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleConfig {
    /// Device index
    pub device: u32,
    /// Subdevice index
    pub subdevice: u32,
    /// Channel to program
    pub channel: u32,
    /// Range, direction or counter mode
    pub mode: SingleConfigMode,
    /// Ground reference
    pub reference: Reference,
    /// Trigger input used by external triggers
    pub trigger_channel: TriggerChannel,
    /// What starts a conversion
    pub trigger_type: TriggerType,
    /// Edge or level of an external trigger
    pub trigger_edge: TriggerEdge,
    /// Configuration flags
    pub flags: SingleConfigFlags,
}

impl SingleConfig {
    /// Software-triggered configuration without reference.
    pub fn new(device: u32, subdevice: u32, channel: u32, mode: SingleConfigMode) -> Self {
        Self {
            device,
            subdevice,
            channel,
            mode,
            reference: Reference::None,
            trigger_channel: TriggerChannel::Default,
            trigger_type: TriggerType::Software,
            trigger_edge: TriggerEdge::None,
            flags: SingleConfigFlags::empty(),
        }
    }

    /// Set the signal reference.
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = reference;
        self
    }

    /// Bind the channel to a trigger.
    pub fn with_trigger(mut self, channel: TriggerChannel, kind: TriggerType, edge: TriggerEdge) -> Self {
        self.trigger_channel = channel;
        self.trigger_type = kind;
        self.trigger_edge = edge;
        self
    }

    /// Set the configuration flags.
    pub fn with_flags(mut self, flags: SingleConfigFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Check argument consistency.
    pub fn validate(&self) -> Result<()> {
        check_dio_width(self.flags.bits(), "single config flags")?;
        // Rejects out-of-range counter modes
        self.mode.to_raw()?;
        Ok(())
    }
}

/// One entry of a single-shot batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleRequest {
    /// Device index
    pub device: u32,
    /// Subdevice index
    pub subdevice: u32,
    /// Channel index
    pub channel: u32,
    /// Read or write
    pub direction: Direction,
    /// Value to write; ignored for input entries
    pub value: i32,
    /// Driver timeout in milliseconds, 0 waits forever
    pub timeout_ms: u32,
    /// Width and trigger flags
    pub flags: SingleFlags,
}

impl SingleRequest {
    /// Input request.
    pub fn read(device: u32, subdevice: u32, channel: u32) -> Self {
        Self {
            device,
            subdevice,
            channel,
            direction: Direction::Input,
            value: 0,
            timeout_ms: 0,
            flags: SingleFlags::empty(),
        }
    }

    /// Output request.
    pub fn write(device: u32, subdevice: u32, channel: u32, value: i32) -> Self {
        Self {
            direction: Direction::Output,
            value,
            ..Self::read(device, subdevice, channel)
        }
    }

    /// Set the per-entry timeout.
    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the per-entry flags.
    pub fn with_flags(mut self, flags: SingleFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Result of one batch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleOutcome {
    /// Value read (inputs) or echoed (outputs)
    pub value: i32,
    /// Driver result, `SUCCESS` when the entry went through
    pub code: ErrorCode,
}

impl SingleOutcome {
    /// Successful outcome.
    pub fn ok(value: i32) -> Self {
        Self {
            value,
            code: ErrorCode::SUCCESS,
        }
    }

    /// Failed outcome.
    pub fn failed(code: ErrorCode) -> Self {
        Self { value: 0, code }
    }

    /// Check whether the entry succeeded.
    pub fn is_ok(&self) -> bool {
        self.code.is_success()
    }
}

/// Outcomes of a single-shot batch, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    outcomes: Vec<SingleOutcome>,
}

impl BatchReport {
    pub(crate) fn new(outcomes: Vec<SingleOutcome>) -> Self {
        Self { outcomes }
    }

    /// All outcomes.
    pub fn outcomes(&self) -> &[SingleOutcome] {
        &self.outcomes
    }

    /// Outcome of entry `index`.
    pub fn get(&self, index: usize) -> Option<&SingleOutcome> {
        self.outcomes.get(index)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True for an empty batch.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Check whether every entry succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(SingleOutcome::is_ok)
    }

    /// Indices and codes of failed entries.
    pub fn failures(&self) -> impl Iterator<Item = (usize, ErrorCode)> + '_ {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| !outcome.is_ok())
            .map(|(index, outcome)| (index, outcome.code))
    }
}

impl Session {
    /// Program one channel for single-shot transfers.
    pub fn single_config(&self, config: &SingleConfig) -> Result<()> {
        let transport = self.transport()?;
        config.validate()?;
        debug!(
            device = config.device,
            subdevice = config.subdevice,
            channel = config.channel,
            mode = ?config.mode,
            "Single config"
        );
        transport.single_config(config).io("single_config")
    }

    /// Execute a batch of single-shot transfers.
    ///
    /// Returns `Ok` even when individual entries failed; inspect the report.
    pub fn single(&self, requests: &[SingleRequest], flags: SingleBatchFlags) -> Result<BatchReport> {
        let transport = self.transport()?;
        if requests.is_empty() {
            return Err(MeidsError::invalid("single batch is empty"));
        }
        for (index, request) in requests.iter().enumerate() {
            check_dio_width(request.flags.bits(), &format!("single entry {}", index))?;
        }

        let outcomes = transport.single(requests, flags).io("single")?;
        if outcomes.len() != requests.len() {
            return Err(MeidsError::Io {
                operation: "single",
                code: ErrorCode::INTERNAL,
            });
        }

        let report = BatchReport::new(outcomes);
        for (index, code) in report.failures() {
            warn!(index, %code, "Single entry failed");
        }
        trace!(entries = report.len(), "Single batch done");
        Ok(report)
    }

    /// Read one value. Entry failures become errors.
    pub fn read_single(&self, device: u32, subdevice: u32, channel: u32) -> Result<i32> {
        self.single_one(SingleRequest::read(device, subdevice, channel))
    }

    /// Write one value. Entry failures become errors.
    pub fn write_single(&self, device: u32, subdevice: u32, channel: u32, value: i32) -> Result<()> {
        self.single_one(SingleRequest::write(device, subdevice, channel, value))
            .map(|_| ())
    }

    fn single_one(&self, request: SingleRequest) -> Result<i32> {
        let report = self.single(&[request], SingleBatchFlags::empty())?;
        match report.get(0) {
            Some(outcome) if outcome.is_ok() => Ok(outcome.value),
            Some(outcome) => Err(MeidsError::Io {
                operation: "single",
                code: outcome.code,
            }),
            None => Err(MeidsError::Io {
                operation: "single",
                code: ErrorCode::INTERNAL,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let read = SingleRequest::read(0, 1, 2).with_timeout(100);
        assert_eq!(read.direction, Direction::Input);
        assert_eq!(read.timeout_ms, 100);

        let write = SingleRequest::write(0, 1, 2, 42).with_flags(SingleFlags::DIO_BYTE);
        assert_eq!(write.direction, Direction::Output);
        assert_eq!(write.value, 42);
        assert_eq!(write.flags, SingleFlags::DIO_BYTE);
    }

    #[test]
    fn test_config_validation() {
        let good = SingleConfig::new(0, 2, 0, SingleConfigMode::DioOutput)
            .with_flags(SingleConfigFlags::DIO_BYTE);
        assert!(good.validate().is_ok());

        let bad = good
            .clone()
            .with_flags(SingleConfigFlags::DIO_BYTE | SingleConfigFlags::DIO_WORD);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_report_failures() {
        let report = BatchReport::new(vec![
            SingleOutcome::ok(1),
            SingleOutcome::failed(ErrorCode::INVALID_CHANNEL),
            SingleOutcome::ok(3),
        ]);
        assert!(!report.all_succeeded());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures, vec![(1, ErrorCode::INVALID_CHANNEL)]);
    }
}

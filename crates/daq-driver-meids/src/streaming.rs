//! Streaming I/O: channel lists, composite triggers and buffered transfer.
//!
//! A streaming subdevice moves through
//! `Idle -> Configured -> Running -> (Idle | Error)`:
//!
//! 1. [`Session::stream_config`] programs the channel list (the scan
//!    pattern) and a [`StreamTrigger`].
//! 2. [`Session::stream_start`] starts one or more subdevices.
//! 3. [`Session::stream_read`] / [`Session::stream_write`] move data.
//!    Non-blocking transfers may move fewer values than requested.
//! 4. [`Session::stream_stop`] ends the run.
//!
//! # Trigger stages
//!
//! A trigger has three start stages (acquisition, scan, conversion) and two
//! stop stages (scan, acquisition). Each stage carries exactly
//! [`TRIGGER_ARGS_COUNT`] auxiliary arguments as a [`TriggerArgs`]; slices
//! of any other length are rejected when the trigger is built or modified.
//!
//! # Example
//!
//! ```no_run
//! use daq_driver_meids::{
//!     ReadMode, Session, StartMode, StopMode, StreamChannelConfig, StreamConfigFlags,
//!     StreamTrigger, Timer,
//! };
//! use daq_driver_meids::simulated::SimulatedDriver;
//! use std::sync::Arc;
//!
//! # fn example() -> daq_driver_meids::Result<()> {
//! let session = Session::open(Arc::new(SimulatedDriver::default()))?;
//! let conv = session.frequency_to_ticks(0, 0, Timer::ConvStart, 10_000.0)?;
//!
//! let trigger = StreamTrigger::builder()
//!     .software_start()
//!     .scan_follow()
//!     .conv_timer(conv.ticks)
//!     .stop_after_scans(1000)
//!     .build()?;
//!
//! let channels = [StreamChannelConfig::new(0, 0), StreamChannelConfig::new(1, 0)];
//! session.stream_config(0, 0, &channels, &trigger, 0, StreamConfigFlags::empty())?;
//! session.start_stream(0, 0, StartMode::Blocking, 1000)?;
//! let values = session.stream_read(0, 0, ReadMode::Blocking, 2000)?;
//! session.stop_stream(0, 0, StopMode::LastValue)?;
//! # Ok(())
//! # }
//! ```

use tracing::{debug, info, trace, warn};

use crate::error::{ErrorCode, IoContext, MeidsError, Result};
use crate::session::Session;
use crate::transport::{StatusReport, TransportResult};
use crate::types::{
    ReadMode, Reference, StartFlags, StartMode, StopFlags, StopMode, StreamChannelFlags,
    StreamConfigFlags, TriggerChannel, TriggerEdge, TriggerType, WaitMode, WriteMode,
};

/// Number of auxiliary arguments carried by every trigger stage.
pub const TRIGGER_ARGS_COUNT: usize = meids_sys::ME_TRIGGER_ARGS_COUNT;

/// One channel of a stream's scan pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamChannelConfig {
    /// Channel index
    pub channel: u32,
    /// Range index (see [`Session::range_info`])
    pub range: u32,
    /// Ground reference of the input or output
    pub reference: Reference,
    /// Per-channel stream flags
    pub flags: StreamChannelFlags,
}

impl StreamChannelConfig {
    /// Channel with ground reference.
    pub fn new(channel: u32, range: u32) -> Self {
        Self {
            channel,
            range,
            reference: Reference::AiGround,
            flags: StreamChannelFlags::empty(),
        }
    }

    /// Set the signal reference.
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = reference;
        self
    }

    /// Set the channel flags.
    pub fn with_flags(mut self, flags: StreamChannelFlags) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn to_ffi(self) -> Result<meids_sys::meIOStreamConfig_t> {
        Ok(meids_sys::meIOStreamConfig_t {
            iChannel: to_c_int(self.channel, "channel")?,
            iStreamConfig: to_c_int(self.range, "range")?,
            iRef: self.reference.to_raw(),
            iFlags: self.flags.bits(),
        })
    }
}

/// Exactly [`TRIGGER_ARGS_COUNT`] auxiliary trigger arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TriggerArgs([i32; TRIGGER_ARGS_COUNT]);

impl TriggerArgs {
    /// Wrap a fixed-size array.
    pub fn new(args: [i32; TRIGGER_ARGS_COUNT]) -> Self {
        Self(args)
    }

    /// Copy from a slice that must hold exactly ten values.
    pub fn from_slice(args: &[i32]) -> Result<Self> {
        <[i32; TRIGGER_ARGS_COUNT]>::try_from(args)
            .map(Self)
            .map_err(|_| {
                MeidsError::invalid(format!(
                    "trigger arguments need exactly {} values, got {}",
                    TRIGGER_ARGS_COUNT,
                    args.len()
                ))
            })
    }

    /// The arguments.
    pub fn as_array(&self) -> &[i32; TRIGGER_ARGS_COUNT] {
        &self.0
    }
}

impl TryFrom<&[i32]> for TriggerArgs {
    type Error = MeidsError;

    fn try_from(args: &[i32]) -> Result<Self> {
        Self::from_slice(args)
    }
}

impl TryFrom<Vec<i32>> for TriggerArgs {
    type Error = MeidsError;

    fn try_from(args: Vec<i32>) -> Result<Self> {
        Self::from_slice(&args)
    }
}

/// Acquisition start stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcqStartStage {
    /// How the stage is triggered
    pub trigger_type: TriggerType,
    /// Edge or level of an external trigger
    pub edge: TriggerEdge,
    /// Trigger input for external triggers
    pub channel: TriggerChannel,
    /// Start delay in timer ticks
    pub ticks: u64,
    /// Type-specific trigger arguments
    pub args: TriggerArgs,
}

/// Scan or conversion start stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartStage {
    /// How the stage is triggered
    pub trigger_type: TriggerType,
    /// Timer period in ticks
    pub ticks: u64,
    /// Type-specific trigger arguments
    pub args: TriggerArgs,
}

/// Scan or acquisition stop stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopStage {
    /// How the stage is triggered
    pub trigger_type: TriggerType,
    /// Scans or values before stopping
    pub count: u32,
    /// Type-specific trigger arguments
    pub args: TriggerArgs,
}

/// Composite trigger of a streaming subdevice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTrigger {
    /// Starts the acquisition
    pub acq_start: AcqStartStage,
    /// Starts each scan
    pub scan_start: StartStage,
    /// Starts each conversion
    pub conv_start: StartStage,
    /// Ends scanning after a count
    pub scan_stop: StopStage,
    /// Ends the acquisition
    pub acq_stop: StopStage,
}

impl Default for StreamTrigger {
    fn default() -> Self {
        Self {
            acq_start: AcqStartStage {
                trigger_type: TriggerType::Software,
                edge: TriggerEdge::None,
                channel: TriggerChannel::Default,
                ticks: 0,
                args: TriggerArgs::default(),
            },
            scan_start: StartStage {
                trigger_type: TriggerType::Follow,
                ticks: 0,
                args: TriggerArgs::default(),
            },
            conv_start: StartStage {
                trigger_type: TriggerType::Timer,
                ticks: 0,
                args: TriggerArgs::default(),
            },
            scan_stop: StopStage {
                trigger_type: TriggerType::None,
                count: 0,
                args: TriggerArgs::default(),
            },
            acq_stop: StopStage {
                trigger_type: TriggerType::None,
                count: 0,
                args: TriggerArgs::default(),
            },
        }
    }
}

/// How many values an acquisition produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionLength {
    /// Runs until stopped
    Continuous,
    /// Ends by itself after this many values
    Values(u64),
}

impl StreamTrigger {
    /// Create a new builder.
    pub fn builder() -> StreamTriggerBuilder {
        StreamTriggerBuilder::default()
    }

    /// Replace the acquisition start arguments.
    pub fn set_acq_start_args(&mut self, args: &[i32]) -> Result<()> {
        self.acq_start.args = TriggerArgs::from_slice(args)?;
        Ok(())
    }

    /// Replace the scan start arguments.
    pub fn set_scan_start_args(&mut self, args: &[i32]) -> Result<()> {
        self.scan_start.args = TriggerArgs::from_slice(args)?;
        Ok(())
    }

    /// Replace the conversion start arguments.
    pub fn set_conv_start_args(&mut self, args: &[i32]) -> Result<()> {
        self.conv_start.args = TriggerArgs::from_slice(args)?;
        Ok(())
    }

    /// Replace the scan stop arguments.
    pub fn set_scan_stop_args(&mut self, args: &[i32]) -> Result<()> {
        self.scan_stop.args = TriggerArgs::from_slice(args)?;
        Ok(())
    }

    /// Replace the acquisition stop arguments.
    pub fn set_acq_stop_args(&mut self, args: &[i32]) -> Result<()> {
        self.acq_stop.args = TriggerArgs::from_slice(args)?;
        Ok(())
    }

    /// Check the stage combination the way the driver does and work out
    /// how many values the acquisition will deliver.
    pub fn plan(&self, channel_count: usize) -> TransportResult<AcquisitionLength> {
        use TriggerType::{Count, ExtAnalog, ExtDigital, Follow, Software, Timer};

        if channel_count == 0 {
            return Err(ErrorCode::INVALID_CONFIG_LIST_COUNT);
        }

        let acq = self.acq_start.trigger_type;
        let scan = self.scan_start.trigger_type;
        let conv = self.conv_start.trigger_type;

        if !matches!(acq, Software | ExtDigital | ExtAnalog) {
            return Err(ErrorCode::INVALID_ACQ_START_TRIG_TYPE);
        }
        if acq.is_external() {
            let edge_ok = match acq {
                ExtAnalog => !matches!(self.acq_start.edge, TriggerEdge::None),
                _ => matches!(
                    self.acq_start.edge,
                    TriggerEdge::Rising | TriggerEdge::Falling | TriggerEdge::Any
                ),
            };
            if !edge_ok {
                return Err(ErrorCode::INVALID_ACQ_START_TRIG_EDGE);
            }
        }
        if !matches!(scan, Timer | Follow | ExtDigital | ExtAnalog) {
            return Err(ErrorCode::INVALID_SCAN_START_TRIG_TYPE);
        }
        if !matches!(conv, Timer | ExtDigital | ExtAnalog) {
            return Err(ErrorCode::INVALID_CONV_START_TRIG_TYPE);
        }
        // External scan or conversion triggers share the acquisition's line
        if (scan.is_external() && scan != acq) || (conv.is_external() && conv != acq) {
            return Err(ErrorCode::INVALID_ACQ_START_TRIG_TYPE);
        }
        let scan_ticks_ok = match scan {
            Timer => self.scan_start.ticks > 0,
            _ => self.scan_start.ticks == 0,
        };
        if !scan_ticks_ok {
            return Err(ErrorCode::INVALID_SCAN_START_ARG);
        }
        if conv == Timer && self.conv_start.ticks == 0 {
            return Err(ErrorCode::INVALID_CONV_START_ARG);
        }

        match self.scan_stop.trigger_type {
            TriggerType::None => {}
            Count if self.scan_stop.count > 0 => {}
            Count => return Err(ErrorCode::INVALID_SCAN_STOP_ARG),
            _ => return Err(ErrorCode::INVALID_SCAN_STOP_TRIG_TYPE),
        }

        let scan_stop_none = self.scan_stop.trigger_type == TriggerType::None;
        match self.acq_stop.trigger_type {
            TriggerType::None if scan_stop_none => Ok(AcquisitionLength::Continuous),
            Count if scan_stop_none => {
                if self.acq_stop.count == 0 {
                    return Err(ErrorCode::INVALID_ACQ_STOP_ARG);
                }
                Ok(AcquisitionLength::Values(
                    u64::from(self.acq_stop.count) * channel_count as u64,
                ))
            }
            Follow if !scan_stop_none => {
                Ok(AcquisitionLength::Values(u64::from(self.scan_stop.count)))
            }
            _ => Err(ErrorCode::INVALID_ACQ_STOP_TRIG_TYPE),
        }
    }

    pub(crate) fn to_ffi(&self) -> Result<meids_sys::meIOStreamTrigger_t> {
        let (acq_low, acq_high) = split_ticks(self.acq_start.ticks);
        let (scan_low, scan_high) = split_ticks(self.scan_start.ticks);
        let (conv_low, conv_high) = split_ticks(self.conv_start.ticks);

        Ok(meids_sys::meIOStreamTrigger_t {
            iAcqStartTrigType: self.acq_start.trigger_type.to_raw(),
            iAcqStartTrigEdge: self.acq_start.edge.to_raw(),
            iAcqStartTrigChan: self.acq_start.channel.to_raw(),
            iAcqStartTicksLow: acq_low,
            iAcqStartTicksHigh: acq_high,
            iAcqStartArgs: *self.acq_start.args.as_array(),
            iScanStartTrigType: self.scan_start.trigger_type.to_raw(),
            iScanStartTicksLow: scan_low,
            iScanStartTicksHigh: scan_high,
            iScanStartArgs: *self.scan_start.args.as_array(),
            iConvStartTrigType: self.conv_start.trigger_type.to_raw(),
            iConvStartTicksLow: conv_low,
            iConvStartTicksHigh: conv_high,
            iConvStartArgs: *self.conv_start.args.as_array(),
            iScanStopTrigType: self.scan_stop.trigger_type.to_raw(),
            iScanStopCount: to_c_int(self.scan_stop.count, "scan stop count")?,
            iScanStopArgs: *self.scan_stop.args.as_array(),
            iAcqStopTrigType: self.acq_stop.trigger_type.to_raw(),
            iAcqStopCount: to_c_int(self.acq_stop.count, "acquisition stop count")?,
            iAcqStopArgs: *self.acq_stop.args.as_array(),
            iFlags: meids_sys::ME_IO_STREAM_TRIGGER_TYPE_NO_FLAGS,
        })
    }
}

/// Split a 64-bit tick count into the driver's low/high words.
fn split_ticks(ticks: u64) -> (i32, i32) {
    ((ticks & 0xFFFF_FFFF) as u32 as i32, (ticks >> 32) as u32 as i32)
}

pub(crate) fn to_c_int(value: u32, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| MeidsError::invalid(format!("{} {} is too large", what, value)))
}

/// Builder for [`StreamTrigger`].
///
/// Argument slices are only checked by [`build`](Self::build), so a
/// mis-sized slice for any stage makes the whole build fail.
#[derive(Debug, Clone, Default)]
pub struct StreamTriggerBuilder {
    trigger: StreamTrigger,
    acq_start_args: Option<Vec<i32>>,
    scan_start_args: Option<Vec<i32>>,
    conv_start_args: Option<Vec<i32>>,
    scan_stop_args: Option<Vec<i32>>,
    acq_stop_args: Option<Vec<i32>>,
}

impl StreamTriggerBuilder {
    /// Start on the software start call.
    pub fn software_start(mut self) -> Self {
        self.trigger.acq_start.trigger_type = TriggerType::Software;
        self.trigger.acq_start.edge = TriggerEdge::None;
        self
    }

    /// Start on an external trigger line.
    pub fn external_start(mut self, kind: TriggerType, edge: TriggerEdge, channel: TriggerChannel) -> Self {
        self.trigger.acq_start.trigger_type = kind;
        self.trigger.acq_start.edge = edge;
        self.trigger.acq_start.channel = channel;
        self
    }

    /// Delay between start trigger and first scan.
    pub fn acq_start_delay(mut self, ticks: u64) -> Self {
        self.trigger.acq_start.ticks = ticks;
        self
    }

    /// Start scans from the scan timer.
    pub fn scan_timer(mut self, ticks: u64) -> Self {
        self.trigger.scan_start = StartStage {
            trigger_type: TriggerType::Timer,
            ticks,
            ..self.trigger.scan_start
        };
        self
    }

    /// Start each scan right after the previous one.
    pub fn scan_follow(mut self) -> Self {
        self.trigger.scan_start = StartStage {
            trigger_type: TriggerType::Follow,
            ticks: 0,
            ..self.trigger.scan_start
        };
        self
    }

    /// Start each scan on the external trigger.
    pub fn scan_external(mut self, kind: TriggerType) -> Self {
        self.trigger.scan_start = StartStage {
            trigger_type: kind,
            ticks: 0,
            ..self.trigger.scan_start
        };
        self
    }

    /// Pace conversions with the conversion timer.
    pub fn conv_timer(mut self, ticks: u64) -> Self {
        self.trigger.conv_start = StartStage {
            trigger_type: TriggerType::Timer,
            ticks,
            ..self.trigger.conv_start
        };
        self
    }

    /// Pace conversions with the external trigger.
    pub fn conv_external(mut self, kind: TriggerType) -> Self {
        self.trigger.conv_start = StartStage {
            trigger_type: kind,
            ticks: 0,
            ..self.trigger.conv_start
        };
        self
    }

    /// Run until stopped.
    pub fn continuous(mut self) -> Self {
        self.trigger.scan_stop.trigger_type = TriggerType::None;
        self.trigger.scan_stop.count = 0;
        self.trigger.acq_stop.trigger_type = TriggerType::None;
        self.trigger.acq_stop.count = 0;
        self
    }

    /// Stop after `scans` complete scans of the channel list.
    pub fn stop_after_scans(mut self, scans: u32) -> Self {
        self.trigger.scan_stop.trigger_type = TriggerType::None;
        self.trigger.scan_stop.count = 0;
        self.trigger.acq_stop.trigger_type = TriggerType::Count;
        self.trigger.acq_stop.count = scans;
        self
    }

    /// Stop after `values` individual conversions.
    pub fn stop_after_values(mut self, values: u32) -> Self {
        self.trigger.scan_stop.trigger_type = TriggerType::Count;
        self.trigger.scan_stop.count = values;
        self.trigger.acq_stop.trigger_type = TriggerType::Follow;
        self.trigger.acq_stop.count = 0;
        self
    }

    /// Acquisition start arguments (ten values).
    pub fn acq_start_args(mut self, args: &[i32]) -> Self {
        self.acq_start_args = Some(args.to_vec());
        self
    }

    /// Scan start arguments (ten values).
    pub fn scan_start_args(mut self, args: &[i32]) -> Self {
        self.scan_start_args = Some(args.to_vec());
        self
    }

    /// Conversion start arguments (ten values).
    pub fn conv_start_args(mut self, args: &[i32]) -> Self {
        self.conv_start_args = Some(args.to_vec());
        self
    }

    /// Scan stop arguments (ten values).
    pub fn scan_stop_args(mut self, args: &[i32]) -> Self {
        self.scan_stop_args = Some(args.to_vec());
        self
    }

    /// Acquisition stop arguments (ten values).
    pub fn acq_stop_args(mut self, args: &[i32]) -> Self {
        self.acq_stop_args = Some(args.to_vec());
        self
    }

    /// Build the trigger.
    pub fn build(self) -> Result<StreamTrigger> {
        let mut trigger = self.trigger;
        if let Some(args) = self.acq_start_args {
            trigger.set_acq_start_args(&args)?;
        }
        if let Some(args) = self.scan_start_args {
            trigger.set_scan_start_args(&args)?;
        }
        if let Some(args) = self.conv_start_args {
            trigger.set_conv_start_args(&args)?;
        }
        if let Some(args) = self.scan_stop_args {
            trigger.set_scan_stop_args(&args)?;
        }
        if let Some(args) = self.acq_stop_args {
            trigger.set_acq_stop_args(&args)?;
        }
        Ok(trigger)
    }
}

/// Start request for one subdevice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartRequest {
    /// Device index
    pub device: u32,
    /// Subdevice index
    pub subdevice: u32,
    /// Return at once or wait until running
    pub mode: StartMode,
    /// Driver timeout in milliseconds, 0 waits forever
    pub timeout_ms: u32,
    /// Start flags
    pub flags: StartFlags,
}

impl StartRequest {
    /// Start request without flags.
    pub fn new(device: u32, subdevice: u32, mode: StartMode, timeout_ms: u32) -> Self {
        Self {
            device,
            subdevice,
            mode,
            timeout_ms,
            flags: StartFlags::empty(),
        }
    }

    /// Set the entry flags.
    pub fn with_flags(mut self, flags: StartFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Stop request for one subdevice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopRequest {
    /// Device index
    pub device: u32,
    /// Subdevice index
    pub subdevice: u32,
    /// Stop at once or after the last value
    pub mode: StopMode,
    /// Stop flags
    pub flags: StopFlags,
}

impl StopRequest {
    /// Stop request without flags.
    pub fn new(device: u32, subdevice: u32, mode: StopMode) -> Self {
        Self {
            device,
            subdevice,
            mode,
            flags: StopFlags::empty(),
        }
    }

    /// Set the entry flags.
    pub fn with_flags(mut self, flags: StopFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Result of one start or stop entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEntryOutcome {
    /// Device index
    pub device: u32,
    /// Subdevice index
    pub subdevice: u32,
    /// Driver result, `SUCCESS` when the entry went through
    pub code: ErrorCode,
}

impl StreamEntryOutcome {
    /// Check whether the entry succeeded.
    pub fn is_ok(&self) -> bool {
        self.code.is_success()
    }
}

impl Session {
    /// Program the channel list and trigger of a streaming subdevice.
    pub fn stream_config(
        &self,
        device: u32,
        subdevice: u32,
        channels: &[StreamChannelConfig],
        trigger: &StreamTrigger,
        fifo_threshold: u32,
        flags: StreamConfigFlags,
    ) -> Result<()> {
        let transport = self.transport()?;
        if channels.is_empty() {
            return Err(MeidsError::invalid("stream channel list is empty"));
        }
        debug!(
            device,
            subdevice,
            channels = channels.len(),
            acq_start = ?trigger.acq_start.trigger_type,
            scan_start = ?trigger.scan_start.trigger_type,
            conv_start = ?trigger.conv_start.trigger_type,
            "Stream config"
        );
        transport
            .stream_config(device, subdevice, channels, trigger, fifo_threshold, flags)
            .io("stream_config")
    }

    /// Start a batch of subdevices. Entry failures are reported per entry.
    pub fn stream_start(&self, requests: &[StartRequest]) -> Result<Vec<StreamEntryOutcome>> {
        let transport = self.transport()?;
        if requests.is_empty() {
            return Err(MeidsError::invalid("stream start list is empty"));
        }
        let outcomes = transport.stream_start(requests).io("stream_start")?;
        log_entries("start", &outcomes);
        Ok(outcomes)
    }

    /// Stop a batch of subdevices. Entry failures are reported per entry.
    pub fn stream_stop(&self, requests: &[StopRequest]) -> Result<Vec<StreamEntryOutcome>> {
        let transport = self.transport()?;
        if requests.is_empty() {
            return Err(MeidsError::invalid("stream stop list is empty"));
        }
        let outcomes = transport.stream_stop(requests).io("stream_stop")?;
        log_entries("stop", &outcomes);
        Ok(outcomes)
    }

    /// Start one subdevice; an entry failure becomes an error.
    pub fn start_stream(&self, device: u32, subdevice: u32, mode: StartMode, timeout_ms: u32) -> Result<()> {
        let outcomes = self.stream_start(&[StartRequest::new(device, subdevice, mode, timeout_ms)])?;
        single_entry("stream_start", &outcomes)
    }

    /// Stop one subdevice; an entry failure becomes an error.
    pub fn stop_stream(&self, device: u32, subdevice: u32, mode: StopMode) -> Result<()> {
        let outcomes = self.stream_stop(&[StopRequest::new(device, subdevice, mode)])?;
        single_entry("stream_stop", &outcomes)
    }

    /// Read up to `count` values.
    ///
    /// Blocking reads return `count` values unless the acquisition ends
    /// first. Non-blocking reads return what is available, possibly fewer.
    pub fn stream_read(&self, device: u32, subdevice: u32, mode: ReadMode, count: usize) -> Result<Vec<i32>> {
        let mut buffer = vec![0; count];
        let n = self.stream_read_into(device, subdevice, mode, &mut buffer)?;
        buffer.truncate(n);
        Ok(buffer)
    }

    /// Read into `buffer`, returning how many values were stored.
    pub fn stream_read_into(&self, device: u32, subdevice: u32, mode: ReadMode, buffer: &mut [i32]) -> Result<usize> {
        let transport = self.transport()?;
        if buffer.is_empty() {
            return Err(MeidsError::invalid("stream read of zero values"));
        }
        let n = transport
            .stream_read(device, subdevice, mode, buffer)
            .io("stream_read")?;
        trace!(device, subdevice, requested = buffer.len(), read = n, "Stream read");
        Ok(n.min(buffer.len()))
    }

    /// Write values, returning how many the driver accepted.
    ///
    /// `WriteMode::Preload` fills the output buffer of a configured but not
    /// yet started subdevice.
    pub fn stream_write(&self, device: u32, subdevice: u32, mode: WriteMode, values: &[i32]) -> Result<usize> {
        let transport = self.transport()?;
        if values.is_empty() {
            return Err(MeidsError::invalid("stream write of zero values"));
        }
        let n = transport
            .stream_write(device, subdevice, mode, values)
            .io("stream_write")?;
        trace!(device, subdevice, offered = values.len(), written = n, "Stream write");
        Ok(n)
    }

    /// Stream state, optionally waiting until the subdevice is idle.
    pub fn stream_status(&self, device: u32, subdevice: u32, wait: WaitMode) -> Result<StatusReport> {
        self.transport()?
            .stream_status(device, subdevice, wait)
            .io("stream_status")
    }

    /// Number of values ready to read, waiting up to `timeout_ms` for new ones.
    pub fn stream_new_values(&self, device: u32, subdevice: u32, timeout_ms: u32) -> Result<usize> {
        self.transport()?
            .stream_new_values(device, subdevice, timeout_ms)
            .io("stream_new_values")
    }
}

fn log_entries(what: &str, outcomes: &[StreamEntryOutcome]) {
    for outcome in outcomes {
        if outcome.is_ok() {
            info!(device = outcome.device, subdevice = outcome.subdevice, "Stream {}", what);
        } else {
            warn!(
                device = outcome.device,
                subdevice = outcome.subdevice,
                code = %outcome.code,
                "Stream {} failed",
                what
            );
        }
    }
}

fn single_entry(operation: &'static str, outcomes: &[StreamEntryOutcome]) -> Result<()> {
    match outcomes.first() {
        Some(outcome) if outcome.is_ok() => Ok(()),
        Some(outcome) => Err(MeidsError::Io {
            operation,
            code: outcome.code,
        }),
        None => Err(MeidsError::Io {
            operation,
            code: ErrorCode::INTERNAL,
        }),
    }
}

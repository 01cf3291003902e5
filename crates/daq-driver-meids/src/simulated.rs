//! In-process simulated ME-iDS driver.
//!
//! [`SimulatedDriver`] implements [`DriverTransport`] over the installation
//! described by a [`SystemConfig`]. It enforces the same contract as the
//! real driver: open reference counting, the lock hierarchy, single I/O
//! configuration rules, trigger validation and the stream state machine.
//!
//! Every handle obtained from [`SimulatedDriver::connect`] is a separate
//! lock owner, so two sessions in one process contend like two processes.
//!
//! Input streams deliver a deterministic sawtooth per channel:
//!
//! ```text
//! code(scan, channel) = (scan * 97 + channel * 4099) % (max_data + 1)
//! ```
//!
//! unless a fixed level was forced with [`SimulatedDriver::set_input_level`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::config::{RangeConfig, SubdeviceConfig, SystemConfig};
use crate::error::{ErrorCode, MeidsError, Result};
use crate::single::{SingleConfig, SingleOutcome, SingleRequest};
use crate::streaming::{
    AcquisitionLength, StartRequest, StopRequest, StreamChannelConfig, StreamEntryOutcome,
    StreamTrigger,
};
use crate::timing::Ticks;
use crate::transport::{DeviceInfo, DriverTransport, RangeInfo, StatusReport, TransportResult};
use crate::types::{
    CapabilityArg, CloseFlags, Direction, LockMode, ReadMode, Reference, SingleBatchFlags,
    SingleConfigMode, SingleFlags, StopFlags, StopMode, StreamConfigFlags, StreamStatus,
    SubdeviceCaps, SubdeviceSubtype, SubdeviceType, Timer, TriggerType, Unit, WaitMode, WriteMode,
};

type Owner = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unconfigured,
    Configured,
    Running,
    Error,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    mode: Option<SingleConfigMode>,
    /// Last value written by single or stream output
    level: Option<i32>,
    /// Fixed input code set by tests
    forced_input: Option<i32>,
}

#[derive(Debug)]
struct StreamState {
    phase: Phase,
    channels: Vec<StreamChannelConfig>,
    flags: StreamConfigFlags,
    length: AcquisitionLength,
    /// Values delivered to or taken from the client since start
    position: u64,
    /// End of readable data once the acquisition is no longer running
    limit: u64,
    preload: Vec<i32>,
}

impl StreamState {
    fn new() -> Self {
        Self {
            phase: Phase::Unconfigured,
            channels: Vec::new(),
            flags: StreamConfigFlags::empty(),
            length: AcquisitionLength::Continuous,
            position: 0,
            limit: 0,
            preload: Vec::new(),
        }
    }

    /// Input values that can still be read.
    fn remaining(&self) -> u64 {
        match (self.phase, self.length) {
            (Phase::Running, AcquisitionLength::Continuous) => u64::MAX,
            (Phase::Running, AcquisitionLength::Values(total)) => total.saturating_sub(self.position),
            _ => self.limit.saturating_sub(self.position),
        }
    }

    /// Leave the running state keeping `unread` values readable.
    fn halt(&mut self, unread: u64) {
        self.phase = Phase::Configured;
        self.limit = self.position + unread;
    }
}

#[derive(Debug)]
struct SubdeviceState {
    config: SubdeviceConfig,
    lock: Option<Owner>,
    channels: Vec<ChannelState>,
    stream: StreamState,
}

impl SubdeviceState {
    fn new(config: SubdeviceConfig) -> Self {
        let channels = vec![ChannelState::default(); config.channels as usize];
        Self {
            config,
            lock: None,
            channels,
            stream: StreamState::new(),
        }
    }

    fn is_output(&self) -> bool {
        matches!(
            self.config.subdevice_type,
            SubdeviceType::AnalogOutput | SubdeviceType::DigitalOutput | SubdeviceType::FrequencyOutput
        )
    }

    fn is_streaming(&self) -> bool {
        self.config.subtype == SubdeviceSubtype::Streaming
    }

    fn range(&self, index: u32) -> Option<&RangeConfig> {
        self.config.ranges.get(index as usize)
    }

    fn max_data(&self, range: u32) -> i64 {
        self.range(range).map_or(0xFFFF, |r| i64::from(r.max_data))
    }

    fn channel(&self, channel: u32) -> TransportResult<&ChannelState> {
        self.channels
            .get(channel as usize)
            .ok_or(ErrorCode::INVALID_CHANNEL)
    }

    fn channel_mut(&mut self, channel: u32) -> TransportResult<&mut ChannelState> {
        self.channels
            .get_mut(channel as usize)
            .ok_or(ErrorCode::INVALID_CHANNEL)
    }

    /// Range index a channel was configured with, 0 if none.
    fn configured_range(&self, channel: u32) -> u32 {
        match self.channels.get(channel as usize).and_then(|c| c.mode) {
            Some(SingleConfigMode::Range(index)) => index,
            _ => 0,
        }
    }

    fn capacity(&self, cap: CapabilityArg) -> Option<usize> {
        self.config
            .caps_args
            .iter()
            .find(|arg| arg.cap == cap)
            .and_then(|arg| arg.values.first())
            .and_then(|&v| usize::try_from(v).ok())
    }

    fn reset(&mut self) {
        self.channels.iter_mut().for_each(|c| *c = ChannelState::default());
        self.stream = StreamState::new();
    }

    /// Input code of one stream position.
    fn sample(&self, position: u64) -> i32 {
        let n = self.stream.channels.len() as u64;
        let entry = self.stream.channels[(position % n) as usize];
        if let Some(code) = self
            .channels
            .get(entry.channel as usize)
            .and_then(|c| c.forced_input)
        {
            return code;
        }
        let scan = position / n;
        let modulus = self.max_data(entry.range) as u64 + 1;
        ((scan * 97 + u64::from(entry.channel) * 4099) % modulus) as i32
    }
}

/// Code of 0 in a range, or its lower end for unipolar ranges.
fn zero_code(range: Option<&RangeConfig>) -> i32 {
    match range {
        Some(r) if r.min < 0.0 && r.max > 0.0 => {
            ((-r.min) / (r.max - r.min) * f64::from(r.max_data) + 0.5).floor() as i32
        }
        Some(r) if r.max <= 0.0 => r.max_data as i32,
        _ => 0,
    }
}

#[derive(Debug)]
struct DeviceState {
    lock: Option<Owner>,
    subdevices: Vec<SubdeviceState>,
}

#[derive(Debug)]
struct SystemState {
    config: SystemConfig,
    next_owner: Owner,
    opens: HashMap<Owner, u32>,
    driver_lock: Option<Owner>,
    devices: Vec<DeviceState>,
}

fn other(lock: Option<Owner>, me: Owner) -> bool {
    matches!(lock, Some(owner) if owner != me)
}

impl SystemState {
    fn new(config: SystemConfig) -> Self {
        let devices = config
            .devices
            .iter()
            .map(|device| DeviceState {
                lock: None,
                subdevices: device.subdevices.iter().cloned().map(SubdeviceState::new).collect(),
            })
            .collect();
        Self {
            config,
            next_owner: 0,
            opens: HashMap::new(),
            driver_lock: None,
            devices,
        }
    }

    fn ensure_open(&self, me: Owner) -> TransportResult<()> {
        match self.opens.get(&me) {
            Some(&count) if count > 0 => Ok(()),
            _ => Err(ErrorCode::NOT_OPEN),
        }
    }

    fn device(&self, device: u32) -> TransportResult<&DeviceState> {
        self.devices
            .get(device as usize)
            .ok_or(ErrorCode::INVALID_DEVICE)
    }

    fn subdevice(&self, device: u32, subdevice: u32) -> TransportResult<&SubdeviceState> {
        self.device(device)?
            .subdevices
            .get(subdevice as usize)
            .ok_or(ErrorCode::INVALID_SUBDEVICE)
    }

    fn subdevice_mut(&mut self, device: u32, subdevice: u32) -> TransportResult<&mut SubdeviceState> {
        self.devices
            .get_mut(device as usize)
            .ok_or(ErrorCode::INVALID_DEVICE)?
            .subdevices
            .get_mut(subdevice as usize)
            .ok_or(ErrorCode::INVALID_SUBDEVICE)
    }

    /// Fail with `LOCKED` if another owner holds the subdevice or anything above it.
    fn check_access(&self, me: Owner, device: u32, subdevice: u32) -> TransportResult<()> {
        let sub = self.subdevice(device, subdevice)?;
        let dev = self.device(device)?;
        if other(self.driver_lock, me) || other(dev.lock, me) || other(sub.lock, me) {
            return Err(ErrorCode::LOCKED);
        }
        Ok(())
    }

    fn device_contended(&self, me: Owner, device: &DeviceState) -> bool {
        other(self.driver_lock, me)
            || other(device.lock, me)
            || device.subdevices.iter().any(|s| other(s.lock, me))
    }

    fn release_all(&mut self, me: Owner) {
        if self.driver_lock == Some(me) {
            self.driver_lock = None;
        }
        for device in &mut self.devices {
            if device.lock == Some(me) {
                device.lock = None;
            }
            for sub in &mut device.subdevices {
                if sub.lock == Some(me) {
                    sub.lock = None;
                }
            }
        }
    }

    fn range_info(&self, device: u32, subdevice: u32, index: u32) -> TransportResult<RangeInfo> {
        let range = self
            .subdevice(device, subdevice)?
            .range(index)
            .ok_or(ErrorCode::INVALID_RANGE)?;
        Ok(RangeInfo {
            index,
            unit: range.unit,
            min: range.min,
            max: range.max,
            max_data: range.max_data,
        })
    }

    fn timer(&self, device: u32, subdevice: u32, timer: Timer) -> TransportResult<crate::timing::TimerSpec> {
        let sub = self.subdevice(device, subdevice)?;
        if !sub.is_streaming() {
            return Err(ErrorCode::NOT_SUPPORTED);
        }
        sub.config.timer(timer).copied().ok_or(ErrorCode::INVALID_TIMER)
    }
}

/// Simulated driver handle; each connected handle is one lock owner.
#[derive(Debug)]
pub struct SimulatedDriver {
    owner: Owner,
    state: Arc<Mutex<SystemState>>,
}

impl Default for SimulatedDriver {
    /// Driver presenting [`SystemConfig::default`].
    fn default() -> Self {
        Self::with_state(Arc::new(Mutex::new(SystemState::new(SystemConfig::default()))))
    }
}

impl SimulatedDriver {
    /// Simulate the installation described by `config`.
    pub fn new(config: SystemConfig) -> Result<Self> {
        config.validate().map_err(MeidsError::from)?;
        Ok(Self::with_state(Arc::new(Mutex::new(SystemState::new(config)))))
    }

    fn with_state(state: Arc<Mutex<SystemState>>) -> Self {
        let owner = {
            let mut guard = state.lock();
            guard.next_owner += 1;
            guard.next_owner
        };
        Self { owner, state }
    }

    /// Another client of the same simulated system, with its own lock identity.
    pub fn connect(&self) -> Self {
        Self::with_state(Arc::clone(&self.state))
    }

    /// Level last written to an output channel.
    pub fn output_level(&self, device: u32, subdevice: u32, channel: u32) -> Option<i32> {
        let state = self.state.lock();
        let sub = state.subdevice(device, subdevice).ok()?;
        let ch = sub.channel(channel).ok()?;
        ch.level
    }

    /// Force the code an input channel reports.
    pub fn set_input_level(&self, device: u32, subdevice: u32, channel: u32, code: i32) -> Result<()> {
        let mut state = self.state.lock();
        let ch = state
            .subdevice_mut(device, subdevice)
            .and_then(|sub| sub.channel_mut(channel))
            .map_err(|code| MeidsError::Io {
                operation: "set_input_level",
                code,
            })?;
        ch.forced_input = Some(code);
        Ok(())
    }

    /// Put a running stream into the error state, as after a buffer overflow.
    pub fn inject_fault(&self, device: u32, subdevice: u32) -> Result<()> {
        let mut state = self.state.lock();
        let sub = state
            .subdevice_mut(device, subdevice)
            .map_err(|code| MeidsError::Io {
                operation: "inject_fault",
                code,
            })?;
        if sub.stream.phase == Phase::Running {
            sub.stream.phase = Phase::Error;
            debug!(device, subdevice, "Injected stream fault");
        }
        Ok(())
    }

    fn with<T>(&self, f: impl FnOnce(&mut SystemState, Owner) -> TransportResult<T>) -> TransportResult<T> {
        let mut state = self.state.lock();
        state.ensure_open(self.owner)?;
        f(&mut state, self.owner)
    }
}

fn check_reference(sub: &SubdeviceState, reference: Reference) -> TransportResult<()> {
    let ok = match sub.config.subdevice_type {
        SubdeviceType::AnalogInput => match reference {
            Reference::None | Reference::AiGround => true,
            Reference::AiDifferential => sub.config.caps.contains(SubdeviceCaps::AI_DIFFERENTIAL),
            _ => false,
        },
        SubdeviceType::AnalogOutput => {
            matches!(reference, Reference::None | Reference::AoGround | Reference::AoDifferential)
        }
        SubdeviceType::Counter => matches!(
            reference,
            Reference::None
                | Reference::CtrPrevious
                | Reference::CtrInternal1MHz
                | Reference::CtrInternal10MHz
                | Reference::CtrExternal
        ),
        SubdeviceType::DigitalIo | SubdeviceType::DigitalOutput | SubdeviceType::DigitalInput => {
            matches!(
                reference,
                Reference::None | Reference::DioFifoLow | Reference::DioFifoHigh
            )
        }
        _ => reference == Reference::None,
    };
    if ok {
        Ok(())
    } else {
        Err(ErrorCode::INVALID_REF)
    }
}

fn check_external_trigger(sub: &SubdeviceState, kind: TriggerType) -> bool {
    match kind {
        TriggerType::ExtDigital => sub.config.caps.contains(SubdeviceCaps::TRIG_DIGITAL),
        TriggerType::ExtAnalog => sub.config.caps.contains(SubdeviceCaps::TRIG_ANALOG),
        _ => true,
    }
}

fn check_mode(sub: &SubdeviceState, mode: SingleConfigMode) -> TransportResult<()> {
    let ok = match (sub.config.subdevice_type, mode) {
        (SubdeviceType::AnalogInput | SubdeviceType::AnalogOutput, SingleConfigMode::Range(index)) => {
            sub.range(index).is_some()
        }
        (SubdeviceType::DigitalIo, m) => matches!(
            m,
            SingleConfigMode::DioInput
                | SingleConfigMode::DioOutput
                | SingleConfigMode::DioHighImpedance
                | SingleConfigMode::DioSink
                | SingleConfigMode::DioSource
                | SingleConfigMode::DioMux32M
                | SingleConfigMode::DioDemux32
                | SingleConfigMode::DioBitPattern
        ),
        (SubdeviceType::DigitalOutput, m) => m.is_dio_output(),
        (SubdeviceType::DigitalInput, m) => m == SingleConfigMode::DioInput,
        (SubdeviceType::Counter, SingleConfigMode::Ctr8254Disable | SingleConfigMode::Ctr8254Mode(_)) => {
            sub.config.subtype == SubdeviceSubtype::Counter8254
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ErrorCode::INVALID_SINGLE_CONFIG)
    }
}

/// Largest value a digital entry may carry for its access width.
fn dio_max(flags: SingleFlags) -> i64 {
    if flags.contains(SingleFlags::DIO_BIT) {
        1
    } else if flags.contains(SingleFlags::DIO_WORD) {
        0xFFFF
    } else if flags.contains(SingleFlags::DIO_DWORD) {
        i64::from(u32::MAX)
    } else {
        0xFF
    }
}

fn single_entry(state: &mut SystemState, me: Owner, request: &SingleRequest) -> TransportResult<i32> {
    state.check_access(me, request.device, request.subdevice)?;
    let sub = state.subdevice_mut(request.device, request.subdevice)?;
    if sub.stream.phase == Phase::Running {
        return Err(ErrorCode::SUBDEVICE_BUSY);
    }
    let channel = request.channel;
    sub.channel(channel)?;

    let kind = sub.config.subdevice_type;
    match (kind, request.direction) {
        (SubdeviceType::AnalogInput, Direction::Input) => {
            let ch = sub.channel(channel)?;
            Ok(ch
                .forced_input
                .unwrap_or_else(|| zero_code(sub.range(sub.configured_range(channel)))))
        }
        (SubdeviceType::AnalogOutput, Direction::Output) => {
            let max = sub.max_data(sub.configured_range(channel));
            if !(0..=max).contains(&i64::from(request.value)) {
                return Err(ErrorCode::VALUE_OUT_OF_RANGE);
            }
            sub.channel_mut(channel)?.level = Some(request.value);
            Ok(request.value)
        }
        (SubdeviceType::DigitalIo | SubdeviceType::DigitalInput, Direction::Input) => {
            let ch = sub.channel(channel)?;
            Ok(ch.forced_input.or(ch.level).unwrap_or(0))
        }
        (SubdeviceType::DigitalIo | SubdeviceType::DigitalOutput, Direction::Output) => {
            let configured = sub.channel(channel)?.mode;
            if !configured.is_some_and(SingleConfigMode::is_dio_output) {
                return Err(ErrorCode::PREVIOUS_CONFIG);
            }
            let value = i64::from(request.value as u32);
            if value > dio_max(request.flags) {
                return Err(ErrorCode::VALUE_OUT_OF_RANGE);
            }
            sub.channel_mut(channel)?.level = Some(request.value);
            Ok(request.value)
        }
        (SubdeviceType::Counter, Direction::Input) => {
            let ch = sub.channel(channel)?;
            Ok(ch.forced_input.or(ch.level).unwrap_or(0))
        }
        (SubdeviceType::Counter, Direction::Output) => {
            if !(0..=0xFFFF).contains(&request.value) {
                return Err(ErrorCode::VALUE_OUT_OF_RANGE);
            }
            sub.channel_mut(channel)?.level = Some(request.value);
            Ok(request.value)
        }
        _ => Err(ErrorCode::INVALID_DIR),
    }
}

/// Check trigger timing against the subdevice's timers.
fn check_timing(sub: &SubdeviceState, trigger: &StreamTrigger, channels: usize) -> TransportResult<()> {
    let within = |timer: Timer, ticks: u64| {
        sub.config
            .timer(timer)
            .is_some_and(|spec| ticks >= spec.min_ticks && ticks <= spec.max_ticks)
    };

    if trigger.acq_start.ticks != 0 && !within(Timer::AcqStart, trigger.acq_start.ticks) {
        return Err(ErrorCode::INVALID_ACQ_START_ARG);
    }
    if trigger.conv_start.trigger_type == TriggerType::Timer
        && !within(Timer::ConvStart, trigger.conv_start.ticks)
    {
        return Err(ErrorCode::INVALID_CONV_START_ARG);
    }
    if trigger.scan_start.trigger_type == TriggerType::Timer {
        if !within(Timer::ScanStart, trigger.scan_start.ticks) {
            return Err(ErrorCode::INVALID_SCAN_START_ARG);
        }
        // A scan must fit all conversions of the channel list
        if trigger.conv_start.trigger_type == TriggerType::Timer
            && trigger.scan_start.ticks < trigger.conv_start.ticks.saturating_mul(channels as u64)
        {
            return Err(ErrorCode::INVALID_SCAN_START_ARG);
        }
    }
    for kind in [
        trigger.acq_start.trigger_type,
        trigger.scan_start.trigger_type,
        trigger.conv_start.trigger_type,
    ] {
        if !check_external_trigger(sub, kind) {
            return Err(ErrorCode::INVALID_ACQ_START_TRIG_TYPE);
        }
    }
    Ok(())
}

fn start_entry(state: &mut SystemState, me: Owner, request: &StartRequest) -> TransportResult<()> {
    state.check_access(me, request.device, request.subdevice)?;
    let sub = state.subdevice_mut(request.device, request.subdevice)?;
    if !sub.is_streaming() {
        return Err(ErrorCode::NOT_SUPPORTED);
    }
    match sub.stream.phase {
        Phase::Running => return Err(ErrorCode::SUBDEVICE_BUSY),
        Phase::Unconfigured => return Err(ErrorCode::PREVIOUS_CONFIG),
        Phase::Configured | Phase::Error => {}
    }

    let output = sub.is_output();
    let stream = &mut sub.stream;
    stream.phase = Phase::Running;
    stream.position = 0;
    stream.limit = 0;

    if output {
        let preload = std::mem::take(&mut stream.preload);
        stream.position = preload.len() as u64;
        if let (Some(&last), Some(entry)) = (preload.last(), stream.channels.first()) {
            let channel = entry.channel;
            sub.channel_mut(channel)?.level = Some(last);
        }
    }
    Ok(())
}

fn stop_entry(state: &mut SystemState, me: Owner, request: &StopRequest) -> TransportResult<()> {
    state.check_access(me, request.device, request.subdevice)?;
    let sub = state.subdevice_mut(request.device, request.subdevice)?;
    if !sub.is_streaming() {
        return Err(ErrorCode::NOT_SUPPORTED);
    }
    match sub.stream.phase {
        Phase::Unconfigured | Phase::Configured => return Ok(()),
        Phase::Running | Phase::Error => {}
    }

    let unread = if request.flags.contains(StopFlags::PRESERVE_BUFFERS) && !sub.is_output() {
        match sub.stream.length {
            AcquisitionLength::Continuous => sub.config.burst_size as u64,
            AcquisitionLength::Values(total) => total.saturating_sub(sub.stream.position),
        }
    } else {
        0
    };
    sub.stream.halt(unread);

    if sub.is_output() && request.mode == StopMode::Immediate {
        let entries: Vec<_> = sub.stream.channels.iter().map(|e| (e.channel, e.range)).collect();
        for (channel, range) in entries {
            let code = zero_code(sub.range(range));
            sub.channel_mut(channel)?.level = Some(code);
        }
    }
    Ok(())
}

impl DriverTransport for SimulatedDriver {
    fn name(&self) -> &str {
        "simulated"
    }

    fn open(&self) -> TransportResult<()> {
        let mut state = self.state.lock();
        if state.config.unavailable {
            return Err(ErrorCode::OPEN);
        }
        if other(state.driver_lock, self.owner) {
            return Err(ErrorCode::USED);
        }
        *state.opens.entry(self.owner).or_insert(0) += 1;
        debug!(owner = self.owner, "Simulated driver opened");
        Ok(())
    }

    fn close(&self, flags: CloseFlags) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.ensure_open(self.owner)?;
        let remaining = match state.opens.get_mut(&self.owner) {
            Some(count) if flags.contains(CloseFlags::FORCE) => {
                *count = 0;
                0
            }
            Some(count) => {
                *count -= 1;
                *count
            }
            None => return Err(ErrorCode::NOT_OPEN),
        };
        if remaining == 0 {
            state.opens.remove(&self.owner);
            state.release_all(self.owner);
        }
        debug!(owner = self.owner, remaining, "Simulated driver closed");
        Ok(())
    }

    fn lock_driver(&self, mode: LockMode) -> TransportResult<()> {
        self.with(|state, me| {
            let contended = other(state.driver_lock, me)
                || state.devices.iter().any(|d| state.device_contended(me, d));
            match mode {
                LockMode::Check if contended => Err(ErrorCode::LOCKED),
                LockMode::Check => Ok(()),
                LockMode::Set if contended => Err(ErrorCode::LOCKED),
                LockMode::Set => {
                    state.driver_lock = Some(me);
                    Ok(())
                }
                LockMode::Release if other(state.driver_lock, me) => Err(ErrorCode::LOCKED),
                LockMode::Release => {
                    state.release_all(me);
                    Ok(())
                }
            }
        })
    }

    fn lock_device(&self, device: u32, mode: LockMode) -> TransportResult<()> {
        self.with(|state, me| {
            let contended = state.device_contended(me, state.device(device)?);
            let dev = state
                .devices
                .get_mut(device as usize)
                .ok_or(ErrorCode::INVALID_DEVICE)?;
            match mode {
                LockMode::Check if contended => Err(ErrorCode::LOCKED),
                LockMode::Check => Ok(()),
                LockMode::Set if contended => Err(ErrorCode::LOCKED),
                LockMode::Set => {
                    dev.lock = Some(me);
                    Ok(())
                }
                LockMode::Release if other(dev.lock, me) => Err(ErrorCode::LOCKED),
                LockMode::Release => {
                    dev.lock = None;
                    for sub in &mut dev.subdevices {
                        if sub.lock == Some(me) {
                            sub.lock = None;
                        }
                    }
                    Ok(())
                }
            }
        })
    }

    fn lock_subdevice(&self, device: u32, subdevice: u32, mode: LockMode) -> TransportResult<()> {
        self.with(|state, me| {
            let contended = state.check_access(me, device, subdevice).is_err();
            let sub = state.subdevice_mut(device, subdevice)?;
            match mode {
                LockMode::Check if contended => Err(ErrorCode::LOCKED),
                LockMode::Check => Ok(()),
                LockMode::Set if contended => Err(ErrorCode::LOCKED),
                LockMode::Set => {
                    sub.lock = Some(me);
                    Ok(())
                }
                LockMode::Release if other(sub.lock, me) => Err(ErrorCode::LOCKED),
                LockMode::Release => {
                    sub.lock = None;
                    Ok(())
                }
            }
        })
    }

    fn reset_device(&self, device: u32) -> TransportResult<()> {
        self.with(|state, me| {
            if state.device_contended(me, state.device(device)?) {
                return Err(ErrorCode::LOCKED);
            }
            let dev = state
                .devices
                .get_mut(device as usize)
                .ok_or(ErrorCode::INVALID_DEVICE)?;
            dev.subdevices.iter_mut().for_each(SubdeviceState::reset);
            Ok(())
        })
    }

    fn reset_subdevice(&self, device: u32, subdevice: u32) -> TransportResult<()> {
        self.with(|state, me| {
            state.check_access(me, device, subdevice)?;
            state.subdevice_mut(device, subdevice)?.reset();
            Ok(())
        })
    }

    fn number_devices(&self) -> TransportResult<u32> {
        self.with(|state, _| Ok(state.devices.len() as u32))
    }

    fn number_subdevices(&self, device: u32) -> TransportResult<u32> {
        self.with(|state, _| Ok(state.device(device)?.subdevices.len() as u32))
    }

    fn number_channels(&self, device: u32, subdevice: u32) -> TransportResult<u32> {
        self.with(|state, _| Ok(state.subdevice(device, subdevice)?.config.channels))
    }

    fn number_ranges(&self, device: u32, subdevice: u32, unit: Unit) -> TransportResult<u32> {
        self.with(|state, _| {
            let sub = state.subdevice(device, subdevice)?;
            Ok(sub.config.ranges.iter().filter(|r| unit.matches(r.unit)).count() as u32)
        })
    }

    fn range_info(&self, device: u32, subdevice: u32, range: u32) -> TransportResult<RangeInfo> {
        self.with(|state, _| state.range_info(device, subdevice, range))
    }

    fn range_by_min_max(
        &self,
        device: u32,
        subdevice: u32,
        unit: Unit,
        min: f64,
        max: f64,
    ) -> TransportResult<RangeInfo> {
        self.with(|state, _| {
            if min > max {
                return Err(ErrorCode::INVALID_MIN_MAX);
            }
            let sub = state.subdevice(device, subdevice)?;
            let best = sub
                .config
                .ranges
                .iter()
                .enumerate()
                .filter(|(_, r)| unit.matches(r.unit) && r.min <= min && r.max >= max)
                .min_by(|(_, a), (_, b)| (a.max - a.min).total_cmp(&(b.max - b.min)))
                .map(|(index, _)| index as u32)
                .ok_or(ErrorCode::NO_RANGE)?;
            state.range_info(device, subdevice, best)
        })
    }

    fn device_name(&self, device: u32) -> TransportResult<String> {
        self.with(|state, _| {
            state.device(device)?;
            Ok(state.config.devices[device as usize].name.clone())
        })
    }

    fn device_driver_name(&self, device: u32) -> TransportResult<String> {
        self.with(|state, _| {
            state.device(device)?;
            Ok(state.config.devices[device as usize].driver_name.clone())
        })
    }

    fn device_description(&self, device: u32) -> TransportResult<String> {
        self.with(|state, _| {
            state.device(device)?;
            Ok(state.config.devices[device as usize].description.clone())
        })
    }

    fn device_info(&self, device: u32) -> TransportResult<DeviceInfo> {
        self.with(|state, _| {
            state.device(device)?;
            Ok(state.config.devices[device as usize].info.clone())
        })
    }

    fn subdevice_type(
        &self,
        device: u32,
        subdevice: u32,
    ) -> TransportResult<(SubdeviceType, SubdeviceSubtype)> {
        self.with(|state, _| {
            let sub = state.subdevice(device, subdevice)?;
            Ok((sub.config.subdevice_type, sub.config.subtype))
        })
    }

    fn subdevice_by_type(
        &self,
        device: u32,
        start: u32,
        subdevice_type: SubdeviceType,
        subtype: SubdeviceSubtype,
    ) -> TransportResult<u32> {
        self.with(|state, _| {
            let dev = state.device(device)?;
            if start as usize > dev.subdevices.len() {
                return Err(ErrorCode::INVALID_SUBDEVICE);
            }
            dev.subdevices
                .iter()
                .enumerate()
                .skip(start as usize)
                .find(|(_, sub)| {
                    sub.config.subdevice_type == subdevice_type && subtype.matches(sub.config.subtype)
                })
                .map(|(index, _)| index as u32)
                .ok_or(ErrorCode::NOMORE_SUBDEVICE_TYPE)
        })
    }

    fn subdevice_caps(&self, device: u32, subdevice: u32) -> TransportResult<SubdeviceCaps> {
        self.with(|state, _| Ok(state.subdevice(device, subdevice)?.config.caps))
    }

    fn subdevice_caps_args(
        &self,
        device: u32,
        subdevice: u32,
        cap: CapabilityArg,
        count: usize,
    ) -> TransportResult<Vec<i32>> {
        self.with(|state, _| {
            let sub = state.subdevice(device, subdevice)?;
            let arg = sub
                .config
                .caps_args
                .iter()
                .find(|arg| arg.cap == cap)
                .ok_or(ErrorCode::INVALID_CAP)?;
            if count < arg.values.len() {
                return Err(ErrorCode::INVALID_CAP_ARG_COUNT);
            }
            Ok(arg.values.clone())
        })
    }

    fn version_library(&self) -> TransportResult<u32> {
        Ok(self.state.lock().config.library_version)
    }

    fn version_main_driver(&self) -> TransportResult<u32> {
        self.with(|state, _| Ok(state.config.main_driver_version))
    }

    fn version_device_driver(&self, device: u32) -> TransportResult<u32> {
        self.with(|state, _| {
            state.device(device)?;
            Ok(state.config.devices[device as usize].driver_version)
        })
    }

    fn single_config(&self, config: &SingleConfig) -> TransportResult<()> {
        self.with(|state, me| {
            state.check_access(me, config.device, config.subdevice)?;
            let sub = state.subdevice_mut(config.device, config.subdevice)?;
            sub.channel(config.channel)?;
            if sub.stream.phase == Phase::Running {
                return Err(ErrorCode::SUBDEVICE_BUSY);
            }
            check_mode(sub, config.mode)?;
            check_reference(sub, config.reference)?;
            let trigger_ok = match config.trigger_type {
                TriggerType::Software | TriggerType::None => true,
                kind @ (TriggerType::ExtDigital | TriggerType::ExtAnalog) => {
                    check_external_trigger(sub, kind)
                }
                _ => false,
            };
            if !trigger_ok {
                return Err(ErrorCode::INVALID_TRIG_TYPE);
            }
            sub.channel_mut(config.channel)?.mode = Some(config.mode);
            trace!(
                device = config.device,
                subdevice = config.subdevice,
                channel = config.channel,
                "Simulated single config"
            );
            Ok(())
        })
    }

    fn single(
        &self,
        requests: &[SingleRequest],
        _flags: SingleBatchFlags,
    ) -> TransportResult<Vec<SingleOutcome>> {
        self.with(|state, me| {
            Ok(requests
                .iter()
                .map(|request| match single_entry(state, me, request) {
                    Ok(value) => SingleOutcome::ok(value),
                    Err(code) => SingleOutcome::failed(code),
                })
                .collect())
        })
    }

    fn stream_config(
        &self,
        device: u32,
        subdevice: u32,
        channels: &[StreamChannelConfig],
        trigger: &StreamTrigger,
        fifo_threshold: u32,
        flags: StreamConfigFlags,
    ) -> TransportResult<()> {
        self.with(|state, me| {
            state.check_access(me, device, subdevice)?;
            let sub = state.subdevice_mut(device, subdevice)?;
            if !sub.is_streaming() {
                return Err(ErrorCode::NOT_SUPPORTED);
            }
            if sub.stream.phase == Phase::Running {
                return Err(ErrorCode::SUBDEVICE_BUSY);
            }

            let list_limit = sub
                .capacity(CapabilityArg::AiChannelListSize)
                .or_else(|| sub.capacity(CapabilityArg::AoChannelListSize))
                .unwrap_or(usize::MAX);
            if channels.is_empty() || channels.len() > list_limit {
                return Err(ErrorCode::INVALID_CONFIG_LIST_COUNT);
            }
            for entry in channels {
                sub.channel(entry.channel)?;
                if sub.range(entry.range).is_none() {
                    return Err(ErrorCode::INVALID_STREAM_CONFIG);
                }
                check_reference(sub, entry.reference)?;
            }

            let output_only = StreamConfigFlags::WRAPAROUND;
            if flags.intersects(output_only) && !sub.is_output() {
                return Err(ErrorCode::INVALID_FLAGS);
            }
            if flags.contains(StreamConfigFlags::BIT_PATTERN)
                && !matches!(sub.config.subdevice_type, SubdeviceType::DigitalIo | SubdeviceType::DigitalOutput)
            {
                return Err(ErrorCode::INVALID_FLAGS);
            }

            let fifo = sub
                .capacity(CapabilityArg::AiFifoSize)
                .or_else(|| sub.capacity(CapabilityArg::AoFifoSize))
                .unwrap_or(usize::MAX);
            if fifo_threshold as usize > fifo {
                return Err(ErrorCode::INVALID_FIFO_IRQ_THRESHOLD);
            }

            let length = trigger.plan(channels.len())?;
            check_timing(sub, trigger, channels.len())?;

            sub.stream = StreamState {
                phase: Phase::Configured,
                channels: channels.to_vec(),
                flags,
                length,
                position: 0,
                limit: 0,
                preload: Vec::new(),
            };
            debug!(device, subdevice, channels = channels.len(), ?length, "Simulated stream configured");
            Ok(())
        })
    }

    fn stream_start(&self, requests: &[StartRequest]) -> TransportResult<Vec<StreamEntryOutcome>> {
        self.with(|state, me| {
            Ok(requests
                .iter()
                .map(|request| StreamEntryOutcome {
                    device: request.device,
                    subdevice: request.subdevice,
                    code: start_entry(state, me, request).err().unwrap_or(ErrorCode::SUCCESS),
                })
                .collect())
        })
    }

    fn stream_stop(&self, requests: &[StopRequest]) -> TransportResult<Vec<StreamEntryOutcome>> {
        self.with(|state, me| {
            Ok(requests
                .iter()
                .map(|request| StreamEntryOutcome {
                    device: request.device,
                    subdevice: request.subdevice,
                    code: stop_entry(state, me, request).err().unwrap_or(ErrorCode::SUCCESS),
                })
                .collect())
        })
    }

    fn stream_read(
        &self,
        device: u32,
        subdevice: u32,
        mode: ReadMode,
        buffer: &mut [i32],
    ) -> TransportResult<usize> {
        self.with(|state, me| {
            state.check_access(me, device, subdevice)?;
            let sub = state.subdevice_mut(device, subdevice)?;
            if !sub.is_streaming() || sub.is_output() {
                return Err(ErrorCode::NOT_SUPPORTED);
            }
            match sub.stream.phase {
                Phase::Error => return Err(ErrorCode::HW_BUFFER_OVERFLOW),
                Phase::Unconfigured => return Err(ErrorCode::PREVIOUS_CONFIG),
                Phase::Configured | Phase::Running => {}
            }

            let remaining = sub.stream.remaining();
            if remaining == 0 {
                return Err(ErrorCode::SUBDEVICE_NOT_RUNNING);
            }
            let mut n = (buffer.len() as u64).min(remaining);
            if mode == ReadMode::NonBlocking {
                n = n.min(sub.config.burst_size as u64);
            }
            let n = n as usize;

            let start = sub.stream.position;
            for (i, slot) in buffer[..n].iter_mut().enumerate() {
                *slot = sub.sample(start + i as u64);
            }
            sub.stream.position += n as u64;

            if let (Phase::Running, AcquisitionLength::Values(total)) = (sub.stream.phase, sub.stream.length) {
                if sub.stream.position >= total {
                    sub.stream.halt(0);
                    info!(device, subdevice, values = total, "Simulated acquisition complete");
                }
            }
            Ok(n)
        })
    }

    fn stream_write(
        &self,
        device: u32,
        subdevice: u32,
        mode: WriteMode,
        values: &[i32],
    ) -> TransportResult<usize> {
        self.with(|state, me| {
            state.check_access(me, device, subdevice)?;
            let sub = state.subdevice_mut(device, subdevice)?;
            if !sub.is_streaming() || !sub.is_output() {
                return Err(ErrorCode::NOT_SUPPORTED);
            }
            let max = sub
                .stream
                .channels
                .first()
                .map_or(0xFFFF, |entry| sub.max_data(entry.range));
            if values.iter().any(|&v| !(0..=max).contains(&i64::from(v))) {
                return Err(ErrorCode::VALUE_OUT_OF_RANGE);
            }

            let fifo = sub.capacity(CapabilityArg::AoFifoSize).unwrap_or(4096);
            let accepted = match (mode, sub.stream.phase) {
                (_, Phase::Unconfigured) => return Err(ErrorCode::PREVIOUS_CONFIG),
                (_, Phase::Error) => return Err(ErrorCode::HW_BUFFER_UNDERFLOW),
                (WriteMode::Preload, Phase::Configured) => {
                    let room = fifo.saturating_sub(sub.stream.preload.len());
                    let n = values.len().min(room);
                    sub.stream.preload.extend_from_slice(&values[..n]);
                    return Ok(n);
                }
                (_, Phase::Configured) => return Err(ErrorCode::SUBDEVICE_NOT_RUNNING),
                (WriteMode::NonBlocking, Phase::Running) => values.len().min(sub.config.burst_size),
                (_, Phase::Running) => values.len(),
            };

            sub.stream.position += accepted as u64;
            if let (Some(&last), Some(entry)) = (values[..accepted].last(), sub.stream.channels.first()) {
                let channel = entry.channel;
                sub.channel_mut(channel)?.level = Some(last);
            }
            Ok(accepted)
        })
    }

    fn stream_status(
        &self,
        device: u32,
        subdevice: u32,
        wait: WaitMode,
    ) -> TransportResult<StatusReport> {
        self.with(|state, _| {
            let sub = state.subdevice_mut(device, subdevice)?;
            if !sub.is_streaming() {
                return Err(ErrorCode::NOT_SUPPORTED);
            }
            if wait == WaitMode::Idle && sub.stream.phase == Phase::Running {
                match sub.stream.length {
                    AcquisitionLength::Continuous => return Err(ErrorCode::TIMEOUT),
                    AcquisitionLength::Values(total) => {
                        let unread = if sub.is_output() {
                            0
                        } else {
                            total.saturating_sub(sub.stream.position)
                        };
                        sub.stream.halt(unread);
                    }
                }
            }

            let status = match sub.stream.phase {
                Phase::Running => StreamStatus::Busy,
                Phase::Error => StreamStatus::Error,
                Phase::Configured | Phase::Unconfigured => StreamStatus::Idle,
            };
            let values = if sub.is_output() {
                0
            } else {
                available(sub)
            };
            Ok(StatusReport { status, values })
        })
    }

    fn stream_new_values(&self, device: u32, subdevice: u32, _timeout_ms: u32) -> TransportResult<usize> {
        self.with(|state, _| {
            let sub = state.subdevice(device, subdevice)?;
            if !sub.is_streaming() {
                return Err(ErrorCode::NOT_SUPPORTED);
            }
            if sub.is_output() {
                let fifo = sub.capacity(CapabilityArg::AoFifoSize).unwrap_or(4096);
                return Ok(fifo.saturating_sub(sub.stream.preload.len()));
            }
            Ok(available(sub))
        })
    }

    fn stream_time_to_ticks(
        &self,
        device: u32,
        subdevice: u32,
        timer: Timer,
        seconds: f64,
    ) -> TransportResult<Ticks> {
        self.with(|state, _| Ok(state.timer(device, subdevice, timer)?.quantize_time(seconds)))
    }

    fn stream_frequency_to_ticks(
        &self,
        device: u32,
        subdevice: u32,
        timer: Timer,
        hertz: f64,
    ) -> TransportResult<Ticks> {
        self.with(|state, _| Ok(state.timer(device, subdevice, timer)?.quantize_frequency(hertz)))
    }
}

/// Input values a non-blocking read would return right now.
fn available(sub: &SubdeviceState) -> usize {
    sub.stream.remaining().min(sub.config.burst_size as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StartMode;

    fn open_driver() -> SimulatedDriver {
        let driver = SimulatedDriver::default();
        driver.open().unwrap();
        driver
    }

    fn finite_trigger(scans: u32) -> StreamTrigger {
        StreamTrigger::builder()
            .software_start()
            .scan_follow()
            .conv_timer(3300)
            .stop_after_scans(scans)
            .build()
            .unwrap()
    }

    #[test]
    fn test_zero_code() {
        let bipolar = RangeConfig {
            unit: Unit::Volt,
            min: -10.0,
            max: 10.0,
            max_data: 0xFFFF,
        };
        assert_eq!(zero_code(Some(&bipolar)), 32768);
        let unipolar = RangeConfig { min: 0.0, ..bipolar };
        assert_eq!(zero_code(Some(&unipolar)), 0);
    }

    #[test]
    fn test_requires_open() {
        let driver = SimulatedDriver::default();
        assert_eq!(driver.number_devices(), Err(ErrorCode::NOT_OPEN));
        driver.open().unwrap();
        assert_eq!(driver.number_devices(), Ok(1));
        driver.close(CloseFlags::empty()).unwrap();
        assert_eq!(driver.close(CloseFlags::empty()), Err(ErrorCode::NOT_OPEN));
    }

    #[test]
    fn test_open_reference_counting() {
        let driver = SimulatedDriver::default();
        driver.open().unwrap();
        driver.open().unwrap();
        driver.close(CloseFlags::empty()).unwrap();
        assert!(driver.number_devices().is_ok());
        driver.close(CloseFlags::empty()).unwrap();
        assert!(driver.number_devices().is_err());

        driver.open().unwrap();
        driver.open().unwrap();
        driver.close(CloseFlags::FORCE).unwrap();
        assert!(driver.number_devices().is_err());
    }

    #[test]
    fn test_unavailable_system() {
        let config = SystemConfig {
            unavailable: true,
            ..SystemConfig::default()
        };
        let driver = SimulatedDriver::new(config).unwrap();
        assert_eq!(driver.open(), Err(ErrorCode::OPEN));
    }

    #[test]
    fn test_subdevice_lock_blocks_device_lock_of_other_owner() {
        let a = open_driver();
        let b = a.connect();
        b.open().unwrap();

        a.lock_subdevice(0, 1, LockMode::Set).unwrap();
        assert_eq!(b.lock_device(0, LockMode::Set), Err(ErrorCode::LOCKED));
        assert_eq!(b.lock_device(0, LockMode::Check), Err(ErrorCode::LOCKED));
        assert!(b.lock_subdevice(0, 2, LockMode::Set).is_ok());

        // Device release drops the owner's subdevice locks too
        a.lock_device(0, LockMode::Release).unwrap();
        b.lock_subdevice(0, 2, LockMode::Release).unwrap();
        assert!(b.lock_device(0, LockMode::Set).is_ok());
    }

    #[test]
    fn test_close_releases_locks() {
        let a = open_driver();
        let b = a.connect();
        b.open().unwrap();
        a.lock_driver(LockMode::Set).unwrap();
        assert_eq!(b.lock_device(0, LockMode::Set), Err(ErrorCode::LOCKED));
        a.close(CloseFlags::empty()).unwrap();
        assert!(b.lock_device(0, LockMode::Set).is_ok());
    }

    #[test]
    fn test_finite_read_then_not_running() {
        let driver = open_driver();
        let channels = [StreamChannelConfig::new(0, 0), StreamChannelConfig::new(1, 0)];
        driver
            .stream_config(0, 0, &channels, &finite_trigger(10), 0, StreamConfigFlags::empty())
            .unwrap();
        let outcomes = driver
            .stream_start(&[StartRequest::new(0, 0, StartMode::Blocking, 0)])
            .unwrap();
        assert!(outcomes[0].is_ok());

        let mut buffer = [0; 64];
        assert_eq!(driver.stream_read(0, 0, ReadMode::Blocking, &mut buffer), Ok(20));
        assert_eq!(buffer[0], 0);
        assert_eq!(buffer[1], 4099);
        assert_eq!(buffer[2], 97);
        assert_eq!(
            driver.stream_read(0, 0, ReadMode::NonBlocking, &mut buffer),
            Err(ErrorCode::SUBDEVICE_NOT_RUNNING)
        );
    }

    #[test]
    fn test_scan_period_must_fit_conversions() {
        let driver = open_driver();
        let trigger = StreamTrigger::builder()
            .software_start()
            .scan_timer(100)
            .conv_timer(66)
            .continuous()
            .build()
            .unwrap();
        let channels = [StreamChannelConfig::new(0, 0), StreamChannelConfig::new(1, 0)];
        assert_eq!(
            driver.stream_config(0, 0, &channels, &trigger, 0, StreamConfigFlags::empty()),
            Err(ErrorCode::INVALID_SCAN_START_ARG)
        );
    }

    #[test]
    fn test_time_to_ticks_needs_timer() {
        let driver = open_driver();
        assert!(driver.stream_time_to_ticks(0, 0, Timer::ConvStart, 1e-4).is_ok());
        assert_eq!(
            driver.stream_time_to_ticks(0, 0, Timer::FioTotal, 1e-4),
            Err(ErrorCode::INVALID_TIMER)
        );
        assert_eq!(
            driver.stream_time_to_ticks(0, 2, Timer::ConvStart, 1e-4),
            Err(ErrorCode::NOT_SUPPORTED)
        );
    }
}

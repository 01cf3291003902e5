//! Transport backed by the installed ME-iDS library.
//!
//! The vendor library keeps global state and is not documented as thread
//! safe, so configuration and query calls go through one process-wide
//! mutex. Calls that wait on the device (stream read and write, status
//! with `WaitMode::Idle`, new-value waits and blocking starts) run outside
//! it, so a `stream_stop` from another thread can end them.

#![allow(unsafe_code)]

use std::ffi::CStr;
use std::os::raw::{c_char, c_double, c_int};

use parking_lot::Mutex;
use tracing::{debug, warn};

use meids_sys as sys;

use crate::error::ErrorCode;
use crate::single::{SingleConfig, SingleOutcome, SingleRequest};
use crate::streaming::{
    StartRequest, StopRequest, StreamChannelConfig, StreamEntryOutcome, StreamTrigger,
};
use crate::timing::Ticks;
use crate::transport::{DeviceInfo, DriverTransport, RangeInfo, StatusReport, TransportResult};
use crate::types::{
    BusType, CapabilityArg, CloseFlags, LockMode, PlugState, ReadMode, SingleBatchFlags,
    StartMode, StreamConfigFlags, StreamStatus, SubdeviceCaps, SubdeviceSubtype, SubdeviceType, Timer, Unit,
    WaitMode, WriteMode,
};

static FFI_LOCK: Mutex<()> = Mutex::new(());

/// Native driver transport.
#[derive(Debug, Default)]
pub struct NativeDriver {
    _private: (),
}

impl NativeDriver {
    /// Transport over the vendor library. Nothing is opened until
    /// [`DriverTransport::open`].
    pub fn new() -> Self {
        Self { _private: () }
    }
}

/// Run one library call under the FFI lock.
fn call(f: impl FnOnce() -> c_int) -> TransportResult<()> {
    let _guard = FFI_LOCK.lock();
    ErrorCode::check(f())
}

/// Run a library call that may wait on the device, without the FFI lock.
fn wait_call(f: impl FnOnce() -> c_int) -> TransportResult<()> {
    ErrorCode::check(f())
}

fn int(value: u32) -> c_int {
    value as c_int
}

fn decode<T>(what: &str, raw: c_int, from_raw: impl FnOnce(c_int) -> Option<T>) -> TransportResult<T> {
    from_raw(raw).ok_or_else(|| {
        warn!(what, raw, "Driver returned an unknown value");
        ErrorCode::INTERNAL
    })
}

fn query_string(max: usize, f: impl FnOnce(*mut c_char, c_int) -> c_int) -> TransportResult<String> {
    let mut buffer = vec![0u8; max];
    let ptr = buffer.as_mut_ptr().cast::<c_char>();
    call(|| f(ptr, max as c_int))?;
    let text = CStr::from_bytes_until_nul(&buffer).map_err(|_| ErrorCode::USER_BUFFER_SIZE)?;
    Ok(text.to_string_lossy().into_owned())
}

fn join_ticks(low: c_int, high: c_int) -> u64 {
    (u64::from(high as u32) << 32) | u64::from(low as u32)
}

impl DriverTransport for NativeDriver {
    fn name(&self) -> &str {
        "native"
    }

    fn open(&self) -> TransportResult<()> {
        call(|| unsafe { sys::meOpen(sys::ME_OPEN_NO_FLAGS) })
    }

    fn close(&self, flags: CloseFlags) -> TransportResult<()> {
        call(|| unsafe { sys::meClose(flags.bits()) })
    }

    fn lock_driver(&self, mode: LockMode) -> TransportResult<()> {
        call(|| unsafe { sys::meLockDriver(mode.to_raw(), 0) })
    }

    fn lock_device(&self, device: u32, mode: LockMode) -> TransportResult<()> {
        call(|| unsafe { sys::meLockDevice(int(device), mode.to_raw(), 0) })
    }

    fn lock_subdevice(&self, device: u32, subdevice: u32, mode: LockMode) -> TransportResult<()> {
        call(|| unsafe { sys::meLockSubdevice(int(device), int(subdevice), mode.to_raw(), 0) })
    }

    fn reset_device(&self, device: u32) -> TransportResult<()> {
        call(|| unsafe { sys::meIOResetDevice(int(device), 0) })
    }

    fn reset_subdevice(&self, device: u32, subdevice: u32) -> TransportResult<()> {
        call(|| unsafe { sys::meIOResetSubdevice(int(device), int(subdevice), 0) })
    }

    fn number_devices(&self) -> TransportResult<u32> {
        let mut n: c_int = 0;
        call(|| unsafe { sys::meQueryNumberDevices(&mut n) })?;
        Ok(n as u32)
    }

    fn number_subdevices(&self, device: u32) -> TransportResult<u32> {
        let mut n: c_int = 0;
        call(|| unsafe { sys::meQueryNumberSubdevices(int(device), &mut n) })?;
        Ok(n as u32)
    }

    fn number_channels(&self, device: u32, subdevice: u32) -> TransportResult<u32> {
        let mut n: c_int = 0;
        call(|| unsafe { sys::meQueryNumberChannels(int(device), int(subdevice), &mut n) })?;
        Ok(n as u32)
    }

    fn number_ranges(&self, device: u32, subdevice: u32, unit: Unit) -> TransportResult<u32> {
        let mut n: c_int = 0;
        call(|| unsafe {
            sys::meQueryNumberRanges(int(device), int(subdevice), unit.to_raw(), &mut n)
        })?;
        Ok(n as u32)
    }

    fn range_info(&self, device: u32, subdevice: u32, range: u32) -> TransportResult<RangeInfo> {
        let mut unit: c_int = 0;
        let mut min: c_double = 0.0;
        let mut max: c_double = 0.0;
        let mut max_data: c_int = 0;
        call(|| unsafe {
            sys::meQueryRangeInfo(
                int(device),
                int(subdevice),
                int(range),
                &mut unit,
                &mut min,
                &mut max,
                &mut max_data,
            )
        })?;
        Ok(RangeInfo {
            index: range,
            unit: decode("unit", unit, Unit::from_raw)?,
            min,
            max,
            max_data: max_data as u32,
        })
    }

    fn range_by_min_max(
        &self,
        device: u32,
        subdevice: u32,
        unit: Unit,
        min: f64,
        max: f64,
    ) -> TransportResult<RangeInfo> {
        let mut min = min;
        let mut max = max;
        let mut max_data: c_int = 0;
        let mut range: c_int = 0;
        call(|| unsafe {
            sys::meQueryRangeByMinMax(
                int(device),
                int(subdevice),
                unit.to_raw(),
                &mut min,
                &mut max,
                &mut max_data,
                &mut range,
            )
        })?;
        self.range_info(device, subdevice, range as u32)
    }

    fn device_name(&self, device: u32) -> TransportResult<String> {
        query_string(sys::ME_DEVICE_NAME_MAX_COUNT, |buf, len| unsafe {
            sys::meQueryNameDevice(int(device), buf, len)
        })
    }

    fn device_driver_name(&self, device: u32) -> TransportResult<String> {
        query_string(sys::ME_DEVICE_DRIVER_NAME_MAX_COUNT, |buf, len| unsafe {
            sys::meQueryNameDeviceDriver(int(device), buf, len)
        })
    }

    fn device_description(&self, device: u32) -> TransportResult<String> {
        query_string(sys::ME_DEVICE_DESCRIPTION_MAX_COUNT, |buf, len| unsafe {
            sys::meQueryDescriptionDevice(int(device), buf, len)
        })
    }

    fn device_info(&self, device: u32) -> TransportResult<DeviceInfo> {
        let mut raw = [0 as c_int; 8];
        let [vendor, dev_id, serial, bus, bus_no, dev_no, func_no, plugged] = &mut raw;
        call(|| unsafe {
            sys::meQueryInfoDevice(int(device), vendor, dev_id, serial, bus, bus_no, dev_no, func_no, plugged)
        })?;
        Ok(DeviceInfo {
            vendor_id: raw[0] as u32,
            device_id: raw[1] as u32,
            serial_number: raw[2] as u32,
            bus_type: decode("bus type", raw[3], BusType::from_raw)?,
            bus_number: raw[4] as u32,
            device_number: raw[5] as u32,
            function_number: raw[6] as u32,
            plugged: decode("plug state", raw[7], PlugState::from_raw)?,
        })
    }

    fn subdevice_type(
        &self,
        device: u32,
        subdevice: u32,
    ) -> TransportResult<(SubdeviceType, SubdeviceSubtype)> {
        let mut kind: c_int = 0;
        let mut subtype: c_int = 0;
        call(|| unsafe {
            sys::meQuerySubdeviceType(int(device), int(subdevice), &mut kind, &mut subtype)
        })?;
        Ok((
            decode("subdevice type", kind, SubdeviceType::from_raw)?,
            decode("subdevice subtype", subtype, SubdeviceSubtype::from_raw)?,
        ))
    }

    fn subdevice_by_type(
        &self,
        device: u32,
        start: u32,
        subdevice_type: SubdeviceType,
        subtype: SubdeviceSubtype,
    ) -> TransportResult<u32> {
        let mut index: c_int = 0;
        call(|| unsafe {
            sys::meQuerySubdeviceByType(
                int(device),
                int(start),
                subdevice_type.to_raw(),
                subtype.to_raw(),
                &mut index,
            )
        })?;
        Ok(index as u32)
    }

    fn subdevice_caps(&self, device: u32, subdevice: u32) -> TransportResult<SubdeviceCaps> {
        let mut caps: c_int = 0;
        call(|| unsafe { sys::meQuerySubdeviceCaps(int(device), int(subdevice), &mut caps) })?;
        Ok(SubdeviceCaps::from_bits_truncate(caps))
    }

    fn subdevice_caps_args(
        &self,
        device: u32,
        subdevice: u32,
        cap: CapabilityArg,
        count: usize,
    ) -> TransportResult<Vec<i32>> {
        let mut args = vec![0 as c_int; count];
        call(|| unsafe {
            sys::meQuerySubdeviceCapsArgs(
                int(device),
                int(subdevice),
                cap.to_raw(),
                args.as_mut_ptr(),
                count as c_int,
            )
        })?;
        Ok(args)
    }

    fn version_library(&self) -> TransportResult<u32> {
        let mut version: c_int = 0;
        call(|| unsafe { sys::meQueryVersionLibrary(&mut version) })?;
        Ok(version as u32)
    }

    fn version_main_driver(&self) -> TransportResult<u32> {
        let mut version: c_int = 0;
        call(|| unsafe { sys::meQueryVersionMainDriver(&mut version) })?;
        Ok(version as u32)
    }

    fn version_device_driver(&self, device: u32) -> TransportResult<u32> {
        let mut version: c_int = 0;
        call(|| unsafe { sys::meQueryVersionDeviceDriver(int(device), &mut version) })?;
        Ok(version as u32)
    }

    fn single_config(&self, config: &SingleConfig) -> TransportResult<()> {
        let mode = config.mode.to_raw().map_err(|_| ErrorCode::INVALID_SINGLE_CONFIG)?;
        call(|| unsafe {
            sys::meIOSingleConfig(
                int(config.device),
                int(config.subdevice),
                int(config.channel),
                mode,
                config.reference.to_raw(),
                config.trigger_channel.to_raw(),
                config.trigger_type.to_raw(),
                config.trigger_edge.to_raw(),
                config.flags.bits(),
            )
        })
    }

    fn single(
        &self,
        requests: &[SingleRequest],
        flags: SingleBatchFlags,
    ) -> TransportResult<Vec<SingleOutcome>> {
        let mut list: Vec<sys::meIOSingle_t> = requests
            .iter()
            .map(|r| sys::meIOSingle_t {
                iDevice: int(r.device),
                iSubdevice: int(r.subdevice),
                iChannel: int(r.channel),
                iDir: r.direction.to_raw(),
                iValue: r.value,
                iTimeOut: int(r.timeout_ms),
                iFlags: r.flags.bits(),
                iErrno: 0,
            })
            .collect();
        let result = call(|| unsafe {
            sys::meIOSingle(list.as_mut_ptr(), list.len() as c_int, flags.bits())
        });
        // The call fails as a whole only when no entry carries its own error
        if let Err(code) = result {
            if list.iter().all(|entry| entry.iErrno == 0) {
                return Err(code);
            }
        }
        Ok(list
            .iter()
            .map(|entry| match ErrorCode::check(entry.iErrno) {
                Ok(()) => SingleOutcome::ok(entry.iValue),
                Err(code) => SingleOutcome::failed(code),
            })
            .collect())
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
        let mut list = channels
            .iter()
            .map(|entry| entry.to_ffi())
            .collect::<crate::error::Result<Vec<_>>>()
            .map_err(|_| ErrorCode::INVALID_STREAM_CONFIG)?;
        let mut raw_trigger = trigger.to_ffi().map_err(|_| ErrorCode::INVALID_STREAM_CONFIG)?;
        debug!(device, subdevice, entries = list.len(), "meIOStreamConfig");
        call(|| unsafe {
            sys::meIOStreamConfig(
                int(device),
                int(subdevice),
                list.as_mut_ptr(),
                list.len() as c_int,
                &mut raw_trigger,
                int(fifo_threshold),
                flags.bits(),
            )
        })
    }

    fn stream_start(&self, requests: &[StartRequest]) -> TransportResult<Vec<StreamEntryOutcome>> {
        let mut list: Vec<sys::meIOStreamStart_t> = requests
            .iter()
            .map(|r| sys::meIOStreamStart_t {
                iDevice: int(r.device),
                iSubdevice: int(r.subdevice),
                iStartMode: r.mode.to_raw(),
                iTimeOut: int(r.timeout_ms),
                iFlags: r.flags.bits(),
                iErrno: 0,
            })
            .collect();
        let start = || unsafe {
            sys::meIOStreamStart(list.as_mut_ptr(), list.len() as c_int, sys::ME_IO_STREAM_START_NO_FLAGS)
        };
        let result = if requests.iter().any(|r| r.mode == StartMode::Blocking) {
            wait_call(start)
        } else {
            call(start)
        };
        if let Err(code) = result {
            if list.iter().all(|entry| entry.iErrno == 0) {
                return Err(code);
            }
        }
        Ok(list
            .iter()
            .map(|entry| StreamEntryOutcome {
                device: entry.iDevice as u32,
                subdevice: entry.iSubdevice as u32,
                code: ErrorCode(entry.iErrno),
            })
            .collect())
    }

    fn stream_stop(&self, requests: &[StopRequest]) -> TransportResult<Vec<StreamEntryOutcome>> {
        let mut list: Vec<sys::meIOStreamStop_t> = requests
            .iter()
            .map(|r| sys::meIOStreamStop_t {
                iDevice: int(r.device),
                iSubdevice: int(r.subdevice),
                iStopMode: r.mode.to_raw(),
                iFlags: r.flags.bits(),
                iErrno: 0,
            })
            .collect();
        let result = call(|| unsafe {
            sys::meIOStreamStop(list.as_mut_ptr(), list.len() as c_int, sys::ME_IO_STREAM_STOP_NO_FLAGS)
        });
        if let Err(code) = result {
            if list.iter().all(|entry| entry.iErrno == 0) {
                return Err(code);
            }
        }
        Ok(list
            .iter()
            .map(|entry| StreamEntryOutcome {
                device: entry.iDevice as u32,
                subdevice: entry.iSubdevice as u32,
                code: ErrorCode(entry.iErrno),
            })
            .collect())
    }

    fn stream_read(
        &self,
        device: u32,
        subdevice: u32,
        mode: ReadMode,
        buffer: &mut [i32],
    ) -> TransportResult<usize> {
        let mut count = buffer.len() as c_int;
        wait_call(|| unsafe {
            sys::meIOStreamRead(
                int(device),
                int(subdevice),
                mode.to_raw(),
                buffer.as_mut_ptr(),
                &mut count,
                sys::ME_IO_STREAM_READ_NO_FLAGS,
            )
        })?;
        Ok(count.max(0) as usize)
    }

    fn stream_write(
        &self,
        device: u32,
        subdevice: u32,
        mode: WriteMode,
        values: &[i32],
    ) -> TransportResult<usize> {
        let mut copy = values.to_vec();
        let mut count = copy.len() as c_int;
        wait_call(|| unsafe {
            sys::meIOStreamWrite(
                int(device),
                int(subdevice),
                mode.to_raw(),
                copy.as_mut_ptr(),
                &mut count,
                sys::ME_IO_STREAM_WRITE_NO_FLAGS,
            )
        })?;
        Ok(count.max(0) as usize)
    }

    fn stream_status(
        &self,
        device: u32,
        subdevice: u32,
        wait: WaitMode,
    ) -> TransportResult<StatusReport> {
        let mut status: c_int = 0;
        let mut count: c_int = 0;
        let query = || unsafe {
            sys::meIOStreamStatus(int(device), int(subdevice), wait.to_raw(), &mut status, &mut count, 0)
        };
        match wait {
            WaitMode::None => call(query)?,
            WaitMode::Idle => wait_call(query)?,
        }
        Ok(StatusReport {
            status: decode("stream status", status, StreamStatus::from_raw)?,
            values: count.max(0) as usize,
        })
    }

    fn stream_new_values(&self, device: u32, subdevice: u32, timeout_ms: u32) -> TransportResult<usize> {
        let mut count: c_int = 0;
        wait_call(|| unsafe {
            sys::meIOStreamNewValues(int(device), int(subdevice), int(timeout_ms), &mut count, 0)
        })?;
        Ok(count.max(0) as usize)
    }

    fn stream_time_to_ticks(
        &self,
        device: u32,
        subdevice: u32,
        timer: Timer,
        seconds: f64,
    ) -> TransportResult<Ticks> {
        let mut time = seconds;
        let mut low: c_int = 0;
        let mut high: c_int = 0;
        call(|| unsafe {
            sys::meIOStreamTimeToTicks(int(device), int(subdevice), timer.to_raw(), &mut time, &mut low, &mut high, 0)
        })?;
        Ok(Ticks {
            ticks: join_ticks(low, high),
            time,
        })
    }

    fn stream_frequency_to_ticks(
        &self,
        device: u32,
        subdevice: u32,
        timer: Timer,
        hertz: f64,
    ) -> TransportResult<Ticks> {
        let mut frequency = hertz;
        let mut low: c_int = 0;
        let mut high: c_int = 0;
        call(|| unsafe {
            sys::meIOStreamFrequencyToTicks(
                int(device),
                int(subdevice),
                timer.to_raw(),
                &mut frequency,
                &mut low,
                &mut high,
                0,
            )
        })?;
        let time = if frequency > 0.0 { 1.0 / frequency } else { f64::INFINITY };
        Ok(Ticks {
            ticks: join_ticks(low, high),
            time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_ticks() {
        assert_eq!(join_ticks(2, 1), 0x1_0000_0002);
        assert_eq!(join_ticks(-1, 0), 0xFFFF_FFFF);
    }

    #[test]
    fn test_waiting_call_does_not_hold_ffi_lock() {
        use std::sync::mpsc;
        use std::time::Duration;

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();
        let waiter = std::thread::spawn(move || {
            let result = wait_call(|| match stop_rx.recv_timeout(Duration::from_secs(5)) {
                Ok(()) => 0,
                Err(_) => sys::ME_ERRNO_TIMEOUT,
            });
            done_tx.send(result).unwrap();
        });

        // A locked call (a stop) must get through while the wait is parked
        std::thread::sleep(Duration::from_millis(20));
        call(|| {
            stop_tx.send(()).unwrap();
            0
        })
        .unwrap();

        let result = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(result, Ok(()));
        waiter.join().unwrap();
    }

    /// Needs an installed driver and `MEIDS_HARDWARE_TEST=1`.
    #[test]
    fn test_open_installed_driver() {
        if std::env::var("MEIDS_HARDWARE_TEST").as_deref() != Ok("1") {
            return;
        }
        let driver = NativeDriver::new();
        driver.open().unwrap();
        assert!(driver.number_devices().is_ok());
        driver.close(CloseFlags::empty()).unwrap();
    }
}

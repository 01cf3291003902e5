//! Low-level FFI declarations for the Meilhaus ME-iDS driver library.
//!
//! This crate mirrors the C interface of `libmedriver`: the numeric constant
//! catalogue (`ME_*`), the `#[repr(C)]` records exchanged with the driver and
//! the function prototypes. It performs no validation of its own.
//!
//! # Safety
//!
//! All functions are `unsafe` direct FFI calls. For a safe client library
//! use the `daq-driver-meids` crate.
//!
//! # Features
//!
//! - `meids-sdk`: declare and link the vendor functions. Without it only the
//!   constants and record layouts are available, which is enough to build
//!   and test the safe crate on machines without the driver installed.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(missing_docs)]
#![allow(clippy::all)]

use std::os::raw::c_int;

// =============================================================================
// String limits
// =============================================================================

pub const ME_DEVICE_DRIVER_NAME_MAX_COUNT: usize = 64;
pub const ME_DEVICE_NAME_MAX_COUNT: usize = 64;
pub const ME_DEVICE_DESCRIPTION_MAX_COUNT: usize = 256;
pub const ME_ERROR_MSG_MAX_COUNT: usize = 256;

/// Number of auxiliary arguments per trigger stage.
pub const ME_TRIGGER_ARGS_COUNT: usize = 10;

// =============================================================================
// Flags shared by all calls
// =============================================================================

pub const ME_VALUE_NOT_USED: c_int = 0x0;
pub const ME_VALUE_INVALID: c_int = !0x0;

pub const ME_OPEN_NO_FLAGS: c_int = 0x0;
pub const ME_CLOSE_NO_FLAGS: c_int = 0x0;
pub const ME_CLOSE_FORCE: c_int = 0x1000_0000;

// =============================================================================
// Locks
// =============================================================================

pub const ME_LOCK_RELEASE: c_int = 0x0001_0001;
pub const ME_LOCK_SET: c_int = 0x0001_0002;
pub const ME_LOCK_CHECK: c_int = 0x0001_0003;

// =============================================================================
// Reference, trigger channel, trigger type, trigger edge
// =============================================================================

pub const ME_REF_NONE: c_int = 0x0;
pub const ME_REF_DIO_FIFO_LOW: c_int = 0x3_0001;
pub const ME_REF_DIO_FIFO_HIGH: c_int = 0x3_0002;
pub const ME_REF_CTR_PREVIOUS: c_int = 0x4_0001;
pub const ME_REF_CTR_INTERNAL_1MHZ: c_int = 0x4_0002;
pub const ME_REF_CTR_INTERNAL_10MHZ: c_int = 0x4_0003;
pub const ME_REF_CTR_EXTERNAL: c_int = 0x4_0004;
pub const ME_REF_AI_GROUND: c_int = 0x5_0001;
pub const ME_REF_AI_DIFFERENTIAL: c_int = 0x5_0002;
pub const ME_REF_AO_GROUND: c_int = 0x6_0001;
pub const ME_REF_AO_DIFFERENTIAL: c_int = 0x6_0002;

pub const ME_TRIG_CHAN_NONE: c_int = 0x0;
pub const ME_TRIG_CHAN_DEFAULT: c_int = 0x7_0001;
pub const ME_TRIG_CHAN_SYNCHRONOUS: c_int = 0x7_0002;

pub const ME_TRIG_TYPE_NONE: c_int = 0x0;
pub const ME_TRIG_TYPE_SW: c_int = 0x8_0001;
pub const ME_TRIG_TYPE_THRESHOLD: c_int = 0x8_0002;
pub const ME_TRIG_TYPE_WINDOW: c_int = 0x8_0003;
pub const ME_TRIG_TYPE_EDGE: c_int = 0x8_0004;
pub const ME_TRIG_TYPE_SLOPE: c_int = 0x8_0005;
pub const ME_TRIG_TYPE_EXT_DIGITAL: c_int = 0x8_0006;
pub const ME_TRIG_TYPE_EXT_ANALOG: c_int = 0x8_0007;
pub const ME_TRIG_TYPE_PATTERN: c_int = 0x8_0008;
pub const ME_TRIG_TYPE_TIMER: c_int = 0x8_0009;
pub const ME_TRIG_TYPE_COUNT: c_int = 0x8_000A;
pub const ME_TRIG_TYPE_FOLLOW: c_int = 0x8_000B;

pub const ME_TRIG_EDGE_NONE: c_int = 0x0;
pub const ME_TRIG_EDGE_ABOVE: c_int = 0x9_0001;
pub const ME_TRIG_EDGE_BELOW: c_int = 0x9_0002;
pub const ME_TRIG_EDGE_ENTRY: c_int = 0x9_0003;
pub const ME_TRIG_EDGE_EXIT: c_int = 0x9_0004;
pub const ME_TRIG_EDGE_RISING: c_int = 0x9_0005;
pub const ME_TRIG_EDGE_FALLING: c_int = 0x9_0006;
pub const ME_TRIG_EDGE_ANY: c_int = 0x9_0007;

// =============================================================================
// Timers
// =============================================================================

pub const ME_TIMER_ACQ_START: c_int = 0xA_0001;
pub const ME_TIMER_SCAN_START: c_int = 0xA_0002;
pub const ME_TIMER_CONV_START: c_int = 0xA_0003;
pub const ME_TIMER_FIO_TOTAL: c_int = 0xA_0004;
pub const ME_TIMER_FIO_FIRST_PHASE: c_int = 0xA_0005;

// =============================================================================
// Single configuration
// =============================================================================

pub const ME_SINGLE_CONFIG_DIO_INPUT: c_int = 0xD_0001;
pub const ME_SINGLE_CONFIG_DIO_OUTPUT: c_int = 0xD_0002;
pub const ME_SINGLE_CONFIG_DIO_HIGH_IMPEDANCE: c_int = 0xD_0003;
pub const ME_SINGLE_CONFIG_DIO_SINK: c_int = 0xD_0004;
pub const ME_SINGLE_CONFIG_DIO_SOURCE: c_int = 0xD_0005;
pub const ME_SINGLE_CONFIG_DIO_MUX32M: c_int = 0xD_0006;
pub const ME_SINGLE_CONFIG_DIO_DEMUX32: c_int = 0xD_0007;
pub const ME_SINGLE_CONFIG_DIO_BIT_PATTERN: c_int = 0xD_0008;

pub const ME_SINGLE_CONFIG_CTR_8254_MODE_DISABLE: c_int = 0xE_0000;
pub const ME_SINGLE_CONFIG_CTR_8254_MODE_0: c_int = 0xE_0001;
pub const ME_SINGLE_CONFIG_CTR_8254_MODE_1: c_int = 0xE_0002;
pub const ME_SINGLE_CONFIG_CTR_8254_MODE_2: c_int = 0xE_0003;
pub const ME_SINGLE_CONFIG_CTR_8254_MODE_3: c_int = 0xE_0004;
pub const ME_SINGLE_CONFIG_CTR_8254_MODE_4: c_int = 0xE_0005;
pub const ME_SINGLE_CONFIG_CTR_8254_MODE_5: c_int = 0xE_0006;

pub const ME_IO_SINGLE_CONFIG_NO_FLAGS: c_int = 0x0;
pub const ME_IO_SINGLE_CONFIG_DIO_BIT: c_int = 0x1;
pub const ME_IO_SINGLE_CONFIG_DIO_BYTE: c_int = 0x2;
pub const ME_IO_SINGLE_CONFIG_DIO_WORD: c_int = 0x4;
pub const ME_IO_SINGLE_CONFIG_DIO_DWORD: c_int = 0x8;

// =============================================================================
// Single I/O
// =============================================================================

pub const ME_DIR_INPUT: c_int = 0xF_0001;
pub const ME_DIR_OUTPUT: c_int = 0xF_0002;
pub const ME_DIR_SET_OFFSET: c_int = 0xF_0003;

pub const ME_IO_SINGLE_NO_FLAGS: c_int = 0x0;
pub const ME_IO_SINGLE_NONBLOCKING: c_int = 0x20;

pub const ME_IO_SINGLE_TYPE_NO_FLAGS: c_int = 0x0;
pub const ME_IO_SINGLE_TYPE_DIO_BIT: c_int = 0x1;
pub const ME_IO_SINGLE_TYPE_DIO_BYTE: c_int = 0x2;
pub const ME_IO_SINGLE_TYPE_DIO_WORD: c_int = 0x4;
pub const ME_IO_SINGLE_TYPE_DIO_DWORD: c_int = 0x8;
pub const ME_IO_SINGLE_TYPE_TRIG_SYNCHRONOUS: c_int = 0x10;
pub const ME_IO_SINGLE_TYPE_NONBLOCKING: c_int = 0x20;

// =============================================================================
// Streaming
// =============================================================================

pub const ME_IO_STREAM_CONFIG_NO_FLAGS: c_int = 0x0;
pub const ME_IO_STREAM_CONFIG_BIT_PATTERN: c_int = 0x1;
pub const ME_IO_STREAM_CONFIG_WRAPAROUND: c_int = 0x2;
pub const ME_IO_STREAM_CONFIG_SAMPLE_AND_HOLD: c_int = 0x4;
pub const ME_IO_STREAM_CONFIG_HARDWARE_ONLY: c_int = 0x8;

pub const ME_IO_STREAM_CONFIG_TYPE_NO_FLAGS: c_int = 0x0;
pub const ME_IO_STREAM_CONFIG_TYPE_EXTRA_SHUNT: c_int = 0x100;

pub const ME_IO_STREAM_TRIGGER_TYPE_NO_FLAGS: c_int = 0x0;

pub const ME_READ_MODE_BLOCKING: c_int = 0x10_0001;
pub const ME_READ_MODE_NONBLOCKING: c_int = 0x10_0002;
pub const ME_IO_STREAM_READ_NO_FLAGS: c_int = 0x0;
pub const ME_IO_STREAM_READ_FRAMES: c_int = 0x1;

pub const ME_WRITE_MODE_BLOCKING: c_int = 0x11_0001;
pub const ME_WRITE_MODE_NONBLOCKING: c_int = 0x11_0002;
pub const ME_WRITE_MODE_PRELOAD: c_int = 0x11_0003;
pub const ME_IO_STREAM_WRITE_NO_FLAGS: c_int = 0x0;

pub const ME_START_MODE_BLOCKING: c_int = 0x12_0001;
pub const ME_START_MODE_NONBLOCKING: c_int = 0x12_0002;
pub const ME_IO_STREAM_START_NO_FLAGS: c_int = 0x0;
pub const ME_IO_STREAM_START_TYPE_NO_FLAGS: c_int = 0x0;
pub const ME_IO_STREAM_START_TYPE_TRIG_SYNCHRONOUS: c_int = 0x10;

pub const ME_STOP_MODE_IMMEDIATE: c_int = 0x13_0001;
pub const ME_STOP_MODE_LAST_VALUE: c_int = 0x13_0002;
pub const ME_IO_STREAM_STOP_NO_FLAGS: c_int = 0x0;
pub const ME_IO_STREAM_STOP_TYPE_NO_FLAGS: c_int = 0x0;
pub const ME_IO_STREAM_STOP_TYPE_PRESERVE_BUFFERS: c_int = 0x1;

pub const ME_WAIT_NONE: c_int = 0x14_0001;
pub const ME_WAIT_IDLE: c_int = 0x14_0002;
pub const ME_WAIT_BUSY: c_int = 0x14_0003;

pub const ME_STATUS_INVALID: c_int = 0x0;
pub const ME_STATUS_IDLE: c_int = 0x15_0001;
pub const ME_STATUS_BUSY: c_int = 0x15_0002;
pub const ME_STATUS_ERROR: c_int = 0x15_0003;

// =============================================================================
// Signal conditioning modules
// =============================================================================

pub const ME_MODULE_TYPE_MULTISIG_NONE: c_int = 0x0;
pub const ME_MODULE_TYPE_MULTISIG_DIFF16_10V: c_int = 0x16_0001;
pub const ME_MODULE_TYPE_MULTISIG_DIFF16_20V: c_int = 0x16_0002;
pub const ME_MODULE_TYPE_MULTISIG_DIFF16_50V: c_int = 0x16_0003;
pub const ME_MODULE_TYPE_MULTISIG_CURRENT16_0_20MA: c_int = 0x16_0004;
pub const ME_MODULE_TYPE_MULTISIG_RTD8_PT100: c_int = 0x16_0005;
pub const ME_MODULE_TYPE_MULTISIG_RTD8_PT500: c_int = 0x16_0006;
pub const ME_MODULE_TYPE_MULTISIG_RTD8_PT1000: c_int = 0x16_0007;
pub const ME_MODULE_TYPE_MULTISIG_TE8_TYPE_B: c_int = 0x16_0008;
pub const ME_MODULE_TYPE_MULTISIG_TE8_TYPE_E: c_int = 0x16_0009;
pub const ME_MODULE_TYPE_MULTISIG_TE8_TYPE_J: c_int = 0x16_000A;
pub const ME_MODULE_TYPE_MULTISIG_TE8_TYPE_K: c_int = 0x16_000B;
pub const ME_MODULE_TYPE_MULTISIG_TE8_TYPE_N: c_int = 0x16_000C;
pub const ME_MODULE_TYPE_MULTISIG_TE8_TYPE_R: c_int = 0x16_000D;
pub const ME_MODULE_TYPE_MULTISIG_TE8_TYPE_S: c_int = 0x16_000E;
pub const ME_MODULE_TYPE_MULTISIG_TE8_TYPE_T: c_int = 0x16_000F;
pub const ME_MODULE_TYPE_MULTISIG_TE8_TEMP_SENSOR: c_int = 0x16_0010;

// =============================================================================
// Units, subdevice types and subtypes
// =============================================================================

pub const ME_UNIT_INVALID: c_int = 0x0;
pub const ME_UNIT_VOLT: c_int = 0x17_0001;
pub const ME_UNIT_AMPERE: c_int = 0x17_0002;
pub const ME_UNIT_ANY: c_int = 0x17_0003;
pub const ME_UNIT_HZ: c_int = 0x17_0004;

pub const ME_TYPE_INVALID: c_int = 0x0;
pub const ME_TYPE_AO: c_int = 0x18_0001;
pub const ME_TYPE_AI: c_int = 0x18_0002;
pub const ME_TYPE_DIO: c_int = 0x18_0003;
pub const ME_TYPE_DO: c_int = 0x18_0004;
pub const ME_TYPE_DI: c_int = 0x18_0005;
pub const ME_TYPE_CTR: c_int = 0x18_0006;
pub const ME_TYPE_EXT_IRQ: c_int = 0x18_0007;
pub const ME_TYPE_FREQ_IO: c_int = 0x18_0008;
pub const ME_TYPE_FREQ_O: c_int = 0x18_0009;
pub const ME_TYPE_FREQ_I: c_int = 0x18_000A;
pub const ME_TYPE_FPGA: c_int = 0x18_000B;

pub const ME_SUBTYPE_INVALID: c_int = 0x0;
pub const ME_SUBTYPE_SINGLE: c_int = 0x19_0001;
pub const ME_SUBTYPE_STREAMING: c_int = 0x19_0002;
pub const ME_SUBTYPE_CTR_8254: c_int = 0x19_0003;
pub const ME_SUBTYPE_ANY: c_int = 0x19_0004;
pub const ME_SUBTYPE_CTR: c_int = 0x19_0006;

// =============================================================================
// Bus and plug state
// =============================================================================

pub const ME_BUS_TYPE_INVALID: c_int = 0x0;
pub const ME_BUS_TYPE_PCI: c_int = 0x1A_0001;
pub const ME_BUS_TYPE_USB: c_int = 0x1A_0002;
pub const ME_BUS_TYPE_LAN_PCI: c_int = 0x1A_0101;
pub const ME_BUS_TYPE_LAN_USB: c_int = 0x1A_0102;

pub const ME_PLUGGED_INVALID: c_int = 0x0;
pub const ME_PLUGGED_IN: c_int = 0x1B_0001;
pub const ME_PLUGGED_OUT: c_int = 0x1B_0002;

// =============================================================================
// Capabilities
// =============================================================================

pub const ME_CAPS_NONE: c_int = 0x0;
pub const ME_CAPS_AI_TRIG_SYNCHRONOUS: c_int = 0x1;
pub const ME_CAPS_AI_FIFO: c_int = 0x2;
pub const ME_CAPS_AI_FIFO_THRESHOLD: c_int = 0x4;
pub const ME_CAPS_AI_SAMPLE_HOLD: c_int = 0x8;
pub const ME_CAPS_AI_DIFFERENTIAL: c_int = 0x10;
pub const ME_CAPS_TRIG_DIGITAL: c_int = 0x8000;
pub const ME_CAPS_TRIG_ANALOG: c_int = 0x1_0000;
pub const ME_CAPS_TRIG_EDGE_RISING: c_int = 0x2_0000;
pub const ME_CAPS_TRIG_EDGE_FALLING: c_int = 0x4_0000;
pub const ME_CAPS_TRIG_EDGE_ANY: c_int = 0x8_0000;

pub const ME_CAP_AI_FIFO_SIZE: c_int = 0x1D_0000;
pub const ME_CAP_AI_BUFFER_SIZE: c_int = 0x1D_0001;
pub const ME_CAP_AI_CHANNEL_LIST_SIZE: c_int = 0x1D_0002;
pub const ME_CAP_AI_MAX_THRESHOLD_SIZE: c_int = 0x1D_0003;
pub const ME_CAP_AO_FIFO_SIZE: c_int = 0x1F_0000;
pub const ME_CAP_AO_BUFFER_SIZE: c_int = 0x1F_0001;
pub const ME_CAP_AO_CHANNEL_LIST_SIZE: c_int = 0x1F_0002;
pub const ME_CAP_AO_MAX_THRESHOLD_SIZE: c_int = 0x1F_0003;
pub const ME_CAP_CTR_WIDTH: c_int = 0x20_0000;

// =============================================================================
// Error numbers (index into the driver's message table)
// =============================================================================

pub const ME_ERRNO_SUCCESS: c_int = 0;
pub const ME_ERRNO_INVALID_DEVICE: c_int = 1;
pub const ME_ERRNO_INVALID_SUBDEVICE: c_int = 2;
pub const ME_ERRNO_INVALID_CHANNEL: c_int = 3;
pub const ME_ERRNO_INVALID_SINGLE_CONFIG: c_int = 4;
pub const ME_ERRNO_INVALID_REF: c_int = 5;
pub const ME_ERRNO_INVALID_TRIG_CHAN: c_int = 6;
pub const ME_ERRNO_INVALID_TRIG_TYPE: c_int = 7;
pub const ME_ERRNO_INVALID_TRIG_EDGE: c_int = 8;
pub const ME_ERRNO_INVALID_TIMEOUT: c_int = 9;
pub const ME_ERRNO_INVALID_FLAGS: c_int = 10;
pub const ME_ERRNO_OPEN: c_int = 11;
pub const ME_ERRNO_CLOSE: c_int = 12;
pub const ME_ERRNO_NOT_OPEN: c_int = 13;
pub const ME_ERRNO_INVALID_DIR: c_int = 14;
pub const ME_ERRNO_PREVIOUS_CONFIG: c_int = 15;
pub const ME_ERRNO_NOT_SUPPORTED: c_int = 16;
pub const ME_ERRNO_SUBDEVICE_TYPE: c_int = 17;
pub const ME_ERRNO_USER_BUFFER_SIZE: c_int = 18;
pub const ME_ERRNO_LOCKED: c_int = 19;
pub const ME_ERRNO_NOMORE_SUBDEVICE_TYPE: c_int = 20;
pub const ME_ERRNO_TIMEOUT: c_int = 21;
pub const ME_ERRNO_SIGNAL: c_int = 22;
pub const ME_ERRNO_INVALID_IRQ_SOURCE: c_int = 23;
pub const ME_ERRNO_THREAD_RUNNING: c_int = 24;
pub const ME_ERRNO_START_THREAD: c_int = 25;
pub const ME_ERRNO_CANCEL_THREAD: c_int = 26;
pub const ME_ERRNO_NO_CALLBACK: c_int = 27;
pub const ME_ERRNO_USED: c_int = 28;
pub const ME_ERRNO_INVALID_UNIT: c_int = 29;
pub const ME_ERRNO_INVALID_MIN_MAX: c_int = 30;
pub const ME_ERRNO_NO_RANGE: c_int = 31;
pub const ME_ERRNO_INVALID_RANGE: c_int = 32;
pub const ME_ERRNO_SUBDEVICE_BUSY: c_int = 33;
pub const ME_ERRNO_INVALID_LOCK: c_int = 34;
pub const ME_ERRNO_INVALID_SWITCH: c_int = 35;
pub const ME_ERRNO_INVALID_ERROR_MSG_COUNT: c_int = 36;
pub const ME_ERRNO_INVALID_STREAM_CONFIG: c_int = 37;
pub const ME_ERRNO_INVALID_CONFIG_LIST_COUNT: c_int = 38;
pub const ME_ERRNO_INVALID_ACQ_START_TRIG_TYPE: c_int = 39;
pub const ME_ERRNO_INVALID_ACQ_START_TRIG_EDGE: c_int = 40;
pub const ME_ERRNO_INVALID_ACQ_START_TRIG_CHAN: c_int = 41;
pub const ME_ERRNO_INVALID_ACQ_START_TIMEOUT: c_int = 42;
pub const ME_ERRNO_INVALID_ACQ_START_ARG: c_int = 43;
pub const ME_ERRNO_INVALID_SCAN_START_TRIG_TYPE: c_int = 44;
pub const ME_ERRNO_INVALID_SCAN_START_ARG: c_int = 45;
pub const ME_ERRNO_INVALID_CONV_START_TRIG_TYPE: c_int = 46;
pub const ME_ERRNO_INVALID_CONV_START_ARG: c_int = 47;
pub const ME_ERRNO_INVALID_SCAN_STOP_TRIG_TYPE: c_int = 48;
pub const ME_ERRNO_INVALID_SCAN_STOP_ARG: c_int = 49;
pub const ME_ERRNO_INVALID_ACQ_STOP_TRIG_TYPE: c_int = 50;
pub const ME_ERRNO_INVALID_ACQ_STOP_ARG: c_int = 51;
pub const ME_ERRNO_SUBDEVICE_NOT_RUNNING: c_int = 52;
pub const ME_ERRNO_INVALID_READ_MODE: c_int = 53;
pub const ME_ERRNO_INVALID_VALUE_COUNT: c_int = 54;
pub const ME_ERRNO_INVALID_WRITE_MODE: c_int = 55;
pub const ME_ERRNO_INVALID_TIMER: c_int = 56;
pub const ME_ERRNO_DEVICE_UNPLUGGED: c_int = 57;
pub const ME_ERRNO_USED_INTERNAL: c_int = 58;
pub const ME_ERRNO_INVALID_DUTY_CYCLE: c_int = 59;
pub const ME_ERRNO_INVALID_WAIT: c_int = 60;
pub const ME_ERRNO_CONNECT_REMOTE: c_int = 61;
pub const ME_ERRNO_COMMUNICATION: c_int = 62;
pub const ME_ERRNO_INVALID_SINGLE_LIST: c_int = 63;
pub const ME_ERRNO_INVALID_MODULE_TYPE: c_int = 64;
pub const ME_ERRNO_INVALID_START_MODE: c_int = 65;
pub const ME_ERRNO_INVALID_STOP_MODE: c_int = 66;
pub const ME_ERRNO_INVALID_FIFO_IRQ_THRESHOLD: c_int = 67;
pub const ME_ERRNO_INVALID_POINTER: c_int = 68;
pub const ME_ERRNO_CREATE_EVENT: c_int = 69;
pub const ME_ERRNO_LACK_OF_RESOURCES: c_int = 70;
pub const ME_ERRNO_CANCELLED: c_int = 71;
pub const ME_ERRNO_RING_BUFFER_OVERFLOW: c_int = 72;
pub const ME_ERRNO_RING_BUFFER_UNDERFLOW: c_int = 73;
pub const ME_ERRNO_INVALID_IRQ_EDGE: c_int = 74;
pub const ME_ERRNO_INVALID_IRQ_ARG: c_int = 75;
pub const ME_ERRNO_INVALID_CAP: c_int = 76;
pub const ME_ERRNO_INVALID_CAP_ARG_COUNT: c_int = 77;
pub const ME_ERRNO_INTERNAL: c_int = 78;
pub const ME_ERRNO_VALUE_OUT_OF_RANGE: c_int = 79;
pub const ME_ERRNO_HW_BUFFER_OVERFLOW: c_int = 80;
pub const ME_ERRNO_HW_BUFFER_UNDERFLOW: c_int = 81;
pub const ME_ERRNO_CONFIG_LOAD_FAILED: c_int = 82;
pub const ME_ERRNO_INVALID_ERROR_NUMBER: c_int = 83;

// =============================================================================
// Records
// =============================================================================

/// One entry of a `meIOSingle` batch.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct meIOSingle_t {
    pub iDevice: c_int,
    pub iSubdevice: c_int,
    pub iChannel: c_int,
    pub iDir: c_int,
    pub iValue: c_int,
    pub iTimeOut: c_int,
    pub iFlags: c_int,
    pub iErrno: c_int,
}

/// One entry of a stream channel list.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct meIOStreamConfig_t {
    pub iChannel: c_int,
    pub iStreamConfig: c_int,
    pub iRef: c_int,
    pub iFlags: c_int,
}

/// Composite trigger description passed to `meIOStreamConfig`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct meIOStreamTrigger_t {
    pub iAcqStartTrigType: c_int,
    pub iAcqStartTrigEdge: c_int,
    pub iAcqStartTrigChan: c_int,
    pub iAcqStartTicksLow: c_int,
    pub iAcqStartTicksHigh: c_int,
    pub iAcqStartArgs: [c_int; ME_TRIGGER_ARGS_COUNT],
    pub iScanStartTrigType: c_int,
    pub iScanStartTicksLow: c_int,
    pub iScanStartTicksHigh: c_int,
    pub iScanStartArgs: [c_int; ME_TRIGGER_ARGS_COUNT],
    pub iConvStartTrigType: c_int,
    pub iConvStartTicksLow: c_int,
    pub iConvStartTicksHigh: c_int,
    pub iConvStartArgs: [c_int; ME_TRIGGER_ARGS_COUNT],
    pub iScanStopTrigType: c_int,
    pub iScanStopCount: c_int,
    pub iScanStopArgs: [c_int; ME_TRIGGER_ARGS_COUNT],
    pub iAcqStopTrigType: c_int,
    pub iAcqStopCount: c_int,
    pub iAcqStopArgs: [c_int; ME_TRIGGER_ARGS_COUNT],
    pub iFlags: c_int,
}

/// One entry of a `meIOStreamStart` batch.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct meIOStreamStart_t {
    pub iDevice: c_int,
    pub iSubdevice: c_int,
    pub iStartMode: c_int,
    pub iTimeOut: c_int,
    pub iFlags: c_int,
    pub iErrno: c_int,
}

/// One entry of a `meIOStreamStop` batch.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct meIOStreamStop_t {
    pub iDevice: c_int,
    pub iSubdevice: c_int,
    pub iStopMode: c_int,
    pub iFlags: c_int,
    pub iErrno: c_int,
}

// =============================================================================
// Functions
// =============================================================================

#[cfg(feature = "meids-sdk")]
use std::os::raw::{c_char, c_double, c_uint};

#[cfg(feature = "meids-sdk")]
extern "C" {
    pub fn meOpen(iFlags: c_int) -> c_int;
    pub fn meClose(iFlags: c_int) -> c_int;

    pub fn meLockDriver(iLock: c_int, iFlags: c_int) -> c_int;
    pub fn meLockDevice(iDevice: c_int, iLock: c_int, iFlags: c_int) -> c_int;
    pub fn meLockSubdevice(iDevice: c_int, iSubdevice: c_int, iLock: c_int, iFlags: c_int)
        -> c_int;

    pub fn meErrorGetLast(piErrorCode: *mut c_int, iFlags: c_int) -> c_int;
    pub fn meErrorGetMessage(iErrorCode: c_int, pcErrorMsg: *mut c_char, iCount: c_int) -> c_int;
    pub fn meErrorSetDefaultProc(iSwitch: c_int) -> c_int;

    pub fn meIOResetDevice(iDevice: c_int, iFlags: c_int) -> c_int;
    pub fn meIOResetSubdevice(iDevice: c_int, iSubdevice: c_int, iFlags: c_int) -> c_int;

    pub fn meIOSingleConfig(
        iDevice: c_int,
        iSubdevice: c_int,
        iChannel: c_int,
        iSingleConfig: c_int,
        iRef: c_int,
        iTrigChan: c_int,
        iTrigType: c_int,
        iTrigEdge: c_int,
        iFlags: c_int,
    ) -> c_int;
    pub fn meIOSingle(pSingleList: *mut meIOSingle_t, iCount: c_int, iFlags: c_int) -> c_int;

    pub fn meIOStreamConfig(
        iDevice: c_int,
        iSubdevice: c_int,
        pConfigList: *mut meIOStreamConfig_t,
        iCount: c_int,
        pTrigger: *mut meIOStreamTrigger_t,
        iFifoIrqThreshold: c_int,
        iFlags: c_int,
    ) -> c_int;
    pub fn meIOStreamNewValues(
        iDevice: c_int,
        iSubdevice: c_int,
        iTimeOut: c_int,
        piCount: *mut c_int,
        iFlags: c_int,
    ) -> c_int;
    pub fn meIOStreamRead(
        iDevice: c_int,
        iSubdevice: c_int,
        iReadMode: c_int,
        piValues: *mut c_int,
        piCount: *mut c_int,
        iFlags: c_int,
    ) -> c_int;
    pub fn meIOStreamWrite(
        iDevice: c_int,
        iSubdevice: c_int,
        iWriteMode: c_int,
        piValues: *mut c_int,
        piCount: *mut c_int,
        iFlags: c_int,
    ) -> c_int;
    pub fn meIOStreamStart(pStartList: *mut meIOStreamStart_t, iCount: c_int, iFlags: c_int)
        -> c_int;
    pub fn meIOStreamStop(pStopList: *mut meIOStreamStop_t, iCount: c_int, iFlags: c_int)
        -> c_int;
    pub fn meIOStreamStatus(
        iDevice: c_int,
        iSubdevice: c_int,
        iWait: c_int,
        piStatus: *mut c_int,
        piCount: *mut c_int,
        iFlags: c_int,
    ) -> c_int;
    pub fn meIOStreamTimeToTicks(
        iDevice: c_int,
        iSubdevice: c_int,
        iTimer: c_int,
        pdTime: *mut c_double,
        piTicksLow: *mut c_int,
        piTicksHigh: *mut c_int,
        iFlags: c_int,
    ) -> c_int;
    pub fn meIOStreamFrequencyToTicks(
        iDevice: c_int,
        iSubdevice: c_int,
        iTimer: c_int,
        pdFrequency: *mut c_double,
        piTicksLow: *mut c_int,
        piTicksHigh: *mut c_int,
        iFlags: c_int,
    ) -> c_int;

    pub fn meQueryDescriptionDevice(iDevice: c_int, pcDescription: *mut c_char, iCount: c_int)
        -> c_int;
    pub fn meQueryInfoDevice(
        iDevice: c_int,
        piVendorId: *mut c_int,
        piDeviceId: *mut c_int,
        piSerialNo: *mut c_int,
        piBusType: *mut c_int,
        piBusNo: *mut c_int,
        piDevNo: *mut c_int,
        piFuncNo: *mut c_int,
        piPlugged: *mut c_int,
    ) -> c_int;
    pub fn meQueryNameDevice(iDevice: c_int, pcName: *mut c_char, iCount: c_int) -> c_int;
    pub fn meQueryNameDeviceDriver(iDevice: c_int, pcName: *mut c_char, iCount: c_int) -> c_int;
    pub fn meQueryNumberDevices(piNumber: *mut c_int) -> c_int;
    pub fn meQueryNumberSubdevices(iDevice: c_int, piNumber: *mut c_int) -> c_int;
    pub fn meQueryNumberChannels(iDevice: c_int, iSubdevice: c_int, piNumber: *mut c_int)
        -> c_int;
    pub fn meQueryNumberRanges(
        iDevice: c_int,
        iSubdevice: c_int,
        iUnit: c_int,
        piNumber: *mut c_int,
    ) -> c_int;
    pub fn meQueryRangeByMinMax(
        iDevice: c_int,
        iSubdevice: c_int,
        iUnit: c_int,
        pdMin: *mut c_double,
        pdMax: *mut c_double,
        piMaxData: *mut c_int,
        piRange: *mut c_int,
    ) -> c_int;
    pub fn meQueryRangeInfo(
        iDevice: c_int,
        iSubdevice: c_int,
        iRange: c_int,
        piUnit: *mut c_int,
        pdMin: *mut c_double,
        pdMax: *mut c_double,
        piMaxData: *mut c_int,
    ) -> c_int;
    pub fn meQuerySubdeviceByType(
        iDevice: c_int,
        iStartSubdevice: c_int,
        iType: c_int,
        iSubtype: c_int,
        piSubdevice: *mut c_int,
    ) -> c_int;
    pub fn meQuerySubdeviceType(
        iDevice: c_int,
        iSubdevice: c_int,
        piType: *mut c_int,
        piSubtype: *mut c_int,
    ) -> c_int;
    pub fn meQuerySubdeviceCaps(iDevice: c_int, iSubdevice: c_int, piCaps: *mut c_int) -> c_int;
    pub fn meQuerySubdeviceCapsArgs(
        iDevice: c_int,
        iSubdevice: c_int,
        iCap: c_int,
        piArgs: *mut c_int,
        iCount: c_int,
    ) -> c_int;
    pub fn meQueryVersionLibrary(piVersion: *mut c_int) -> c_int;
    pub fn meQueryVersionMainDriver(piVersion: *mut c_int) -> c_int;
    pub fn meQueryVersionDeviceDriver(iDevice: c_int, piVersion: *mut c_int) -> c_int;

    pub fn meUtilityPeriodToTicks(iBaseFreq: c_int, dPeriod: c_double, piTicks: *mut c_uint)
        -> c_int;
    pub fn meUtilityTicksToPeriod(iBaseFreq: c_int, iTicks: c_uint, pdPeriod: *mut c_double)
        -> c_int;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_record_layouts() {
        assert_eq!(size_of::<meIOSingle_t>(), 8 * size_of::<c_int>());
        assert_eq!(size_of::<meIOStreamConfig_t>(), 4 * size_of::<c_int>());
        assert_eq!(size_of::<meIOStreamStart_t>(), 6 * size_of::<c_int>());
        assert_eq!(size_of::<meIOStreamStop_t>(), 5 * size_of::<c_int>());
        // 16 scalar fields plus five argument blocks
        assert_eq!(
            size_of::<meIOStreamTrigger_t>(),
            (16 + 5 * ME_TRIGGER_ARGS_COUNT) * size_of::<c_int>()
        );
    }

    #[test]
    fn test_lock_constants() {
        assert_eq!(ME_LOCK_RELEASE, 0x10001);
        assert_eq!(ME_LOCK_SET, 0x10002);
        assert_eq!(ME_LOCK_CHECK, 0x10003);
    }

    #[test]
    fn test_errno_table_bounds() {
        assert_eq!(ME_ERRNO_SUCCESS, 0);
        assert_eq!(ME_ERRNO_LOCKED, 19);
        assert_eq!(ME_ERRNO_INVALID_ERROR_NUMBER, 83);
    }

    #[test]
    fn test_dio_width_bits_are_distinct() {
        let bits = [
            ME_IO_SINGLE_TYPE_DIO_BIT,
            ME_IO_SINGLE_TYPE_DIO_BYTE,
            ME_IO_SINGLE_TYPE_DIO_WORD,
            ME_IO_SINGLE_TYPE_DIO_DWORD,
        ];
        for (i, a) in bits.iter().enumerate() {
            for b in &bits[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
    }
}

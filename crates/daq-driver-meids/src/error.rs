//! Error types for ME-iDS operations.
//!
//! Failures come in three shapes:
//!
//! - [`MeidsError::InvalidArgument`]: the request was malformed and never
//!   reached the driver.
//! - [`MeidsError::Io`]: the driver refused or failed the operation. The
//!   driver's error number is carried as an [`ErrorCode`].
//! - Per-entry failures of batched calls, which are not errors of the call
//!   itself but [`ErrorCode`] values inside the returned outcomes.

use std::fmt;

use thiserror::Error;

/// Result type alias for ME-iDS operations.
pub type Result<T> = std::result::Result<T, MeidsError>;

/// Errors that can occur when working with ME-iDS devices.
#[derive(Error, Debug)]
pub enum MeidsError {
    /// Malformed argument rejected before any driver call
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Driver call failed
    #[error("{operation} failed: {code}")]
    Io {
        operation: &'static str,
        code: ErrorCode,
    },

    /// No subdevice of the requested type at or after the start index
    #[error("No {subdevice_type:?}/{subtype:?} subdevice on device {device} at or after index {start}")]
    NotFound {
        device: u32,
        start: u32,
        subdevice_type: crate::types::SubdeviceType,
        subtype: crate::types::SubdeviceSubtype,
    },

    /// Session was already closed
    #[error("Session is not open")]
    NotOpen,

    /// Raw code delivered by the driver that has no matching variant
    #[error("Driver returned unknown {what} value {raw:#x}")]
    UnknownValue { what: &'static str, raw: i32 },

    /// Raw code outside `[0, max_data]` passed to a conversion
    #[error("Value {raw} outside [0, {max_data}], clamped to {clamped}")]
    ValueOutOfRange { raw: i64, max_data: u32, clamped: f64 },

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl MeidsError {
    /// Shorthand for an argument error.
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Driver error code, if this is an I/O failure.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Io { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if the failure was lock contention.
    pub fn is_locked(&self) -> bool {
        self.code() == Some(ErrorCode::LOCKED)
    }

    /// Check if this is an argument error.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// Extension for attaching an operation name to raw transport results.
pub(crate) trait IoContext<T> {
    fn io(self, operation: &'static str) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, ErrorCode> {
    fn io(self, operation: &'static str) -> Result<T> {
        self.map_err(|code| MeidsError::Io { operation, code })
    }
}

/// Driver error number.
///
/// Zero means success. Other values index the driver's message table; use
/// [`ErrorCode::message`] for the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ErrorCode(pub i32);

macro_rules! error_codes {
    ($($name:ident = $raw:ident => $msg:literal,)*) => {
        impl ErrorCode {
            $(
                #[doc = $msg]
                pub const $name: ErrorCode = ErrorCode(meids_sys::$raw);
            )*

            /// Human readable text for this code.
            pub fn message(self) -> &'static str {
                match self.0 {
                    $(meids_sys::$raw => $msg,)*
                    _ => "Invalid error number specified.",
                }
            }
        }
    };
}

error_codes! {
    SUCCESS = ME_ERRNO_SUCCESS => "Successful completion.",
    INVALID_DEVICE = ME_ERRNO_INVALID_DEVICE => "Invalid device specified.",
    INVALID_SUBDEVICE = ME_ERRNO_INVALID_SUBDEVICE => "Invalid subdevice specified.",
    INVALID_CHANNEL = ME_ERRNO_INVALID_CHANNEL => "Invalid channel specified.",
    INVALID_SINGLE_CONFIG = ME_ERRNO_INVALID_SINGLE_CONFIG => "Invalid single configuration specified.",
    INVALID_REF = ME_ERRNO_INVALID_REF => "Invalid reference specified.",
    INVALID_TRIG_CHAN = ME_ERRNO_INVALID_TRIG_CHAN => "Invalid trigger channel specified.",
    INVALID_TRIG_TYPE = ME_ERRNO_INVALID_TRIG_TYPE => "Invalid trigger type specified.",
    INVALID_TRIG_EDGE = ME_ERRNO_INVALID_TRIG_EDGE => "Invalid trigger edge specified.",
    INVALID_TIMEOUT = ME_ERRNO_INVALID_TIMEOUT => "Invalid timeout specified.",
    INVALID_FLAGS = ME_ERRNO_INVALID_FLAGS => "Invalid flags specified.",
    OPEN = ME_ERRNO_OPEN => "Cannot open the driver.",
    CLOSE = ME_ERRNO_CLOSE => "Cannot close the driver.",
    NOT_OPEN = ME_ERRNO_NOT_OPEN => "Driver is not opened.",
    INVALID_DIR = ME_ERRNO_INVALID_DIR => "Invalid direction specified.",
    PREVIOUS_CONFIG = ME_ERRNO_PREVIOUS_CONFIG => "The device was not configured for this operation.",
    NOT_SUPPORTED = ME_ERRNO_NOT_SUPPORTED => "Operation not supported by the subdevice.",
    SUBDEVICE_TYPE = ME_ERRNO_SUBDEVICE_TYPE => "Invalid subdevice type specified.",
    USER_BUFFER_SIZE = ME_ERRNO_USER_BUFFER_SIZE => "User buffer is too small.",
    LOCKED = ME_ERRNO_LOCKED => "The resource or parts of it are locked by another process.",
    NOMORE_SUBDEVICE_TYPE = ME_ERRNO_NOMORE_SUBDEVICE_TYPE => "No more subdevices of this type available.",
    TIMEOUT = ME_ERRNO_TIMEOUT => "Operation timed out.",
    SIGNAL = ME_ERRNO_SIGNAL => "Operation interrupted by a signal.",
    INVALID_IRQ_SOURCE = ME_ERRNO_INVALID_IRQ_SOURCE => "Invalid interrupt source specified.",
    THREAD_RUNNING = ME_ERRNO_THREAD_RUNNING => "A thread is already running.",
    START_THREAD = ME_ERRNO_START_THREAD => "Cannot start the thread.",
    CANCEL_THREAD = ME_ERRNO_CANCEL_THREAD => "Cannot cancel the thread.",
    NO_CALLBACK = ME_ERRNO_NO_CALLBACK => "No callback function was registered.",
    USED = ME_ERRNO_USED => "The resource is already in use.",
    INVALID_UNIT = ME_ERRNO_INVALID_UNIT => "Invalid unit specified.",
    INVALID_MIN_MAX = ME_ERRNO_INVALID_MIN_MAX => "Invalid minimum or maximum value specified.",
    NO_RANGE = ME_ERRNO_NO_RANGE => "No range covering the requested limits was found.",
    INVALID_RANGE = ME_ERRNO_INVALID_RANGE => "Invalid range specified.",
    SUBDEVICE_BUSY = ME_ERRNO_SUBDEVICE_BUSY => "Subdevice is busy.",
    INVALID_LOCK = ME_ERRNO_INVALID_LOCK => "Invalid lock specified.",
    INVALID_SWITCH = ME_ERRNO_INVALID_SWITCH => "Invalid switch specified.",
    INVALID_ERROR_MSG_COUNT = ME_ERRNO_INVALID_ERROR_MSG_COUNT => "Invalid error message buffer size specified.",
    INVALID_STREAM_CONFIG = ME_ERRNO_INVALID_STREAM_CONFIG => "Invalid stream configuration specified.",
    INVALID_CONFIG_LIST_COUNT = ME_ERRNO_INVALID_CONFIG_LIST_COUNT => "Invalid configuration list count specified.",
    INVALID_ACQ_START_TRIG_TYPE = ME_ERRNO_INVALID_ACQ_START_TRIG_TYPE => "Invalid acquisition start trigger type specified.",
    INVALID_ACQ_START_TRIG_EDGE = ME_ERRNO_INVALID_ACQ_START_TRIG_EDGE => "Invalid acquisition start trigger edge specified.",
    INVALID_ACQ_START_TRIG_CHAN = ME_ERRNO_INVALID_ACQ_START_TRIG_CHAN => "Invalid acquisition start trigger channel specified.",
    INVALID_ACQ_START_TIMEOUT = ME_ERRNO_INVALID_ACQ_START_TIMEOUT => "Invalid acquisition start timeout specified.",
    INVALID_ACQ_START_ARG = ME_ERRNO_INVALID_ACQ_START_ARG => "Invalid acquisition start argument specified.",
    INVALID_SCAN_START_TRIG_TYPE = ME_ERRNO_INVALID_SCAN_START_TRIG_TYPE => "Invalid scan start trigger type specified.",
    INVALID_SCAN_START_ARG = ME_ERRNO_INVALID_SCAN_START_ARG => "Invalid scan start argument specified.",
    INVALID_CONV_START_TRIG_TYPE = ME_ERRNO_INVALID_CONV_START_TRIG_TYPE => "Invalid conversion start trigger type specified.",
    INVALID_CONV_START_ARG = ME_ERRNO_INVALID_CONV_START_ARG => "Invalid conversion start argument specified.",
    INVALID_SCAN_STOP_TRIG_TYPE = ME_ERRNO_INVALID_SCAN_STOP_TRIG_TYPE => "Invalid scan stop trigger type specified.",
    INVALID_SCAN_STOP_ARG = ME_ERRNO_INVALID_SCAN_STOP_ARG => "Invalid scan stop argument specified.",
    INVALID_ACQ_STOP_TRIG_TYPE = ME_ERRNO_INVALID_ACQ_STOP_TRIG_TYPE => "Invalid acquisition stop trigger type specified.",
    INVALID_ACQ_STOP_ARG = ME_ERRNO_INVALID_ACQ_STOP_ARG => "Invalid acquisition stop argument specified.",
    SUBDEVICE_NOT_RUNNING = ME_ERRNO_SUBDEVICE_NOT_RUNNING => "Subdevice is not running.",
    INVALID_READ_MODE = ME_ERRNO_INVALID_READ_MODE => "Invalid read mode specified.",
    INVALID_VALUE_COUNT = ME_ERRNO_INVALID_VALUE_COUNT => "Invalid value count specified.",
    INVALID_WRITE_MODE = ME_ERRNO_INVALID_WRITE_MODE => "Invalid write mode specified.",
    INVALID_TIMER = ME_ERRNO_INVALID_TIMER => "Invalid timer specified.",
    DEVICE_UNPLUGGED = ME_ERRNO_DEVICE_UNPLUGGED => "Device is unplugged.",
    USED_INTERNAL = ME_ERRNO_USED_INTERNAL => "The requested resource is used internally.",
    INVALID_DUTY_CYCLE = ME_ERRNO_INVALID_DUTY_CYCLE => "Invalid duty cycle specified.",
    INVALID_WAIT = ME_ERRNO_INVALID_WAIT => "Invalid wait mode specified.",
    CONNECT_REMOTE = ME_ERRNO_CONNECT_REMOTE => "Cannot connect to the remote host.",
    COMMUNICATION = ME_ERRNO_COMMUNICATION => "Communication with the remote host failed.",
    INVALID_SINGLE_LIST = ME_ERRNO_INVALID_SINGLE_LIST => "Invalid single list specified.",
    INVALID_MODULE_TYPE = ME_ERRNO_INVALID_MODULE_TYPE => "Invalid module type specified.",
    INVALID_START_MODE = ME_ERRNO_INVALID_START_MODE => "Invalid start mode specified.",
    INVALID_STOP_MODE = ME_ERRNO_INVALID_STOP_MODE => "Invalid stop mode specified.",
    INVALID_FIFO_IRQ_THRESHOLD = ME_ERRNO_INVALID_FIFO_IRQ_THRESHOLD => "Invalid FIFO interrupt threshold specified.",
    INVALID_POINTER = ME_ERRNO_INVALID_POINTER => "Invalid pointer specified.",
    CREATE_EVENT = ME_ERRNO_CREATE_EVENT => "Cannot create the event.",
    LACK_OF_RESOURCES = ME_ERRNO_LACK_OF_RESOURCES => "Not enough resources to perform the operation.",
    CANCELLED = ME_ERRNO_CANCELLED => "Operation was cancelled.",
    RING_BUFFER_OVERFLOW = ME_ERRNO_RING_BUFFER_OVERFLOW => "Software ring buffer overflow.",
    RING_BUFFER_UNDERFLOW = ME_ERRNO_RING_BUFFER_UNDERFLOW => "Software ring buffer underflow.",
    INVALID_IRQ_EDGE = ME_ERRNO_INVALID_IRQ_EDGE => "Invalid interrupt edge specified.",
    INVALID_IRQ_ARG = ME_ERRNO_INVALID_IRQ_ARG => "Invalid interrupt argument specified.",
    INVALID_CAP = ME_ERRNO_INVALID_CAP => "Invalid capability specified.",
    INVALID_CAP_ARG_COUNT = ME_ERRNO_INVALID_CAP_ARG_COUNT => "Invalid capability argument count specified.",
    INTERNAL = ME_ERRNO_INTERNAL => "Internal driver error.",
    VALUE_OUT_OF_RANGE = ME_ERRNO_VALUE_OUT_OF_RANGE => "Value out of range.",
    HW_BUFFER_OVERFLOW = ME_ERRNO_HW_BUFFER_OVERFLOW => "Hardware buffer overflow.",
    HW_BUFFER_UNDERFLOW = ME_ERRNO_HW_BUFFER_UNDERFLOW => "Hardware buffer underflow.",
    CONFIG_LOAD_FAILED = ME_ERRNO_CONFIG_LOAD_FAILED => "Configuration could not be loaded.",
    INVALID_ERROR_NUMBER = ME_ERRNO_INVALID_ERROR_NUMBER => "Invalid error number specified.",
}

impl ErrorCode {
    /// Check for the success code.
    pub fn is_success(self) -> bool {
        self.0 == meids_sys::ME_ERRNO_SUCCESS
    }

    /// Turn a raw status into a `Result`.
    pub fn check(raw: i32) -> std::result::Result<(), ErrorCode> {
        if raw == meids_sys::ME_ERRNO_SUCCESS {
            Ok(())
        } else {
            Err(ErrorCode(raw))
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {})", self.message(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_messages() {
        assert_eq!(ErrorCode::TIMEOUT.message(), "Operation timed out.");
        assert_eq!(ErrorCode(9999).message(), "Invalid error number specified.");
        assert!(ErrorCode::SUCCESS.is_success());
        assert!(!ErrorCode::LOCKED.is_success());
    }

    #[test]
    fn test_io_display_includes_code() {
        let err = MeidsError::Io {
            operation: "lock_device",
            code: ErrorCode::LOCKED,
        };
        let text = err.to_string();
        assert!(text.contains("lock_device"));
        assert!(text.contains("errno 19"));
        assert!(err.is_locked());
    }

    #[test]
    fn test_check() {
        assert!(ErrorCode::check(0).is_ok());
        assert_eq!(ErrorCode::check(21), Err(ErrorCode::TIMEOUT));
    }
}

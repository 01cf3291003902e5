//! Timer tick conversion.
//!
//! Streaming timers count ticks of a fixed base clock. A requested period
//! or frequency is rounded to the nearest tick count the timer can realize,
//! and the realized value is reported back in [`Ticks`]. Callers must use
//! that value rather than their request.
//!
//! ```text
//! ticks = round(period * base)      clamped to [min_ticks, max_ticks]
//! time  = ticks / base
//! ```
//!
//! The [`fio`] module holds the base-frequency helpers used for frequency
//! I/O subdevices.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IoContext, MeidsError, Result};
use crate::session::Session;
use crate::types::Timer;

/// A tick count together with the period it realizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticks {
    /// Tick count the timer will use
    pub ticks: u64,
    /// Realized period in seconds
    pub time: f64,
}

impl Ticks {
    /// Realized frequency in hertz.
    pub fn frequency(&self) -> f64 {
        if self.time > 0.0 {
            1.0 / self.time
        } else {
            0.0
        }
    }
}

/// Base clock and tick limits of one timer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimerSpec {
    /// Which timer this describes
    pub timer: Timer,
    /// Base clock in hertz
    pub base_frequency: f64,
    /// Smallest programmable tick count
    pub min_ticks: u64,
    /// Largest programmable tick count
    pub max_ticks: u64,
}

impl TimerSpec {
    /// Timer without limits; it cannot realize any period.
    fn unlimited(&self) -> bool {
        self.min_ticks == 0 && self.max_ticks == 0
    }

    /// Period of `ticks` in seconds.
    pub fn ticks_to_time(&self, ticks: u64) -> f64 {
        if self.base_frequency > 0.0 {
            ticks as f64 / self.base_frequency
        } else {
            f64::INFINITY
        }
    }

    /// Round a period to the nearest realizable tick count.
    pub fn quantize_time(&self, seconds: f64) -> Ticks {
        if self.unlimited() || self.base_frequency <= 0.0 {
            return Ticks {
                ticks: 0,
                time: f64::INFINITY,
            };
        }

        let base = self.base_frequency;
        let ticks = if seconds < self.min_ticks as f64 / base {
            self.min_ticks
        } else if seconds > self.max_ticks as f64 / base {
            self.max_ticks
        } else {
            (seconds * base + 0.5) as u64
        };
        Ticks {
            ticks,
            time: self.ticks_to_time(ticks),
        }
    }

    /// Round a frequency to the nearest realizable tick count.
    ///
    /// Zero and frequencies above the fastest rate select `min_ticks`.
    pub fn quantize_frequency(&self, hertz: f64) -> Ticks {
        if self.unlimited() || self.base_frequency <= 0.0 {
            return Ticks {
                ticks: 0,
                time: f64::INFINITY,
            };
        }

        let base = self.base_frequency;
        let ticks = if hertz == 0.0 || hertz > base / self.min_ticks as f64 {
            self.min_ticks
        } else if hertz < base / self.max_ticks as f64 {
            self.max_ticks
        } else {
            (base / hertz + 0.5) as u64
        };
        Ticks {
            ticks,
            time: self.ticks_to_time(ticks),
        }
    }
}

impl Session {
    /// Realizable tick count for a period on one timer of a streaming subdevice.
    pub fn time_to_ticks(&self, device: u32, subdevice: u32, timer: Timer, seconds: f64) -> Result<Ticks> {
        let transport = self.transport()?;
        if seconds.is_nan() || seconds < 0.0 {
            return Err(MeidsError::invalid(format!("period {} is not a duration", seconds)));
        }
        let ticks = transport
            .stream_time_to_ticks(device, subdevice, timer, seconds)
            .io("stream_time_to_ticks")?;
        debug!(device, subdevice, timer = ?timer, requested = seconds, ticks = ticks.ticks, actual = ticks.time, "Time to ticks");
        Ok(ticks)
    }

    /// Realizable tick count for a frequency on one timer of a streaming subdevice.
    pub fn frequency_to_ticks(&self, device: u32, subdevice: u32, timer: Timer, hertz: f64) -> Result<Ticks> {
        let transport = self.transport()?;
        if hertz.is_nan() || hertz < 0.0 {
            return Err(MeidsError::invalid(format!("frequency {} is not a rate", hertz)));
        }
        let ticks = transport
            .stream_frequency_to_ticks(device, subdevice, timer, hertz)
            .io("stream_frequency_to_ticks")?;
        debug!(device, subdevice, timer = ?timer, requested = hertz, ticks = ticks.ticks, actual = ticks.frequency(), "Frequency to ticks");
        Ok(ticks)
    }
}

/// Tick and divider helpers for frequency I/O subdevices.
pub mod fio {
    use crate::error::{ErrorCode, MeidsError, Result};

    const DIVIDER_SCALE: f64 = 4_294_967_296.0;

    fn positive(value: f64) -> bool {
        value > 0.0
    }

    fn out_of_range(operation: &'static str) -> MeidsError {
        MeidsError::Io {
            operation,
            code: ErrorCode::VALUE_OUT_OF_RANGE,
        }
    }

    /// Truncated number of base-clock ticks in `period` seconds.
    pub fn period_to_ticks(base_frequency: f64, period: f64) -> Result<u64> {
        if !positive(base_frequency) || period.is_nan() || period < 0.0 {
            return Err(out_of_range("period_to_ticks"));
        }
        Ok((period * base_frequency) as u64)
    }

    /// Period of `ticks` base-clock ticks in seconds.
    pub fn ticks_to_period(base_frequency: f64, ticks: u64) -> Result<f64> {
        if !positive(base_frequency) {
            return Err(out_of_range("ticks_to_period"));
        }
        Ok(ticks as f64 / base_frequency)
    }

    /// Truncated number of base-clock ticks in one period of `frequency`.
    pub fn frequency_to_ticks(base_frequency: f64, frequency: f64) -> Result<u64> {
        if !positive(base_frequency) || !positive(frequency) {
            return Err(out_of_range("frequency_to_ticks"));
        }
        Ok((base_frequency / frequency) as u64)
    }

    /// Frequency whose period is `ticks` base-clock ticks.
    pub fn ticks_to_frequency(base_frequency: f64, ticks: u64) -> Result<f64> {
        if !positive(base_frequency) || ticks == 0 {
            return Err(out_of_range("ticks_to_frequency"));
        }
        Ok(base_frequency / ticks as f64)
    }

    /// Encode a duty fraction in `[0, 1]` as a 32-bit divider.
    ///
    /// Values are clamped; `1.0` wraps to code 0, which decodes back to 1.0.
    pub fn code_divider(fraction: f64) -> u32 {
        let clamped = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        (clamped * DIVIDER_SCALE) as u64 as u32
    }

    /// Decode a 32-bit divider into a fraction in `(0, 1]`.
    pub fn decode_divider(code: u32) -> f64 {
        let fraction = f64::from(code) / DIVIDER_SCALE;
        if fraction > 0.0 {
            fraction
        } else {
            1.0 + fraction
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv_timer() -> TimerSpec {
        TimerSpec {
            timer: Timer::ConvStart,
            base_frequency: 33_000_000.0,
            min_ticks: 66,
            max_ticks: 0xFFFF_FFFF,
        }
    }

    #[test]
    fn test_quantize_time_rounds() {
        let ticks = conv_timer().quantize_time(1e-4);
        assert_eq!(ticks.ticks, 3300);
        assert!((ticks.time - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn test_quantize_time_clamps() {
        let spec = conv_timer();
        assert_eq!(spec.quantize_time(0.0).ticks, 66);
        assert_eq!(spec.quantize_time(1e6).ticks, 0xFFFF_FFFF);
    }

    #[test]
    fn test_quantize_frequency() {
        let spec = conv_timer();
        let ticks = spec.quantize_frequency(10_000.0);
        assert_eq!(ticks.ticks, 3300);
        assert!((ticks.frequency() - 10_000.0).abs() < 1e-6);

        // Unrealizable rate reports the realized one
        let ticks = spec.quantize_frequency(7_000.0);
        assert_eq!(ticks.ticks, 4714);
        assert!((ticks.frequency() - 33e6 / 4714.0).abs() < 1e-9);

        assert_eq!(spec.quantize_frequency(0.0).ticks, 66);
        assert_eq!(spec.quantize_frequency(1e9).ticks, 66);
    }

    #[test]
    fn test_unlimited_timer() {
        let spec = TimerSpec {
            min_ticks: 0,
            max_ticks: 0,
            ..conv_timer()
        };
        let ticks = spec.quantize_time(1.0);
        assert_eq!(ticks.ticks, 0);
        assert!(ticks.time.is_infinite());
        assert_eq!(ticks.frequency(), 0.0);
    }

    #[test]
    fn test_fio_ticks() {
        assert_eq!(fio::period_to_ticks(66e6, 1e-3).ok(), Some(66_000));
        assert_eq!(fio::frequency_to_ticks(66e6, 1000.0).ok(), Some(66_000));
        assert!(fio::period_to_ticks(0.0, 1.0).is_err());
        assert!(fio::period_to_ticks(66e6, -1.0).is_err());
        assert!(fio::frequency_to_ticks(66e6, 0.0).is_err());
        assert_eq!(fio::ticks_to_period(1000.0, 500).ok(), Some(0.5));
        assert_eq!(fio::ticks_to_frequency(1000.0, 500).ok(), Some(2.0));
        assert!(fio::ticks_to_frequency(1000.0, 0).is_err());
    }

    #[test]
    fn test_fio_divider() {
        assert_eq!(fio::code_divider(0.5), 0x8000_0000);
        assert_eq!(fio::code_divider(2.0), 0);
        assert_eq!(fio::code_divider(-1.0), 0);
        assert_eq!(fio::decode_divider(0x8000_0000), 0.5);
        assert_eq!(fio::decode_divider(0), 1.0);
    }
}

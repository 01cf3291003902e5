//! Conversion between digital codes and physical values.
//!
//! A range maps the codes `0..=max_data` linearly onto `[min, max]`:
//!
//! ```text
//! physical = min + raw * (max - min) / max_data
//! raw      = round((physical - min) * max_data / (max - min))
//! ```
//!
//! Analog inputs fronted by a signal conditioning module need a further
//! correction, selected by [`ModuleType`]. Temperature modules are
//! linearized through the tables in [`crate::linearization`].
//!
//! None of these functions touch the driver.

use tracing::{debug, warn};

use crate::error::{MeidsError, Result};
use crate::linearization::{pt100_temperature, Thermocouple};
use crate::streaming::StreamChannelConfig;
use crate::transport::RangeInfo;
use crate::types::ModuleType;

/// Excitation current of RTD modules in amperes, used when the caller
/// passes a reference value of zero.
pub const DEFAULT_RTD_CURRENT: f64 = 0.0005;

/// Gain between thermocouple and ADC on TE modules.
pub const TE_GAIN: f64 = 1.0;

/// Widest `max_data` whose codes fit the driver's `i32` sample type.
pub const MAX_DATA_LIMIT: u32 = i32::MAX as u32;

fn check_code_width(max_data: u32) -> Result<()> {
    if max_data > MAX_DATA_LIMIT {
        return Err(MeidsError::invalid(format!(
            "max_data {max_data} exceeds the widest code {MAX_DATA_LIMIT}"
        )));
    }
    Ok(())
}

fn check_max_data(max_data: u32) -> Result<()> {
    if max_data == 0 {
        return Err(MeidsError::invalid("max_data must be greater than zero"));
    }
    check_code_width(max_data)
}

/// Convert a raw code to a physical value.
///
/// `reference_value` depends on the module: the excitation current in
/// amperes for RTD modules (zero selects [`DEFAULT_RTD_CURRENT`]) and the
/// cold junction temperature in °C for thermocouple modules. Other modules
/// ignore it.
///
/// A code outside `0..=max_data` yields [`MeidsError::ValueOutOfRange`]
/// carrying the range limit it was clamped to.
pub fn digital_to_physical(
    min: f64,
    max: f64,
    max_data: u32,
    raw: i32,
    module: ModuleType,
    reference_value: f64,
) -> Result<f64> {
    check_max_data(max_data)?;

    if raw < 0 || i64::from(raw) > i64::from(max_data) {
        let clamped = if raw < 0 { min } else { max };
        warn!(raw, max_data, clamped, "Digital value outside range");
        return Err(MeidsError::ValueOutOfRange {
            raw: i64::from(raw),
            max_data,
            clamped,
        });
    }

    let volts = min + (max - min) * f64::from(raw) / f64::from(max_data);
    Ok(apply_module(volts, module, reference_value))
}

fn apply_module(volts: f64, module: ModuleType, reference_value: f64) -> f64 {
    let current = if reference_value == 0.0 {
        DEFAULT_RTD_CURRENT
    } else {
        reference_value
    };
    let thermocouple = |kind: Thermocouple| kind.temperature(volts / TE_GAIN * 1e6) + reference_value;

    match module {
        ModuleType::None | ModuleType::Diff16_10V => volts,
        ModuleType::Diff16_20V => volts * 2.0,
        ModuleType::Diff16_50V => volts * 5.0,
        ModuleType::Current16_0_20mA => volts * 20e-3 / 10.0,
        ModuleType::Rtd8Pt100 => pt100_temperature(volts / 40.0 / current),
        ModuleType::Rtd8Pt500 => pt100_temperature(volts / 8.0 / current),
        ModuleType::Rtd8Pt1000 => pt100_temperature(volts / 4.0 / current),
        ModuleType::Te8TypeB => thermocouple(Thermocouple::B),
        ModuleType::Te8TypeE => thermocouple(Thermocouple::E),
        ModuleType::Te8TypeJ => thermocouple(Thermocouple::J),
        ModuleType::Te8TypeK => thermocouple(Thermocouple::K),
        ModuleType::Te8TypeN => thermocouple(Thermocouple::N),
        ModuleType::Te8TypeR => thermocouple(Thermocouple::R),
        ModuleType::Te8TypeS => thermocouple(Thermocouple::S),
        ModuleType::Te8TypeT => thermocouple(Thermocouple::T),
        ModuleType::Te8TempSensor => (volts / 4.0 - 0.5) / 0.01,
    }
}

/// Convert a physical value to the nearest raw code.
///
/// The result is clamped to `0..=max_data`. Returns 0 when `max_data` is 0.
/// `max_data` above [`MAX_DATA_LIMIT`] is rejected.
pub fn physical_to_digital(min: f64, max: f64, max_data: u32, physical: f64) -> Result<i32> {
    if min.is_nan() || max.is_nan() || max <= min {
        return Err(MeidsError::invalid(format!("empty range [{min}, {max}]")));
    }
    check_code_width(max_data)?;
    if max_data == 0 {
        return Ok(0);
    }
    if physical.is_nan() {
        return Err(MeidsError::invalid("physical value is NaN"));
    }

    let exact = (physical - min) * f64::from(max_data) / (max - min);
    let code = (exact + 0.5).floor();
    let clamped = code.clamp(0.0, f64::from(max_data));
    if clamped != code {
        debug!(physical, min, max, code = clamped, "Physical value clamped to range");
    }
    Ok(clamped as i32)
}

/// Convert every code of `raw` with [`digital_to_physical`].
///
/// Stops at the first out-of-range code.
pub fn digital_to_physical_slice(
    range: &RangeInfo,
    raw: &[i32],
    module: ModuleType,
    reference_value: f64,
) -> Result<Vec<f64>> {
    raw.iter()
        .map(|&code| {
            digital_to_physical(range.min, range.max, range.max_data, code, module, reference_value)
        })
        .collect()
}

/// Convert every value of `physical` with [`physical_to_digital`].
pub fn physical_to_digital_slice(range: &RangeInfo, physical: &[f64]) -> Result<Vec<i32>> {
    physical
        .iter()
        .map(|&value| physical_to_digital(range.min, range.max, range.max_data, value))
        .collect()
}

/// Pick the samples of `channel` out of an interleaved stream buffer.
///
/// Samples cycle through `configs` in list order. A channel listed more
/// than once in the pattern contributes every one of its slots. A trailing
/// partial scan is included.
pub fn extract_values(channel: u32, raw: &[i32], configs: &[StreamChannelConfig]) -> Vec<i32> {
    if configs.is_empty() {
        return Vec::new();
    }
    raw.iter()
        .zip(configs.iter().cycle())
        .filter(|(_, config)| config.channel == channel)
        .map(|(value, _)| *value)
        .collect()
}

impl RangeInfo {
    /// Convert a raw code of this range to volts (or amperes).
    pub fn to_physical(&self, raw: i32) -> Result<f64> {
        digital_to_physical(self.min, self.max, self.max_data, raw, ModuleType::None, 0.0)
    }

    /// Convert a physical value to the nearest code of this range.
    pub fn to_digital(&self, physical: f64) -> Result<i32> {
        physical_to_digital(self.min, self.max, self.max_data, physical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Unit;

    fn bipolar() -> RangeInfo {
        RangeInfo {
            index: 0,
            unit: Unit::Volt,
            min: -10.0,
            max: 10.0,
            max_data: 0xFFFF,
        }
    }

    #[test]
    fn test_linear_endpoints() {
        let r = bipolar();
        assert_eq!(r.to_physical(0).ok(), Some(-10.0));
        assert_eq!(r.to_physical(0xFFFF).ok(), Some(10.0));
        assert!((r.to_physical(0x8000).unwrap() - 0.000152590).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_code_reports_clamp() {
        let err = digital_to_physical(-10.0, 10.0, 0xFFFF, -1, ModuleType::None, 0.0).unwrap_err();
        assert!(matches!(
            err,
            MeidsError::ValueOutOfRange { raw: -1, clamped, .. } if clamped == -10.0
        ));
        let err = digital_to_physical(-10.0, 10.0, 0xFFFF, 0x10000, ModuleType::None, 0.0).unwrap_err();
        assert!(matches!(err, MeidsError::ValueOutOfRange { clamped, .. } if clamped == 10.0));
    }

    #[test]
    fn test_zero_max_data_rejected() {
        assert!(digital_to_physical(0.0, 1.0, 0, 0, ModuleType::None, 0.0)
            .unwrap_err()
            .is_invalid_argument());
        assert_eq!(physical_to_digital(0.0, 1.0, 0, 0.5).ok(), Some(0));
    }

    #[test]
    fn test_physical_to_digital_rounds_to_nearest() {
        // One LSB of 0..10 V over 0..=1000 is 10 mV
        assert_eq!(physical_to_digital(0.0, 10.0, 1000, 0.014).ok(), Some(1));
        assert_eq!(physical_to_digital(0.0, 10.0, 1000, 0.016).ok(), Some(2));
    }

    #[test]
    fn test_physical_to_digital_clamps() {
        let r = bipolar();
        assert_eq!(r.to_digital(-20.0).ok(), Some(0));
        assert_eq!(r.to_digital(20.0).ok(), Some(0xFFFF));
        assert!(physical_to_digital(1.0, 1.0, 100, 1.0).is_err());
        assert!(r.to_digital(f64::NAN).is_err());
    }

    #[test]
    fn test_round_trip_within_half_lsb() {
        let r = bipolar();
        let lsb = r.span() / f64::from(r.max_data);
        for v in [-9.99, -1.234, 0.0, 3.3, 9.5] {
            let code = r.to_digital(v).unwrap();
            assert!((r.to_physical(code).unwrap() - v).abs() <= lsb / 2.0 + 1e-12);
        }
    }

    #[test]
    fn test_boundaries_for_every_code_width() {
        for max_data in [1, 255, 4095, 65535, (1 << 24) - 1, MAX_DATA_LIMIT] {
            let top = i32::try_from(max_data).unwrap();
            assert_eq!(physical_to_digital(-10.0, 10.0, max_data, -10.0).ok(), Some(0));
            assert_eq!(physical_to_digital(-10.0, 10.0, max_data, 10.0).ok(), Some(top));
            assert_eq!(physical_to_digital(-10.0, 10.0, max_data, 50.0).ok(), Some(top));

            let lsb = 20.0 / f64::from(max_data);
            for v in [-10.0, -3.7, 0.0, 1.25, 9.99, 10.0] {
                let code = physical_to_digital(-10.0, 10.0, max_data, v).unwrap();
                let back = digital_to_physical(-10.0, 10.0, max_data, code, ModuleType::None, 0.0)
                    .unwrap();
                assert!((back - v).abs() <= lsb / 2.0 + 1e-12, "{v} at max_data {max_data}");
            }
        }
    }

    #[test]
    fn test_too_wide_max_data_rejected() {
        for max_data in [MAX_DATA_LIMIT + 1, u32::MAX] {
            assert!(physical_to_digital(0.0, 10.0, max_data, 10.0)
                .unwrap_err()
                .is_invalid_argument());
            assert!(digital_to_physical(0.0, 10.0, max_data, 0, ModuleType::None, 0.0)
                .unwrap_err()
                .is_invalid_argument());
        }
    }

    #[test]
    fn test_divider_modules_scale() {
        let full = |m| digital_to_physical(0.0, 10.0, 100, 100, m, 0.0).unwrap();
        assert_eq!(full(ModuleType::Diff16_10V), 10.0);
        assert_eq!(full(ModuleType::Diff16_20V), 20.0);
        assert_eq!(full(ModuleType::Diff16_50V), 50.0);
        assert!((full(ModuleType::Current16_0_20mA) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_rtd_uses_default_current() {
        // 138.5055 ohm at 0.5 mA through gain 40 reads as 2.77011 V
        let volts = 138.5055 * DEFAULT_RTD_CURRENT * 40.0;
        let t = apply_module(volts, ModuleType::Rtd8Pt100, 0.0);
        assert!((t - 100.0).abs() < 0.01);
        let t = apply_module(volts, ModuleType::Rtd8Pt100, DEFAULT_RTD_CURRENT);
        assert!((t - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_thermocouple_adds_cold_junction() {
        let volts = Thermocouple::K.emf(100.0) * 1e-6;
        let t = apply_module(volts, ModuleType::Te8TypeK, 0.0);
        assert!((t - 100.0).abs() < 0.05);
        let t = apply_module(volts, ModuleType::Te8TypeK, 21.5);
        assert!((t - 121.5).abs() < 0.05);
    }

    #[test]
    fn test_temp_sensor() {
        assert!((apply_module(3.0, ModuleType::Te8TempSensor, 0.0) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_extract_values() {
        let configs = [
            StreamChannelConfig::new(0, 0),
            StreamChannelConfig::new(1, 0),
            StreamChannelConfig::new(0, 0),
        ];
        let raw = [10, 20, 11, 12, 21, 13, 14];
        assert_eq!(extract_values(0, &raw, &configs), vec![10, 11, 12, 13, 14]);
        assert_eq!(extract_values(1, &raw, &configs), vec![20, 21]);
        assert!(extract_values(5, &raw, &configs).is_empty());
        assert!(extract_values(0, &raw, &[]).is_empty());
    }
}

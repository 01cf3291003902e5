//! Driver configuration.
//!
//! [`DriverConfig`] selects the backend. [`SystemConfig`] describes the
//! installation the simulated backend presents: devices, their subdevices,
//! ranges, timers and capabilities. It is loaded from TOML with
//! `MEIDS_`-prefixed environment overrides:
//!
//! ```toml
//! main_driver_version = 0x00010300
//!
//! [[devices]]
//! name = "ME-4660"
//! description = "ME-4660 analog I/O board"
//! driver_name = "me4600"
//! driver_version = 0x00010300
//! info = { vendor_id = 0x1402, device_id = 0x4660, serial_number = 1, bus_type = "pci", bus_number = 2, device_number = 0, function_number = 0, plugged = "in" }
//!
//! [[devices.subdevices]]
//! type = "analog_input"
//! subtype = "streaming"
//! channels = 16
//! ranges = [{ unit = "volt", min = -10.0, max = 10.0, max_data = 65535 }]
//! timers = [{ timer = "conv_start", base_frequency = 33e6, min_ticks = 66, max_ticks = 4294967295 }]
//! ```

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::timing::TimerSpec;
use crate::transport::DeviceInfo;
use crate::types::{
    BusType, CapabilityArg, PlugState, SubdeviceCaps, SubdeviceSubtype, SubdeviceType, Timer, Unit,
};

/// Error types for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Invalid TOML or wrong field types
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// Parsed but inconsistent
    #[error("Config validation failed: {0}")]
    Invalid(String),
}

/// Which transport a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process simulated driver
    #[default]
    Simulated,
    /// Vendor library (feature `hardware`)
    Native,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Transport to connect
    #[serde(default)]
    pub backend: Backend,
    /// Installation presented by the simulated backend
    #[serde(default)]
    pub system: SystemConfig,
}

/// One range of an analog subdevice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    /// Physical unit
    pub unit: Unit,
    /// Physical value of code 0
    pub min: f64,
    /// Physical value of `max_data`
    pub max: f64,
    /// Largest digital code
    pub max_data: u32,
}

/// Arguments reported for one capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapArgConfig {
    /// Capability the values answer
    pub cap: CapabilityArg,
    /// Values returned for the capability
    pub values: Vec<i32>,
}

fn default_burst_size() -> usize {
    512
}

/// One subdevice of a simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubdeviceConfig {
    /// Kind of I/O unit
    #[serde(rename = "type")]
    pub subdevice_type: SubdeviceType,
    /// Single or streaming, or counter kind
    pub subtype: SubdeviceSubtype,
    /// Number of channels
    pub channels: u32,
    /// Ranges in index order
    #[serde(default)]
    pub ranges: Vec<RangeConfig>,
    /// Capability flags
    #[serde(default)]
    pub caps: SubdeviceCaps,
    /// Answers to capability queries
    #[serde(default)]
    pub caps_args: Vec<CapArgConfig>,
    /// Streaming timers
    #[serde(default)]
    pub timers: Vec<TimerSpec>,
    /// Largest number of values a non-blocking read returns
    #[serde(default = "default_burst_size")]
    pub burst_size: usize,
}

impl SubdeviceConfig {
    /// Timer description, if the subdevice has that timer.
    pub fn timer(&self, timer: Timer) -> Option<&TimerSpec> {
        self.timers.iter().find(|spec| spec.timer == timer)
    }
}

/// One simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name
    pub name: String,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Name of the device driver
    pub driver_name: String,
    /// Version of the device driver
    #[serde(default)]
    pub driver_version: u32,
    /// Bus identification
    pub info: DeviceInfo,
    /// Subdevices in index order
    #[serde(default)]
    pub subdevices: Vec<SubdeviceConfig>,
}

fn default_library_version() -> u32 {
    0x0001_0300
}

/// The installation a simulated driver presents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Make every open fail, as if no driver were loaded
    #[serde(default)]
    pub unavailable: bool,
    /// Reported library version
    #[serde(default = "default_library_version")]
    pub library_version: u32,
    /// Reported main driver version
    #[serde(default = "default_library_version")]
    pub main_driver_version: u32,
    /// Installed devices
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl Default for SystemConfig {
    /// One ME-4680-like board.
    fn default() -> Self {
        Self {
            unavailable: false,
            library_version: default_library_version(),
            main_driver_version: default_library_version(),
            devices: vec![me4680()],
        }
    }
}

fn streaming_timers(conv_max: u64) -> Vec<TimerSpec> {
    let base_frequency = 33_000_000.0;
    vec![
        TimerSpec {
            timer: Timer::AcqStart,
            base_frequency,
            min_ticks: 66,
            max_ticks: 0xFF_FFFF_FFFF,
        },
        TimerSpec {
            timer: Timer::ScanStart,
            base_frequency,
            min_ticks: 66,
            max_ticks: 0xFF_FFFF_FFFF,
        },
        TimerSpec {
            timer: Timer::ConvStart,
            base_frequency,
            min_ticks: 66,
            max_ticks: conv_max,
        },
    ]
}

fn me4680() -> DeviceConfig {
    let volts = |min, max| RangeConfig {
        unit: Unit::Volt,
        min,
        max,
        max_data: 0xFFFF,
    };

    DeviceConfig {
        name: "ME-4680".to_string(),
        description: "ME-4680 simulated analog, digital and counter I/O board".to_string(),
        driver_name: "me4600".to_string(),
        driver_version: default_library_version(),
        info: DeviceInfo {
            vendor_id: 0x1402,
            device_id: 0x4680,
            serial_number: 0x0468_0001,
            bus_type: BusType::Pci,
            bus_number: 1,
            device_number: 0,
            function_number: 0,
            plugged: PlugState::In,
        },
        subdevices: vec![
            SubdeviceConfig {
                subdevice_type: SubdeviceType::AnalogInput,
                subtype: SubdeviceSubtype::Streaming,
                channels: 2,
                ranges: vec![
                    volts(-10.0, 10.0),
                    volts(-2.5, 2.5),
                    volts(0.0, 10.0),
                    volts(0.0, 2.5),
                ],
                caps: SubdeviceCaps::AI_TRIG_SYNCHRONOUS
                    | SubdeviceCaps::AI_FIFO
                    | SubdeviceCaps::AI_FIFO_THRESHOLD
                    | SubdeviceCaps::AI_SAMPLE_HOLD
                    | SubdeviceCaps::AI_DIFFERENTIAL
                    | SubdeviceCaps::TRIG_DIGITAL
                    | SubdeviceCaps::TRIG_ANALOG
                    | SubdeviceCaps::TRIG_EDGE_RISING
                    | SubdeviceCaps::TRIG_EDGE_FALLING
                    | SubdeviceCaps::TRIG_EDGE_ANY,
                caps_args: vec![
                    CapArgConfig {
                        cap: CapabilityArg::AiFifoSize,
                        values: vec![2048],
                    },
                    CapArgConfig {
                        cap: CapabilityArg::AiChannelListSize,
                        values: vec![1024],
                    },
                ],
                timers: streaming_timers(0xFFFF_FFFF),
                burst_size: default_burst_size(),
            },
            SubdeviceConfig {
                subdevice_type: SubdeviceType::AnalogOutput,
                subtype: SubdeviceSubtype::Streaming,
                channels: 1,
                ranges: vec![volts(-10.0, 10.0)],
                caps: SubdeviceCaps::TRIG_DIGITAL
                    | SubdeviceCaps::TRIG_EDGE_RISING
                    | SubdeviceCaps::TRIG_EDGE_FALLING
                    | SubdeviceCaps::TRIG_EDGE_ANY,
                caps_args: vec![CapArgConfig {
                    cap: CapabilityArg::AoFifoSize,
                    values: vec![4096],
                }],
                timers: streaming_timers(0xFFFF_FFFF),
                burst_size: default_burst_size(),
            },
            SubdeviceConfig {
                subdevice_type: SubdeviceType::DigitalIo,
                subtype: SubdeviceSubtype::Single,
                channels: 8,
                ranges: Vec::new(),
                caps: SubdeviceCaps::empty(),
                caps_args: Vec::new(),
                timers: Vec::new(),
                burst_size: default_burst_size(),
            },
            SubdeviceConfig {
                subdevice_type: SubdeviceType::Counter,
                subtype: SubdeviceSubtype::Counter8254,
                channels: 3,
                ranges: Vec::new(),
                caps: SubdeviceCaps::empty(),
                caps_args: vec![CapArgConfig {
                    cap: CapabilityArg::CounterWidth,
                    values: vec![16],
                }],
                timers: Vec::new(),
                burst_size: default_burst_size(),
            },
        ],
    }
}

impl SystemConfig {
    /// Parse TOML text over the default installation.
    ///
    /// Omitted top-level keys keep their default; a `devices` array replaces
    /// the default board.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SystemConfig = Figment::from(Serialized::defaults(SystemConfig::default()))
            .merge(Toml::string(text))
            .extract()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (d, device) in self.devices.iter().enumerate() {
            if device.name.is_empty() {
                return Err(ConfigError::Invalid(format!("device {} has no name", d)));
            }
            for (s, sub) in device.subdevices.iter().enumerate() {
                let at = format!("device {} subdevice {}", d, s);
                if sub.channels == 0 {
                    return Err(ConfigError::Invalid(format!("{} has no channels", at)));
                }
                if sub.subtype == SubdeviceSubtype::Any {
                    return Err(ConfigError::Invalid(format!("{} uses the wildcard subtype", at)));
                }
                if sub.burst_size == 0 {
                    return Err(ConfigError::Invalid(format!("{} has a zero burst size", at)));
                }
                for range in &sub.ranges {
                    if range.unit == Unit::Any || range.min >= range.max || range.max_data == 0 {
                        return Err(ConfigError::Invalid(format!(
                            "{} has an invalid range [{}, {}] ({:?}, max_data {})",
                            at, range.min, range.max, range.unit, range.max_data
                        )));
                    }
                }
                for timer in &sub.timers {
                    if timer.base_frequency <= 0.0 || timer.min_ticks > timer.max_ticks {
                        return Err(ConfigError::Invalid(format!(
                            "{} has an invalid {:?} timer",
                            at, timer.timer
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Load a system description from a TOML file.
///
/// Environment variables prefixed with `MEIDS_` override top-level keys,
/// e.g. `MEIDS_UNAVAILABLE=true`.
pub fn load_system_config(path: &Path) -> Result<SystemConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    debug!("Loading system config from: {}", path.display());

    let config: SystemConfig = Figment::from(Serialized::defaults(SystemConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MEIDS_").only(&["unavailable", "library_version", "main_driver_version"]))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;

    info!(
        devices = config.devices.len(),
        "Loaded system config from {}",
        path.display()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_system_is_valid() {
        let config = SystemConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].subdevices.len(), 4);
        assert!(config.devices[0].subdevices[0].timer(Timer::ConvStart).is_some());
    }

    #[test]
    fn test_default_backend_is_simulated() {
        assert_eq!(DriverConfig::default().backend, Backend::Simulated);
    }

    #[test]
    fn test_inline_toml_overrides() {
        let config = SystemConfig::from_toml_str("unavailable = true").unwrap();
        assert!(config.unavailable);
        assert_eq!(config.devices.len(), 1);
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut config = SystemConfig::default();
        config.devices[0].subdevices[0].ranges[0].min = 20.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_system_config(Path::new("/nonexistent/meids.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}

//! Closed enumerations and flag sets for the ME-iDS driver interface.
//!
//! Every numeric selector the driver accepts is modelled as its own enum so
//! that an invalid combination cannot be expressed. Conversions to and from
//! the raw `ME_*` values happen only at the transport boundary.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{MeidsError, Result};

macro_rules! me_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $raw:ident,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
        }

        impl $name {
            /// Convert from the raw driver value.
            pub fn from_raw(raw: i32) -> Option<Self> {
                match raw {
                    $(meids_sys::$raw => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Convert to the raw driver value.
            pub fn to_raw(self) -> i32 {
                match self {
                    $(Self::$variant => meids_sys::$raw,)+
                }
            }
        }
    };
}

me_enum! {
    /// Operation performed by a lock call.
    LockMode {
        /// Release a lock held by this session
        Release = ME_LOCK_RELEASE,
        /// Acquire the lock
        Set = ME_LOCK_SET,
        /// Report contention without changing anything
        Check = ME_LOCK_CHECK,
    }
}

me_enum! {
    /// Functional type of a subdevice.
    SubdeviceType {
        AnalogOutput = ME_TYPE_AO,
        AnalogInput = ME_TYPE_AI,
        DigitalIo = ME_TYPE_DIO,
        DigitalOutput = ME_TYPE_DO,
        DigitalInput = ME_TYPE_DI,
        Counter = ME_TYPE_CTR,
        ExternalInterrupt = ME_TYPE_EXT_IRQ,
        FrequencyIo = ME_TYPE_FREQ_IO,
        FrequencyOutput = ME_TYPE_FREQ_O,
        FrequencyInput = ME_TYPE_FREQ_I,
        Fpga = ME_TYPE_FPGA,
    }
}

me_enum! {
    /// Transfer style of a subdevice.
    SubdeviceSubtype {
        Single = ME_SUBTYPE_SINGLE,
        Streaming = ME_SUBTYPE_STREAMING,
        Counter8254 = ME_SUBTYPE_CTR_8254,
        Counter = ME_SUBTYPE_CTR,
        /// Wildcard for searches
        Any = ME_SUBTYPE_ANY,
    }
}

impl SubdeviceSubtype {
    /// Check whether `self`, used as a search pattern, accepts `actual`.
    ///
    /// `Any` accepts single and streaming subdevices.
    pub fn matches(self, actual: SubdeviceSubtype) -> bool {
        match self {
            Self::Any => matches!(actual, Self::Single | Self::Streaming),
            _ => self == actual,
        }
    }
}

me_enum! {
    /// Physical unit of a range.
    Unit {
        Volt = ME_UNIT_VOLT,
        Ampere = ME_UNIT_AMPERE,
        Hertz = ME_UNIT_HZ,
        /// Wildcard for range queries
        Any = ME_UNIT_ANY,
    }
}

impl Unit {
    /// Check whether `self`, used as a filter, accepts `actual`.
    pub fn matches(self, actual: Unit) -> bool {
        self == Unit::Any || self == actual
    }
}

me_enum! {
    /// Signal reference of a channel.
    Reference {
        None = ME_REF_NONE,
        DioFifoLow = ME_REF_DIO_FIFO_LOW,
        DioFifoHigh = ME_REF_DIO_FIFO_HIGH,
        CtrPrevious = ME_REF_CTR_PREVIOUS,
        CtrInternal1MHz = ME_REF_CTR_INTERNAL_1MHZ,
        CtrInternal10MHz = ME_REF_CTR_INTERNAL_10MHZ,
        CtrExternal = ME_REF_CTR_EXTERNAL,
        AiGround = ME_REF_AI_GROUND,
        AiDifferential = ME_REF_AI_DIFFERENTIAL,
        AoGround = ME_REF_AO_GROUND,
        AoDifferential = ME_REF_AO_DIFFERENTIAL,
    }
}

me_enum! {
    /// Trigger line selection.
    TriggerChannel {
        None = ME_TRIG_CHAN_NONE,
        Default = ME_TRIG_CHAN_DEFAULT,
        Synchronous = ME_TRIG_CHAN_SYNCHRONOUS,
    }
}

me_enum! {
    /// Trigger source of one stage.
    TriggerType {
        None = ME_TRIG_TYPE_NONE,
        Software = ME_TRIG_TYPE_SW,
        Threshold = ME_TRIG_TYPE_THRESHOLD,
        Window = ME_TRIG_TYPE_WINDOW,
        Edge = ME_TRIG_TYPE_EDGE,
        Slope = ME_TRIG_TYPE_SLOPE,
        ExtDigital = ME_TRIG_TYPE_EXT_DIGITAL,
        ExtAnalog = ME_TRIG_TYPE_EXT_ANALOG,
        Pattern = ME_TRIG_TYPE_PATTERN,
        Timer = ME_TRIG_TYPE_TIMER,
        Count = ME_TRIG_TYPE_COUNT,
        Follow = ME_TRIG_TYPE_FOLLOW,
    }
}

impl TriggerType {
    /// External hardware trigger.
    pub fn is_external(self) -> bool {
        matches!(self, Self::ExtDigital | Self::ExtAnalog)
    }
}

me_enum! {
    /// Trigger edge or window condition.
    TriggerEdge {
        None = ME_TRIG_EDGE_NONE,
        Above = ME_TRIG_EDGE_ABOVE,
        Below = ME_TRIG_EDGE_BELOW,
        Entry = ME_TRIG_EDGE_ENTRY,
        Exit = ME_TRIG_EDGE_EXIT,
        Rising = ME_TRIG_EDGE_RISING,
        Falling = ME_TRIG_EDGE_FALLING,
        Any = ME_TRIG_EDGE_ANY,
    }
}

me_enum! {
    /// Timer of a streaming subdevice.
    Timer {
        AcqStart = ME_TIMER_ACQ_START,
        ScanStart = ME_TIMER_SCAN_START,
        ConvStart = ME_TIMER_CONV_START,
        FioTotal = ME_TIMER_FIO_TOTAL,
        FioFirstPhase = ME_TIMER_FIO_FIRST_PHASE,
    }
}

me_enum! {
    /// Direction of a single transfer.
    Direction {
        Input = ME_DIR_INPUT,
        Output = ME_DIR_OUTPUT,
    }
}

me_enum! {
    /// Stream read behaviour.
    ReadMode {
        Blocking = ME_READ_MODE_BLOCKING,
        NonBlocking = ME_READ_MODE_NONBLOCKING,
    }
}

me_enum! {
    /// Stream write behaviour.
    WriteMode {
        Blocking = ME_WRITE_MODE_BLOCKING,
        NonBlocking = ME_WRITE_MODE_NONBLOCKING,
        /// Fill the output buffer before the stream is started
        Preload = ME_WRITE_MODE_PRELOAD,
    }
}

me_enum! {
    /// Stream start behaviour.
    StartMode {
        Blocking = ME_START_MODE_BLOCKING,
        NonBlocking = ME_START_MODE_NONBLOCKING,
    }
}

me_enum! {
    /// Output state after a stream stop.
    StopMode {
        /// Outputs return to their idle level
        Immediate = ME_STOP_MODE_IMMEDIATE,
        /// Outputs hold the last generated value
        LastValue = ME_STOP_MODE_LAST_VALUE,
    }
}

me_enum! {
    /// Wait behaviour of a status query.
    WaitMode {
        None = ME_WAIT_NONE,
        /// Block until the subdevice is no longer running
        Idle = ME_WAIT_IDLE,
    }
}

me_enum! {
    /// Stream state reported by the driver.
    StreamStatus {
        Invalid = ME_STATUS_INVALID,
        Idle = ME_STATUS_IDLE,
        Busy = ME_STATUS_BUSY,
        Error = ME_STATUS_ERROR,
    }
}

me_enum! {
    /// Bus a device is attached to.
    BusType {
        Pci = ME_BUS_TYPE_PCI,
        Usb = ME_BUS_TYPE_USB,
        LanPci = ME_BUS_TYPE_LAN_PCI,
        LanUsb = ME_BUS_TYPE_LAN_USB,
    }
}

me_enum! {
    /// Whether a device is currently present.
    PlugState {
        In = ME_PLUGGED_IN,
        Out = ME_PLUGGED_OUT,
    }
}

/// Mode programmed by a single configuration call.
///
/// Analog subdevices take a range index, digital and counter subdevices a
/// port or counter mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleConfigMode {
    /// Range index for analog channels
    Range(u32),
    DioInput,
    DioOutput,
    DioHighImpedance,
    DioSink,
    DioSource,
    DioMux32M,
    DioDemux32,
    DioBitPattern,
    Ctr8254Disable,
    /// 8254 counter mode 0 to 5
    Ctr8254Mode(u8),
}

impl SingleConfigMode {
    /// Convert to the raw driver value.
    pub fn to_raw(self) -> Result<i32> {
        Ok(match self {
            Self::Range(index) => i32::try_from(index)
                .map_err(|_| MeidsError::invalid(format!("range index {} too large", index)))?,
            Self::DioInput => meids_sys::ME_SINGLE_CONFIG_DIO_INPUT,
            Self::DioOutput => meids_sys::ME_SINGLE_CONFIG_DIO_OUTPUT,
            Self::DioHighImpedance => meids_sys::ME_SINGLE_CONFIG_DIO_HIGH_IMPEDANCE,
            Self::DioSink => meids_sys::ME_SINGLE_CONFIG_DIO_SINK,
            Self::DioSource => meids_sys::ME_SINGLE_CONFIG_DIO_SOURCE,
            Self::DioMux32M => meids_sys::ME_SINGLE_CONFIG_DIO_MUX32M,
            Self::DioDemux32 => meids_sys::ME_SINGLE_CONFIG_DIO_DEMUX32,
            Self::DioBitPattern => meids_sys::ME_SINGLE_CONFIG_DIO_BIT_PATTERN,
            Self::Ctr8254Disable => meids_sys::ME_SINGLE_CONFIG_CTR_8254_MODE_DISABLE,
            Self::Ctr8254Mode(mode @ 0..=5) => {
                meids_sys::ME_SINGLE_CONFIG_CTR_8254_MODE_0 + i32::from(mode)
            }
            Self::Ctr8254Mode(mode) => {
                return Err(MeidsError::invalid(format!("8254 mode {} is not 0..=5", mode)))
            }
        })
    }

    /// True for modes that drive a digital port.
    pub fn is_dio_output(self) -> bool {
        matches!(
            self,
            Self::DioOutput | Self::DioSink | Self::DioSource | Self::DioBitPattern
        )
    }
}

bitflags! {
    /// Flags of a single configuration call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SingleConfigFlags: i32 {
        const DIO_BIT = meids_sys::ME_IO_SINGLE_CONFIG_DIO_BIT;
        const DIO_BYTE = meids_sys::ME_IO_SINGLE_CONFIG_DIO_BYTE;
        const DIO_WORD = meids_sys::ME_IO_SINGLE_CONFIG_DIO_WORD;
        const DIO_DWORD = meids_sys::ME_IO_SINGLE_CONFIG_DIO_DWORD;
    }
}

bitflags! {
    /// Flags of one single I/O entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SingleFlags: i32 {
        const DIO_BIT = meids_sys::ME_IO_SINGLE_TYPE_DIO_BIT;
        const DIO_BYTE = meids_sys::ME_IO_SINGLE_TYPE_DIO_BYTE;
        const DIO_WORD = meids_sys::ME_IO_SINGLE_TYPE_DIO_WORD;
        const DIO_DWORD = meids_sys::ME_IO_SINGLE_TYPE_DIO_DWORD;
        const TRIG_SYNCHRONOUS = meids_sys::ME_IO_SINGLE_TYPE_TRIG_SYNCHRONOUS;
        const NONBLOCKING = meids_sys::ME_IO_SINGLE_TYPE_NONBLOCKING;
    }
}

bitflags! {
    /// Flags of a whole single I/O batch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SingleBatchFlags: i32 {
        const NONBLOCKING = meids_sys::ME_IO_SINGLE_NONBLOCKING;
    }
}

/// Reject flag words selecting more than one DIO access width.
pub(crate) fn check_dio_width(bits: i32, what: &str) -> Result<()> {
    let width = bits
        & (meids_sys::ME_IO_SINGLE_TYPE_DIO_BIT
            | meids_sys::ME_IO_SINGLE_TYPE_DIO_BYTE
            | meids_sys::ME_IO_SINGLE_TYPE_DIO_WORD
            | meids_sys::ME_IO_SINGLE_TYPE_DIO_DWORD);
    if width.count_ones() > 1 {
        return Err(MeidsError::invalid(format!(
            "{} selects more than one DIO width ({:#x})",
            what, width
        )));
    }
    Ok(())
}

bitflags! {
    /// Flags of a stream configuration call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StreamConfigFlags: i32 {
        const BIT_PATTERN = meids_sys::ME_IO_STREAM_CONFIG_BIT_PATTERN;
        /// Replay the preloaded output buffer endlessly
        const WRAPAROUND = meids_sys::ME_IO_STREAM_CONFIG_WRAPAROUND;
        const SAMPLE_AND_HOLD = meids_sys::ME_IO_STREAM_CONFIG_SAMPLE_AND_HOLD;
        const HARDWARE_ONLY = meids_sys::ME_IO_STREAM_CONFIG_HARDWARE_ONLY;
    }
}

bitflags! {
    /// Flags of one channel list entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct StreamChannelFlags: i32 {
        const EXTRA_SHUNT = meids_sys::ME_IO_STREAM_CONFIG_TYPE_EXTRA_SHUNT;
    }
}

bitflags! {
    /// Flags of one stream start entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StartFlags: i32 {
        const TRIG_SYNCHRONOUS = meids_sys::ME_IO_STREAM_START_TYPE_TRIG_SYNCHRONOUS;
    }
}

bitflags! {
    /// Flags of one stream stop entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StopFlags: i32 {
        /// Keep unread input data after the stop
        const PRESERVE_BUFFERS = meids_sys::ME_IO_STREAM_STOP_TYPE_PRESERVE_BUFFERS;
    }
}

bitflags! {
    /// Flags of a close call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CloseFlags: i32 {
        /// Drop every outstanding open of this process
        const FORCE = meids_sys::ME_CLOSE_FORCE;
    }
}

bitflags! {
    /// Capability bits of a subdevice.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct SubdeviceCaps: i32 {
        const AI_TRIG_SYNCHRONOUS = meids_sys::ME_CAPS_AI_TRIG_SYNCHRONOUS;
        const AI_FIFO = meids_sys::ME_CAPS_AI_FIFO;
        const AI_FIFO_THRESHOLD = meids_sys::ME_CAPS_AI_FIFO_THRESHOLD;
        const AI_SAMPLE_HOLD = meids_sys::ME_CAPS_AI_SAMPLE_HOLD;
        const AI_DIFFERENTIAL = meids_sys::ME_CAPS_AI_DIFFERENTIAL;
        const TRIG_DIGITAL = meids_sys::ME_CAPS_TRIG_DIGITAL;
        const TRIG_ANALOG = meids_sys::ME_CAPS_TRIG_ANALOG;
        const TRIG_EDGE_RISING = meids_sys::ME_CAPS_TRIG_EDGE_RISING;
        const TRIG_EDGE_FALLING = meids_sys::ME_CAPS_TRIG_EDGE_FALLING;
        const TRIG_EDGE_ANY = meids_sys::ME_CAPS_TRIG_EDGE_ANY;
    }
}

me_enum! {
    /// Capability whose arguments can be queried.
    CapabilityArg {
        AiFifoSize = ME_CAP_AI_FIFO_SIZE,
        AiBufferSize = ME_CAP_AI_BUFFER_SIZE,
        AiChannelListSize = ME_CAP_AI_CHANNEL_LIST_SIZE,
        AiMaxThresholdSize = ME_CAP_AI_MAX_THRESHOLD_SIZE,
        AoFifoSize = ME_CAP_AO_FIFO_SIZE,
        AoBufferSize = ME_CAP_AO_BUFFER_SIZE,
        AoChannelListSize = ME_CAP_AO_CHANNEL_LIST_SIZE,
        AoMaxThresholdSize = ME_CAP_AO_MAX_THRESHOLD_SIZE,
        CounterWidth = ME_CAP_CTR_WIDTH,
    }
}

me_enum! {
    /// Signal conditioning module in front of an analog input.
    ///
    /// Selects the correction applied by
    /// [`digital_to_physical`](crate::conversion::digital_to_physical).
    ModuleType {
        None = ME_MODULE_TYPE_MULTISIG_NONE,
        Diff16_10V = ME_MODULE_TYPE_MULTISIG_DIFF16_10V,
        Diff16_20V = ME_MODULE_TYPE_MULTISIG_DIFF16_20V,
        Diff16_50V = ME_MODULE_TYPE_MULTISIG_DIFF16_50V,
        Current16_0_20mA = ME_MODULE_TYPE_MULTISIG_CURRENT16_0_20MA,
        Rtd8Pt100 = ME_MODULE_TYPE_MULTISIG_RTD8_PT100,
        Rtd8Pt500 = ME_MODULE_TYPE_MULTISIG_RTD8_PT500,
        Rtd8Pt1000 = ME_MODULE_TYPE_MULTISIG_RTD8_PT1000,
        Te8TypeB = ME_MODULE_TYPE_MULTISIG_TE8_TYPE_B,
        Te8TypeE = ME_MODULE_TYPE_MULTISIG_TE8_TYPE_E,
        Te8TypeJ = ME_MODULE_TYPE_MULTISIG_TE8_TYPE_J,
        Te8TypeK = ME_MODULE_TYPE_MULTISIG_TE8_TYPE_K,
        Te8TypeN = ME_MODULE_TYPE_MULTISIG_TE8_TYPE_N,
        Te8TypeR = ME_MODULE_TYPE_MULTISIG_TE8_TYPE_R,
        Te8TypeS = ME_MODULE_TYPE_MULTISIG_TE8_TYPE_S,
        Te8TypeT = ME_MODULE_TYPE_MULTISIG_TE8_TYPE_T,
        Te8TempSensor = ME_MODULE_TYPE_MULTISIG_TE8_TEMP_SENSOR,
    }
}

impl ModuleType {
    /// Check if this is a platinum resistance thermometer module.
    pub fn is_rtd(self) -> bool {
        matches!(self, Self::Rtd8Pt100 | Self::Rtd8Pt500 | Self::Rtd8Pt1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip_for_lock_modes() {
        for mode in [LockMode::Release, LockMode::Set, LockMode::Check] {
            assert_eq!(LockMode::from_raw(mode.to_raw()), Some(mode));
        }
        assert_eq!(LockMode::from_raw(0x1234), None);
    }

    #[test]
    fn test_subtype_any_matches_single_and_streaming() {
        assert!(SubdeviceSubtype::Any.matches(SubdeviceSubtype::Single));
        assert!(SubdeviceSubtype::Any.matches(SubdeviceSubtype::Streaming));
        assert!(!SubdeviceSubtype::Any.matches(SubdeviceSubtype::Counter8254));
        assert!(!SubdeviceSubtype::Single.matches(SubdeviceSubtype::Streaming));
    }

    #[test]
    fn test_unit_any_matches_everything() {
        assert!(Unit::Any.matches(Unit::Volt));
        assert!(Unit::Any.matches(Unit::Ampere));
        assert!(!Unit::Volt.matches(Unit::Ampere));
    }

    #[test]
    fn test_single_config_mode_raw() {
        assert_eq!(SingleConfigMode::Range(3).to_raw().ok(), Some(3));
        assert_eq!(
            SingleConfigMode::Ctr8254Mode(2).to_raw().ok(),
            Some(meids_sys::ME_SINGLE_CONFIG_CTR_8254_MODE_2)
        );
        assert!(SingleConfigMode::Ctr8254Mode(6).to_raw().is_err());
    }

    #[test]
    fn test_dio_width_exclusive() {
        assert!(check_dio_width(SingleFlags::DIO_BYTE.bits(), "entry").is_ok());
        assert!(check_dio_width(
            (SingleFlags::DIO_BYTE | SingleFlags::TRIG_SYNCHRONOUS).bits(),
            "entry"
        )
        .is_ok());
        assert!(check_dio_width((SingleFlags::DIO_BIT | SingleFlags::DIO_WORD).bits(), "entry")
            .is_err());
    }

    #[test]
    fn test_serde_names() {
        let text = toml::to_string(&Holder {
            ty: SubdeviceType::AnalogInput,
        });
        assert_eq!(text.ok().as_deref(), Some("ty = \"analog_input\"\n"));
    }

    #[derive(Serialize)]
    struct Holder {
        ty: SubdeviceType,
    }
}

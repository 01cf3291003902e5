//! Sensor linearization tables.
//!
//! Platinum RTDs and thermocouples have a nonlinear response. The forward
//! functions (temperature to resistance, temperature to EMF) are sampled at
//! 1 °C steps into lookup tables the first time they are used, and the
//! inverse is found by linear interpolation between neighbouring entries.
//!
//! - RTD resistance follows the Callendar-Van Dusen equation with the
//!   IEC 60751 coefficients.
//! - Thermocouple EMF follows the NIST ITS-90 reference polynomials.
//!
//! Inputs beyond a table clamp to the first or last temperature of that
//! table.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Nominal resistance of a PT100 at 0 °C, in ohms.
pub const PT100_R0: f64 = 100.0;

const CVD_A: f64 = 3.9083e-3;
const CVD_B: f64 = -5.775e-7;
const CVD_C: f64 = -4.183e-12;

/// Monotonic table of a sensor quantity sampled once per degree.
#[derive(Debug)]
pub struct Table {
    start: i32,
    values: Vec<f64>,
}

impl Table {
    fn generate(start: i32, end: i32, f: impl Fn(f64) -> f64) -> Self {
        Self {
            start,
            values: (start..=end).map(|t| f(f64::from(t))).collect(),
        }
    }

    /// First tabulated temperature in °C.
    pub fn min_temperature(&self) -> f64 {
        f64::from(self.start)
    }

    /// Last tabulated temperature in °C.
    pub fn max_temperature(&self) -> f64 {
        self.min_temperature() + (self.values.len() - 1) as f64
    }

    /// Temperature whose tabulated value is `x`, interpolated linearly.
    pub fn temperature(&self, x: f64) -> f64 {
        let (first, last) = match (self.values.first(), self.values.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return self.min_temperature(),
        };
        if x.is_nan() || x <= first {
            return self.min_temperature();
        }
        if x >= last {
            return self.max_temperature();
        }

        let upper = self.values.partition_point(|v| *v <= x);
        let lower = upper - 1;
        let (lo, hi) = (self.values[lower], self.values[upper]);
        self.min_temperature() + lower as f64 + (x - lo) / (hi - lo)
    }
}

/// Resistance of a PT100 at `temperature` °C.
pub fn pt100_resistance(temperature: f64) -> f64 {
    let t = temperature;
    let mut r = 1.0 + CVD_A * t + CVD_B * t * t;
    if t < 0.0 {
        r += CVD_C * (t - 100.0) * t * t * t;
    }
    PT100_R0 * r
}

static PT100: Lazy<Table> = Lazy::new(|| Table::generate(-200, 850, pt100_resistance));

/// Temperature of a PT100 element with resistance `ohms`.
pub fn pt100_temperature(ohms: f64) -> f64 {
    PT100.temperature(ohms)
}

/// Standard thermocouple types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Thermocouple {
    B,
    E,
    J,
    K,
    N,
    R,
    S,
    T,
}

/// Polynomial valid up to `upper` °C, coefficients in mV.
struct Segment {
    upper: f64,
    coefficients: &'static [f64],
}

const fn seg(upper: f64, coefficients: &'static [f64]) -> Segment {
    Segment {
        upper,
        coefficients,
    }
}

const TYPE_B: &[Segment] = &[
    seg(
        630.615,
        &[
            0.0,
            -0.246508183460e-03,
            0.590404211710e-05,
            -0.132579316360e-08,
            0.156682919010e-11,
            -0.169445292400e-14,
            0.629903470940e-18,
        ],
    ),
    seg(
        f64::INFINITY,
        &[
            -0.389381686210e+01,
            0.285717474700e-01,
            -0.848851047850e-04,
            0.157852801640e-06,
            -0.168353448640e-09,
            0.111097940130e-12,
            -0.445154310330e-16,
            0.989756408210e-20,
            -0.937913302890e-24,
        ],
    ),
];

const TYPE_E: &[Segment] = &[
    seg(
        0.0,
        &[
            0.0,
            0.586655087080e-01,
            0.454109771240e-04,
            -0.779980486860e-06,
            -0.258001608430e-07,
            -0.594525830570e-09,
            -0.932140586670e-11,
            -0.102876055340e-12,
            -0.803701236210e-15,
            -0.439794973910e-17,
            -0.164147763550e-19,
            -0.396736195160e-22,
            -0.558273287210e-25,
            -0.346578420130e-28,
        ],
    ),
    seg(
        f64::INFINITY,
        &[
            0.0,
            0.586655087100e-01,
            0.450322755820e-04,
            0.289084072120e-07,
            -0.330568966520e-09,
            0.650244032700e-12,
            -0.191974955040e-15,
            -0.125366004970e-17,
            0.214892175690e-20,
            -0.143880417820e-23,
            0.359608994810e-27,
        ],
    ),
];

const TYPE_J: &[Segment] = &[
    seg(
        760.0,
        &[
            0.0,
            0.503811878150e-01,
            0.304758369300e-04,
            -0.856810657200e-07,
            0.132281952950e-09,
            -0.170529583370e-12,
            0.209480906970e-15,
            -0.125383953360e-18,
            0.156317256970e-22,
        ],
    ),
    seg(
        f64::INFINITY,
        &[
            0.296456256810e+03,
            -0.149761277860e+01,
            0.317871039240e-02,
            -0.318476867010e-05,
            0.157208190040e-08,
            -0.306913690560e-12,
        ],
    ),
];

const TYPE_K: &[Segment] = &[
    seg(
        0.0,
        &[
            0.0,
            0.394501280250e-01,
            0.236223735980e-04,
            -0.328589067840e-06,
            -0.499048287770e-08,
            -0.675090591730e-10,
            -0.574103274280e-12,
            -0.310888728940e-14,
            -0.104516093650e-16,
            -0.198892668780e-19,
            -0.163226974860e-22,
        ],
    ),
    seg(
        f64::INFINITY,
        &[
            -0.176004136860e-01,
            0.389212049750e-01,
            0.185587700320e-04,
            -0.994575928740e-07,
            0.318409457190e-09,
            -0.560728448890e-12,
            0.560750590590e-15,
            -0.320207200030e-18,
            0.971511471520e-22,
            -0.121047212750e-25,
        ],
    ),
];

// Exponential term of type K above 0 °C: a0 * exp(a1 * (t - a2)^2)
const TYPE_K_EXP: (f64, f64, f64) = (0.118597600000e+00, -0.118343200000e-03, 0.126968600000e+03);

const TYPE_N: &[Segment] = &[
    seg(
        0.0,
        &[
            0.0,
            0.261591059620e-01,
            0.109574842280e-04,
            -0.938411115540e-07,
            -0.464120397590e-10,
            -0.263033577160e-11,
            -0.226534380030e-13,
            -0.760893007910e-16,
            -0.934196678350e-19,
        ],
    ),
    seg(
        f64::INFINITY,
        &[
            0.0,
            0.259293946010e-01,
            0.157101418800e-04,
            0.438256272370e-07,
            -0.252611697940e-09,
            0.643118193390e-12,
            -0.100634715190e-14,
            0.997453389920e-18,
            -0.608632456070e-21,
            0.208492293390e-24,
            -0.306821961510e-28,
        ],
    ),
];

const TYPE_R: &[Segment] = &[
    seg(
        1064.18,
        &[
            0.0,
            0.528961729765e-02,
            0.139166589782e-04,
            -0.238855693017e-07,
            0.356916001063e-10,
            -0.462347666298e-13,
            0.500777441034e-16,
            -0.373105886191e-19,
            0.157716482367e-22,
            -0.281038625251e-26,
        ],
    ),
    seg(
        1664.5,
        &[
            0.295157925316e+01,
            -0.252061251332e-02,
            0.159564501865e-04,
            -0.764085947576e-08,
            0.205305291024e-11,
            -0.293359668173e-15,
        ],
    ),
    seg(
        f64::INFINITY,
        &[
            0.152232118209e+03,
            -0.268819888545e+00,
            0.171280280471e-03,
            -0.345895706453e-07,
            -0.934633971046e-14,
        ],
    ),
];

const TYPE_S: &[Segment] = &[
    seg(
        1064.18,
        &[
            0.0,
            0.540313308631e-02,
            0.125934289740e-04,
            -0.232477968689e-07,
            0.322028823036e-10,
            -0.331465196389e-13,
            0.255744251786e-16,
            -0.125068871393e-19,
            0.271443176145e-23,
        ],
    ),
    seg(
        1664.5,
        &[
            0.132900444085e+01,
            0.334509311344e-02,
            0.654805192818e-05,
            -0.164856259209e-08,
            0.129989605174e-13,
        ],
    ),
    seg(
        f64::INFINITY,
        &[
            0.146628232636e+03,
            -0.258430516752e+00,
            0.163693574641e-03,
            -0.330439046987e-07,
            -0.943223690612e-14,
        ],
    ),
];

const TYPE_T: &[Segment] = &[
    seg(
        0.0,
        &[
            0.0,
            0.387481063640e-01,
            0.441944343470e-04,
            0.118443231050e-06,
            0.200329735540e-07,
            0.901380195590e-09,
            0.226511565930e-10,
            0.360711542050e-12,
            0.384939398830e-14,
            0.282135219250e-16,
            0.142515947790e-18,
            0.487686622860e-21,
            0.107955392700e-23,
            0.139450270620e-26,
            0.797951539270e-30,
        ],
    ),
    seg(
        f64::INFINITY,
        &[
            0.0,
            0.387481063640e-01,
            0.332922278800e-04,
            0.206182434040e-06,
            -0.218822568460e-08,
            0.109968809280e-10,
            -0.308157587720e-13,
            0.454791352900e-16,
            -0.275129016730e-19,
        ],
    ),
];

fn horner(coefficients: &[f64], t: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * t + c)
}

macro_rules! tc_table {
    ($name:ident, $kind:expr, $start:expr, $end:expr) => {
        static $name: Lazy<Table> = Lazy::new(|| Table::generate($start, $end, |t| $kind.emf(t)));
    };
}

tc_table!(TABLE_B, Thermocouple::B, 50, 1820);
tc_table!(TABLE_E, Thermocouple::E, -200, 1000);
tc_table!(TABLE_J, Thermocouple::J, -210, 1200);
tc_table!(TABLE_K, Thermocouple::K, -200, 1372);
tc_table!(TABLE_N, Thermocouple::N, -200, 1300);
tc_table!(TABLE_R, Thermocouple::R, -50, 1768);
tc_table!(TABLE_S, Thermocouple::S, -50, 1768);
tc_table!(TABLE_T, Thermocouple::T, -200, 400);

impl Thermocouple {
    fn segments(self) -> &'static [Segment] {
        match self {
            Self::B => TYPE_B,
            Self::E => TYPE_E,
            Self::J => TYPE_J,
            Self::K => TYPE_K,
            Self::N => TYPE_N,
            Self::R => TYPE_R,
            Self::S => TYPE_S,
            Self::T => TYPE_T,
        }
    }

    /// Lookup table for this type, generated on first use.
    pub fn table(self) -> &'static Table {
        match self {
            Self::B => &TABLE_B,
            Self::E => &TABLE_E,
            Self::J => &TABLE_J,
            Self::K => &TABLE_K,
            Self::N => &TABLE_N,
            Self::R => &TABLE_R,
            Self::S => &TABLE_S,
            Self::T => &TABLE_T,
        }
    }

    /// Reference EMF in microvolts at `temperature` °C with the cold
    /// junction at 0 °C.
    pub fn emf(self, temperature: f64) -> f64 {
        let segments = self.segments();
        let coefficients = segments
            .iter()
            .find(|s| temperature <= s.upper)
            .or(segments.last())
            .map_or(&[][..], |s| s.coefficients);

        let mut millivolts = horner(coefficients, temperature);
        if self == Self::K && temperature > 0.0 {
            let (a0, a1, a2) = TYPE_K_EXP;
            millivolts += a0 * (a1 * (temperature - a2).powi(2)).exp();
        }
        millivolts * 1e3
    }

    /// Hot junction temperature for a measured EMF in microvolts.
    pub fn temperature(self, microvolts: f64) -> f64 {
        self.table().temperature(microvolts)
    }
}

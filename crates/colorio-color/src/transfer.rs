//! Transfer functions.
//!
//! [`TransferFunction::to_linear`] maps encoded signal to relative linear
//! light (1.0 = nominal peak); [`TransferFunction::from_linear`] inverts it.
//! PQ is normalized so 10000 cd/m2 maps to 1.0; HLG is scene-referred with
//! signal 1.0 at linear 1.0.
//!
//! ```rust
//! use colorio_color::TransferFunction;
//!
//! let v = TransferFunction::Srgb.from_linear(0.5);
//! assert!((TransferFunction::Srgb.to_linear(v) - 0.5).abs() < 1e-12);
//! ```

/// Transfer characteristic of a color encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferFunction {
    /// ITU-R BT.709 OETF.
    Bt709,
    /// Not known; cannot be converted.
    Unknown,
    /// Identity.
    Linear,
    /// IEC 61966-2-1 sRGB.
    Srgb,
    /// SMPTE ST 2084 perceptual quantizer.
    Pq,
    /// DCI gamma 2.6.
    Dci,
    /// ARIB STD-B67 hybrid log-gamma.
    Hlg,
    /// Pure power `encoded = linear^gamma`, `gamma` in (0, 1].
    Gamma(f64),
}

// SMPTE ST 2084
const PQ_M1: f64 = 2610.0 / 16384.0;
const PQ_M2: f64 = 2523.0 / 4096.0 * 128.0;
const PQ_C1: f64 = 3424.0 / 4096.0;
const PQ_C2: f64 = 2413.0 / 4096.0 * 32.0;
const PQ_C3: f64 = 2392.0 / 4096.0 * 32.0;

// ARIB STD-B67
const HLG_A: f64 = 0.17883277;
const HLG_B: f64 = 0.28466892;
const HLG_C: f64 = 0.55991073;

impl TransferFunction {
    /// Whether this is [`TransferFunction::Linear`] or gamma 1.
    pub fn is_linear(&self) -> bool {
        match self {
            Self::Linear => true,
            Self::Gamma(g) => (*g - 1.0).abs() < 1e-9,
            _ => false,
        }
    }

    /// Decodes a signal value to linear light.
    ///
    /// Negative inputs are mirrored for the curves that define them at 0
    /// (sRGB, BT.709, gamma); `Unknown` returns the input unchanged.
    pub fn to_linear(&self, v: f64) -> f64 {
        let sign = v.signum();
        let a = v.abs();
        match self {
            Self::Linear | Self::Unknown => v,
            Self::Srgb => {
                sign * if a <= 0.04045 {
                    a / 12.92
                } else {
                    ((a + 0.055) / 1.055).powf(2.4)
                }
            }
            Self::Bt709 => {
                sign * if a < 0.081 {
                    a / 4.5
                } else {
                    ((a + 0.099) / 1.099).powf(1.0 / 0.45)
                }
            }
            Self::Dci => sign * a.powf(2.6),
            Self::Gamma(g) => sign * a.powf(1.0 / g),
            Self::Pq => {
                if v <= 0.0 {
                    return 0.0;
                }
                let p = v.powf(1.0 / PQ_M2);
                let num = (p - PQ_C1).max(0.0);
                (num / (PQ_C2 - PQ_C3 * p)).powf(1.0 / PQ_M1)
            }
            Self::Hlg => {
                if v <= 0.0 {
                    0.0
                } else if v <= 0.5 {
                    v * v / 3.0
                } else {
                    (((v - HLG_C) / HLG_A).exp() + HLG_B) / 12.0
                }
            }
        }
    }

    /// Encodes linear light to a signal value.
    pub fn from_linear(&self, l: f64) -> f64 {
        let sign = l.signum();
        let a = l.abs();
        match self {
            Self::Linear | Self::Unknown => l,
            Self::Srgb => {
                sign * if a <= 0.0031308 {
                    a * 12.92
                } else {
                    1.055 * a.powf(1.0 / 2.4) - 0.055
                }
            }
            Self::Bt709 => {
                sign * if a < 0.018 {
                    a * 4.5
                } else {
                    1.099 * a.powf(0.45) - 0.099
                }
            }
            Self::Dci => sign * a.powf(1.0 / 2.6),
            Self::Gamma(g) => sign * a.powf(*g),
            Self::Pq => {
                if l <= 0.0 {
                    return 0.0;
                }
                let p = l.powf(PQ_M1);
                ((PQ_C1 + PQ_C2 * p) / (1.0 + PQ_C3 * p)).powf(PQ_M2)
            }
            Self::Hlg => {
                if l <= 0.0 {
                    0.0
                } else if l <= 1.0 / 12.0 {
                    (3.0 * l).sqrt()
                } else {
                    HLG_A * (12.0 * l - HLG_B).ln() + HLG_C
                }
            }
        }
    }
}

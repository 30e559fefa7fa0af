//! Bit depths and pixel interchange formats.
//!
//! # Types
//!
//! - [`BitDepth`] - Nominal sample precision of an image (1-32 bit integer, or float)
//! - [`DataType`] - Storage type of one sample in a packed buffer
//! - [`Endianness`] - Byte order of multi-byte samples
//! - [`InterchangeFormat`] - Channel count + storage layout an encoder consumes
//!
//! # Usage
//!
//! ```rust
//! use colorio_core::format::{BitDepth, DataType, InterchangeFormat};
//!
//! let depth = BitDepth::uint(12).unwrap();
//! assert_eq!(depth.bits_per_sample, 12);
//!
//! let fmt = InterchangeFormat::new(3, DataType::Uint16);
//! assert!(fmt.data_type.bits() >= depth.bits_per_sample);
//! ```

use crate::error::{Error, Result};

/// Nominal sample precision of an image.
///
/// Integer samples carry `bits_per_sample` bits in `[0, 2^bits - 1]`.
/// Floating-point samples use `exponent_bits_per_sample` exponent bits
/// (5 for half, 8 for single precision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitDepth {
    /// Bits per sample, 1 to 32.
    pub bits_per_sample: u32,
    /// Whether samples are floating point.
    pub floating_point_sample: bool,
    /// Exponent bits, nonzero only for floating-point samples.
    pub exponent_bits_per_sample: u32,
}

impl Default for BitDepth {
    fn default() -> Self {
        Self::U8
    }
}

impl BitDepth {
    /// 8-bit unsigned integer.
    pub const U8: Self = Self {
        bits_per_sample: 8,
        floating_point_sample: false,
        exponent_bits_per_sample: 0,
    };

    /// 16-bit unsigned integer.
    pub const U16: Self = Self {
        bits_per_sample: 16,
        floating_point_sample: false,
        exponent_bits_per_sample: 0,
    };

    /// IEEE 754 half precision.
    pub const F16: Self = Self {
        bits_per_sample: 16,
        floating_point_sample: true,
        exponent_bits_per_sample: 5,
    };

    /// IEEE 754 single precision.
    pub const F32: Self = Self {
        bits_per_sample: 32,
        floating_point_sample: true,
        exponent_bits_per_sample: 8,
    };

    /// Integer depth of `bits` bits.
    pub fn uint(bits: u32) -> Result<Self> {
        let depth = Self {
            bits_per_sample: bits,
            floating_point_sample: false,
            exponent_bits_per_sample: 0,
        };
        depth.validate()?;
        Ok(depth)
    }

    /// Single precision float depth.
    #[inline]
    pub const fn float32() -> Self {
        Self::F32
    }

    /// Checks the field ranges.
    pub fn validate(&self) -> Result<()> {
        let reject = |reason| {
            Err(Error::InvalidBitDepth {
                bits: self.bits_per_sample,
                exponent_bits: self.exponent_bits_per_sample,
                reason,
            })
        };
        if self.bits_per_sample == 0 || self.bits_per_sample > 32 {
            return reject("bits per sample must be in 1..=32");
        }
        if self.floating_point_sample {
            if self.exponent_bits_per_sample == 0
                || self.exponent_bits_per_sample >= self.bits_per_sample
            {
                return reject("float exponent must be nonzero and below total bits");
            }
        } else if self.exponent_bits_per_sample != 0 {
            return reject("integer samples carry no exponent");
        }
        Ok(())
    }

    /// Whether samples are floating point.
    #[inline]
    pub const fn is_float(&self) -> bool {
        self.floating_point_sample
    }

    /// Largest integer sample value, `2^bits - 1`.
    ///
    /// Returns 1.0 for floating-point depths.
    #[inline]
    pub fn max_value(&self) -> f32 {
        if self.floating_point_sample {
            1.0
        } else {
            ((1u64 << self.bits_per_sample) - 1) as f32
        }
    }
}

/// Storage type of one sample in a packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// 8-bit unsigned integer.
    Uint8,
    /// 16-bit unsigned integer.
    Uint16,
    /// 16-bit half-precision float.
    Float16,
    /// 32-bit single-precision float.
    Float32,
}

impl DataType {
    /// Precision the type can carry without loss, used for negotiation.
    #[inline]
    pub const fn bits(&self) -> u32 {
        match self {
            Self::Uint8 => 8,
            Self::Uint16 | Self::Float16 => 16,
            Self::Float32 => 32,
        }
    }

    /// Bytes per sample.
    #[inline]
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Uint8 => 1,
            Self::Uint16 | Self::Float16 => 2,
            Self::Float32 => 4,
        }
    }

    /// Whether the type is floating point.
    #[inline]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::Float32)
    }

    /// The bit depth samples of this type carry at full precision.
    pub const fn bit_depth(&self) -> BitDepth {
        match self {
            Self::Uint8 => BitDepth::U8,
            Self::Uint16 => BitDepth::U16,
            Self::Float16 => BitDepth::F16,
            Self::Float32 => BitDepth::F32,
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    /// Host byte order.
    #[default]
    Native,
    /// Little endian.
    Little,
    /// Big endian.
    Big,
}

impl Endianness {
    /// Whether samples are stored big endian once `Native` is resolved.
    #[inline]
    pub const fn is_big(&self) -> bool {
        match self {
            Self::Native => cfg!(target_endian = "big"),
            Self::Little => false,
            Self::Big => true,
        }
    }
}

/// Channel count plus sample layout an encoder can consume natively.
///
/// Used only during negotiation; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterchangeFormat {
    /// Interleaved channels, color first then alpha.
    pub num_channels: u32,
    /// Sample storage type.
    pub data_type: DataType,
    /// Byte order for multi-byte samples.
    pub endianness: Endianness,
    /// Row alignment in bytes, 0 for tightly packed.
    pub align: usize,
}

impl InterchangeFormat {
    /// Tightly packed, native-endian format.
    #[inline]
    pub const fn new(num_channels: u32, data_type: DataType) -> Self {
        Self {
            num_channels,
            data_type,
            endianness: Endianness::Native,
            align: 0,
        }
    }

    /// Same format with a fixed byte order.
    #[inline]
    pub const fn with_endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }

    /// Bytes per interleaved pixel.
    #[inline]
    pub const fn bytes_per_pixel(&self) -> usize {
        self.num_channels as usize * self.data_type.bytes()
    }

    /// Bytes per row for `width` pixels, honoring `align`.
    pub fn row_stride(&self, width: usize) -> usize {
        let row = width * self.bytes_per_pixel();
        if self.align > 1 {
            row.div_ceil(self.align) * self.align
        } else {
            row
        }
    }
}

//! Error types for colorio-core operations.
//!
//! The [`Error`] enum covers failures of the leaf layer:
//! - Bit depth and pixel format validation
//! - Planar buffer construction (dimension and length checks)
//! - Executor setup
//!
//! Higher crates wrap it (`colorio-io` converts it into its own
//! `CodecError::InvalidImage`).

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by core types.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Bit depth outside the supported range.
    ///
    /// Integer samples take 1 to 32 bits; floating-point samples need a
    /// nonzero exponent width smaller than the total width.
    #[error("invalid bit depth: {bits} bits, {exponent_bits} exponent bits ({reason})")]
    InvalidBitDepth {
        /// Total bits per sample
        bits: u32,
        /// Exponent bits per sample
        exponent_bits: u32,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Image dimensions don't match for the operation.
    #[error("dimension mismatch: {a_width}x{a_height} vs {b_width}x{b_height}")]
    DimensionMismatch {
        /// First image width
        a_width: usize,
        /// First image height
        a_height: usize,
        /// Second image width
        b_width: usize,
        /// Second image height
        b_height: usize,
    },

    /// Buffer length does not equal `width * height`.
    #[error("buffer of {len} samples does not fit {width}x{height}")]
    BufferSize {
        /// Provided sample count
        len: usize,
        /// Plane width
        width: usize,
        /// Plane height
        height: usize,
    },

    /// Wrong number of planes for the requested layout.
    #[error("channel mismatch: expected {expected}, got {got}")]
    ChannelMismatch {
        /// Expected plane count
        expected: usize,
        /// Actual plane count
        got: usize,
    },

    /// Thread pool could not be built.
    #[error("thread pool: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Creates an [`Error::DimensionMismatch`] error.
    #[inline]
    pub fn dimension_mismatch(a: (usize, usize), b: (usize, usize)) -> Self {
        Self::DimensionMismatch {
            a_width: a.0,
            a_height: a.1,
            b_width: b.0,
            b_height: b.1,
        }
    }

    /// Creates an [`Error::ChannelMismatch`] error.
    #[inline]
    pub fn channel_mismatch(expected: usize, got: usize) -> Self {
        Self::ChannelMismatch { expected, got }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch() {
        let err = Error::dimension_mismatch((100, 100), (200, 200));
        let msg = err.to_string();
        assert!(msg.contains("100x100"));
        assert!(msg.contains("200x200"));
    }

    #[test]
    fn test_bit_depth_message() {
        let err = Error::InvalidBitDepth {
            bits: 40,
            exponent_bits: 0,
            reason: "integer samples take 1..=32 bits",
        };
        assert!(err.to_string().contains("40 bits"));
    }
}

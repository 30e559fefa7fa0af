//! Error types for codec operations.
//!
//! Every failure is fatal for the call that raised it: nothing is retried
//! and no other codec is tried in its place.

use std::io;

use colorio_color::ColorError;
use thiserror::Error;

use crate::codec::Codec;

/// Codec operation error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Codec is unknown or has no writer in this build.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// The image violates a rule of the target container.
    #[error("{codec:?} cannot store this image: {reason}")]
    FormatConstraintViolation {
        /// Target codec.
        codec: Codec,
        /// Which rule was violated.
        reason: String,
    },

    /// The encoder accepts no layout with the image's channel count.
    #[error("no accepted format for {num_channels} channels at {bits_per_sample} bits")]
    NoCompatibleFormat {
        /// Color plus alpha channels.
        num_channels: u32,
        /// Requested precision.
        bits_per_sample: u32,
    },

    /// ICC creation, parsing or color transform failed.
    #[error("color profile error: {0}")]
    ColorProfile(#[from] ColorError),

    /// Malformed input bytes.
    #[error("corrupt {codec:?} data: {reason}")]
    DecodeCorruption {
        /// Codec that was decoding.
        codec: Codec,
        /// What was wrong.
        reason: String,
    },

    /// Decoded image exceeds caller limits.
    #[error("size constraint violated: {0}")]
    SizeConstraintViolation(String),

    /// The underlying writer failed.
    #[error("encode error: {0}")]
    EncodeFailed(String),

    /// Pixel container is inconsistent.
    #[error("invalid image: {0}")]
    InvalidImage(#[from] colorio_core::Error),

    /// Read or write failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Creates a [`CodecError::FormatConstraintViolation`].
    pub fn constraint(codec: Codec, reason: impl Into<String>) -> Self {
        Self::FormatConstraintViolation {
            codec,
            reason: reason.into(),
        }
    }

    /// Creates a [`CodecError::DecodeCorruption`].
    pub fn corrupt(codec: Codec, reason: impl Into<String>) -> Self {
        Self::DecodeCorruption {
            codec,
            reason: reason.into(),
        }
    }
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

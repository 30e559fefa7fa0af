//! Color error types.

use thiserror::Error;

/// Result type for color operations.
pub type ColorResult<T> = Result<T, ColorError>;

/// Errors from color encodings, ICC handling and transforms.
///
/// `Clone` so per-worker transform construction failures can be reported
/// from every worker that hit them.
#[derive(Debug, Clone, Error)]
pub enum ColorError {
    /// Failed to build an ICC profile from structured fields.
    #[error("failed to create profile: {0}")]
    CreateFailed(String),

    /// ICC bytes could not be parsed.
    #[error("invalid profile data: {0}")]
    InvalidProfile(String),

    /// Failed to create a transform between two encodings.
    #[error("failed to create transform: {0}")]
    TransformFailed(String),

    /// A description string did not parse.
    #[error("invalid color description {0:?}")]
    InvalidDescription(String),

    /// The encoding cannot be expressed (unknown color space or transfer).
    #[error("unsupported color encoding: {0}")]
    Unsupported(String),
}

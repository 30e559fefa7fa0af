//! # colorio-core
//!
//! Leaf types shared by the colorio crates.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`format`] | [`BitDepth`], [`DataType`], [`Endianness`], [`InterchangeFormat`] |
//! | [`image`] | [`Plane`], [`PlanarImage`], round-trip error statistics |
//! | [`pool`] | [`ThreadPool`] and the [`run_on_pool`] map-then-join primitive |
//! | [`error`] | [`Error`], [`Result`] |
//!
//! ## Example
//!
//! ```rust
//! use colorio_core::{BitDepth, Plane, PlanarImage};
//!
//! let gray = PlanarImage::gray(Plane::filled(7, 4, 0.25));
//! assert_eq!((gray.width(), gray.height()), (7, 4));
//! assert!(BitDepth::uint(16).is_ok());
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod format;
pub mod image;
pub mod pool;

pub use error::{Error, Result};
pub use format::{BitDepth, DataType, Endianness, InterchangeFormat};
pub use image::{compare_planes, ErrorStats, PlanarImage, Plane};
pub use pool::{run_on_pool, ThreadPool};

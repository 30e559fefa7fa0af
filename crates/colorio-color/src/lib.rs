//! # colorio-color
//!
//! Color encodings and color management for colorio.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`encoding`] | [`ColorEncoding`], [`ColorSpace`], [`RenderingIntent`], description strings |
//! | [`primaries`] | [`WhitePoint`], [`Primaries`], CIE xy constants |
//! | [`transfer`] | [`TransferFunction`] curves |
//! | [`cms`] | [`ColorManagement`] trait and the Little CMS implementation [`LcmsCms`] |
//!
//! ICC bytes are produced and parsed by Little CMS through the `lcms2`
//! crate; this crate never interprets ICC tags beyond the description.
//!
//! ## Example
//!
//! ```rust
//! use colorio_color::{ColorEncoding, Primaries, TransferFunction};
//!
//! let mut c = ColorEncoding::srgb(false);
//! c.set_primaries(Primaries::P3);
//! c.set_transfer_function(TransferFunction::Linear);
//! assert_eq!(c.description(), "RGB_D65_DCI_Rel_Lin");
//!
//! c.create_icc().unwrap();
//! let restored = ColorEncoding::from_icc(c.icc()).unwrap();
//! assert_eq!(restored.description(), c.description());
//! ```

#![warn(missing_docs)]

pub mod cms;
pub mod encoding;
pub mod error;
mod icc;
pub mod primaries;
pub mod transfer;

pub use cms::{ColorManagement, LcmsCms, PixelTransform};
pub use encoding::{ColorEncoding, ColorSpace, RenderingIntent};
pub use error::{ColorError, ColorResult};
pub use primaries::{Chromaticity, Primaries, PrimariesXy, WhitePoint};
pub use transfer::TransferFunction;

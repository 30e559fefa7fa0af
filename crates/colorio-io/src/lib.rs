//! # colorio-io
//!
//! Color-managed image codecs.
//!
//! Images live in a [`CodecInOut`]: metadata plus frames ([`ImageBundle`]),
//! each tagged with the [`ColorEncoding`](colorio_color::ColorEncoding) its
//! samples are currently in. [`encode`] converts a copy of the frames to the
//! encoding the file should carry, negotiates a sample layout the codec can
//! consume and writes the container. [`decode`] reverses this and recovers
//! the encoding from the file, or from hints for formats that cannot
//! describe color.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`dispatch`] | [`encode`], [`decode`], [`decode_as`], explicit-encoder variants |
//! | [`registry`] | [`CodecRegistry`], [`encoder_from_extension`] |
//! | [`codec`] | [`Codec`], magic-byte sniffing, [`extension_for_codec`] |
//! | [`bundle`] | [`CodecInOut`], [`ImageBundle`], the color transform gateway |
//! | [`negotiate`] | [`select_format`] |
//! | [`packed`] | [`PackedPixelFile`], the interleaved codec interface |
//! | [`convert`] | Packing and unpacking between the two representations |
//! | [`hints`] | [`ColorHints`], [`SizeConstraints`] |
//!
//! # Supported Formats
//!
//! | Format | Read | Write | Samples | Color signaling |
//! |--------|------|-------|---------|-----------------|
//! | PNG | Yes | Yes | 8, 16 | sRGB, iCCP, gAMA + cHRM |
//! | PNM (PGM/PPM/PFM/PAM) | Yes | Yes | 1-16, 32f | hints |
//! | PGX | Yes | Yes | 1-16 gray | hints |
//! | JPEG | Yes | Yes | 8 | APP2 ICC |
//! | GIF | Yes | Yes | 8, palette | hints |
//! | EXR | Yes | Yes | 16f, 32f | chromaticities, linear |
//!
//! # Feature Flags
//!
//! - `png` - PNG support (default)
//! - `jpeg` - JPEG support (default)
//! - `gif` - GIF support (default)
//! - `exr` - OpenEXR support (default)
//!
//! PNM and PGX are always available.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bundle;
pub mod codec;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod hints;
pub mod metadata;
pub mod negotiate;
pub mod packed;
pub mod registry;
pub mod traits;

pub mod pgx;
pub mod pnm;

#[cfg(feature = "exr")]
pub mod exr;
#[cfg(feature = "gif")]
pub mod gif;
#[cfg(feature = "jpeg")]
pub mod jpeg;
#[cfg(feature = "png")]
pub mod png;

pub use bundle::{CodecInOut, ImageBundle};
pub use codec::{extension_for_codec, Codec};
pub use convert::{codec_in_out_to_packed, packed_to_codec_in_out};
pub use dispatch::{decode, decode_as, encode, encode_with_cms, encode_with_encoder, encoder_for_codec};
pub use error::{CodecError, CodecResult};
pub use hints::{ColorHints, SizeConstraints};
pub use metadata::{AlphaInfo, AnimationInfo, Blobs, ImageMetadata};
pub use negotiate::{select_format, SourceInfo};
pub use packed::{BasicInfo, EncodedImage, PackedFrame, PackedImage, PackedPixelFile};
pub use registry::{encoder_from_extension, CodecInfo, CodecRegistry};
pub use traits::{DecodeFn, Encoder};

//! Image-level metadata.
//!
//! [`ImageMetadata`] describes the image as it should be stored: nominal
//! bit depth, the original color encoding, alpha layout, opaque blobs
//! (EXIF, XMP) and animation looping. Frames carry their own current color
//! encoding separately (see [`crate::ImageBundle`]).

use colorio_color::ColorEncoding;
use colorio_core::BitDepth;

/// Alpha channel layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlphaInfo {
    /// Integer bits per alpha sample.
    pub bits_per_sample: u32,
    /// Whether color samples are premultiplied by alpha.
    pub premultiplied: bool,
}

/// Opaque metadata payloads, passed through unmodified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blobs {
    /// EXIF (TIFF structure, no `Exif\0\0` prefix).
    pub exif: Vec<u8>,
    /// XMP packet.
    pub xmp: Vec<u8>,
}

impl Blobs {
    /// Whether no blob is set.
    pub fn is_empty(&self) -> bool {
        self.exif.is_empty() && self.xmp.is_empty()
    }
}

/// Looping of animated images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimationInfo {
    /// Number of plays, 0 for infinite.
    pub num_loops: u32,
}

/// Metadata shared by all frames of an image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    /// Nominal sample precision.
    pub bit_depth: BitDepth,
    /// Original color encoding of the image.
    pub color_encoding: ColorEncoding,
    /// Alpha layout, `None` when there is no alpha.
    pub alpha: Option<AlphaInfo>,
    /// Opaque payloads.
    pub blobs: Blobs,
    /// Set for animated images.
    pub animation: Option<AnimationInfo>,
}

impl Default for ImageMetadata {
    fn default() -> Self {
        Self {
            bit_depth: BitDepth::U8,
            color_encoding: ColorEncoding::srgb(false),
            alpha: None,
            blobs: Blobs::default(),
            animation: None,
        }
    }
}

impl ImageMetadata {
    /// Whether an alpha channel is present.
    #[inline]
    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }
}

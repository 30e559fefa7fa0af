//! Codec-agnostic interleaved pixels.
//!
//! Encoders consume and decoders produce a [`PackedPixelFile`]: interleaved
//! samples in a stated [`InterchangeFormat`], plus the information needed
//! to interpret them. Integer samples hold values in `[0, 2^bits - 1]`
//! where `bits` comes from [`BasicInfo::bit_depth`]; float samples hold
//! nominal values.

use colorio_color::ColorEncoding;
use colorio_core::{BitDepth, DataType, InterchangeFormat};
use half::f16;

use crate::metadata::{AlphaInfo, AnimationInfo, Blobs};

/// Image-level facts shared by all frames.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicInfo {
    /// Width in pixels.
    pub xsize: usize,
    /// Height in pixels.
    pub ysize: usize,
    /// Precision of the stored samples.
    pub bit_depth: BitDepth,
    /// 1 for gray, 3 for color.
    pub num_color_channels: u32,
    /// Alpha layout; integer alpha uses `bit_depth` bits.
    pub alpha: Option<AlphaInfo>,
    /// Set for animations.
    pub animation: Option<AnimationInfo>,
}

impl BasicInfo {
    /// Total interleaved channels.
    #[inline]
    pub fn num_channels(&self) -> u32 {
        self.num_color_channels + u32::from(self.alpha.is_some())
    }
}

/// Interleaved pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedImage {
    /// Width in pixels.
    pub xsize: usize,
    /// Height in pixels.
    pub ysize: usize,
    /// Sample layout.
    pub format: InterchangeFormat,
    /// `ysize` rows of `stride()` bytes.
    pub pixels: Vec<u8>,
}

impl PackedImage {
    /// Zero-filled buffer.
    pub fn new(xsize: usize, ysize: usize, format: InterchangeFormat) -> Self {
        Self {
            xsize,
            ysize,
            format,
            pixels: vec![0; format.row_stride(xsize) * ysize],
        }
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.format.row_stride(self.xsize)
    }

    /// Row `y` as bytes.
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.stride();
        &self.pixels[y * stride..y * stride + self.xsize * self.format.bytes_per_pixel()]
    }

    /// Raw sample value of channel `c` at `(x, y)`.
    #[inline]
    pub fn sample(&self, x: usize, y: usize, c: usize) -> f32 {
        let bytes = self.format.data_type.bytes();
        let offset = y * self.stride() + (x * self.format.num_channels as usize + c) * bytes;
        read_sample(&self.pixels[offset..offset + bytes], &self.format)
    }

    /// Stores raw sample value `v` for channel `c` at `(x, y)`.
    #[inline]
    pub fn set_sample(&mut self, x: usize, y: usize, c: usize, v: f32) {
        let bytes = self.format.data_type.bytes();
        let offset = y * self.stride() + (x * self.format.num_channels as usize + c) * bytes;
        let format = self.format;
        write_sample(&mut self.pixels[offset..offset + bytes], &format, v);
    }
}

/// Decodes one sample. Integer types return their integer value.
pub(crate) fn read_sample(bytes: &[u8], format: &InterchangeFormat) -> f32 {
    let big = format.endianness.is_big();
    match format.data_type {
        DataType::Uint8 => f32::from(bytes[0]),
        DataType::Uint16 => {
            let raw = [bytes[0], bytes[1]];
            f32::from(if big { u16::from_be_bytes(raw) } else { u16::from_le_bytes(raw) })
        }
        DataType::Float16 => {
            let raw = [bytes[0], bytes[1]];
            f16::from_bits(if big { u16::from_be_bytes(raw) } else { u16::from_le_bytes(raw) }).to_f32()
        }
        DataType::Float32 => {
            let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
            if big { f32::from_be_bytes(raw) } else { f32::from_le_bytes(raw) }
        }
    }
}

/// Encodes one sample. Integer types round and clamp.
pub(crate) fn write_sample(out: &mut [u8], format: &InterchangeFormat, v: f32) {
    let big = format.endianness.is_big();
    match format.data_type {
        DataType::Uint8 => out[0] = v.round().clamp(0.0, 255.0) as u8,
        DataType::Uint16 => {
            let s = v.round().clamp(0.0, 65535.0) as u16;
            out.copy_from_slice(&if big { s.to_be_bytes() } else { s.to_le_bytes() });
        }
        DataType::Float16 => {
            let s = f16::from_f32(v).to_bits();
            out.copy_from_slice(&if big { s.to_be_bytes() } else { s.to_le_bytes() });
        }
        DataType::Float32 => {
            out.copy_from_slice(&if big { v.to_be_bytes() } else { v.to_le_bytes() });
        }
    }
}

/// Interleaved samples of `image` requantized from `depth` to unsigned
/// integers of `target_bits` bits. Float samples are clamped to `[0, 1]`.
pub(crate) fn uint_samples(image: &PackedImage, depth: &BitDepth, target_bits: u32) -> Vec<u16> {
    let target_max = ((1u32 << target_bits) - 1) as f32;
    let same = !depth.floating_point_sample && depth.bits_per_sample == target_bits;
    let scale = target_max / depth.max_value();
    let channels = image.format.num_channels as usize;
    let mut out = Vec::with_capacity(image.xsize * image.ysize * channels);
    for y in 0..image.ysize {
        for x in 0..image.xsize {
            for c in 0..channels {
                let v = image.sample(x, y, c);
                let q = if same {
                    v
                } else if depth.floating_point_sample {
                    v.clamp(0.0, 1.0) * target_max
                } else {
                    v * scale
                };
                out.push(q.round().clamp(0.0, target_max) as u16);
            }
        }
    }
    out
}

/// Interleaved samples of `image` as nominal floats: integers are divided
/// by the maximum value of `depth`.
pub(crate) fn float_samples(image: &PackedImage, depth: &BitDepth) -> Vec<f32> {
    let scale = 1.0 / depth.max_value();
    let channels = image.format.num_channels as usize;
    let mut out = Vec::with_capacity(image.xsize * image.ysize * channels);
    for y in 0..image.ysize {
        for x in 0..image.xsize {
            for c in 0..channels {
                out.push(image.sample(x, y, c) * scale);
            }
        }
    }
    out
}

/// One frame of a packed file.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedFrame {
    /// Pixels.
    pub image: PackedImage,
    /// Display time for animations.
    pub duration_ms: u32,
}

/// A whole image in packed form.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedPixelFile {
    /// Image-level facts.
    pub info: BasicInfo,
    /// Encoding of the samples.
    pub color_encoding: ColorEncoding,
    /// Frames in display order.
    pub frames: Vec<PackedFrame>,
    /// Opaque payloads.
    pub blobs: Blobs,
}

impl PackedPixelFile {
    /// Single-frame file.
    pub fn single(info: BasicInfo, color_encoding: ColorEncoding, image: PackedImage) -> Self {
        Self {
            info,
            color_encoding,
            frames: vec![PackedFrame {
                image,
                duration_ms: 0,
            }],
            blobs: Blobs::default(),
        }
    }
}

/// Encoder output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoded files; one for every format in this crate.
    pub bitstreams: Vec<Vec<u8>>,
    /// Profile the caller must ship alongside when the container could not
    /// embed it; empty otherwise.
    pub icc: Vec<u8>,
}

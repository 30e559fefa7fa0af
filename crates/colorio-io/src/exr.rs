//! OpenEXR format support.
//!
//! EXR stores linear-light RGB(A) floats. The writer converts samples from
//! the requested encoding's transfer function to linear and records its
//! primaries and white point in the `chromaticities` header attribute; the
//! reader turns that attribute back into a [`ColorEncoding`] (BT.709 / D65
//! when absent). Alpha is always written as premultiplied half floats.
//!
//! Only the first RGB(A) layer at its largest resolution is read. Gray
//! images and encodings without structured fields cannot be written.

use std::io::Cursor;

use colorio_color::{Chromaticity, ColorEncoding, Primaries, PrimariesXy, TransferFunction, WhitePoint};
use colorio_core::{BitDepth, DataType, InterchangeFormat, ThreadPool};

use crate::bundle::CodecInOut;
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::hints::{ColorHints, SizeConstraints};
use crate::metadata::AlphaInfo;
use crate::packed::{float_samples, BasicInfo, EncodedImage, PackedImage, PackedPixelFile};
use crate::traits::{check_packed, check_single_frame, Encoder};

/// Chromaticity match tolerance for named primaries and white points.
const XY_TOLERANCE: f64 = 1e-4;

/// EXR compression method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExrCompression {
    /// No compression.
    None,
    /// RLE compression.
    Rle,
    /// ZIP compression, 16 scanlines per block.
    #[default]
    Zip,
    /// PIZ wavelet compression (lossless, best for noisy images).
    Piz,
}

impl From<ExrCompression> for exr::compression::Compression {
    fn from(c: ExrCompression) -> Self {
        use exr::compression::Compression;
        match c {
            ExrCompression::None => Compression::Uncompressed,
            ExrCompression::Rle => Compression::RLE,
            ExrCompression::Zip => Compression::ZIP16,
            ExrCompression::Piz => Compression::PIZ,
        }
    }
}

/// EXR writer options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExrWriterOptions {
    /// Compression method. Default: ZIP.
    pub compression: ExrCompression,
}

/// EXR writer.
#[derive(Debug, Clone, Default)]
pub struct ExrEncoder {
    options: ExrWriterOptions,
}

impl ExrEncoder {
    /// Creates an encoder with ZIP compression.
    pub fn new() -> Self {
        Self::with_options(ExrWriterOptions::default())
    }

    /// Creates an encoder with custom options.
    pub fn with_options(options: ExrWriterOptions) -> Self {
        Self { options }
    }
}

impl Encoder for ExrEncoder {
    fn codec(&self) -> Codec {
        Codec::Exr
    }

    fn accepted_formats(&self) -> Vec<InterchangeFormat> {
        vec![
            InterchangeFormat::new(3, DataType::Float16),
            InterchangeFormat::new(3, DataType::Float32),
            InterchangeFormat::new(4, DataType::Float16),
            InterchangeFormat::new(4, DataType::Float32),
        ]
    }

    fn check_image(&self, io: &CodecInOut, c_external: &ColorEncoding) -> CodecResult<()> {
        check_single_frame(Codec::Exr, io)?;
        if c_external.is_gray() {
            return Err(CodecError::constraint(Codec::Exr, "gray images are not supported"));
        }
        Ok(())
    }

    fn encode(&self, ppf: &PackedPixelFile, _pool: Option<&ThreadPool>) -> CodecResult<EncodedImage> {
        use exr::prelude::*;

        check_packed(self, ppf)?;
        if ppf.frames.len() > 1 {
            return Err(CodecError::constraint(Codec::Exr, "container holds a single frame"));
        }
        let c = &ppf.color_encoding;
        if c.is_gray() {
            return Err(CodecError::constraint(Codec::Exr, "gray images are not supported"));
        }
        if !c.have_fields() || matches!(c.transfer_function(), TransferFunction::Unknown) {
            return Err(CodecError::constraint(
                Codec::Exr,
                format!("{c} cannot be expressed as EXR chromaticities"),
            ));
        }

        let image = &ppf.frames[0].image;
        let (width, height) = (image.xsize, image.ysize);
        let has_alpha = ppf.info.alpha.is_some();
        let premultiply = ppf.info.alpha.is_some_and(|a| !a.premultiplied);
        let half_float = image.format.data_type == DataType::Float16;
        let tf = c.transfer_function();
        let channels = image.format.num_channels as usize;

        let pixels: Vec<[f32; 4]> = float_samples(image, &ppf.info.bit_depth)
            .chunks_exact(channels)
            .map(|px| {
                let alpha = if has_alpha { px[3] } else { 1.0 };
                let scale = if premultiply { alpha } else { 1.0 };
                let linear = |v: f32| {
                    let l = if tf.is_linear() { v } else { tf.to_linear(f64::from(v)) as f32 };
                    l * scale
                };
                [linear(px[0]), linear(px[1]), linear(px[2]), alpha]
            })
            .collect();

        let xy = |c: Chromaticity| Vec2(c.x as f32, c.y as f32);
        let primaries = c.primaries().xy();
        let chromaticities = exr::meta::attribute::Chromaticities {
            red: xy(primaries.red),
            green: xy(primaries.green),
            blue: xy(primaries.blue),
            white: xy(c.white_point().xy()),
        };
        let encoding = Encoding {
            compression: self.options.compression.into(),
            ..Encoding::UNCOMPRESSED
        };
        tracing::debug!(width, height, has_alpha, half_float, compression = ?self.options.compression, "writing EXR");

        let mut out = Vec::new();
        let at = |pos: Vec2<usize>| pixels[pos.y() * width + pos.x()];
        let h = f16::from_f32;

        macro_rules! write_layer {
            ($channels:expr) => {{
                let layer = Layer::new((width, height), LayerAttributes::named("RGBA"), encoding, $channels);
                let mut exr_image = Image::from_layer(layer);
                exr_image.attributes.chromaticities = Some(chromaticities);
                exr_image.write().to_buffered(Cursor::new(&mut out))
            }};
        }

        let written = match (has_alpha, half_float) {
            (false, true) => write_layer!(SpecificChannels::rgb(|pos: Vec2<usize>| {
                let p = at(pos);
                (h(p[0]), h(p[1]), h(p[2]))
            })),
            (false, false) => write_layer!(SpecificChannels::rgb(|pos: Vec2<usize>| {
                let p = at(pos);
                (p[0], p[1], p[2])
            })),
            (true, true) => write_layer!(SpecificChannels::rgba(|pos: Vec2<usize>| {
                let p = at(pos);
                (h(p[0]), h(p[1]), h(p[2]), h(p[3]))
            })),
            (true, false) => write_layer!(SpecificChannels::rgba(|pos: Vec2<usize>| {
                let p = at(pos);
                (p[0], p[1], p[2], h(p[3]))
            })),
        };
        written.map_err(|e| CodecError::EncodeFailed(e.to_string()))?;

        Ok(EncodedImage {
            bitstreams: vec![out],
            icc: Vec::new(),
        })
    }
}

/// Decoded RGBA samples plus what the channel list said about them.
struct RgbaBuffer {
    width: usize,
    samples: Vec<[f32; 4]>,
    has_alpha: bool,
    half_float: bool,
}

/// Decodes the first RGB(A) layer of an EXR file. Hints are ignored.
pub fn decode(bytes: &[u8], hints: &ColorHints, constraints: &SizeConstraints) -> CodecResult<PackedPixelFile> {
    use exr::prelude::*;

    tracing::trace!(len = bytes.len(), "decoding EXR");
    hints.warn_ignored(Codec::Exr);
    let corrupt = |e: exr::error::Error| CodecError::corrupt(Codec::Exr, e.to_string());

    let meta = exr::meta::MetaData::read_from_buffered(Cursor::new(bytes), false).map_err(corrupt)?;
    let header = meta
        .headers
        .first()
        .ok_or_else(|| CodecError::corrupt(Codec::Exr, "no layers"))?;
    constraints.check(header.layer_size.width(), header.layer_size.height())?;

    let image = read()
        .no_deep_data()
        .largest_resolution_level()
        .rgba_channels(
            |resolution, channels| RgbaBuffer {
                width: resolution.width(),
                samples: vec![[0.0, 0.0, 0.0, 1.0]; resolution.area()],
                has_alpha: channels.3.is_some(),
                half_float: matches!(channels.0.sample_type, exr::meta::attribute::SampleType::F16),
            },
            |buffer: &mut RgbaBuffer, pos: Vec2<usize>, (r, g, b, a): (f32, f32, f32, f32)| {
                let idx = pos.y() * buffer.width + pos.x();
                buffer.samples[idx] = [r, g, b, a];
            },
        )
        .first_valid_layer()
        .all_attributes()
        .from_buffered(Cursor::new(bytes))
        .map_err(corrupt)?;

    let (width, height) = (image.layer_data.size.width(), image.layer_data.size.height());
    let buffer = image.layer_data.channel_data.pixels;

    let mut color = ColorEncoding::linear_srgb(false);
    if let Some(chroma) = image.attributes.chromaticities {
        let xy = |v: Vec2<f32>| Chromaticity::new(f64::from(v.0), f64::from(v.1));
        let primaries = PrimariesXy {
            red: xy(chroma.red),
            green: xy(chroma.green),
            blue: xy(chroma.blue),
        };
        color.set_primaries(Primaries::from_xy(primaries, XY_TOLERANCE));
        color.set_white_point(WhitePoint::from_xy(xy(chroma.white), XY_TOLERANCE));
    }

    let data_type = if buffer.half_float { DataType::Float16 } else { DataType::Float32 };
    let channels = 3 + u32::from(buffer.has_alpha);
    let mut packed = PackedImage::new(width, height, InterchangeFormat::new(channels, data_type));
    for (i, px) in buffer.samples.iter().enumerate() {
        let (x, y) = (i % width, i / width);
        for c in 0..channels as usize {
            packed.set_sample(x, y, c, px[c]);
        }
    }

    let info = BasicInfo {
        xsize: width,
        ysize: height,
        bit_depth: if buffer.half_float { BitDepth::F16 } else { BitDepth::F32 },
        num_color_channels: 3,
        alpha: buffer.has_alpha.then_some(AlphaInfo {
            bits_per_sample: 16,
            premultiplied: true,
        }),
        animation: None,
    };
    Ok(PackedPixelFile::single(info, color, packed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn float_ppf(format: InterchangeFormat, c: ColorEncoding, px: &[f32]) -> PackedPixelFile {
        let channels = format.num_channels as usize;
        let width = px.len() / channels;
        let mut image = PackedImage::new(width, 1, format);
        for (i, &v) in px.iter().enumerate() {
            image.set_sample(i / channels, 0, i % channels, v);
        }
        let info = BasicInfo {
            xsize: width,
            ysize: 1,
            bit_depth: format.data_type.bit_depth(),
            num_color_channels: 3,
            alpha: (channels == 4).then_some(AlphaInfo {
                bits_per_sample: format.data_type.bits(),
                premultiplied: false,
            }),
            animation: None,
        };
        PackedPixelFile::single(info, c, image)
    }

    fn no_hints() -> (ColorHints, SizeConstraints) {
        (ColorHints::new(), SizeConstraints::default())
    }

    #[test]
    fn test_p3_linear_round_trip() {
        let mut c = ColorEncoding::linear_srgb(false);
        c.set_primaries(Primaries::P3);
        let px = [0.25, 0.5, 1.5, 0.0, 0.125, 0.75];
        let ppf = float_ppf(InterchangeFormat::new(3, DataType::Float32), c.clone(), &px);
        let encoded = ExrEncoder::new().encode(&ppf, None).expect("encode");

        let (hints, limits) = no_hints();
        let back = decode(&encoded.bitstreams[0], &hints, &limits).expect("decode");
        assert_eq!(back.color_encoding.description(), c.description());
        assert_eq!(back.info.bit_depth, BitDepth::F32);
        assert!(back.info.alpha.is_none());
        for (i, &v) in px.iter().enumerate() {
            assert_abs_diff_eq!(back.frames[0].image.sample(i / 3, 0, i % 3), v, epsilon = 1e-7);
        }
    }

    #[test]
    fn test_srgb_samples_linearized() {
        let px = [0.5, 0.5, 0.5];
        let ppf = float_ppf(InterchangeFormat::new(3, DataType::Float32), ColorEncoding::srgb(false), &px);
        let encoded = ExrEncoder::with_options(ExrWriterOptions {
            compression: ExrCompression::None,
        })
        .encode(&ppf, None)
        .expect("encode");
        let (hints, limits) = no_hints();
        let back = decode(&encoded.bitstreams[0], &hints, &limits).expect("decode");
        assert!(back.color_encoding.transfer_function().is_linear());
        assert_abs_diff_eq!(back.frames[0].image.sample(0, 0, 0), 0.21404, epsilon = 1e-4);
    }

    #[test]
    fn test_alpha_premultiplied() {
        let ppf = float_ppf(
            InterchangeFormat::new(4, DataType::Float16),
            ColorEncoding::linear_srgb(false),
            &[0.5, 1.0, 0.25, 0.5],
        );
        let encoded = ExrEncoder::new().encode(&ppf, None).expect("encode");
        let (hints, limits) = no_hints();
        let back = decode(&encoded.bitstreams[0], &hints, &limits).expect("decode");
        assert_eq!(back.info.bit_depth, BitDepth::F16);
        assert_eq!(
            back.info.alpha,
            Some(AlphaInfo {
                bits_per_sample: 16,
                premultiplied: true
            })
        );
        let image = &back.frames[0].image;
        assert_abs_diff_eq!(image.sample(0, 0, 0), 0.25, epsilon = 1e-3);
        assert_abs_diff_eq!(image.sample(0, 0, 1), 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(image.sample(0, 0, 3), 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_rejects_unknown_transfer() {
        let mut c = ColorEncoding::srgb(false);
        c.set_transfer_function(TransferFunction::Unknown);
        let ppf = float_ppf(InterchangeFormat::new(3, DataType::Float32), c, &[0.0; 3]);
        assert!(matches!(
            ExrEncoder::new().encode(&ppf, None),
            Err(CodecError::FormatConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_garbage() {
        let (hints, limits) = no_hints();
        assert!(matches!(
            decode(b"v/1\x01not an exr", &hints, &limits),
            Err(CodecError::DecodeCorruption { .. })
        ));
    }
}

//! PNG format support.
//!
//! Writes 8- and 16-bit gray, gray+alpha, RGB and RGBA. Other integer
//! depths are scaled to the next storage depth and recorded in `sBIT`,
//! which the reader uses to scale them back. Colorimetry is
//! stored as an `sRGB` chunk when the encoding is sRGB, otherwise as an
//! `iCCP` profile derived from the encoding. EXIF goes into `eXIf`.
//!
//! Reading honors, in order: `iCCP`, `sRGB`, `gAMA` (+ `cHRM`), and falls
//! back to sRGB. Palette and sub-byte images are expanded to 8 bits.
//! Decode hints are ignored.

use std::borrow::Cow;
use std::io::Cursor;

use colorio_color::{
    Chromaticity, ColorEncoding, Primaries, PrimariesXy, RenderingIntent, TransferFunction, WhitePoint,
};
use colorio_core::{BitDepth, DataType, Endianness, InterchangeFormat, ThreadPool};

use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::hints::{ColorHints, SizeConstraints};
use crate::metadata::{AlphaInfo, Blobs};
use crate::packed::{uint_samples, BasicInfo, EncodedImage, PackedImage, PackedPixelFile};
use crate::traits::{check_packed, Encoder};

/// Tolerance when matching `cHRM` values against known primaries.
const CHRM_TOLERANCE: f64 = 1e-4;

/// PNG writer options.
#[derive(Debug, Clone, Copy)]
pub struct PngWriterOptions {
    /// Deflate effort.
    pub compression: png::Compression,
}

impl Default for PngWriterOptions {
    fn default() -> Self {
        Self {
            compression: png::Compression::default(),
        }
    }
}

/// PNG writer.
#[derive(Debug, Clone, Default)]
pub struct PngEncoder {
    options: PngWriterOptions,
}

impl PngEncoder {
    /// Creates an encoder with default options.
    pub fn new() -> Self {
        Self::with_options(PngWriterOptions::default())
    }

    /// Creates an encoder with custom options.
    pub fn with_options(options: PngWriterOptions) -> Self {
        Self { options }
    }
}

fn rendering_intent_to_png(intent: RenderingIntent) -> png::SrgbRenderingIntent {
    match intent {
        RenderingIntent::Perceptual => png::SrgbRenderingIntent::Perceptual,
        RenderingIntent::Relative => png::SrgbRenderingIntent::RelativeColorimetric,
        RenderingIntent::Saturation => png::SrgbRenderingIntent::Saturation,
        RenderingIntent::Absolute => png::SrgbRenderingIntent::AbsoluteColorimetric,
    }
}

fn rendering_intent_from_png(intent: png::SrgbRenderingIntent) -> RenderingIntent {
    match intent {
        png::SrgbRenderingIntent::Perceptual => RenderingIntent::Perceptual,
        png::SrgbRenderingIntent::RelativeColorimetric => RenderingIntent::Relative,
        png::SrgbRenderingIntent::Saturation => RenderingIntent::Saturation,
        png::SrgbRenderingIntent::AbsoluteColorimetric => RenderingIntent::Absolute,
    }
}

fn encode_err(e: png::EncodingError) -> CodecError {
    CodecError::EncodeFailed(e.to_string())
}

impl Encoder for PngEncoder {
    fn codec(&self) -> Codec {
        Codec::Png
    }

    fn accepted_formats(&self) -> Vec<InterchangeFormat> {
        (1..=4)
            .flat_map(|c| {
                [
                    InterchangeFormat::new(c, DataType::Uint8),
                    InterchangeFormat::new(c, DataType::Uint16).with_endianness(Endianness::Big),
                ]
            })
            .collect()
    }

    fn encode(&self, ppf: &PackedPixelFile, _pool: Option<&ThreadPool>) -> CodecResult<EncodedImage> {
        check_packed(self, ppf)?;
        if ppf.frames.len() > 1 {
            return Err(CodecError::constraint(Codec::Png, "container holds a single frame"));
        }
        let image = &ppf.frames[0].image;
        let width = u32::try_from(image.xsize).map_err(|_| CodecError::constraint(Codec::Png, "width too large"))?;
        let height =
            u32::try_from(image.ysize).map_err(|_| CodecError::constraint(Codec::Png, "height too large"))?;
        let sixteen = image.format.data_type == DataType::Uint16;

        let mut info = png::Info::with_size(width, height);
        info.color_type = match image.format.num_channels {
            1 => png::ColorType::Grayscale,
            2 => png::ColorType::GrayscaleAlpha,
            3 => png::ColorType::Rgb,
            _ => png::ColorType::Rgba,
        };
        info.bit_depth = if sixteen { png::BitDepth::Sixteen } else { png::BitDepth::Eight };

        let c = &ppf.color_encoding;
        if c.is_srgb() {
            info.srgb = Some(rendering_intent_to_png(c.rendering_intent()));
        } else {
            let mut with_icc = c.clone();
            with_icc.create_icc()?;
            info.icc_profile = Some(Cow::Owned(with_icc.icc().to_vec()));
        }
        tracing::debug!(
            width,
            height,
            color_type = ?info.color_type,
            sixteen,
            srgb = info.srgb.is_some(),
            "writing PNG"
        );

        let data: Vec<u8> = if sixteen {
            uint_samples(image, &ppf.info.bit_depth, 16)
                .into_iter()
                .flat_map(u16::to_be_bytes)
                .collect()
        } else {
            uint_samples(image, &ppf.info.bit_depth, 8)
                .into_iter()
                .map(|v| v as u8)
                .collect()
        };

        let storage_bits = if sixteen { 16 } else { 8 };
        let depth = &ppf.info.bit_depth;
        let significant = (!depth.floating_point_sample && depth.bits_per_sample < storage_bits)
            .then(|| vec![depth.bits_per_sample as u8; image.format.num_channels as usize]);

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::with_info(&mut out, info).map_err(encode_err)?;
            encoder.set_compression(self.options.compression);
            let mut writer = encoder.write_header().map_err(encode_err)?;
            if let Some(sbit) = &significant {
                writer.write_chunk(png::chunk::sBIT, sbit).map_err(encode_err)?;
            }
            if !ppf.blobs.exif.is_empty() {
                writer
                    .write_chunk(png::chunk::ChunkType(*b"eXIf"), &ppf.blobs.exif)
                    .map_err(encode_err)?;
            }
            writer.write_image_data(&data).map_err(encode_err)?;
            writer.finish().map_err(encode_err)?;
        }
        Ok(EncodedImage {
            bitstreams: vec![out],
            icc: Vec::new(),
        })
    }
}

fn decode_err(e: png::DecodingError) -> CodecError {
    CodecError::corrupt(Codec::Png, e.to_string())
}

/// Colorimetry signaled by the PNG chunks.
fn color_from_info(info: &png::Info<'_>, is_gray: bool) -> CodecResult<ColorEncoding> {
    if let Some(icc) = &info.icc_profile {
        let c = ColorEncoding::from_icc(icc)?;
        if c.is_gray() == is_gray {
            return Ok(c);
        }
        tracing::warn!(profile = %c, "iCCP color space does not match the image, ignoring it");
    }
    if let Some(intent) = info.srgb {
        let mut c = ColorEncoding::srgb(is_gray);
        c.set_rendering_intent(rendering_intent_from_png(intent));
        return Ok(c);
    }
    let mut c = ColorEncoding::srgb(is_gray);
    if let Some(gamma) = info.source_gamma {
        let g = f64::from(gamma.into_value());
        if (g - 1.0).abs() < 1e-4 {
            c.set_transfer_function(TransferFunction::Linear);
        } else if g > 0.0 && g < 1.0 {
            c.set_transfer_function(TransferFunction::Gamma(g));
        } else {
            tracing::warn!(gamma = g, "ignoring out of range gAMA");
        }
        if let Some(chrm) = info.source_chromaticities {
            let xy = |(x, y): (png::ScaledFloat, png::ScaledFloat)| {
                Chromaticity::new(f64::from(x.into_value()), f64::from(y.into_value()))
            };
            c.set_white_point(WhitePoint::from_xy(xy(chrm.white), CHRM_TOLERANCE));
            if !is_gray {
                let primaries = PrimariesXy {
                    red: xy(chrm.red),
                    green: xy(chrm.green),
                    blue: xy(chrm.blue),
                };
                c.set_primaries(Primaries::from_xy(primaries, CHRM_TOLERANCE));
            }
        }
    }
    Ok(c)
}

/// Decodes a PNG file. Hints are ignored.
pub fn decode(bytes: &[u8], hints: &ColorHints, constraints: &SizeConstraints) -> CodecResult<PackedPixelFile> {
    tracing::trace!(len = bytes.len(), "decoding PNG");
    hints.warn_ignored(Codec::Png);

    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder.read_info().map_err(decode_err)?;
    let (width, height) = {
        let info = reader.info();
        (info.width as usize, info.height as usize)
    };
    constraints.check(width, height)?;

    let size = reader
        .output_buffer_size()
        .ok_or_else(|| CodecError::corrupt(Codec::Png, "cannot determine output buffer size"))?;
    let mut buf = vec![0u8; size];
    let frame = reader.next_frame(&mut buf).map_err(decode_err)?;

    let channels: u32 = match frame.color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        png::ColorType::Indexed => return Err(CodecError::corrupt(Codec::Png, "palette was not expanded")),
    };
    let bits = match frame.bit_depth {
        png::BitDepth::Sixteen => 16,
        png::BitDepth::Eight => 8,
        other => return Err(CodecError::corrupt(Codec::Png, format!("unexpected depth {other:?}"))),
    };
    let format = if bits == 16 {
        InterchangeFormat::new(channels, DataType::Uint16).with_endianness(Endianness::Big)
    } else {
        InterchangeFormat::new(channels, DataType::Uint8)
    };
    let mut image = PackedImage::new(width, height, format);
    let row = image.stride();
    if frame.line_size < row || buf.len() < frame.line_size * (height - 1) + row {
        return Err(CodecError::corrupt(Codec::Png, "short image data"));
    }
    for y in 0..height {
        let src = y * frame.line_size;
        image.pixels[y * row..(y + 1) * row].copy_from_slice(&buf[src..src + row]);
    }

    let png_info = reader.info();
    // sBIT below the storage depth: samples were scaled up on write.
    let significant = png_info
        .sbit
        .as_deref()
        .and_then(|sbit| sbit.iter().copied().max())
        .map(u32::from)
        .filter(|&n| n < bits);
    let bits = match significant {
        Some(n) => {
            let samples = uint_samples(&image, &BitDepth::uint(bits)?, n);
            let channels = channels as usize;
            for (i, v) in samples.into_iter().enumerate() {
                let (pixel, c) = (i / channels, i % channels);
                image.set_sample(pixel % width, pixel / width, c, f32::from(v));
            }
            n
        }
        None => bits,
    };
    let num_color = if channels >= 3 { 3 } else { 1 };
    let color = color_from_info(png_info, num_color == 1)?;
    let blobs = Blobs {
        exif: png_info.exif_metadata.as_deref().map(<[u8]>::to_vec).unwrap_or_default(),
        xmp: Vec::new(),
    };

    let info = BasicInfo {
        xsize: width,
        ysize: height,
        bit_depth: BitDepth::uint(bits)?,
        num_color_channels: num_color,
        alpha: (channels % 2 == 0).then_some(AlphaInfo {
            bits_per_sample: bits,
            premultiplied: false,
        }),
        animation: None,
    };
    let mut ppf = PackedPixelFile::single(info, color, image);
    ppf.blobs = blobs;
    Ok(ppf)
}

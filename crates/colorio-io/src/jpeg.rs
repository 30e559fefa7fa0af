//! JPEG format support.
//!
//! Baseline 8-bit gray or RGB through `jpeg-encoder`, reading through
//! `jpeg-decoder`. The color encoding is always embedded as an APP2 ICC
//! profile so that it survives the round trip; files without a profile
//! decode as sRGB. EXIF and XMP travel in APP1 segments.
//!
//! JPEG is lossy and has no alpha channel.

use std::io::Cursor;

use colorio_color::ColorEncoding;
use colorio_core::{BitDepth, DataType, Endianness, InterchangeFormat, ThreadPool};

use crate::bundle::CodecInOut;
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::hints::{ColorHints, SizeConstraints};
use crate::metadata::Blobs;
use crate::packed::{uint_samples, BasicInfo, EncodedImage, PackedImage, PackedPixelFile};
use crate::traits::{check_packed, check_single_frame, Encoder};

const EXIF_PREFIX: &[u8] = b"Exif\0\0";
const XMP_PREFIX: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// JPEG writer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegWriterOptions {
    /// Quality level 1-100. Default: 90.
    pub quality: u8,
}

impl Default for JpegWriterOptions {
    fn default() -> Self {
        Self { quality: 90 }
    }
}

/// JPEG writer.
#[derive(Debug, Clone, Default)]
pub struct JpegEncoder {
    options: JpegWriterOptions,
}

impl JpegEncoder {
    /// Creates an encoder with default options (quality 90).
    pub fn new() -> Self {
        Self::with_options(JpegWriterOptions::default())
    }

    /// Creates an encoder with custom options.
    pub fn with_options(options: JpegWriterOptions) -> Self {
        Self { options }
    }
}

fn encode_err(e: jpeg_encoder::EncodingError) -> CodecError {
    CodecError::EncodeFailed(e.to_string())
}

impl Encoder for JpegEncoder {
    fn codec(&self) -> Codec {
        Codec::Jpg
    }

    fn accepted_formats(&self) -> Vec<InterchangeFormat> {
        vec![
            InterchangeFormat::new(1, DataType::Uint8),
            InterchangeFormat::new(3, DataType::Uint8),
        ]
    }

    fn check_image(&self, io: &CodecInOut, _c_external: &ColorEncoding) -> CodecResult<()> {
        check_single_frame(Codec::Jpg, io)?;
        if io.has_alpha() {
            return Err(CodecError::constraint(Codec::Jpg, "alpha is not supported"));
        }
        Ok(())
    }

    fn encode(&self, ppf: &PackedPixelFile, _pool: Option<&ThreadPool>) -> CodecResult<EncodedImage> {
        use jpeg_encoder::{ColorType, Encoder as JfifEncoder};

        check_packed(self, ppf)?;
        if ppf.frames.len() > 1 {
            return Err(CodecError::constraint(Codec::Jpg, "container holds a single frame"));
        }
        let image = &ppf.frames[0].image;
        let too_large = || CodecError::constraint(Codec::Jpg, format!("{}x{} exceeds 65535", image.xsize, image.ysize));
        let width = u16::try_from(image.xsize).map_err(|_| too_large())?;
        let height = u16::try_from(image.ysize).map_err(|_| too_large())?;
        let color_type = if image.format.num_channels == 1 { ColorType::Luma } else { ColorType::Rgb };

        let mut with_icc = ppf.color_encoding.clone();
        with_icc.create_icc()?;
        let pixels: Vec<u8> = uint_samples(image, &ppf.info.bit_depth, 8)
            .into_iter()
            .map(|v| v as u8)
            .collect();
        tracing::debug!(width, height, quality = self.options.quality, "writing JPEG");

        let mut out = Vec::new();
        let mut encoder = JfifEncoder::new(&mut out, self.options.quality);
        encoder.add_icc_profile(with_icc.icc()).map_err(encode_err)?;
        if !ppf.blobs.exif.is_empty() {
            encoder
                .add_app_segment(1, &[EXIF_PREFIX, ppf.blobs.exif.as_slice()].concat())
                .map_err(encode_err)?;
        }
        if !ppf.blobs.xmp.is_empty() {
            encoder
                .add_app_segment(1, &[XMP_PREFIX, ppf.blobs.xmp.as_slice()].concat())
                .map_err(encode_err)?;
        }
        encoder.encode(&pixels, width, height, color_type).map_err(encode_err)?;

        Ok(EncodedImage {
            bitstreams: vec![out],
            icc: Vec::new(),
        })
    }
}

/// Decodes a JPEG file. Hints are ignored.
pub fn decode(bytes: &[u8], hints: &ColorHints, constraints: &SizeConstraints) -> CodecResult<PackedPixelFile> {
    use jpeg_decoder::PixelFormat;

    tracing::trace!(len = bytes.len(), "decoding JPEG");
    hints.warn_ignored(Codec::Jpg);

    let corrupt = |e: jpeg_decoder::Error| CodecError::corrupt(Codec::Jpg, e.to_string());
    let mut decoder = jpeg_decoder::Decoder::new(Cursor::new(bytes));
    decoder.read_info().map_err(corrupt)?;
    let info = decoder
        .info()
        .ok_or_else(|| CodecError::corrupt(Codec::Jpg, "missing JPEG info"))?;
    let (width, height) = (usize::from(info.width), usize::from(info.height));
    constraints.check(width, height)?;

    let pixels = decoder.decode().map_err(corrupt)?;
    let (format, bits, data) = match info.pixel_format {
        PixelFormat::L8 => (InterchangeFormat::new(1, DataType::Uint8), 8, pixels),
        PixelFormat::L16 => (
            InterchangeFormat::new(1, DataType::Uint16).with_endianness(Endianness::Big),
            16,
            pixels,
        ),
        PixelFormat::RGB24 => (InterchangeFormat::new(3, DataType::Uint8), 8, pixels),
        PixelFormat::CMYK32 => {
            // Approximate, without the embedded CMYK profile.
            let rgb = pixels
                .chunks_exact(4)
                .flat_map(|cmyk| {
                    let k = 1.0 - f32::from(cmyk[3]) / 255.0;
                    let channel = |v: u8| ((1.0 - f32::from(v) / 255.0) * k * 255.0).round() as u8;
                    [channel(cmyk[0]), channel(cmyk[1]), channel(cmyk[2])]
                })
                .collect();
            (InterchangeFormat::new(3, DataType::Uint8), 8, rgb)
        }
    };
    let mut image = PackedImage::new(width, height, format);
    if data.len() < image.pixels.len() {
        return Err(CodecError::corrupt(Codec::Jpg, "short image data"));
    }
    let len = image.pixels.len();
    image.pixels.copy_from_slice(&data[..len]);

    let is_gray = format.num_channels == 1;
    let color = match decoder.icc_profile() {
        Some(icc) if !matches!(info.pixel_format, PixelFormat::CMYK32) => {
            let c = ColorEncoding::from_icc(&icc)?;
            if c.is_gray() == is_gray {
                c
            } else {
                tracing::warn!(profile = %c, "ICC color space does not match the image, assuming sRGB");
                ColorEncoding::srgb(is_gray)
            }
        }
        _ => ColorEncoding::srgb(is_gray),
    };

    let info = BasicInfo {
        xsize: width,
        ysize: height,
        bit_depth: BitDepth::uint(bits)?,
        num_color_channels: format.num_channels,
        alpha: None,
        animation: None,
    };
    let mut ppf = PackedPixelFile::single(info, color, image);
    ppf.blobs = Blobs {
        exif: decoder.exif_data().map(<[u8]>::to_vec).unwrap_or_default(),
        xmp: decoder.xmp_data().map(<[u8]>::to_vec).unwrap_or_default(),
    };
    Ok(ppf)
}

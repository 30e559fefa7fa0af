//! PGX, the raw single-component format of the JPEG 2000 conformance suite.
//!
//! A one-line text header `PG <ML|LM> <+|-> <depth> <width> <height>`
//! followed by raw samples: one byte each up to 8 bits, two bytes in the
//! stated byte order above that. Only unsigned gray images without alpha
//! are supported.

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use colorio_color::ColorEncoding;
use colorio_core::{BitDepth, DataType, Endianness, InterchangeFormat, ThreadPool};

use crate::bundle::CodecInOut;
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::hints::{ColorHints, SizeConstraints};
use crate::packed::{uint_samples, BasicInfo, EncodedImage, PackedImage, PackedPixelFile};
use crate::traits::{check_packed, check_single_frame, Encoder};

/// PGX writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgxEncoder;

impl PgxEncoder {
    /// Creates an encoder.
    pub fn new() -> Self {
        Self
    }
}

impl Encoder for PgxEncoder {
    fn codec(&self) -> Codec {
        Codec::Pgx
    }

    fn accepted_formats(&self) -> Vec<InterchangeFormat> {
        vec![
            InterchangeFormat::new(1, DataType::Uint8),
            InterchangeFormat::new(1, DataType::Uint16).with_endianness(Endianness::Big),
        ]
    }

    fn check_image(&self, io: &CodecInOut, c_external: &ColorEncoding) -> CodecResult<()> {
        check_single_frame(Codec::Pgx, io)?;
        if !c_external.is_gray() {
            return Err(CodecError::constraint(Codec::Pgx, "only gray images are supported"));
        }
        if io.has_alpha() {
            return Err(CodecError::constraint(Codec::Pgx, "alpha is not supported"));
        }
        Ok(())
    }

    fn encode(&self, ppf: &PackedPixelFile, _pool: Option<&ThreadPool>) -> CodecResult<EncodedImage> {
        check_packed(self, ppf)?;
        if ppf.frames.len() > 1 {
            return Err(CodecError::constraint(Codec::Pgx, "container holds a single frame"));
        }
        let image = &ppf.frames[0].image;
        let depth = &ppf.info.bit_depth;
        let bits = if depth.floating_point_sample {
            image.format.data_type.bits()
        } else {
            depth.bits_per_sample.min(16)
        };

        let mut out = Vec::with_capacity(image.xsize * image.ysize * 2 + 32);
        writeln!(out, "PG ML + {bits} {} {}", image.xsize, image.ysize)?;
        for v in uint_samples(image, depth, bits) {
            if bits <= 8 {
                out.write_u8(v as u8)?;
            } else {
                out.write_u16::<BigEndian>(v)?;
            }
        }
        Ok(EncodedImage {
            bitstreams: vec![out],
            icc: Vec::new(),
        })
    }
}

/// Decodes an unsigned PGX file. Colorimetry comes from `hints`.
pub fn decode(bytes: &[u8], hints: &ColorHints, constraints: &SizeConstraints) -> CodecResult<PackedPixelFile> {
    tracing::trace!(len = bytes.len(), "decoding PGX");
    let line_end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| CodecError::corrupt(Codec::Pgx, "missing header line"))?;
    let header = std::str::from_utf8(&bytes[..line_end])
        .map_err(|_| CodecError::corrupt(Codec::Pgx, "non-ASCII header"))?;
    let fields: Vec<&str> = header.split_ascii_whitespace().collect();
    let [magic, order, sign, depth, width, height] = fields[..] else {
        return Err(CodecError::corrupt(Codec::Pgx, format!("malformed header {header:?}")));
    };
    if magic != "PG" {
        return Err(CodecError::corrupt(Codec::Pgx, "bad magic"));
    }
    let endianness = match order {
        "ML" => Endianness::Big,
        "LM" => Endianness::Little,
        other => return Err(CodecError::corrupt(Codec::Pgx, format!("byte order {other:?}"))),
    };
    if sign != "+" {
        return Err(CodecError::corrupt(Codec::Pgx, "signed samples are not supported"));
    }
    let parse = |s: &str, what: &str| {
        s.parse::<usize>()
            .map_err(|_| CodecError::corrupt(Codec::Pgx, format!("bad {what}: {s:?}")))
    };
    let bits = parse(depth, "depth")? as u32;
    let (width, height) = (parse(width, "width")?, parse(height, "height")?);
    if !(1..=16).contains(&bits) {
        return Err(CodecError::corrupt(Codec::Pgx, format!("depth {bits} out of range")));
    }
    constraints.check(width, height)?;

    let data_type = if bits > 8 { DataType::Uint16 } else { DataType::Uint8 };
    let format = InterchangeFormat::new(1, data_type).with_endianness(endianness);
    let mut image = PackedImage::new(width, height, format);
    let data = &bytes[line_end + 1..];
    let needed = image.pixels.len();
    if data.len() < needed {
        return Err(CodecError::corrupt(
            Codec::Pgx,
            format!("{} bytes of pixel data, need {needed}", data.len()),
        ));
    }
    image.pixels.copy_from_slice(&data[..needed]);

    let max = (1u32 << bits) - 1;
    for y in 0..height {
        for x in 0..width {
            if image.sample(x, y, 0) as u32 > max {
                return Err(CodecError::corrupt(Codec::Pgx, format!("sample above {bits}-bit range")));
            }
        }
    }

    let info = BasicInfo {
        xsize: width,
        ysize: height,
        bit_depth: BitDepth::uint(bits)?,
        num_color_channels: 1,
        alpha: None,
        animation: None,
    };
    let color = hints.resolve_color(Codec::Pgx, true)?;
    Ok(PackedPixelFile::single(info, color, image))
}

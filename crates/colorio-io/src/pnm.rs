//! Netpbm family: PGM, PPM, PFM and PAM.
//!
//! Binary variants only (`P5`, `P6`, `P7`, `Pf`, `PF`). Integer samples are
//! stored with `MAXVAL = 2^bits - 1`, one byte when `MAXVAL < 256` and two
//! big-endian bytes otherwise, so the bit depth survives a round trip. PFM
//! is written little-endian (negative scale) with rows bottom-up.
//!
//! The files carry no colorimetry; decoding takes it from the
//! `color_space` hint (see [`crate::hints`]).
//!
//! # Variants
//!
//! | Variant | Channels | Samples |
//! |---------|----------|---------|
//! | [`PnmVariant::Pgm`] | 1 | U8, U16 |
//! | [`PnmVariant::Ppm`] | 3 | U8, U16 |
//! | [`PnmVariant::Pfm`] | 1, 3 | F32 |
//! | [`PnmVariant::Pam`] | 1-4 | U8, U16 |
//! | [`PnmVariant::Auto`] | all of the above | picked per image |

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use colorio_color::ColorEncoding;
use colorio_core::{BitDepth, DataType, Endianness, InterchangeFormat, ThreadPool};

use crate::bundle::CodecInOut;
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::hints::{ColorHints, SizeConstraints};
use crate::metadata::AlphaInfo;
use crate::packed::{uint_samples, BasicInfo, EncodedImage, PackedImage, PackedPixelFile};
use crate::traits::{check_packed, check_single_frame, Encoder};

const GRAY_U8: InterchangeFormat = InterchangeFormat::new(1, DataType::Uint8);

const fn uint(channels: u32, data_type: DataType) -> InterchangeFormat {
    InterchangeFormat {
        num_channels: channels,
        data_type,
        endianness: Endianness::Big,
        align: 0,
    }
}

const fn float(channels: u32) -> InterchangeFormat {
    InterchangeFormat {
        num_channels: channels,
        data_type: DataType::Float32,
        endianness: Endianness::Little,
        align: 0,
    }
}

/// Netpbm sub-format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PnmVariant {
    /// Gray, `P5`.
    Pgm,
    /// RGB, `P6`.
    Ppm,
    /// Float gray `Pf` or RGB `PF`.
    Pfm,
    /// Arbitrary tuples, `P7`.
    Pam,
    /// Picks the variant from the negotiated layout.
    Auto,
}

impl PnmVariant {
    /// Variant written for a file extension (lowercase, no dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pgm" => Some(Self::Pgm),
            "ppm" => Some(Self::Ppm),
            "pfm" => Some(Self::Pfm),
            "pam" => Some(Self::Pam),
            "pnm" => Some(Self::Auto),
            _ => None,
        }
    }

    fn accepted_formats(self) -> Vec<InterchangeFormat> {
        match self {
            Self::Pgm => vec![GRAY_U8, uint(1, DataType::Uint16)],
            Self::Ppm => vec![uint(3, DataType::Uint8), uint(3, DataType::Uint16)],
            Self::Pfm => vec![float(1), float(3)],
            Self::Pam => (1..=4)
                .flat_map(|c| [uint(c, DataType::Uint8), uint(c, DataType::Uint16)])
                .collect(),
            Self::Auto => {
                let mut all = Vec::new();
                for c in 1..=4 {
                    all.extend([uint(c, DataType::Uint8), uint(c, DataType::Uint16)]);
                    if c == 1 || c == 3 {
                        all.push(float(c));
                    }
                }
                all
            }
        }
    }

    /// Concrete variant for a negotiated layout.
    fn resolve(self, format: &InterchangeFormat) -> Self {
        if self != Self::Auto {
            return self;
        }
        match (format.num_channels, format.data_type.is_float()) {
            (2 | 4, _) => Self::Pam,
            (_, true) => Self::Pfm,
            (1, false) => Self::Pgm,
            _ => Self::Ppm,
        }
    }
}

/// PNM writer for one variant.
#[derive(Debug, Clone, Copy)]
pub struct PnmEncoder {
    variant: PnmVariant,
}

impl PnmEncoder {
    /// Encoder for `variant`.
    pub fn new(variant: PnmVariant) -> Self {
        Self { variant }
    }

    /// Configured variant.
    pub fn variant(&self) -> PnmVariant {
        self.variant
    }
}

impl Default for PnmEncoder {
    fn default() -> Self {
        Self::new(PnmVariant::Auto)
    }
}

impl Encoder for PnmEncoder {
    fn codec(&self) -> Codec {
        Codec::Pnm
    }

    fn accepted_formats(&self) -> Vec<InterchangeFormat> {
        self.variant.accepted_formats()
    }

    fn check_image(&self, io: &CodecInOut, _c_external: &ColorEncoding) -> CodecResult<()> {
        check_single_frame(Codec::Pnm, io)?;
        if io.has_alpha() && matches!(self.variant, PnmVariant::Pgm | PnmVariant::Ppm | PnmVariant::Pfm) {
            return Err(CodecError::constraint(
                Codec::Pnm,
                format!("{:?} has no alpha channel, use PAM", self.variant),
            ));
        }
        Ok(())
    }

    fn encode(&self, ppf: &PackedPixelFile, _pool: Option<&ThreadPool>) -> CodecResult<EncodedImage> {
        check_packed(self, ppf)?;
        if ppf.frames.len() > 1 {
            return Err(CodecError::constraint(Codec::Pnm, "container holds a single frame"));
        }
        let image = &ppf.frames[0].image;
        let variant = self.variant.resolve(&image.format);
        tracing::debug!(?variant, width = image.xsize, height = image.ysize, "writing PNM");

        let bytes = match variant {
            PnmVariant::Pfm => write_pfm(image)?,
            _ => write_integer(variant, image, &ppf.info)?,
        };
        Ok(EncodedImage {
            bitstreams: vec![bytes],
            icc: Vec::new(),
        })
    }
}

fn write_integer(variant: PnmVariant, image: &PackedImage, info: &BasicInfo) -> CodecResult<Vec<u8>> {
    let bits = if info.bit_depth.floating_point_sample {
        image.format.data_type.bits()
    } else {
        info.bit_depth.bits_per_sample.min(16)
    };
    let maxval = (1u32 << bits) - 1;
    let channels = image.format.num_channels;
    let mut out = Vec::with_capacity(image.xsize * image.ysize * channels as usize * 2 + 64);

    match variant {
        PnmVariant::Pam => {
            let tupltype = match channels {
                1 => "GRAYSCALE",
                2 => "GRAYSCALE_ALPHA",
                3 => "RGB",
                _ => "RGB_ALPHA",
            };
            write!(
                out,
                "P7\nWIDTH {}\nHEIGHT {}\nDEPTH {channels}\nMAXVAL {maxval}\nTUPLTYPE {tupltype}\nENDHDR\n",
                image.xsize, image.ysize
            )?;
        }
        _ => {
            let magic = if variant == PnmVariant::Pgm { "P5" } else { "P6" };
            write!(out, "{magic}\n{} {}\n{maxval}\n", image.xsize, image.ysize)?;
        }
    }

    for v in uint_samples(image, &info.bit_depth, bits) {
        if maxval < 256 {
            out.write_u8(v as u8)?;
        } else {
            out.write_u16::<BigEndian>(v)?;
        }
    }
    Ok(out)
}

fn write_pfm(image: &PackedImage) -> CodecResult<Vec<u8>> {
    let channels = image.format.num_channels as usize;
    let magic = if channels == 1 { "Pf" } else { "PF" };
    let mut out = Vec::with_capacity(image.xsize * image.ysize * channels * 4 + 32);
    write!(out, "{magic}\n{} {}\n-1.0\n", image.xsize, image.ysize)?;
    for y in (0..image.ysize).rev() {
        for x in 0..image.xsize {
            for c in 0..channels {
                out.write_f32::<LittleEndian>(image.sample(x, y, c))?;
            }
        }
    }
    Ok(out)
}

/// Header tokenizer: whitespace separated, `#` comments to end of line.
struct Header<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Header<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn skip_space(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'#' {
                while self.bytes.get(self.pos).is_some_and(|&b| b != b'\n') {
                    self.pos += 1;
                }
            } else if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> CodecResult<&'a str> {
        self.skip_space();
        let start = self.pos;
        while self.bytes.get(self.pos).is_some_and(|b| !b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(CodecError::corrupt(Codec::Pnm, "truncated header"));
        }
        std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| CodecError::corrupt(Codec::Pnm, "non-ASCII header"))
    }

    fn number<T: std::str::FromStr>(&mut self, what: &str) -> CodecResult<T> {
        let token = self.token()?;
        token
            .parse()
            .map_err(|_| CodecError::corrupt(Codec::Pnm, format!("bad {what}: {token:?}")))
    }

    /// Consumes the single whitespace byte ending the header.
    fn end(&mut self) -> CodecResult<&'a [u8]> {
        match self.bytes.get(self.pos) {
            Some(b) if b.is_ascii_whitespace() => Ok(&self.bytes[self.pos + 1..]),
            _ => Err(CodecError::corrupt(Codec::Pnm, "missing data")),
        }
    }

    /// Rest of the current line, after the token just read.
    fn line(&mut self) -> &'a str {
        while self.bytes.get(self.pos).is_some_and(|&b| b == b' ' || b == b'\t') {
            self.pos += 1;
        }
        let start = self.pos;
        while self.bytes.get(self.pos).is_some_and(|&b| b != b'\n') {
            self.pos += 1;
        }
        std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("").trim_end()
    }
}

/// Parsed header of an integer variant.
struct IntHeader {
    width: usize,
    height: usize,
    channels: u32,
    maxval: u32,
}

fn parse_pam(header: &mut Header<'_>) -> CodecResult<IntHeader> {
    let (mut width, mut height, mut depth, mut maxval) = (None, None, None, None);
    let mut tupltype = String::new();
    loop {
        match header.token()? {
            "ENDHDR" => break,
            "WIDTH" => width = Some(header.number("width")?),
            "HEIGHT" => height = Some(header.number("height")?),
            "DEPTH" => depth = Some(header.number("depth")?),
            "MAXVAL" => maxval = Some(header.number("maxval")?),
            "TUPLTYPE" => tupltype = header.line().to_string(),
            other => return Err(CodecError::corrupt(Codec::Pnm, format!("unknown PAM field {other}"))),
        }
    }
    let (Some(width), Some(height), Some(depth), Some(maxval)) = (width, height, depth, maxval) else {
        return Err(CodecError::corrupt(Codec::Pnm, "incomplete PAM header"));
    };
    let expected = match tupltype.as_str() {
        "GRAYSCALE" | "BLACKANDWHITE" => Some(1),
        "GRAYSCALE_ALPHA" | "BLACKANDWHITE_ALPHA" => Some(2),
        "RGB" => Some(3),
        "RGB_ALPHA" => Some(4),
        _ => None,
    };
    if expected.is_some_and(|e| e != depth) || !(1..=4).contains(&depth) {
        return Err(CodecError::corrupt(
            Codec::Pnm,
            format!("depth {depth} with tuple type {tupltype:?}"),
        ));
    }
    Ok(IntHeader {
        width,
        height,
        channels: depth,
        maxval,
    })
}

/// Decodes a binary PGM, PPM, PAM or PFM file.
///
/// Colorimetry comes from `hints` (sRGB when absent).
pub fn decode(bytes: &[u8], hints: &ColorHints, constraints: &SizeConstraints) -> CodecResult<PackedPixelFile> {
    tracing::trace!(len = bytes.len(), "decoding PNM");
    let mut header = Header::new(bytes);
    let magic = header.token()?;
    let parsed = match magic {
        "P5" | "P6" => {
            let width = header.number("width")?;
            let height = header.number("height")?;
            let maxval = header.number("maxval")?;
            let channels = if magic == "P5" { 1 } else { 3 };
            IntHeader {
                width,
                height,
                channels,
                maxval,
            }
        }
        "P7" => parse_pam(&mut header)?,
        "Pf" | "PF" => {
            let width: usize = header.number("width")?;
            let height: usize = header.number("height")?;
            let scale: f32 = header.number("scale")?;
            constraints.check(width, height)?;
            let data = header.end()?;
            let channels = if magic == "Pf" { 1 } else { 3 };
            return decode_pfm(data, width, height, channels, scale, hints);
        }
        other => return Err(CodecError::corrupt(Codec::Pnm, format!("unsupported magic {other:?}"))),
    };
    constraints.check(parsed.width, parsed.height)?;
    if parsed.maxval == 0 || parsed.maxval > 65535 {
        return Err(CodecError::corrupt(Codec::Pnm, format!("maxval {} out of range", parsed.maxval)));
    }
    let data = header.end()?;
    decode_integer(data, &parsed, hints)
}

fn decode_integer(data: &[u8], header: &IntHeader, hints: &ColorHints) -> CodecResult<PackedPixelFile> {
    let IntHeader {
        width,
        height,
        channels,
        maxval,
    } = *header;
    let wide = maxval > 255;
    let count = width * height * channels as usize;
    let needed = count * if wide { 2 } else { 1 };
    if data.len() < needed {
        return Err(CodecError::corrupt(
            Codec::Pnm,
            format!("{} bytes of pixel data, need {needed}", data.len()),
        ));
    }

    // MAXVAL of the form 2^n - 1 keeps its precision; anything else is
    // rescaled to the full range of the sample type.
    let exact = (maxval + 1).is_power_of_two();
    let bits = if exact {
        (maxval + 1).trailing_zeros()
    } else if wide {
        16
    } else {
        8
    };
    let target_max = ((1u32 << bits) - 1) as f32;

    let data_type = if wide { DataType::Uint16 } else { DataType::Uint8 };
    let format = uint(channels, data_type);
    let mut image = PackedImage::new(width, height, format);
    let mut reader = Cursor::new(data);
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels as usize {
                let raw = if wide {
                    reader.read_u16::<BigEndian>()?
                } else {
                    u16::from(reader.read_u8()?)
                };
                if u32::from(raw) > maxval {
                    return Err(CodecError::corrupt(Codec::Pnm, format!("sample {raw} above maxval {maxval}")));
                }
                let v = if exact {
                    f32::from(raw)
                } else {
                    (f32::from(raw) * target_max / maxval as f32).round()
                };
                image.set_sample(x, y, c, v);
            }
        }
    }

    let num_color = if channels >= 3 { 3 } else { 1 };
    let alpha = (channels % 2 == 0).then_some(AlphaInfo {
        bits_per_sample: bits,
        premultiplied: false,
    });
    let info = BasicInfo {
        xsize: width,
        ysize: height,
        bit_depth: BitDepth::uint(bits)?,
        num_color_channels: num_color,
        alpha,
        animation: None,
    };
    let color = hints.resolve_color(Codec::Pnm, num_color == 1)?;
    Ok(PackedPixelFile::single(info, color, image))
}

fn decode_pfm(
    data: &[u8],
    width: usize,
    height: usize,
    channels: u32,
    scale: f32,
    hints: &ColorHints,
) -> CodecResult<PackedPixelFile> {
    if scale == 0.0 || !scale.is_finite() {
        return Err(CodecError::corrupt(Codec::Pnm, format!("invalid PFM scale {scale}")));
    }
    let needed = width * height * channels as usize * 4;
    if data.len() < needed {
        return Err(CodecError::corrupt(
            Codec::Pnm,
            format!("{} bytes of pixel data, need {needed}", data.len()),
        ));
    }
    let endianness = if scale < 0.0 { Endianness::Little } else { Endianness::Big };
    let format = float(channels).with_endianness(endianness);
    let mut image = PackedImage::new(width, height, format);
    let row_bytes = image.stride();
    let mut reader = Cursor::new(data);
    // Bottom row first.
    for y in (0..height).rev() {
        let start = y * row_bytes;
        reader.read_exact(&mut image.pixels[start..start + row_bytes])?;
    }

    let info = BasicInfo {
        xsize: width,
        ysize: height,
        bit_depth: BitDepth::F32,
        num_color_channels: channels,
        alpha: None,
        animation: None,
    };
    let color = hints.resolve_color(Codec::Pnm, channels == 1)?;
    Ok(PackedPixelFile::single(info, color, image))
}

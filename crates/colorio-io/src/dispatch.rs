//! Format dispatcher.
//!
//! [`encode`] and [`decode`] are the entry points most callers need. Encoding
//! runs: container checks, conversion of a copy of each frame to the
//! requested encoding, layout negotiation, packing, and the codec writer.
//! Decoding sniffs the codec, runs its reader and unpacks the result; the
//! frames stay in the encoding recovered from the file or from hints.
//!
//! # Example
//!
//! ```rust
//! use colorio_color::ColorEncoding;
//! use colorio_core::{Plane, PlanarImage};
//! use colorio_io::{decode, encode, Codec, CodecInOut, ColorHints, SizeConstraints};
//!
//! let c = ColorEncoding::srgb(true);
//! let io = CodecInOut::from_image(PlanarImage::gray(Plane::filled(4, 2, 0.5)), c.clone())?;
//! let bytes = encode(&io, Codec::Pgx, &c, 8, None)?;
//!
//! let back = decode(&bytes, &ColorHints::with_color_space(&c), None, &SizeConstraints::default())?;
//! assert_eq!((back.xsize(), back.ysize()), (4, 2));
//! # Ok::<(), colorio_io::CodecError>(())
//! ```

use colorio_color::{ColorEncoding, ColorManagement, LcmsCms};
use colorio_core::{BitDepth, ThreadPool};

use crate::bundle::CodecInOut;
use crate::codec::Codec;
use crate::convert::{codec_in_out_to_packed, packed_to_codec_in_out};
use crate::error::{CodecError, CodecResult};
use crate::hints::{ColorHints, SizeConstraints};
use crate::negotiate::{select_format, SourceInfo};
use crate::registry::CodecRegistry;
use crate::traits::Encoder;

/// Encodes `io` as `codec`, storing samples in `c_external` with
/// `bits_per_sample` bits of precision.
///
/// Uses the lcms2-backed color management for conversions. `io` is not
/// modified.
pub fn encode(
    io: &CodecInOut,
    codec: Codec,
    c_external: &ColorEncoding,
    bits_per_sample: u32,
    pool: Option<&ThreadPool>,
) -> CodecResult<Vec<u8>> {
    encode_with_cms(io, codec, c_external, bits_per_sample, &LcmsCms, pool)
}

/// [`encode`] with a caller-supplied color management implementation.
pub fn encode_with_cms(
    io: &CodecInOut,
    codec: Codec,
    c_external: &ColorEncoding,
    bits_per_sample: u32,
    cms: &dyn ColorManagement,
    pool: Option<&ThreadPool>,
) -> CodecResult<Vec<u8>> {
    let encoder = encoder_for_codec(codec)?;
    encode_with_encoder(io, encoder.as_ref(), c_external, bits_per_sample, cms, pool)
}

/// Default encoder of `codec` from the global registry.
pub fn encoder_for_codec(codec: Codec) -> CodecResult<Box<dyn Encoder>> {
    let unsupported = || CodecError::UnsupportedCodec(codec.name().to_string());
    let info = CodecRegistry::global().get(codec).ok_or_else(unsupported)?;
    let new_encoder = info.new_encoder.ok_or_else(unsupported)?;
    let ext = info.extensions.first().ok_or_else(unsupported)?;
    new_encoder(ext).ok_or_else(unsupported)
}

/// Encodes `io` with a specific encoder, e.g. one from
/// [`crate::encoder_from_extension`].
pub fn encode_with_encoder(
    io: &CodecInOut,
    encoder: &dyn Encoder,
    c_external: &ColorEncoding,
    bits_per_sample: u32,
    cms: &dyn ColorManagement,
    pool: Option<&ThreadPool>,
) -> CodecResult<Vec<u8>> {
    let codec = encoder.codec();
    BitDepth::uint(bits_per_sample)?;
    tracing::trace!(codec = codec.name(), target = %c_external, bits_per_sample, "encoding");

    encoder.check_image(io, c_external)?;

    let source = SourceInfo {
        bits_per_sample,
        num_color_channels: c_external.channels() as u32,
        has_alpha: io.has_alpha(),
    };
    let format = select_format(&encoder.accepted_formats(), &source).ok_or(CodecError::NoCompatibleFormat {
        num_channels: source.num_channels(),
        bits_per_sample,
    })?;
    tracing::debug!(codec = codec.name(), ?format, "negotiated layout");

    let frames = io
        .frames()
        .iter()
        .map(|frame| frame.transformed(c_external, cms, pool))
        .collect::<Result<Vec<_>, _>>()?;
    let external = CodecInOut::from_frames(io.metadata.clone(), frames)?;

    let mut ppf = codec_in_out_to_packed(&external, format, bits_per_sample, pool)?;
    ppf.color_encoding = c_external.clone();

    let encoded = encoder.encode(&ppf, pool)?;
    let mut bitstreams = encoded.bitstreams;
    if bitstreams.len() != 1 {
        return Err(CodecError::EncodeFailed(format!(
            "{} produced {} bitstreams, expected 1",
            codec.name(),
            bitstreams.len()
        )));
    }
    Ok(bitstreams.remove(0))
}

/// Decodes `bytes`, detecting the codec from its magic bytes.
///
/// Formats without colorimetric signaling take their encoding from the
/// `color_space` hint; the others ignore hints. Frames are left in the
/// decoded encoding.
pub fn decode(
    bytes: &[u8],
    hints: &ColorHints,
    pool: Option<&ThreadPool>,
    constraints: &SizeConstraints,
) -> CodecResult<CodecInOut> {
    let codec = CodecRegistry::global().detect(bytes);
    if codec == Codec::Unknown {
        return Err(CodecError::UnsupportedCodec("unrecognized signature".to_string()));
    }
    decode_as(codec, bytes, hints, pool, constraints)
}

/// Decodes `bytes` as `codec` without sniffing.
pub fn decode_as(
    codec: Codec,
    bytes: &[u8],
    hints: &ColorHints,
    pool: Option<&ThreadPool>,
    constraints: &SizeConstraints,
) -> CodecResult<CodecInOut> {
    let info = CodecRegistry::global()
        .get(codec)
        .ok_or_else(|| CodecError::UnsupportedCodec(codec.name().to_string()))?;
    tracing::trace!(codec = codec.name(), len = bytes.len(), "decoding");
    let ppf = (info.decode)(bytes, hints, constraints)?;
    tracing::debug!(
        codec = codec.name(),
        width = ppf.info.xsize,
        height = ppf.info.ysize,
        frames = ppf.frames.len(),
        color = %ppf.color_encoding,
        "decoded"
    );
    packed_to_codec_in_out(&ppf, pool)
}

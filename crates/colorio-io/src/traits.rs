//! Encoder and decoder interfaces.

use colorio_color::ColorEncoding;
use colorio_core::{InterchangeFormat, ThreadPool};

use crate::bundle::CodecInOut;
use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use crate::hints::{ColorHints, SizeConstraints};
use crate::packed::{EncodedImage, PackedPixelFile};

/// Decoder entry point: bytes to packed pixels.
pub type DecodeFn = fn(&[u8], &ColorHints, &SizeConstraints) -> CodecResult<PackedPixelFile>;

/// A container writer.
///
/// Implementations are stateless apart from their options, so one encoder
/// can serve many images.
pub trait Encoder: Send + Sync {
    /// Codec this encoder writes.
    fn codec(&self) -> Codec;

    /// Layouts the encoder consumes natively, in order of preference.
    fn accepted_formats(&self) -> Vec<InterchangeFormat>;

    /// Rejects images the container cannot represent once converted to
    /// `c_external`.
    ///
    /// Called by the dispatcher before any color conversion. The default
    /// accepts single-frame images.
    fn check_image(&self, io: &CodecInOut, _c_external: &ColorEncoding) -> CodecResult<()> {
        check_single_frame(self.codec(), io)
    }

    /// Writes `ppf`, whose frames must use one of
    /// [`accepted_formats`](Encoder::accepted_formats).
    fn encode(&self, ppf: &PackedPixelFile, pool: Option<&ThreadPool>) -> CodecResult<EncodedImage>;
}

/// Fails for animations.
pub(crate) fn check_single_frame(codec: Codec, io: &CodecInOut) -> CodecResult<()> {
    if io.frames().len() > 1 {
        return Err(CodecError::constraint(codec, "container holds a single frame"));
    }
    Ok(())
}

/// Whether `actual` is `accepted` up to irrelevant details (alignment, and
/// byte order of single-byte samples).
pub(crate) fn format_matches(accepted: &InterchangeFormat, actual: &InterchangeFormat) -> bool {
    accepted.num_channels == actual.num_channels
        && accepted.data_type == actual.data_type
        && (accepted.data_type.bytes() == 1 || accepted.endianness.is_big() == actual.endianness.is_big())
}

/// Fails unless every frame of `ppf` uses an accepted format.
pub(crate) fn check_packed(encoder: &dyn Encoder, ppf: &PackedPixelFile) -> CodecResult<()> {
    let accepted = encoder.accepted_formats();
    if ppf.frames.is_empty() {
        return Err(CodecError::constraint(encoder.codec(), "no frames"));
    }
    for frame in &ppf.frames {
        let format = &frame.image.format;
        if !accepted.iter().any(|a| format_matches(a, format)) {
            return Err(CodecError::constraint(
                encoder.codec(),
                format!("{} x {:?} samples not accepted", format.num_channels, format.data_type),
            ));
        }
    }
    Ok(())
}

//! Pixel format negotiation.
//!
//! Picks the sample layout an encoder will receive. Channel count is a hard
//! requirement; precision is matched on a first-fit basis in the encoder's
//! own preference order.

use colorio_core::InterchangeFormat;

/// What the negotiator needs to know about the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    /// Precision the encoded samples should keep.
    pub bits_per_sample: u32,
    /// 1 for gray, 3 for color.
    pub num_color_channels: u32,
    /// Whether an alpha channel is carried.
    pub has_alpha: bool,
}

impl SourceInfo {
    /// Color plus alpha channels.
    #[inline]
    pub fn num_channels(&self) -> u32 {
        self.num_color_channels + u32::from(self.has_alpha)
    }
}

/// Selects a layout from `accepted` for `source`.
///
/// Returns the first entry with exactly `source.num_channels()` channels and
/// at least `source.bits_per_sample` bits of precision. If entries with the
/// right channel count exist but none is precise enough, the most precise
/// of them is returned (first among equals) and a warning is logged.
/// Returns `None` when no entry has the right channel count.
pub fn select_format(accepted: &[InterchangeFormat], source: &SourceInfo) -> Option<InterchangeFormat> {
    let channels = source.num_channels();
    let mut best: Option<InterchangeFormat> = None;
    for fmt in accepted.iter().filter(|f| f.num_channels == channels) {
        if fmt.data_type.bits() >= source.bits_per_sample {
            return Some(*fmt);
        }
        if best.is_none_or(|b| fmt.data_type.bits() > b.data_type.bits()) {
            best = Some(*fmt);
        }
    }
    if let Some(fmt) = best {
        tracing::warn!(
            bits = source.bits_per_sample,
            chosen = ?fmt.data_type,
            "no accepted format keeps full precision"
        );
    }
    best
}

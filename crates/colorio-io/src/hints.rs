//! Decode-time hints and limits.
//!
//! Formats without colorimetric signaling (PNM, PGX, GIF) take their color
//! encoding from the `color_space` hint, a description string such as
//! `RGB_D65_SRG_Rel_Lin`. Formats that signal colorimetry ignore hints.

use std::collections::BTreeMap;

use colorio_color::{ColorEncoding, ColorSpace};

use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};

/// Key of the color encoding hint.
pub const COLOR_SPACE: &str = "color_space";

/// String key/value hints for decoders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorHints {
    entries: BTreeMap<String, String>,
}

impl ColorHints {
    /// No hints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hints with `color_space` set to `c`'s description.
    pub fn with_color_space(c: &ColorEncoding) -> Self {
        let mut hints = Self::new();
        hints.add(COLOR_SPACE, c.description());
        hints
    }

    /// Sets `key` to `value`, replacing any earlier value.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Whether no hint is set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates hints in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether the `color_space` hint names a gray encoding; `None` without
    /// a hint.
    pub(crate) fn hinted_gray(&self) -> CodecResult<Option<bool>> {
        match self.get(COLOR_SPACE) {
            Some(desc) => Ok(Some(desc.parse::<ColorEncoding>()?.is_gray())),
            None => Ok(None),
        }
    }

    /// Color encoding for an image without colorimetric signaling.
    ///
    /// Uses the `color_space` hint when present, else sRGB. A hint whose
    /// gray/color layout disagrees with the image is adapted to the image.
    pub(crate) fn resolve_color(&self, codec: Codec, is_gray: bool) -> CodecResult<ColorEncoding> {
        let Some(desc) = self.get(COLOR_SPACE) else {
            tracing::debug!(codec = codec.name(), "no color_space hint, assuming sRGB");
            return Ok(ColorEncoding::srgb(is_gray));
        };
        let mut c: ColorEncoding = desc.parse()?;
        if c.is_gray() != is_gray {
            tracing::warn!(
                codec = codec.name(),
                hint = desc,
                "color_space hint does not match channel count"
            );
            c.set_color_space(if is_gray { ColorSpace::Gray } else { ColorSpace::Rgb });
        }
        Ok(c)
    }

    /// Logs hints that a self-describing format ignores.
    pub(crate) fn warn_ignored(&self, codec: Codec) {
        for (key, value) in self.iter() {
            tracing::warn!(codec = codec.name(), key, value, "ignoring decode hint");
        }
    }
}

/// Limits checked before pixels are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeConstraints {
    /// Maximum width.
    pub dec_max_xsize: usize,
    /// Maximum height.
    pub dec_max_ysize: usize,
    /// Maximum `width * height`.
    pub dec_max_pixels: usize,
}

impl Default for SizeConstraints {
    fn default() -> Self {
        Self {
            dec_max_xsize: u32::MAX as usize,
            dec_max_ysize: u32::MAX as usize,
            dec_max_pixels: u32::MAX as usize,
        }
    }
}

impl SizeConstraints {
    /// Fails with [`CodecError::SizeConstraintViolation`] when an image of
    /// `xsize` by `ysize` exceeds a limit, or has zero area.
    pub fn check(&self, xsize: usize, ysize: usize) -> CodecResult<()> {
        if xsize == 0 || ysize == 0 {
            return Err(CodecError::SizeConstraintViolation(format!("empty image {xsize}x{ysize}")));
        }
        if xsize > self.dec_max_xsize || ysize > self.dec_max_ysize {
            return Err(CodecError::SizeConstraintViolation(format!(
                "{xsize}x{ysize} exceeds {}x{}",
                self.dec_max_xsize, self.dec_max_ysize
            )));
        }
        match xsize.checked_mul(ysize) {
            Some(pixels) if pixels <= self.dec_max_pixels => Ok(()),
            _ => Err(CodecError::SizeConstraintViolation(format!(
                "{xsize}x{ysize} exceeds {} pixels",
                self.dec_max_pixels
            ))),
        }
    }
}

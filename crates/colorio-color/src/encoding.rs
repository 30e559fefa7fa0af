//! Color encoding model.
//!
//! A [`ColorEncoding`] describes how pixel values map to colors, either as
//! structured fields (color space, white point, primaries, transfer
//! function, rendering intent) or as opaque ICC bytes, usually both.
//!
//! # Description strings
//!
//! [`ColorEncoding::description`] renders a canonical string that is used to
//! compare encodings and to pass them around as text (decode hints):
//!
//! | Encoding | Description |
//! |----------|-------------|
//! | sRGB | `RGB_D65_SRG_Rel_SRG` |
//! | linear gray | `Gra_D65_Rel_Lin` |
//! | P3 with DCI white, gamma 2.6 | `RGB_DCI_DCI_Per_DCI` |
//! | custom white, power 0.5 | `RGB_0.3;0.32_SRG_Rel_g0.5` |
//! | profile without fields | `RGB_ICC` |
//!
//! Gray encodings omit the primaries token. Every description except the
//! `_ICC` form parses back with [`str::parse`].

use std::fmt;
use std::str::FromStr;

use crate::error::{ColorError, ColorResult};
use crate::icc;
use crate::primaries::{Chromaticity, Primaries, PrimariesXy, WhitePoint};
use crate::transfer::TransferFunction;

/// Color model of an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    /// Three-channel RGB.
    #[default]
    Rgb,
    /// Single-channel gray.
    Gray,
    /// Anything else.
    Unknown,
}

/// ICC rendering intent used when converting into an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderingIntent {
    /// Perceptual.
    Perceptual,
    /// Media-relative colorimetric.
    #[default]
    Relative,
    /// Saturation.
    Saturation,
    /// ICC-absolute colorimetric.
    Absolute,
}

impl From<RenderingIntent> for lcms2::Intent {
    fn from(intent: RenderingIntent) -> Self {
        match intent {
            RenderingIntent::Perceptual => lcms2::Intent::Perceptual,
            RenderingIntent::Relative => lcms2::Intent::RelativeColorimetric,
            RenderingIntent::Saturation => lcms2::Intent::Saturation,
            RenderingIntent::Absolute => lcms2::Intent::AbsoluteColorimetric,
        }
    }
}

/// Colorimetric interpretation of pixel values.
///
/// Setters for structured fields drop any ICC bytes, so the profile can
/// never disagree with the fields. Call [`ColorEncoding::create_icc`] to
/// derive fresh bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorEncoding {
    color_space: ColorSpace,
    white_point: WhitePoint,
    primaries: Primaries,
    transfer_function: TransferFunction,
    rendering_intent: RenderingIntent,
    icc: Vec<u8>,
    have_fields: bool,
}

impl Default for ColorEncoding {
    fn default() -> Self {
        Self::srgb(false)
    }
}

impl ColorEncoding {
    /// Encoding from structured fields, without ICC bytes.
    pub fn new(
        color_space: ColorSpace,
        white_point: WhitePoint,
        primaries: Primaries,
        transfer_function: TransferFunction,
        rendering_intent: RenderingIntent,
    ) -> Self {
        Self {
            color_space,
            white_point,
            primaries,
            transfer_function,
            rendering_intent,
            icc: Vec::new(),
            have_fields: true,
        }
    }

    /// sRGB, or gray with the sRGB transfer function.
    pub fn srgb(is_gray: bool) -> Self {
        Self::new(
            if is_gray { ColorSpace::Gray } else { ColorSpace::Rgb },
            WhitePoint::D65,
            Primaries::Srgb,
            TransferFunction::Srgb,
            RenderingIntent::Relative,
        )
    }

    /// Linear-light sRGB primaries, or linear gray.
    pub fn linear_srgb(is_gray: bool) -> Self {
        let mut c = Self::srgb(is_gray);
        c.transfer_function = TransferFunction::Linear;
        c
    }

    /// Encoding described by ICC bytes.
    ///
    /// Profiles produced by [`ColorEncoding::create_icc`] restore their
    /// structured fields exactly. Other matrix/TRC profiles get fields
    /// derived from their tags when the curves match a known transfer
    /// function; anything else yields an ICC-only encoding. The bytes are
    /// kept either way.
    pub fn from_icc(bytes: &[u8]) -> ColorResult<Self> {
        icc::parse(bytes)
    }

    /// Replaces this encoding with the one described by `bytes`.
    pub fn set_icc(&mut self, bytes: &[u8]) -> ColorResult<()> {
        *self = icc::parse(bytes)?;
        Ok(())
    }

    pub(crate) fn icc_only(color_space: ColorSpace, bytes: Vec<u8>) -> Self {
        Self {
            color_space,
            icc: bytes,
            have_fields: false,
            ..Self::srgb(color_space == ColorSpace::Gray)
        }
    }

    pub(crate) fn with_icc(mut self, bytes: Vec<u8>) -> Self {
        self.icc = bytes;
        self
    }

    /// Color model.
    #[inline]
    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    /// White point.
    #[inline]
    pub fn white_point(&self) -> WhitePoint {
        self.white_point
    }

    /// RGB primaries (meaningless for gray).
    #[inline]
    pub fn primaries(&self) -> Primaries {
        self.primaries
    }

    /// Transfer function.
    #[inline]
    pub fn transfer_function(&self) -> TransferFunction {
        self.transfer_function
    }

    /// Rendering intent.
    #[inline]
    pub fn rendering_intent(&self) -> RenderingIntent {
        self.rendering_intent
    }

    /// ICC bytes, empty when none have been created or attached.
    #[inline]
    pub fn icc(&self) -> &[u8] {
        &self.icc
    }

    /// Whether the structured fields are authoritative.
    #[inline]
    pub fn have_fields(&self) -> bool {
        self.have_fields
    }

    /// Whether this is a single-channel encoding.
    #[inline]
    pub fn is_gray(&self) -> bool {
        self.color_space == ColorSpace::Gray
    }

    /// Number of color channels, 1 for gray and 3 otherwise.
    #[inline]
    pub fn channels(&self) -> usize {
        if self.is_gray() { 1 } else { 3 }
    }

    /// Whether this is sRGB (or sRGB gray), regardless of intent.
    pub fn is_srgb(&self) -> bool {
        self.have_fields
            && self.color_space != ColorSpace::Unknown
            && self.white_point == WhitePoint::D65
            && (self.is_gray() || self.primaries == Primaries::Srgb)
            && self.transfer_function == TransferFunction::Srgb
    }

    /// Sets the color model, dropping ICC bytes.
    pub fn set_color_space(&mut self, color_space: ColorSpace) {
        self.color_space = color_space;
        self.fields_changed();
    }

    /// Sets the white point, dropping ICC bytes.
    pub fn set_white_point(&mut self, white_point: WhitePoint) {
        self.white_point = white_point;
        self.fields_changed();
    }

    /// Sets the primaries, dropping ICC bytes.
    pub fn set_primaries(&mut self, primaries: Primaries) {
        self.primaries = primaries;
        self.fields_changed();
    }

    /// Sets the transfer function, dropping ICC bytes.
    pub fn set_transfer_function(&mut self, transfer_function: TransferFunction) {
        self.transfer_function = transfer_function;
        self.fields_changed();
    }

    /// Sets the rendering intent, dropping ICC bytes.
    pub fn set_rendering_intent(&mut self, rendering_intent: RenderingIntent) {
        self.rendering_intent = rendering_intent;
        self.fields_changed();
    }

    fn fields_changed(&mut self) {
        self.icc.clear();
        self.have_fields = true;
    }

    /// Derives ICC bytes from the structured fields.
    ///
    /// The bytes are a pure function of the fields. An encoding without
    /// fields keeps its existing profile, or fails if it has none.
    pub fn create_icc(&mut self) -> ColorResult<()> {
        if !self.have_fields {
            if self.icc.is_empty() {
                return Err(ColorError::Unsupported(
                    "encoding has neither fields nor a profile".into(),
                ));
            }
            return Ok(());
        }
        self.icc = icc::create(self)?;
        Ok(())
    }

    /// Drops the ICC bytes, keeping the structured fields.
    pub fn internal_remove_icc(&mut self) {
        self.icc.clear();
    }

    /// Whether a container must carry an ICC profile to preserve this
    /// encoding: there are no structured fields, or the white point or
    /// primaries are custom.
    pub fn want_icc(&self) -> bool {
        !self.have_fields
            || self.white_point.is_custom()
            || (!self.is_gray() && self.primaries.is_custom())
    }

    /// Same colorimetry: equal descriptions, and equal profiles when the
    /// fields are not authoritative.
    pub fn same_color_encoding(&self, other: &Self) -> bool {
        if self.have_fields && other.have_fields {
            self.description() == other.description()
        } else {
            self.color_space == other.color_space && self.icc == other.icc
        }
    }

    /// Canonical description string.
    pub fn description(&self) -> String {
        let cs = color_space_token(self.color_space);
        if !self.have_fields {
            return format!("{cs}_ICC");
        }
        let wp = white_point_token(&self.white_point);
        let ri = intent_token(self.rendering_intent);
        let tf = transfer_token(&self.transfer_function);
        if self.is_gray() {
            format!("{cs}_{wp}_{ri}_{tf}")
        } else {
            let pr = primaries_token(&self.primaries);
            format!("{cs}_{wp}_{pr}_{ri}_{tf}")
        }
    }
}

impl fmt::Display for ColorEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

impl FromStr for ColorEncoding {
    type Err = ColorError;

    fn from_str(s: &str) -> ColorResult<Self> {
        let invalid = || ColorError::InvalidDescription(s.to_string());
        let parts: Vec<&str> = s.split('_').collect();
        let color_space = match parts.first().copied() {
            Some("RGB") => ColorSpace::Rgb,
            Some("Gra") => ColorSpace::Gray,
            Some("CS?") => ColorSpace::Unknown,
            _ => return Err(invalid()),
        };
        let expected = if color_space == ColorSpace::Gray { 4 } else { 5 };
        if parts.len() != expected {
            return Err(invalid());
        }
        let white_point = parse_white_point(parts[1]).ok_or_else(invalid)?;
        let (primaries, rest) = if color_space == ColorSpace::Gray {
            (Primaries::Srgb, &parts[2..])
        } else {
            (parse_primaries(parts[2]).ok_or_else(invalid)?, &parts[3..])
        };
        let rendering_intent = parse_intent(rest[0]).ok_or_else(invalid)?;
        let transfer_function = parse_transfer(rest[1]).ok_or_else(invalid)?;
        Ok(Self::new(
            color_space,
            white_point,
            primaries,
            transfer_function,
            rendering_intent,
        ))
    }
}

fn color_space_token(cs: ColorSpace) -> &'static str {
    match cs {
        ColorSpace::Rgb => "RGB",
        ColorSpace::Gray => "Gra",
        ColorSpace::Unknown => "CS?",
    }
}

fn white_point_token(wp: &WhitePoint) -> String {
    match wp {
        WhitePoint::D65 => "D65".into(),
        WhitePoint::E => "EER".into(),
        WhitePoint::Dci => "DCI".into(),
        WhitePoint::Custom(c) => format!("{};{}", c.x, c.y),
    }
}

fn primaries_token(pr: &Primaries) -> String {
    match pr {
        Primaries::Srgb => "SRG".into(),
        Primaries::Bt2100 => "202".into(),
        Primaries::P3 => "DCI".into(),
        Primaries::Custom(p) => format!(
            "{},{};{},{};{},{}",
            p.red.x, p.red.y, p.green.x, p.green.y, p.blue.x, p.blue.y
        ),
    }
}

fn intent_token(ri: RenderingIntent) -> &'static str {
    match ri {
        RenderingIntent::Perceptual => "Per",
        RenderingIntent::Relative => "Rel",
        RenderingIntent::Saturation => "Sat",
        RenderingIntent::Absolute => "Abs",
    }
}

fn transfer_token(tf: &TransferFunction) -> String {
    match tf {
        TransferFunction::Bt709 => "709".into(),
        TransferFunction::Unknown => "TF?".into(),
        TransferFunction::Linear => "Lin".into(),
        TransferFunction::Srgb => "SRG".into(),
        TransferFunction::Pq => "PeQ".into(),
        TransferFunction::Dci => "DCI".into(),
        TransferFunction::Hlg => "HLG".into(),
        TransferFunction::Gamma(g) => format!("g{g}"),
    }
}

fn parse_xy(s: &str, sep: char) -> Option<Chromaticity> {
    let (x, y) = s.split_once(sep)?;
    let c = Chromaticity::new(x.parse().ok()?, y.parse().ok()?);
    c.is_valid().then_some(c)
}

fn parse_white_point(s: &str) -> Option<WhitePoint> {
    match s {
        "D65" => Some(WhitePoint::D65),
        "EER" => Some(WhitePoint::E),
        "DCI" => Some(WhitePoint::Dci),
        _ => parse_xy(s, ';').map(WhitePoint::Custom),
    }
}

fn parse_primaries(s: &str) -> Option<Primaries> {
    match s {
        "SRG" => Some(Primaries::Srgb),
        "202" => Some(Primaries::Bt2100),
        "DCI" => Some(Primaries::P3),
        _ => {
            let mut it = s.split(';');
            let red = parse_xy(it.next()?, ',')?;
            let green = parse_xy(it.next()?, ',')?;
            let blue = parse_xy(it.next()?, ',')?;
            if it.next().is_some() {
                return None;
            }
            Some(Primaries::Custom(PrimariesXy { red, green, blue }))
        }
    }
}

fn parse_intent(s: &str) -> Option<RenderingIntent> {
    match s {
        "Per" => Some(RenderingIntent::Perceptual),
        "Rel" => Some(RenderingIntent::Relative),
        "Sat" => Some(RenderingIntent::Saturation),
        "Abs" => Some(RenderingIntent::Absolute),
        _ => None,
    }
}

fn parse_transfer(s: &str) -> Option<TransferFunction> {
    match s {
        "709" => Some(TransferFunction::Bt709),
        "TF?" => Some(TransferFunction::Unknown),
        "Lin" => Some(TransferFunction::Linear),
        "SRG" => Some(TransferFunction::Srgb),
        "PeQ" => Some(TransferFunction::Pq),
        "DCI" => Some(TransferFunction::Dci),
        "HLG" => Some(TransferFunction::Hlg),
        _ => {
            let g: f64 = s.strip_prefix('g')?.parse().ok()?;
            (g > 0.0 && g <= 1.0).then_some(TransferFunction::Gamma(g))
        }
    }
}

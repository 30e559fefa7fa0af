//! ICC profile bridge (Little CMS).
//!
//! Builds profiles from structured fields and recognizes profiles this
//! module built earlier. The profile description tag carries the canonical
//! description string, which is how fields survive a trip through a file.
//!
//! Other matrix/TRC profiles get their fields derived from the colorant,
//! white point and curve tags. Colorants are un-adapted from D50 with the
//! `chad` matrix, or with Bradford from `wtpt` when `chad` is absent.
//! Curves must match a known transfer function (or a pure power) at every
//! sample; otherwise the encoding stays ICC-only.

use lcms2::{
    CIEXYZ, CIExyY, CIExyYTRIPLE, ColorSpaceSignature, InfoType, Intent, Locale, MLU, Profile, Tag,
    TagSignature, ToneCurve, ToneCurveRef,
};

use crate::encoding::{ColorEncoding, ColorSpace, RenderingIntent};
use crate::error::{ColorError, ColorResult};
use crate::primaries::{Chromaticity, Primaries, PrimariesXy, WhitePoint};
use crate::transfer::TransferFunction;

const TABLE_SIZE: usize = 4096;

/// Profile connection space white.
const D50: [f64; 3] = [0.9642, 1.0, 0.8249];

/// Chromaticity tolerance when naming derived white points and primaries.
const XY_TOLERANCE: f64 = 1e-3;

/// Largest deviation between a TRC and a known curve.
const CURVE_TOLERANCE: f64 = 2e-3;
const CURVE_SAMPLES: usize = 64;

const BRADFORD: Mat3 = [
    [0.8951, 0.2664, -0.1614],
    [-0.7502, 1.7135, 0.0367],
    [0.0389, -0.0685, 1.0296],
];

type Mat3 = [[f64; 3]; 3];

// 2024-01-01 00:00:00, big endian u16 fields
const CREATION_DATE: [u8; 12] = [0x07, 0xE8, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0];

/// Serializes a profile for the encoding's structured fields.
pub(crate) fn create(c: &ColorEncoding) -> ColorResult<Vec<u8>> {
    let mut profile = build_profile(c)?;
    let description = c.description();
    let mut mlu = MLU::new(1);
    if !mlu.set_text_ascii(&description, Locale::none())
        || !profile.write_tag(TagSignature::ProfileDescriptionTag, Tag::MLU(&mlu))
    {
        return Err(ColorError::CreateFailed(format!(
            "cannot write description tag for {description}"
        )));
    }
    let mut bytes = profile
        .icc()
        .map_err(|e| ColorError::CreateFailed(e.to_string()))?;
    stamp_header(&mut bytes);
    tracing::trace!(%description, len = bytes.len(), "created ICC profile");
    Ok(bytes)
}

/// Parses ICC bytes into an encoding.
pub(crate) fn parse(bytes: &[u8]) -> ColorResult<ColorEncoding> {
    let profile =
        Profile::new_icc(bytes).map_err(|e| ColorError::InvalidProfile(e.to_string()))?;
    let color_space = match profile.color_space() {
        ColorSpaceSignature::RgbData => ColorSpace::Rgb,
        ColorSpaceSignature::GrayData => ColorSpace::Gray,
        _ => ColorSpace::Unknown,
    };
    let described = profile
        .info(InfoType::Description, Locale::none())
        .and_then(|d| d.trim_end_matches('\0').parse::<ColorEncoding>().ok())
        .filter(|c| c.color_space() == color_space);
    match described.or_else(|| derive_fields(&profile, color_space)) {
        Some(c) => Ok(c.with_icc(bytes.to_vec())),
        None => {
            tracing::debug!(?color_space, "profile without recognizable fields");
            Ok(ColorEncoding::icc_only(color_space, bytes.to_vec()))
        }
    }
}

/// Fields of a matrix/TRC profile, or `None` when its tags do not map onto
/// them.
fn derive_fields(profile: &Profile, color_space: ColorSpace) -> Option<ColorEncoding> {
    let to_native = native_adaptation(profile)?;
    let white = WhitePoint::from_xy(xy(mul_vec(&to_native, D50))?, XY_TOLERANCE);
    let (primaries, transfer) = match color_space {
        ColorSpace::Gray => (Primaries::Srgb, curve_tag(profile, TagSignature::GrayTRCTag)?),
        ColorSpace::Rgb => {
            let colorant = |sig| match profile.read_tag(sig) {
                Tag::CIEXYZ(c) => xy(mul_vec(&to_native, [c.X, c.Y, c.Z])),
                _ => None,
            };
            let primaries = PrimariesXy {
                red: colorant(TagSignature::RedColorantTag)?,
                green: colorant(TagSignature::GreenColorantTag)?,
                blue: colorant(TagSignature::BlueColorantTag)?,
            };
            let transfer = curve_tag(profile, TagSignature::RedTRCTag)?;
            for sig in [TagSignature::GreenTRCTag, TagSignature::BlueTRCTag] {
                if curve_tag(profile, sig)? != transfer {
                    return None;
                }
            }
            (Primaries::from_xy(primaries, XY_TOLERANCE), transfer)
        }
        ColorSpace::Unknown => return None,
    };
    let intent = match profile.header_rendering_intent() {
        Intent::Perceptual => RenderingIntent::Perceptual,
        Intent::Saturation => RenderingIntent::Saturation,
        Intent::AbsoluteColorimetric => RenderingIntent::Absolute,
        _ => RenderingIntent::Relative,
    };
    let c = ColorEncoding::new(color_space, white, primaries, transfer, intent);
    tracing::debug!(description = %c.description(), "derived fields from profile tags");
    Some(c)
}

/// Matrix taking PCS (D50-adapted) XYZ back to the profile's native white.
fn native_adaptation(profile: &Profile) -> Option<Mat3> {
    // chad is stored as nine doubles, which lcms2 exposes as an xyY triple
    if let Tag::CIExyYTRIPLE(m) = profile.read_tag(TagSignature::ChromaticAdaptationTag) {
        let chad = [
            [m.Red.x, m.Red.y, m.Red.Y],
            [m.Green.x, m.Green.y, m.Green.Y],
            [m.Blue.x, m.Blue.y, m.Blue.Y],
        ];
        return invert(&chad);
    }
    let white = match profile.read_tag(TagSignature::MediaWhitePointTag) {
        Tag::CIEXYZ(w) => [w.X, w.Y, w.Z],
        _ => D50,
    };
    bradford(D50, white)
}

/// Bradford adaptation from white `src` to white `dst`.
fn bradford(src: [f64; 3], dst: [f64; 3]) -> Option<Mat3> {
    let s = mul_vec(&BRADFORD, src);
    let d = mul_vec(&BRADFORD, dst);
    if s.iter().any(|v| v.abs() < 1e-12) {
        return None;
    }
    let mut scaled = BRADFORD;
    for (row, (dv, sv)) in scaled.iter_mut().zip(d.iter().zip(s.iter())) {
        row.iter_mut().for_each(|v| *v *= dv / sv);
    }
    Some(mul(&invert(&BRADFORD)?, &scaled))
}

fn curve_tag(profile: &Profile, sig: TagSignature) -> Option<TransferFunction> {
    match profile.read_tag(sig) {
        Tag::ToneCurve(curve) => match_curve(curve),
        _ => None,
    }
}

/// Known transfer function that `curve` reproduces.
fn match_curve(curve: &ToneCurveRef) -> Option<TransferFunction> {
    let fits = |tf: &TransferFunction| {
        (0..=CURVE_SAMPLES).all(|i| {
            let v = i as f64 / CURVE_SAMPLES as f64;
            (f64::from(curve.eval(v as f32)) - tf.to_linear(v)).abs() <= CURVE_TOLERANCE
        })
    };
    let known = [
        TransferFunction::Linear,
        TransferFunction::Srgb,
        TransferFunction::Bt709,
        TransferFunction::Dci,
        TransferFunction::Pq,
        TransferFunction::Hlg,
    ];
    if let Some(tf) = known.into_iter().find(|tf| fits(tf)) {
        return Some(tf);
    }
    let gamma = curve.estimated_gamma(0.01)?;
    let tf = TransferFunction::Gamma(1.0 / gamma);
    (gamma >= 1.0 && fits(&tf)).then_some(tf)
}

fn xy(xyz: [f64; 3]) -> Option<Chromaticity> {
    let c = lcms2::XYZ2xyY(&CIEXYZ {
        X: xyz[0],
        Y: xyz[1],
        Z: xyz[2],
    });
    (c.x.is_finite() && c.y.is_finite() && xyz.iter().sum::<f64>() > 0.0)
        .then(|| Chromaticity::new(c.x, c.y))
}

fn mul_vec(m: &Mat3, v: [f64; 3]) -> [f64; 3] {
    m.map(|row| row[0] * v[0] + row[1] * v[1] + row[2] * v[2])
}

fn mul(a: &Mat3, b: &Mat3) -> Mat3 {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, v) in row.iter_mut().enumerate() {
            *v = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn invert(m: &Mat3) -> Option<Mat3> {
    let cof = |r0: usize, r1: usize, c0: usize, c1: usize| m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0];
    let det = m[0][0] * cof(1, 2, 1, 2) - m[0][1] * cof(1, 2, 0, 2) + m[0][2] * cof(1, 2, 0, 1);
    if det.abs() < 1e-12 {
        return None;
    }
    Some([
        [cof(1, 2, 1, 2) / det, -cof(0, 2, 1, 2) / det, cof(0, 1, 1, 2) / det],
        [-cof(1, 2, 0, 2) / det, cof(0, 2, 0, 2) / det, -cof(0, 1, 0, 2) / det],
        [cof(1, 2, 0, 1) / det, -cof(0, 2, 0, 1) / det, cof(0, 1, 0, 1) / det],
    ])
}

/// Little CMS profile for an encoding, preferring attached ICC bytes.
pub(crate) fn profile_for(c: &ColorEncoding) -> ColorResult<Profile> {
    if c.icc().is_empty() {
        build_profile(c)
    } else {
        Profile::new_icc(c.icc()).map_err(|e| ColorError::InvalidProfile(e.to_string()))
    }
}

fn build_profile(c: &ColorEncoding) -> ColorResult<Profile> {
    if !c.have_fields() {
        return Err(ColorError::Unsupported(
            "encoding has neither fields nor a profile".into(),
        ));
    }
    let curve = tone_curve(c.transfer_function())?;
    let white = xyy(c.white_point().xy());
    let profile = match c.color_space() {
        ColorSpace::Gray => Profile::new_gray(&white, &curve),
        ColorSpace::Rgb => {
            let p = c.primaries().xy();
            let primaries = CIExyYTRIPLE {
                Red: xyy(p.red),
                Green: xyy(p.green),
                Blue: xyy(p.blue),
            };
            Profile::new_rgb(&white, &primaries, &[&curve, &curve, &curve])
        }
        ColorSpace::Unknown => {
            return Err(ColorError::Unsupported("unknown color space".into()));
        }
    };
    profile.map_err(|e| ColorError::CreateFailed(format!("{}: {e}", c.description())))
}

fn xyy(c: Chromaticity) -> CIExyY {
    CIExyY {
        x: c.x,
        y: c.y,
        Y: 1.0,
    }
}

/// Device-to-linear curve for a transfer function.
fn tone_curve(tf: TransferFunction) -> ColorResult<ToneCurve> {
    let parametric = |params: &[f64]| {
        ToneCurve::new_parametric(4, params).map_err(|e| ColorError::CreateFailed(e.to_string()))
    };
    match tf {
        TransferFunction::Linear => Ok(ToneCurve::new(1.0)),
        TransferFunction::Dci => Ok(ToneCurve::new(2.6)),
        TransferFunction::Gamma(g) => Ok(ToneCurve::new(1.0 / g)),
        // Y = (aX + b)^g for X >= d, else cX
        TransferFunction::Srgb => parametric(&[2.4, 1.0 / 1.055, 0.055 / 1.055, 1.0 / 12.92, 0.04045]),
        TransferFunction::Bt709 => parametric(&[1.0 / 0.45, 1.0 / 1.099, 0.099 / 1.099, 1.0 / 4.5, 0.081]),
        TransferFunction::Pq | TransferFunction::Hlg => {
            let table: Vec<f32> = (0..TABLE_SIZE)
                .map(|i| tf.to_linear(i as f64 / (TABLE_SIZE - 1) as f64) as f32)
                .collect();
            Ok(ToneCurve::new_tabulated_float(&table))
        }
        TransferFunction::Unknown => Err(ColorError::Unsupported(
            "unknown transfer function".into(),
        )),
    }
}

/// Fixes the creation date and clears the profile ID so identical fields
/// always serialize to identical bytes.
fn stamp_header(bytes: &mut [u8]) {
    if bytes.len() >= 128 {
        bytes[24..36].copy_from_slice(&CREATION_DATE);
        bytes[84..100].fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::RenderingIntent;
    use crate::primaries::{Primaries, WhitePoint};

    fn sample_encodings() -> Vec<ColorEncoding> {
        let mut out = vec![ColorEncoding::srgb(false), ColorEncoding::linear_srgb(true)];
        let mut p3 = ColorEncoding::srgb(false);
        p3.set_primaries(Primaries::P3);
        p3.set_transfer_function(TransferFunction::Linear);
        out.push(p3);
        let mut wide = ColorEncoding::srgb(false);
        wide.set_white_point(WhitePoint::E);
        wide.set_primaries(Primaries::Bt2100);
        wide.set_rendering_intent(RenderingIntent::Perceptual);
        out.push(wide);
        let mut custom = ColorEncoding::srgb(false);
        custom.set_white_point(WhitePoint::Custom(Chromaticity::new(0.3, 0.32)));
        custom.set_transfer_function(TransferFunction::Gamma(0.5));
        out.push(custom);
        let mut hlg = ColorEncoding::srgb(false);
        hlg.set_primaries(Primaries::Bt2100);
        hlg.set_transfer_function(TransferFunction::Hlg);
        out.push(hlg);
        out
    }

    #[test]
    fn test_create_parse_restores_fields() {
        for c in sample_encodings() {
            let bytes = create(&c).expect("create");
            let parsed = parse(&bytes).expect("parse");
            assert!(parsed.have_fields());
            assert_eq!(parsed.description(), c.description());
            assert_eq!(parsed.icc(), bytes.as_slice());
        }
    }

    #[test]
    fn test_create_is_deterministic() {
        for c in sample_encodings() {
            assert_eq!(create(&c).expect("first"), create(&c).expect("second"));
        }
    }

    /// Profile for `c` under a description that does not parse.
    fn foreign_profile(c: &ColorEncoding, description: &str) -> Vec<u8> {
        let mut profile = build_profile(c).expect("build");
        let mut mlu = MLU::new(1);
        assert!(mlu.set_text_ascii(description, Locale::none()));
        assert!(profile.write_tag(TagSignature::ProfileDescriptionTag, Tag::MLU(&mlu)));
        profile.icc().expect("icc bytes")
    }

    #[test]
    fn test_builtin_srgb_fields_derived() {
        let bytes = Profile::new_srgb().icc().expect("srgb bytes");
        let parsed = parse(&bytes).expect("parse");
        assert!(parsed.have_fields());
        assert_eq!(parsed.color_space(), ColorSpace::Rgb);
        assert_eq!(parsed.white_point(), WhitePoint::D65);
        assert_eq!(parsed.primaries(), Primaries::Srgb);
        assert_eq!(parsed.transfer_function(), TransferFunction::Srgb);
        assert_eq!(parsed.icc(), bytes.as_slice());
    }

    #[test]
    fn test_foreign_description_fields_derived() {
        let mut p3 = ColorEncoding::srgb(false);
        p3.set_primaries(Primaries::P3);
        let mut gray = ColorEncoding::linear_srgb(true);
        gray.set_white_point(WhitePoint::E);
        let mut pq = ColorEncoding::srgb(false);
        pq.set_primaries(Primaries::Bt2100);
        pq.set_transfer_function(TransferFunction::Pq);
        for (c, description) in [(p3, "Display P3"), (gray, "Gray E"), (pq, "Rec2100 PQ")] {
            let parsed = parse(&foreign_profile(&c, description)).expect("parse");
            assert!(parsed.have_fields(), "{description}");
            assert_eq!(parsed.color_space(), c.color_space(), "{description}");
            assert_eq!(parsed.white_point(), c.white_point(), "{description}");
            if !c.is_gray() {
                assert_eq!(parsed.primaries(), c.primaries(), "{description}");
            }
            assert_eq!(parsed.transfer_function(), c.transfer_function(), "{description}");
        }
    }

    #[test]
    fn test_foreign_custom_fields_stay_custom() {
        let mut c = ColorEncoding::srgb(false);
        c.set_white_point(WhitePoint::Custom(Chromaticity::new(0.3, 0.32)));
        c.set_transfer_function(TransferFunction::Gamma(0.5));
        let parsed = parse(&foreign_profile(&c, "custom")).expect("parse");
        let WhitePoint::Custom(white) = parsed.white_point() else {
            panic!("expected custom white, got {:?}", parsed.white_point());
        };
        assert!(white.approx_eq(&Chromaticity::new(0.3, 0.32), XY_TOLERANCE));
        assert_eq!(parsed.primaries(), Primaries::Srgb);
        assert!(matches!(parsed.transfer_function(), TransferFunction::Gamma(g) if (g - 0.5).abs() < 1e-2));
    }

    #[test]
    fn test_unmatched_curve_is_icc_only() {
        // encoded = linear^2 has no transfer function counterpart
        let white = xyy(WhitePoint::D65.xy());
        let profile = Profile::new_gray(&white, &ToneCurve::new(0.5)).expect("gray profile");
        let bytes = profile.icc().expect("icc bytes");
        let parsed = parse(&bytes).expect("parse");
        assert!(!parsed.have_fields());
        assert_eq!(parsed.color_space(), ColorSpace::Gray);
        assert_eq!(parsed.description(), "Gra_ICC");
    }

    #[test]
    fn test_bradford_maps_whites() {
        let d65 = [0.95047, 1.0, 1.08883];
        let m = bradford(D50, d65).expect("bradford");
        let out = mul_vec(&m, D50);
        for (a, b) in out.iter().zip(d65) {
            assert!((a - b).abs() < 1e-9);
        }
        let round = mul(&m, &bradford(d65, D50).expect("inverse"));
        for (i, row) in round.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                let want = if i == j { 1.0 } else { 0.0 };
                assert!((v - want).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(parse(&[0u8; 16]), Err(ColorError::InvalidProfile(_))));
    }

    #[test]
    fn test_unknown_transfer_rejected() {
        let mut c = ColorEncoding::srgb(false);
        c.set_transfer_function(TransferFunction::Unknown);
        assert!(matches!(create(&c), Err(ColorError::Unsupported(_))));
    }
}

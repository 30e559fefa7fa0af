//! Color management service.
//!
//! [`ColorManagement`] is the seam between pixel containers and whatever
//! performs colorimetric math. [`LcmsCms`] implements it with Little CMS.
//!
//! Transforms are not shared between threads: callers build one per
//! worker and feed it interleaved rows.
//!
//! ```rust
//! use colorio_color::{ColorEncoding, ColorManagement, LcmsCms};
//!
//! let src = ColorEncoding::srgb(false);
//! let dst = ColorEncoding::linear_srgb(false);
//! let mut t = LcmsCms.new_transform(&src, &dst).unwrap();
//! let mut out = [0.0f32; 3];
//! t.transform(&[1.0, 1.0, 1.0], &mut out);
//! assert!((out[0] - 1.0).abs() < 1e-3);
//! ```

use lcms2::{PixelFormat, Transform};

use crate::encoding::{ColorEncoding, ColorSpace};
use crate::error::{ColorError, ColorResult};
use crate::icc;

/// Builds pixel transforms between color encodings.
pub trait ColorManagement: Send + Sync {
    /// Transform from `src` to `dst`, using `dst`'s rendering intent.
    fn new_transform(
        &self,
        src: &ColorEncoding,
        dst: &ColorEncoding,
    ) -> ColorResult<Box<dyn PixelTransform>>;
}

/// Converts interleaved float pixels between two encodings.
pub trait PixelTransform {
    /// Samples per input pixel (1 or 3).
    fn input_channels(&self) -> usize;

    /// Samples per output pixel (1 or 3).
    fn output_channels(&self) -> usize;

    /// Converts `src` into `dst`.
    ///
    /// `src.len() / input_channels()` must equal
    /// `dst.len() / output_channels()`.
    fn transform(&mut self, src: &[f32], dst: &mut [f32]);
}

/// Little CMS backed [`ColorManagement`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LcmsCms;

impl ColorManagement for LcmsCms {
    fn new_transform(
        &self,
        src: &ColorEncoding,
        dst: &ColorEncoding,
    ) -> ColorResult<Box<dyn PixelTransform>> {
        let src_profile = icc::profile_for(src)?;
        let dst_profile = icc::profile_for(dst)?;
        let intent = dst.rendering_intent().into();
        let failed = |e: lcms2::Error| {
            ColorError::TransformFailed(format!("{} -> {}: {e}", src.description(), dst.description()))
        };
        let kind = match (channel_layout(src)?, channel_layout(dst)?) {
            (ColorSpace::Rgb, ColorSpace::Rgb) => Kind::RgbToRgb(
                Transform::new(&src_profile, PixelFormat::RGB_FLT, &dst_profile, PixelFormat::RGB_FLT, intent)
                    .map_err(failed)?,
            ),
            (ColorSpace::Gray, ColorSpace::Gray) => Kind::GrayToGray(
                Transform::new(&src_profile, PixelFormat::GRAY_FLT, &dst_profile, PixelFormat::GRAY_FLT, intent)
                    .map_err(failed)?,
            ),
            (ColorSpace::Gray, _) => Kind::GrayToRgb(
                Transform::new(&src_profile, PixelFormat::GRAY_FLT, &dst_profile, PixelFormat::RGB_FLT, intent)
                    .map_err(failed)?,
            ),
            (_, ColorSpace::Gray) => Kind::RgbToGray(
                Transform::new(&src_profile, PixelFormat::RGB_FLT, &dst_profile, PixelFormat::GRAY_FLT, intent)
                    .map_err(failed)?,
            ),
            (ColorSpace::Unknown, _) | (_, ColorSpace::Unknown) => unreachable!("channel_layout rejects Unknown"),
        };
        tracing::debug!(src = %src, dst = %dst, "color transform");
        Ok(Box::new(LcmsTransform {
            kind,
            rgb_in: Vec::new(),
            rgb_out: Vec::new(),
        }))
    }
}

fn channel_layout(c: &ColorEncoding) -> ColorResult<ColorSpace> {
    match c.color_space() {
        ColorSpace::Unknown => Err(ColorError::Unsupported(format!(
            "cannot transform {}",
            c.description()
        ))),
        cs => Ok(cs),
    }
}

enum Kind {
    RgbToRgb(Transform<[f32; 3], [f32; 3]>),
    GrayToGray(Transform<f32, f32>),
    GrayToRgb(Transform<f32, [f32; 3]>),
    RgbToGray(Transform<[f32; 3], f32>),
}

struct LcmsTransform {
    kind: Kind,
    rgb_in: Vec<[f32; 3]>,
    rgb_out: Vec<[f32; 3]>,
}

fn load_rgb(buf: &mut Vec<[f32; 3]>, src: &[f32]) {
    buf.clear();
    buf.extend(src.chunks_exact(3).map(|p| [p[0], p[1], p[2]]));
}

fn store_rgb(buf: &[[f32; 3]], dst: &mut [f32]) {
    for (d, s) in dst.chunks_exact_mut(3).zip(buf) {
        d.copy_from_slice(s);
    }
}

impl PixelTransform for LcmsTransform {
    fn input_channels(&self) -> usize {
        match self.kind {
            Kind::RgbToRgb(_) | Kind::RgbToGray(_) => 3,
            Kind::GrayToGray(_) | Kind::GrayToRgb(_) => 1,
        }
    }

    fn output_channels(&self) -> usize {
        match self.kind {
            Kind::RgbToRgb(_) | Kind::GrayToRgb(_) => 3,
            Kind::GrayToGray(_) | Kind::RgbToGray(_) => 1,
        }
    }

    fn transform(&mut self, src: &[f32], dst: &mut [f32]) {
        let Self {
            kind,
            rgb_in,
            rgb_out,
        } = self;
        match kind {
            Kind::GrayToGray(t) => t.transform_pixels(src, dst),
            Kind::GrayToRgb(t) => {
                rgb_out.clear();
                rgb_out.resize(src.len(), [0.0; 3]);
                t.transform_pixels(src, rgb_out);
                store_rgb(rgb_out, dst);
            }
            Kind::RgbToRgb(t) => {
                load_rgb(rgb_in, src);
                rgb_out.clear();
                rgb_out.resize(rgb_in.len(), [0.0; 3]);
                t.transform_pixels(rgb_in, rgb_out);
                store_rgb(rgb_out, dst);
            }
            Kind::RgbToGray(t) => {
                load_rgb(rgb_in, src);
                t.transform_pixels(rgb_in, dst);
            }
        }
    }
}

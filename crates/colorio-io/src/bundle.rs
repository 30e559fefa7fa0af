//! In-memory image container.
//!
//! [`CodecInOut`] owns an ordered list of [`ImageBundle`] frames plus the
//! shared [`ImageMetadata`]. It always holds at least one frame; the first
//! is [`CodecInOut::main`].
//!
//! # Example
//!
//! ```rust
//! use colorio_color::{ColorEncoding, LcmsCms};
//! use colorio_core::{Plane, PlanarImage};
//! use colorio_io::CodecInOut;
//!
//! let gray = PlanarImage::gray(Plane::filled(7, 4, 0.5));
//! let mut io = CodecInOut::from_image(gray, ColorEncoding::srgb(true)).unwrap();
//! io.set_uint_samples(16).unwrap();
//!
//! io.transform_to(&ColorEncoding::linear_srgb(true), &LcmsCms, None).unwrap();
//! assert_eq!(io.main().c_current().description(), "Gra_D65_Rel_Lin");
//! ```

use colorio_color::{ColorEncoding, ColorManagement, ColorResult};
use colorio_core::{run_on_pool, BitDepth, PlanarImage, Plane, ThreadPool};

use crate::error::{CodecError, CodecResult};
use crate::metadata::{AlphaInfo, ImageMetadata};

/// One frame: color planes, optional alpha, and the color encoding the
/// planes are currently in.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBundle {
    color: PlanarImage,
    alpha: Option<Plane>,
    c_current: ColorEncoding,
    /// Display time for animated images.
    pub duration_ms: u32,
}

impl ImageBundle {
    /// Frame from color planes in encoding `c_current`.
    ///
    /// Gray encodings need one plane; anything else needs three.
    pub fn new(color: PlanarImage, c_current: ColorEncoding) -> colorio_core::Result<Self> {
        if color.channels() != c_current.channels() {
            return Err(colorio_core::Error::channel_mismatch(
                c_current.channels(),
                color.channels(),
            ));
        }
        Ok(Self {
            color,
            alpha: None,
            c_current,
            duration_ms: 0,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn xsize(&self) -> usize {
        self.color.width()
    }

    /// Height in pixels.
    #[inline]
    pub fn ysize(&self) -> usize {
        self.color.height()
    }

    /// Color planes.
    #[inline]
    pub fn color(&self) -> &PlanarImage {
        &self.color
    }

    /// Mutable color planes.
    #[inline]
    pub fn color_mut(&mut self) -> &mut PlanarImage {
        &mut self.color
    }

    /// Alpha plane, if any.
    #[inline]
    pub fn alpha(&self) -> Option<&Plane> {
        self.alpha.as_ref()
    }

    /// Whether the frame has alpha.
    #[inline]
    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    /// Whether the color planes are gray.
    #[inline]
    pub fn is_gray(&self) -> bool {
        self.color.is_gray()
    }

    /// Encoding the color planes are in.
    #[inline]
    pub fn c_current(&self) -> &ColorEncoding {
        &self.c_current
    }

    /// Attaches an alpha plane of the frame's size.
    pub fn set_alpha(&mut self, alpha: Plane) -> colorio_core::Result<()> {
        let dims = (self.xsize(), self.ysize());
        if alpha.dims() != dims {
            return Err(colorio_core::Error::dimension_mismatch(dims, alpha.dims()));
        }
        self.alpha = Some(alpha);
        Ok(())
    }

    /// Removes the alpha plane.
    pub fn remove_alpha(&mut self) {
        self.alpha = None;
    }

    /// Converts the color planes to `target` in place. Alpha is untouched.
    ///
    /// Does nothing when `target` already describes the current encoding.
    /// Rows are converted in parallel on `pool`, each worker with its own
    /// transform; the result does not depend on `pool`.
    pub fn transform_to(
        &mut self,
        target: &ColorEncoding,
        cms: &dyn ColorManagement,
        pool: Option<&ThreadPool>,
    ) -> ColorResult<()> {
        if self.c_current.same_color_encoding(target) {
            return Ok(());
        }
        self.color = convert_planes(&self.color, &self.c_current, target, cms, pool)?;
        self.c_current = target.clone();
        Ok(())
    }

    /// Converted copy of this frame; `self` is not modified.
    pub fn transformed(
        &self,
        target: &ColorEncoding,
        cms: &dyn ColorManagement,
        pool: Option<&ThreadPool>,
    ) -> ColorResult<ImageBundle> {
        if self.c_current.same_color_encoding(target) {
            return Ok(self.clone());
        }
        Ok(Self {
            color: convert_planes(&self.color, &self.c_current, target, cms, pool)?,
            alpha: self.alpha.clone(),
            c_current: target.clone(),
            duration_ms: self.duration_ms,
        })
    }
}

fn convert_planes(
    color: &PlanarImage,
    src: &ColorEncoding,
    dst: &ColorEncoding,
    cms: &dyn ColorManagement,
    pool: Option<&ThreadPool>,
) -> ColorResult<PlanarImage> {
    let (width, height) = (color.width(), color.height());
    let in_ch = color.channels();
    let out_ch = dst.channels();
    tracing::debug!(from = %src, to = %dst, width, height, "transforming frame");

    let rows = run_on_pool(
        pool,
        height,
        || cms.new_transform(src, dst),
        |transform, y| -> ColorResult<Vec<f32>> {
            let transform = transform.as_mut().map_err(|e| e.clone())?;
            let mut interleaved = vec![0.0f32; width * in_ch];
            for c in 0..in_ch {
                for (x, v) in color.plane(c).row(y).iter().enumerate() {
                    interleaved[x * in_ch + c] = *v;
                }
            }
            let mut out = vec![0.0f32; width * out_ch];
            transform.transform(&interleaved, &mut out);
            Ok(out)
        },
    );

    let mut planes: Vec<Plane> = (0..out_ch).map(|_| Plane::new(width, height)).collect();
    for (y, row) in rows.into_iter().enumerate() {
        let row = row?;
        for (c, plane) in planes.iter_mut().enumerate() {
            for (x, v) in plane.row_mut(y).iter_mut().enumerate() {
                *v = row[x * out_ch + c];
            }
        }
    }
    // Plane count and sizes are consistent by construction.
    PlanarImage::from_planes(planes).map_err(|e| colorio_color::ColorError::TransformFailed(e.to_string()))
}

/// Image container: shared metadata plus one or more frames.
#[derive(Debug, Clone, PartialEq)]
pub struct CodecInOut {
    /// Shared metadata.
    pub metadata: ImageMetadata,
    frames: Vec<ImageBundle>,
}

impl CodecInOut {
    /// Single-frame container from color planes in encoding `c`.
    pub fn from_image(color: PlanarImage, c: ColorEncoding) -> CodecResult<Self> {
        let frame = ImageBundle::new(color, c.clone())?;
        Ok(Self {
            metadata: ImageMetadata {
                color_encoding: c,
                ..ImageMetadata::default()
            },
            frames: vec![frame],
        })
    }

    /// Replaces all frames with a single one and records `c` as the
    /// original encoding.
    pub fn set_from_image(&mut self, color: PlanarImage, c: ColorEncoding) -> CodecResult<()> {
        let frame = ImageBundle::new(color, c.clone())?;
        self.metadata.color_encoding = c;
        self.metadata.alpha = None;
        self.frames = vec![frame];
        Ok(())
    }

    /// Attaches alpha to the main frame.
    ///
    /// Alpha precision follows the color precision: 8 bits when colors have
    /// at most 8, otherwise 16.
    pub fn set_alpha(&mut self, alpha: Plane, premultiplied: bool) -> CodecResult<()> {
        self.frames[0].set_alpha(alpha)?;
        self.metadata.alpha = Some(AlphaInfo {
            bits_per_sample: self.alpha_bits(),
            premultiplied,
        });
        Ok(())
    }

    /// Declares integer samples of `bits` bits. Alpha precision follows.
    pub fn set_uint_samples(&mut self, bits: u32) -> CodecResult<()> {
        self.metadata.bit_depth = BitDepth::uint(bits)?;
        self.sync_alpha_bits();
        Ok(())
    }

    /// Declares 32-bit float samples. Alpha precision follows.
    pub fn set_float32_samples(&mut self) {
        self.metadata.bit_depth = BitDepth::float32();
        self.sync_alpha_bits();
    }

    fn alpha_bits(&self) -> u32 {
        if self.metadata.bit_depth.bits_per_sample <= 8 { 8 } else { 16 }
    }

    fn sync_alpha_bits(&mut self) {
        let bits = self.alpha_bits();
        if let Some(alpha) = &mut self.metadata.alpha {
            alpha.bits_per_sample = bits;
        }
    }

    /// Appends an animation frame of the main frame's size and color layout.
    pub fn add_frame(&mut self, frame: ImageBundle) -> CodecResult<()> {
        let main = self.main();
        if (frame.xsize(), frame.ysize()) != (main.xsize(), main.ysize()) {
            return Err(colorio_core::Error::dimension_mismatch(
                (main.xsize(), main.ysize()),
                (frame.xsize(), frame.ysize()),
            )
            .into());
        }
        if frame.is_gray() != main.is_gray() || frame.has_alpha() != main.has_alpha() {
            return Err(CodecError::InvalidImage(colorio_core::Error::channel_mismatch(
                main.color().channels() + usize::from(main.has_alpha()),
                frame.color().channels() + usize::from(frame.has_alpha()),
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    /// The first frame.
    #[inline]
    pub fn main(&self) -> &ImageBundle {
        &self.frames[0]
    }

    /// The first frame, mutable.
    #[inline]
    pub fn main_mut(&mut self) -> &mut ImageBundle {
        &mut self.frames[0]
    }

    /// All frames in display order.
    #[inline]
    pub fn frames(&self) -> &[ImageBundle] {
        &self.frames
    }

    /// All frames, mutable.
    #[inline]
    pub fn frames_mut(&mut self) -> &mut [ImageBundle] {
        &mut self.frames
    }

    /// Width in pixels.
    #[inline]
    pub fn xsize(&self) -> usize {
        self.main().xsize()
    }

    /// Height in pixels.
    #[inline]
    pub fn ysize(&self) -> usize {
        self.main().ysize()
    }

    /// Whether frames are gray.
    #[inline]
    pub fn is_gray(&self) -> bool {
        self.main().is_gray()
    }

    /// Whether frames carry alpha.
    #[inline]
    pub fn has_alpha(&self) -> bool {
        self.main().has_alpha()
    }

    /// Converts every frame to `target`.
    pub fn transform_to(
        &mut self,
        target: &ColorEncoding,
        cms: &dyn ColorManagement,
        pool: Option<&ThreadPool>,
    ) -> CodecResult<()> {
        for frame in &mut self.frames {
            frame.transform_to(target, cms, pool)?;
        }
        Ok(())
    }

    pub(crate) fn from_frames(metadata: ImageMetadata, frames: Vec<ImageBundle>) -> CodecResult<Self> {
        if frames.is_empty() {
            return Err(CodecError::InvalidImage(colorio_core::Error::channel_mismatch(1, 0)));
        }
        Ok(Self { metadata, frames })
    }
}

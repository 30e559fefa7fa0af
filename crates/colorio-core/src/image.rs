//! Planar float pixel storage.
//!
//! Samples are nominal values: integer-origin data is normalized to
//! `[0, 1]`, float data is kept as-is (HDR values above 1 are allowed).
//!
//! # Types
//!
//! - [`Plane`] - One channel, row-major `f32`
//! - [`PlanarImage`] - One (gray) or three (RGB) same-sized planes
//! - [`ErrorStats`] - Difference summary used to check round trips

use crate::error::{Error, Result};

/// A single channel of row-major `f32` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Plane {
    /// Zero-filled plane.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Wraps existing samples; `data.len()` must equal `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(Error::BufferSize {
                len: data.len(),
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Plane filled with `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Sample at `(x, y)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Sets the sample at `(x, y)`.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        &self.data[y * self.width..(y + 1) * self.width]
    }

    /// Mutable row `y`.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    /// All samples.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// All samples, mutable.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the plane, returning its samples.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// One or three same-sized color planes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarImage {
    planes: Vec<Plane>,
}

impl PlanarImage {
    /// Single gray plane.
    pub fn gray(plane: Plane) -> Self {
        Self {
            planes: vec![plane],
        }
    }

    /// Three RGB planes of equal size.
    pub fn rgb(planes: [Plane; 3]) -> Result<Self> {
        Self::from_planes(planes.into())
    }

    /// One or three planes of equal size.
    pub fn from_planes(planes: Vec<Plane>) -> Result<Self> {
        if planes.len() != 1 && planes.len() != 3 {
            return Err(Error::channel_mismatch(3, planes.len()));
        }
        let dims = planes[0].dims();
        if let Some(bad) = planes.iter().find(|p| p.dims() != dims) {
            return Err(Error::dimension_mismatch(dims, bad.dims()));
        }
        Ok(Self { planes })
    }

    /// Zero-filled image with `channels` planes (1 or 3).
    pub fn new(width: usize, height: usize, channels: usize) -> Result<Self> {
        Self::from_planes((0..channels).map(|_| Plane::new(width, height)).collect())
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.planes[0].width()
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.planes[0].height()
    }

    /// Number of color planes.
    #[inline]
    pub fn channels(&self) -> usize {
        self.planes.len()
    }

    /// Whether there is a single plane.
    #[inline]
    pub fn is_gray(&self) -> bool {
        self.planes.len() == 1
    }

    /// Plane `c`.
    #[inline]
    pub fn plane(&self, c: usize) -> &Plane {
        &self.planes[c]
    }

    /// Mutable plane `c`.
    #[inline]
    pub fn plane_mut(&mut self, c: usize) -> &mut Plane {
        &mut self.planes[c]
    }

    /// All planes.
    #[inline]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Consumes the image, returning its planes.
    pub fn into_planes(self) -> Vec<Plane> {
        self.planes
    }
}

/// Largest absolute and relative sample differences between two images.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorStats {
    /// Maximum `|expected - actual|`.
    pub max_abs: f32,
    /// Number of samples beyond both thresholds.
    pub failures: usize,
}

/// Compares planes sample by sample.
///
/// A sample fails only when its absolute error exceeds `max_l1` and its
/// relative error `|e - a| / |e|` exceeds `max_rel`. Expected values
/// smaller than `1e-10` in magnitude are judged by absolute error alone.
pub fn compare_planes(expected: &Plane, actual: &Plane, max_l1: f32, max_rel: f32) -> Result<ErrorStats> {
    if expected.dims() != actual.dims() {
        return Err(Error::dimension_mismatch(expected.dims(), actual.dims()));
    }
    let mut stats = ErrorStats::default();
    for (&e, &a) in expected.data().iter().zip(actual.data()) {
        let l1 = (e - a).abs();
        stats.max_abs = stats.max_abs.max(l1);
        let failed = if e.abs() < 1e-10 {
            l1 > max_l1
        } else {
            l1 > max_l1 && l1 / e.abs() > max_rel
        };
        if failed {
            stats.failures += 1;
        }
    }
    Ok(stats)
}

//! White points and RGB primaries.
//!
//! Each named value maps to CIE 1931 xy chromaticities; `Custom` variants
//! carry their own. Values are the ones ICC profiles and EXR headers are
//! built from.
//!
//! | Name | Red | Green | Blue | White |
//! |------|-----|-------|------|-------|
//! | sRGB / BT.709 | 0.640, 0.330 | 0.300, 0.600 | 0.150, 0.060 | D65 |
//! | BT.2100 / BT.2020 | 0.708, 0.292 | 0.170, 0.797 | 0.131, 0.046 | D65 |
//! | P3 | 0.680, 0.320 | 0.265, 0.690 | 0.150, 0.060 | D65 or DCI |

/// CIE 1931 xy chromaticity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chromaticity {
    /// x coordinate.
    pub x: f64,
    /// y coordinate.
    pub y: f64,
}

impl Chromaticity {
    /// Chromaticity from coordinates.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whether both coordinates are within `tolerance` of `other`.
    #[inline]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.y > 0.0 && self.x >= 0.0
    }
}

/// Chromaticities of the three RGB primaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimariesXy {
    /// Red primary.
    pub red: Chromaticity,
    /// Green primary.
    pub green: Chromaticity,
    /// Blue primary.
    pub blue: Chromaticity,
}

impl PrimariesXy {
    /// Whether every primary is within `tolerance` of `other`'s.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.red.approx_eq(&other.red, tolerance)
            && self.green.approx_eq(&other.green, tolerance)
            && self.blue.approx_eq(&other.blue, tolerance)
    }
}

/// sRGB / BT.709 primaries.
pub const SRGB: PrimariesXy = PrimariesXy {
    red: Chromaticity::new(0.640, 0.330),
    green: Chromaticity::new(0.300, 0.600),
    blue: Chromaticity::new(0.150, 0.060),
};

/// BT.2100 (same as BT.2020) primaries.
pub const BT2100: PrimariesXy = PrimariesXy {
    red: Chromaticity::new(0.708, 0.292),
    green: Chromaticity::new(0.170, 0.797),
    blue: Chromaticity::new(0.131, 0.046),
};

/// P3 primaries.
pub const P3: PrimariesXy = PrimariesXy {
    red: Chromaticity::new(0.680, 0.320),
    green: Chromaticity::new(0.265, 0.690),
    blue: Chromaticity::new(0.150, 0.060),
};

/// CIE standard illuminant D65.
pub const D65: Chromaticity = Chromaticity::new(0.3127, 0.3290);

/// Equal-energy illuminant E.
pub const E: Chromaticity = Chromaticity::new(1.0 / 3.0, 1.0 / 3.0);

/// DCI-P3 theater white.
pub const DCI: Chromaticity = Chromaticity::new(0.314, 0.351);

/// White point of a color encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WhitePoint {
    /// D65.
    D65,
    /// Equal energy.
    E,
    /// DCI theater white.
    Dci,
    /// Any other chromaticity.
    Custom(Chromaticity),
}

impl WhitePoint {
    /// xy chromaticity.
    pub fn xy(&self) -> Chromaticity {
        match self {
            Self::D65 => D65,
            Self::E => E,
            Self::Dci => DCI,
            Self::Custom(c) => *c,
        }
    }

    /// Named white point matching `xy`, else `Custom`.
    pub fn from_xy(xy: Chromaticity, tolerance: f64) -> Self {
        [Self::D65, Self::E, Self::Dci]
            .into_iter()
            .find(|wp| wp.xy().approx_eq(&xy, tolerance))
            .unwrap_or(Self::Custom(xy))
    }

    /// Whether this is a `Custom` white point.
    #[inline]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

/// RGB primaries of a color encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primaries {
    /// sRGB / BT.709.
    Srgb,
    /// BT.2100.
    Bt2100,
    /// P3.
    P3,
    /// Any other set.
    Custom(PrimariesXy),
}

impl Primaries {
    /// xy chromaticities.
    pub fn xy(&self) -> PrimariesXy {
        match self {
            Self::Srgb => SRGB,
            Self::Bt2100 => BT2100,
            Self::P3 => P3,
            Self::Custom(p) => *p,
        }
    }

    /// Named primaries matching `xy`, else `Custom`.
    pub fn from_xy(xy: PrimariesXy, tolerance: f64) -> Self {
        [Self::Srgb, Self::Bt2100, Self::P3]
            .into_iter()
            .find(|p| p.xy().approx_eq(&xy, tolerance))
            .unwrap_or(Self::Custom(xy))
    }

    /// Whether these are `Custom` primaries.
    #[inline]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_lookup() {
        assert_eq!(WhitePoint::from_xy(Chromaticity::new(0.31271, 0.32902), 1e-3), WhitePoint::D65);
        assert_eq!(Primaries::from_xy(P3, 1e-4), Primaries::P3);
        assert_eq!(Primaries::from_xy(BT2100, 1e-4), Primaries::Bt2100);
    }

    #[test]
    fn test_custom_lookup() {
        let odd = Chromaticity::new(0.3, 0.32);
        assert_eq!(WhitePoint::from_xy(odd, 1e-4), WhitePoint::Custom(odd));
        assert!(WhitePoint::from_xy(odd, 1e-4).is_custom());
    }
}

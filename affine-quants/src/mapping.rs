use crate::{QuantError, QuantRange};
use std::{fmt, str::FromStr};

/// How the real range of a block maps onto the integer range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MappingType {
    /// Scale from the max absolute value, zero point fixed at the midpoint.
    Symmetric,
    /// Scale from the full `(min, max)` span, zero point derived from `min`.
    Asymmetric,
}

impl FromStr for MappingType {
    type Err = QuantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "symmetric" | "sym" => Ok(Self::Symmetric),
            "asymmetric" | "asym" => Ok(Self::Asymmetric),
            _ => Err(QuantError::UnsupportedMapping(s.into())),
        }
    }
}

impl fmt::Display for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Symmetric => f.write_str("symmetric"),
            Self::Asymmetric => f.write_str("asymmetric"),
        }
    }
}

/// Turns the `(min, max)` of one block into a raw `(scale, zero_point)`.
///
/// `min <= 0 <= max` always holds on entry. The returned scale has not been
/// floored at eps yet.
pub(crate) trait Rule: Copy + Send + Sync {
    fn scale(self, min: f32, max: f32, range: QuantRange) -> f32;
    fn zero_point(self, min: f32, scale: f32, range: QuantRange) -> i32;
}

#[derive(Clone, Copy)]
pub(crate) struct Symmetric;

#[derive(Clone, Copy)]
pub(crate) struct Asymmetric;

impl Rule for Symmetric {
    #[inline]
    fn scale(self, min: f32, max: f32, range: QuantRange) -> f32 {
        // rounds the same as f32 division, without overflowing on narrow ranges
        ((-min).max(max) as f64 / (range.span() as f64 / 2.)) as f32
    }

    #[inline]
    fn zero_point(self, _: f32, _: f32, range: QuantRange) -> i32 {
        range.midpoint()
    }
}

impl Rule for Asymmetric {
    #[inline]
    fn scale(self, min: f32, max: f32, range: QuantRange) -> f32 {
        let scale = (max - min) / range.span();
        if scale.is_finite() {
            scale
        } else {
            // `max - min` overflowed f32
            ((max as f64 - min as f64) / range.span() as f64) as f32
        }
    }

    #[inline]
    fn zero_point(self, min: f32, scale: f32, range: QuantRange) -> i32 {
        let zp = range.min() as f32 - (min / scale).round_ties_even();
        zp.clamp(range.min() as f32, range.max() as f32) as _
    }
}

#[test]
fn test_parse() {
    assert_eq!("symmetric".parse(), Ok(MappingType::Symmetric));
    assert_eq!(" ASYMMETRIC ".parse(), Ok(MappingType::Asymmetric));
    assert_eq!("asym".parse(), Ok(MappingType::Asymmetric));
    let err = "symmetric_no_clipping".parse::<MappingType>().unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::UnsupportedMapping);
    assert_eq!(MappingType::Symmetric.to_string(), "symmetric");
}

#[test]
fn test_rules() {
    let range = QuantRange::signed(8).unwrap();

    assert_eq!(Symmetric.scale(-2., 1., range), 2. / 127.5);
    assert_eq!(Symmetric.zero_point(-2., 1., range), 0);

    let scale = Asymmetric.scale(-1., 3., range);
    assert_eq!(scale, 4. / 255.);
    // -128 - round(-63.75) = -64
    assert_eq!(Asymmetric.zero_point(-1., scale, range), -64);
    // all positive data maps 0.0 to quant_min
    assert_eq!(Asymmetric.zero_point(0., 1., range), -128);

    let scale = Asymmetric.scale(-f32::MAX, f32::MAX, range);
    assert!(scale.is_finite());
    assert_eq!(scale, (f32::MAX as f64 * 2. / 255.) as f32);
    assert_eq!(Symmetric.scale(-f32::MAX, 0., range), f32::MAX / 127.5);
}

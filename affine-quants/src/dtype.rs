use crate::QuantError;
use half::{bf16, f16};
use std::fmt;

/// Floating point precision of inputs, outputs and scales.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FloatDtype {
    F32,
    F16,
    BF16,
}

impl FloatDtype {
    /// Rounds an f32 value to this precision.
    #[inline]
    pub fn round(self, v: f32) -> f32 {
        match self {
            Self::F32 => v,
            Self::F16 => f16::from_f32(v).to_f32(),
            Self::BF16 => bf16::from_f32(v).to_f32(),
        }
    }
}

/// Named integer dtypes and their representable ranges.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IntDtype {
    Int4,
    UInt4,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
}

impl IntDtype {
    #[rustfmt::skip]
    pub const fn range(self) -> QuantRange {
        let (min, max) = match self {
            Self::Int4   => (         -8,          7),
            Self::UInt4  => (          0,         15),
            Self::Int8   => (i8 ::MIN as _, i8 ::MAX as _),
            Self::UInt8  => (u8 ::MIN as _, u8 ::MAX as _),
            Self::Int16  => (i16::MIN as _, i16::MAX as _),
            Self::UInt16 => (u16::MIN as _, u16::MAX as _),
            Self::Int32  => (i32::MIN     , i32::MAX     ),
        };
        QuantRange { min, max }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Int4 => "int4",
            Self::UInt4 => "uint4",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
        }
    }

    /// The narrowest signed dtype able to hold every value of `range`.
    pub fn signed_for(range: QuantRange) -> Self {
        [Self::Int4, Self::Int8, Self::Int16, Self::Int32]
            .into_iter()
            .find(|ty| ty.range().contains_range(range))
            .unwrap_or(Self::Int32)
    }
}

impl fmt::Display for IntDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive `[quant_min, quant_max]` bounds of the quantized codes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct QuantRange {
    min: i32,
    max: i32,
}

impl QuantRange {
    pub fn new(min: i32, max: i32) -> Result<Self, QuantError> {
        if min >= max {
            return Err(QuantError::InvalidRange {
                min: min as _,
                max: max as _,
            });
        }
        Ok(Self { min, max })
    }

    /// Two's complement range of a `bits`-wide signed integer.
    pub fn signed(bits: u32) -> Result<Self, QuantError> {
        if !(2..=32).contains(&bits) {
            return Err(QuantError::InvalidBits(bits));
        }
        let half = 1i64 << (bits - 1);
        Ok(Self {
            min: (-half) as _,
            max: (half - 1) as _,
        })
    }

    /// Range of a `bits`-wide unsigned integer, capped to what i32 can hold.
    pub fn unsigned(bits: u32) -> Result<Self, QuantError> {
        if !(1..=31).contains(&bits) {
            return Err(QuantError::InvalidBits(bits));
        }
        Ok(Self {
            min: 0,
            max: ((1i64 << bits) - 1) as _,
        })
    }

    #[inline]
    pub const fn min(self) -> i32 {
        self.min
    }

    #[inline]
    pub const fn max(self) -> i32 {
        self.max
    }

    /// `quant_max - quant_min` as a float.
    #[inline]
    pub fn span(self) -> f32 {
        (self.max as i64 - self.min as i64) as f32
    }

    /// The representable midpoint used as the symmetric zero point.
    #[inline]
    pub const fn midpoint(self) -> i32 {
        ((self.min as i64 + self.max as i64 + 1) / 2) as _
    }

    #[inline]
    pub fn contains(self, v: i32) -> bool {
        self.min <= v && v <= self.max
    }

    #[inline]
    pub fn contains_range(self, other: Self) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    pub(crate) fn check_storage<Q: QuantInt>(self) -> Result<(), QuantError> {
        if Q::MIN as i64 <= self.min as i64 && self.max as i64 <= Q::MAX as i64 {
            Ok(())
        } else {
            Err(QuantError::StorageTooNarrow {
                min: self.min,
                max: self.max,
                storage: Q::NAME,
            })
        }
    }
}

impl From<IntDtype> for QuantRange {
    #[inline]
    fn from(ty: IntDtype) -> Self {
        ty.range()
    }
}

/// Integer types quantized codes can be stored in.
pub trait QuantInt: Copy + Send + Sync + 'static {
    const NAME: &'static str;
    const MIN: i64;
    const MAX: i64;

    /// Converts a code already clamped into the storage range.
    fn from_i32(v: i32) -> Self;
    fn to_i32(self) -> i32;
}

macro_rules! quant_int {
    ($($ty:ident)+) => {
        $(
            impl QuantInt for $ty {
                const NAME: &'static str = stringify!($ty);
                const MIN: i64 = $ty::MIN as _;
                const MAX: i64 = $ty::MAX as _;

                #[inline]
                fn from_i32(v: i32) -> Self {
                    v as _
                }
                #[inline]
                fn to_i32(self) -> i32 {
                    self as _
                }
            }
        )+
    };
}

quant_int!(i8 u8 i16 u16 i32);

#[test]
fn test_ranges() {
    assert_eq!(IntDtype::Int4.range(), QuantRange::new(-8, 7).unwrap());
    assert_eq!(IntDtype::Int8.range(), QuantRange::signed(8).unwrap());
    assert_eq!(IntDtype::UInt8.range(), QuantRange::unsigned(8).unwrap());
    assert_eq!(IntDtype::Int32.range(), QuantRange::signed(32).unwrap());

    assert_eq!(IntDtype::Int8.range().midpoint(), 0);
    assert_eq!(IntDtype::Int4.range().midpoint(), 0);
    assert_eq!(IntDtype::UInt8.range().midpoint(), 128);
    assert_eq!(IntDtype::UInt4.range().midpoint(), 8);
    assert_eq!(IntDtype::Int8.range().span(), 255.);

    assert!(QuantRange::new(3, 3).is_err());
    assert!(QuantRange::signed(1).is_err());
    assert!(QuantRange::unsigned(32).is_err());
}

#[test]
fn test_signed_for() {
    assert_eq!(IntDtype::signed_for(IntDtype::Int4.range()), IntDtype::Int4);
    assert_eq!(IntDtype::signed_for(IntDtype::Int8.range()), IntDtype::Int8);
    assert_eq!(IntDtype::signed_for(IntDtype::UInt8.range()), IntDtype::Int16);
    assert_eq!(IntDtype::signed_for(IntDtype::UInt16.range()), IntDtype::Int32);
}

#[test]
fn test_storage() {
    assert!(IntDtype::Int4.range().check_storage::<i8>().is_ok());
    assert!(IntDtype::UInt8.range().check_storage::<u8>().is_ok());
    assert!(IntDtype::UInt8.range().check_storage::<i8>().is_err());
    assert!(IntDtype::Int8.range().check_storage::<u16>().is_err());
}

#[test]
fn test_float_round() {
    let v = 0.1f32;
    assert_eq!(FloatDtype::F32.round(v), v);
    assert_eq!(FloatDtype::F16.round(v), f16::from_f32(v).to_f32());
    assert_ne!(FloatDtype::BF16.round(v), v);
    assert_eq!(FloatDtype::F16.round(f32::EPSILON), f32::EPSILON);
}

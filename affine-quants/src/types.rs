use crate::{FloatDtype, IntDtype};
use digit_layout::{types, DigitLayout};

// two 4-bit codes per byte
digit_layout::layout!(I4; [2] in 1);
digit_layout::layout!(U4; [2] in 1);

impl IntDtype {
    #[rustfmt::skip]
    pub const fn layout(self) -> DigitLayout {
        match self {
            Self::Int4   => I4,
            Self::UInt4  => U4,
            Self::Int8   => types::I8,
            Self::UInt8  => types::U8,
            Self::Int16  => types::I16,
            Self::UInt16 => types::U16,
            Self::Int32  => types::I32,
        }
    }
}

impl FloatDtype {
    pub const fn layout(self) -> DigitLayout {
        match self {
            Self::F32 => types::F32,
            Self::F16 => types::F16,
            Self::BF16 => types::BF16,
        }
    }
}

#[test]
fn test_layout() {
    assert_eq!("i4", IntDtype::Int4.layout().to_string());
    assert_eq!("u4", IntDtype::UInt4.layout().to_string());
    assert_eq!(types::I8.to_string(), IntDtype::Int8.layout().to_string());
    assert_eq!(types::F16.to_string(), FloatDtype::F16.layout().to_string());
}

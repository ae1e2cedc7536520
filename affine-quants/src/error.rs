use thiserror::Error;

/// Coarse classification of [`QuantError`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ErrorKind {
    /// Block size, parameter shape or data length does not fit the tensor.
    ShapeMismatch,
    /// Unknown mapping policy.
    UnsupportedMapping,
    /// Bad integer range, eps, scale or zero-point.
    Range,
}

#[derive(Error, Clone, PartialEq, Debug)]
pub enum QuantError {
    #[error("data length {len} does not match shape {shape:?}")]
    DataLength { shape: Vec<usize>, len: usize },

    #[error("block size {block:?} has a different rank than shape {shape:?}")]
    RankMismatch {
        shape: Vec<usize>,
        block: Vec<usize>,
    },

    #[error("block size {block} does not divide dimension {dim} on axis {axis}")]
    Indivisible {
        axis: usize,
        dim: usize,
        block: usize,
    },

    #[error("block size on axis {0} is zero")]
    ZeroBlock(usize),

    #[error("axis {axis} is out of range for rank {rank}")]
    AxisOutOfRange { axis: usize, rank: usize },

    #[error("parameter shape {actual:?} does not match block grid {expected:?}")]
    ParamShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("tensor shape {actual:?} does not match {expected:?}")]
    TensorShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("unsupported mapping type: {0}")]
    UnsupportedMapping(String),

    #[error("invalid quant range [{min}, {max}]")]
    InvalidRange { min: i64, max: i64 },

    #[error("unsupported bit width: {0}")]
    InvalidBits(u32),

    #[error("quant range [{min}, {max}] does not fit storage type {storage}")]
    StorageTooNarrow {
        min: i32,
        max: i32,
        storage: &'static str,
    },

    #[error("eps must be finite and positive, got {0}")]
    InvalidEps(f32),

    #[error("scale at block {index} must be finite and positive, got {value}")]
    InvalidScale { index: usize, value: f32 },

    #[error("zero point {value} at block {index} is outside [{min}, {max}]")]
    ZeroPointOutOfRange {
        index: usize,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("non-finite value {value} at index {index}")]
    NonFinite { index: usize, value: f32 },
}

impl QuantError {
    pub fn kind(&self) -> ErrorKind {
        use QuantError::*;
        match self {
            DataLength { .. }
            | RankMismatch { .. }
            | Indivisible { .. }
            | ZeroBlock(_)
            | AxisOutOfRange { .. }
            | ParamShape { .. }
            | TensorShape { .. } => ErrorKind::ShapeMismatch,
            UnsupportedMapping(_) => ErrorKind::UnsupportedMapping,
            InvalidRange { .. }
            | InvalidBits(_)
            | StorageTooNarrow { .. }
            | InvalidEps(_)
            | InvalidScale { .. }
            | ZeroPointOutOfRange { .. }
            | NonFinite { .. } => ErrorKind::Range,
        }
    }
}

#[test]
fn test_error_kind() {
    let e = QuantError::Indivisible {
        axis: 1,
        dim: 10,
        block: 3,
    };
    assert_eq!(e.kind(), ErrorKind::ShapeMismatch);
    assert_eq!(
        e.to_string(),
        "block size 3 does not divide dimension 10 on axis 1"
    );
    assert_eq!(
        QuantError::UnsupportedMapping("foo".into()).kind(),
        ErrorKind::UnsupportedMapping
    );
    assert_eq!(QuantError::InvalidEps(0.).kind(), ErrorKind::Range);
}

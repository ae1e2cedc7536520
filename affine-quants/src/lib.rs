#![doc = include_str!("../README.md")]

mod affine;
mod block;
mod dtype;
mod error;
mod mapping;
mod qparams;
mod stats;
mod tensor;
#[cfg(feature = "types")]
mod types;

#[cfg(test)]
mod parity;

pub use affine::{dequantize, fake_quantize, quantize};
pub use block::{BlockGrid, BlockSize, Runs};
pub use dtype::{FloatDtype, IntDtype, QuantInt, QuantRange};
pub use error::{ErrorKind, QuantError};
pub use mapping::MappingType;
pub use qparams::{choose_qparams, ChooseConfig, QParams};
pub use stats::QuantStats;
pub use tensor::{Element, Tensor};

pub use ::half::{bf16, f16};
#[cfg(feature = "types")]
pub use digit_layout::DigitLayout;

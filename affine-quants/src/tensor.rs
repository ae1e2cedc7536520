use crate::{FloatDtype, QuantError};
use half::{bf16, f16};

/// Floating point element of an input or reconstructed tensor.
///
/// Arithmetic is carried out in f32; narrower types round on the way back.
pub trait Element: Copy + Send + Sync + 'static {
    const DTYPE: FloatDtype;

    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
}

impl Element for f32 {
    const DTYPE: FloatDtype = FloatDtype::F32;

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
    #[inline]
    fn from_f32(v: f32) -> Self {
        v
    }
}

impl Element for f16 {
    const DTYPE: FloatDtype = FloatDtype::F16;

    #[inline]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }
    #[inline]
    fn from_f32(v: f32) -> Self {
        f16::from_f32(v)
    }
}

impl Element for bf16 {
    const DTYPE: FloatDtype = FloatDtype::BF16;

    #[inline]
    fn to_f32(self) -> f32 {
        bf16::to_f32(self)
    }
    #[inline]
    fn from_f32(v: f32) -> Self {
        bf16::from_f32(v)
    }
}

/// Dense row-major N-dimensional array.
#[derive(Clone, PartialEq, Debug)]
pub struct Tensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Tensor<T> {
    pub fn new(data: Vec<T>, shape: &[usize]) -> Result<Self, QuantError> {
        if data.len() != shape.iter().product::<usize>() {
            return Err(QuantError::DataLength {
                shape: shape.to_vec(),
                len: data.len(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn from_fn(shape: &[usize], f: impl FnMut(usize) -> T) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: (0..len).map(f).collect(),
        }
    }

    /// Builds a tensor whose length is known to match `shape`.
    pub(crate) fn from_parts(data: Vec<T>, shape: Vec<usize>) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        Self { shape, data }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Reinterprets the data under another shape with the same element count.
    pub fn reshape(self, shape: &[usize]) -> Result<Self, QuantError> {
        Self::new(self.data, shape)
    }
}

impl<T: Element> Tensor<T> {
    pub fn to_f32(&self) -> Tensor<f32> {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|x| x.to_f32()).collect(),
        }
    }

    /// Fails on the first NaN or infinite element.
    pub(crate) fn check_finite(&self) -> Result<(), QuantError> {
        match self
            .data
            .iter()
            .map(|x| x.to_f32())
            .enumerate()
            .find(|(_, x)| !x.is_finite())
        {
            Some((index, value)) => Err(QuantError::NonFinite { index, value }),
            None => Ok(()),
        }
    }
}

#[test]
fn test_tensor() {
    let t = Tensor::new(vec![1.0f32, 2., 3., 4., 5., 6.], &[2, 3]).unwrap();
    assert_eq!(t.shape(), &[2, 3]);
    assert_eq!(t.rank(), 2);
    assert_eq!(t.len(), 6);

    let t = t.reshape(&[3, 2]).unwrap();
    assert_eq!(t.shape(), &[3, 2]);
    assert!(t.clone().reshape(&[4]).is_err());

    let err = Tensor::new(vec![0i8; 5], &[2, 3]).unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::ShapeMismatch);

    let scalar = Tensor::new(vec![1.5f32], &[]).unwrap();
    assert_eq!(scalar.rank(), 0);
    assert_eq!(scalar.len(), 1);
}

#[test]
fn test_half_elements() {
    let t = Tensor::from_fn(&[4], |i| f16::from_f32(i as f32 * 0.5));
    assert_eq!(t.to_f32().into_vec(), [0., 0.5, 1., 1.5]);
    assert_eq!(<bf16 as Element>::DTYPE, FloatDtype::BF16);

    assert!(t.check_finite().is_ok());
    let t = Tensor::new(vec![bf16::ONE, bf16::NEG_INFINITY], &[2]).unwrap();
    assert!(matches!(
        t.check_finite(),
        Err(QuantError::NonFinite { index: 1, .. })
    ));
}

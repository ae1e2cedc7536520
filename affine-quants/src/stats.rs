use crate::{Element, QuantError, Tensor};

/// Reconstruction error of a quantize/dequantize round trip.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct QuantStats {
    pub max_abs: f32,
    pub mean_abs: f32,
    pub rmse: f32,
}

impl QuantStats {
    pub fn compute<T: Element, U: Element>(
        original: &Tensor<T>,
        reconstructed: &Tensor<U>,
    ) -> Result<Self, QuantError> {
        if original.shape() != reconstructed.shape() {
            return Err(QuantError::TensorShape {
                expected: original.shape().to_vec(),
                actual: reconstructed.shape().to_vec(),
            });
        }
        if original.is_empty() {
            return Ok(Self {
                max_abs: 0.,
                mean_abs: 0.,
                rmse: 0.,
            });
        }

        let (max, sum, sum_sq) = original
            .data()
            .iter()
            .zip(reconstructed.data())
            .map(|(a, b)| (a.to_f32() - b.to_f32()).abs() as f64)
            .fold((0f64, 0f64, 0f64), |(max, sum, sum_sq), e| {
                (max.max(e), sum + e, sum_sq + e * e)
            });
        let n = original.len() as f64;
        Ok(Self {
            max_abs: max as _,
            mean_abs: (sum / n) as _,
            rmse: (sum_sq / n).sqrt() as _,
        })
    }
}

#[test]
fn test_stats() {
    let a = Tensor::new(vec![1.0f32, 2., 3., 4.], &[2, 2]).unwrap();
    let b = Tensor::new(vec![1.0f32, 2.5, 3., 3.5], &[2, 2]).unwrap();
    let stats = QuantStats::compute(&a, &b).unwrap();
    assert_eq!(stats.max_abs, 0.5);
    assert_eq!(stats.mean_abs, 0.25);
    assert!((stats.rmse - 0.125f32.sqrt()).abs() < 1e-6);

    let c = Tensor::new(vec![0f32; 4], &[4]).unwrap();
    let err = QuantStats::compute(&a, &c).unwrap_err();
    assert_eq!(
        err,
        QuantError::TensorShape {
            expected: vec![2, 2],
            actual: vec![4],
        }
    );
    assert_eq!(err.kind(), crate::ErrorKind::ShapeMismatch);
}

use crate::{
    mapping::{Asymmetric, Rule, Symmetric},
    BlockGrid, BlockSize, Element, FloatDtype, IntDtype, MappingType, QuantError, QuantRange,
    Tensor,
};
use log::debug;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// Options of [`choose_qparams`].
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ChooseConfig {
    /// Lower bound of every scale.
    pub eps: f32,
    /// Precision of the scales, defaults to the input element type.
    pub scale_dtype: Option<FloatDtype>,
    /// Dtype of the zero points, defaults to the narrowest signed type
    /// holding the quant range.
    pub zero_point_dtype: Option<IntDtype>,
}

impl Default for ChooseConfig {
    fn default() -> Self {
        Self {
            eps: f32::EPSILON,
            scale_dtype: None,
            zero_point_dtype: None,
        }
    }
}

impl ChooseConfig {
    pub fn with_eps(self, eps: f32) -> Self {
        Self { eps, ..self }
    }

    pub fn with_scale_dtype(self, ty: FloatDtype) -> Self {
        Self {
            scale_dtype: Some(ty),
            ..self
        }
    }

    pub fn with_zero_point_dtype(self, ty: IntDtype) -> Self {
        Self {
            zero_point_dtype: Some(ty),
            ..self
        }
    }
}

/// Per-block scales and zero points, both shaped as `shape / block_size`.
#[derive(Clone, PartialEq, Debug)]
pub struct QParams {
    pub scale: Tensor<f32>,
    pub zero_point: Tensor<i32>,
    pub scale_dtype: FloatDtype,
    pub zero_point_dtype: IntDtype,
}

impl QParams {
    /// Wraps externally computed parameters.
    pub fn new(scale: Tensor<f32>, zero_point: Tensor<i32>) -> Result<Self, QuantError> {
        if scale.shape() != zero_point.shape() {
            return Err(QuantError::ParamShape {
                expected: scale.shape().to_vec(),
                actual: zero_point.shape().to_vec(),
            });
        }
        Ok(Self {
            scale,
            zero_point,
            scale_dtype: FloatDtype::F32,
            zero_point_dtype: IntDtype::Int32,
        })
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.scale.shape()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.scale.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scale.is_empty()
    }

    /// Checks the parameters against a block grid and a quant range.
    pub(crate) fn check(&self, grid: &BlockGrid, range: QuantRange) -> Result<(), QuantError> {
        for shape in [self.scale.shape(), self.zero_point.shape()] {
            if shape != grid.param_shape() {
                return Err(QuantError::ParamShape {
                    expected: grid.param_shape().to_vec(),
                    actual: shape.to_vec(),
                });
            }
        }
        if let Some((index, &value)) = self
            .scale
            .data()
            .iter()
            .enumerate()
            .find(|(_, s)| !(s.is_finite() && **s > 0.))
        {
            return Err(QuantError::InvalidScale { index, value });
        }
        if let Some((index, &value)) = self
            .zero_point
            .data()
            .iter()
            .enumerate()
            .find(|(_, zp)| !range.contains(**zp))
        {
            return Err(QuantError::ZeroPointOutOfRange {
                index,
                value,
                min: range.min(),
                max: range.max(),
            });
        }
        Ok(())
    }
}

/// Computes one scale and zero point per block of `tensor`.
///
/// Every block range is widened to include zero before the mapping rule
/// applies, and every scale is floored at `config.eps`, so constant and
/// all-zero blocks never produce a zero or non-finite scale.
pub fn choose_qparams<T: Element>(
    tensor: &Tensor<T>,
    mapping: MappingType,
    block_size: &BlockSize,
    range: QuantRange,
    config: &ChooseConfig,
) -> Result<QParams, QuantError> {
    let grid = BlockGrid::new(tensor.shape(), block_size)?;
    if !(config.eps.is_finite() && config.eps > 0.) {
        return Err(QuantError::InvalidEps(config.eps));
    }
    tensor.check_finite()?;

    let scale_dtype = config.scale_dtype.unwrap_or(T::DTYPE);
    let zero_point_dtype = match config.zero_point_dtype {
        Some(ty) if ty.range().contains_range(range) => ty,
        Some(ty) => {
            return Err(QuantError::StorageTooNarrow {
                min: range.min(),
                max: range.max(),
                storage: ty.name(),
            })
        }
        None => IntDtype::signed_for(range),
    };

    debug!(
        "choose {mapping} qparams: shape {:?} block {:?} -> {:?}, range [{}, {}]",
        tensor.shape(),
        grid.block(),
        grid.param_shape(),
        range.min(),
        range.max(),
    );

    let eps = config.eps;
    let params = match mapping {
        MappingType::Symmetric => choose_with(Symmetric, tensor, &grid, range, eps, scale_dtype),
        MappingType::Asymmetric => choose_with(Asymmetric, tensor, &grid, range, eps, scale_dtype),
    }?;

    let floored = params.iter().filter(|(_, _, floored)| *floored).count();
    if floored > 0 {
        debug!("{floored} of {} blocks hit the eps floor", params.len());
    }

    let (scale, zero_point) = params.into_iter().map(|(s, zp, _)| (s, zp)).unzip();
    let shape = grid.param_shape().to_vec();
    Ok(QParams {
        scale: Tensor::from_parts(scale, shape.clone()),
        zero_point: Tensor::from_parts(zero_point, shape),
        scale_dtype,
        zero_point_dtype,
    })
}

/// Runs one mapping rule over every block, yielding `(scale, zero_point, floored)`.
///
/// Fails if a block's scale is not representable in `scale_dtype`.
fn choose_with<R: Rule, T: Element>(
    rule: R,
    tensor: &Tensor<T>,
    grid: &BlockGrid,
    range: QuantRange,
    eps: f32,
    scale_dtype: FloatDtype,
) -> Result<Vec<(f32, i32, bool)>, QuantError> {
    let data = tensor.data();
    (0..grid.num_params())
        .into_par_iter()
        .map(|p| {
            let (min, max) = grid
                .runs_of(p)
                .map(|run| min_max(&data[run]))
                .fold((0f32, 0f32), |(min, max), (a, b)| (min.min(a), max.max(b)));

            let raw = rule.scale(min, max, range);
            let floored = !(raw > eps);
            let scale = scale_dtype.round(raw.max(eps));
            if !scale.is_finite() {
                return Err(QuantError::InvalidScale {
                    index: p,
                    value: scale,
                });
            }
            Ok((scale, rule.zero_point(min, scale, range), floored))
        })
        .collect()
}

/// Starting the fold from zero clamps `min <= 0 <= max`.
#[inline]
fn min_max<T: Element>(data: &[T]) -> (f32, f32) {
    data.iter().fold((0f32, 0f32), |(min, max), x| {
        let x = x.to_f32();
        (min.min(x), max.max(x))
    })
}

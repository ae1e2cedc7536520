use crate::{BlockGrid, BlockSize, Element, QParams, QuantError, QuantInt, QuantRange, Tensor};
use log::debug;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};

/// Maps every element to `clamp(round(x / scale) + zero_point)` of its block.
///
/// The division is carried out as a multiplication by the reciprocal of the
/// scale, and rounding is half-to-even. NaN and infinite inputs are rejected.
pub fn quantize<T: Element, Q: QuantInt>(
    tensor: &Tensor<T>,
    block_size: &BlockSize,
    qparams: &QParams,
    range: QuantRange,
) -> Result<Tensor<Q>, QuantError> {
    let grid = BlockGrid::new(tensor.shape(), block_size)?;
    qparams.check(&grid, range)?;
    range.check_storage::<Q>()?;
    tensor.check_finite()?;

    debug!(
        "quantize {:?} with {} blocks into {} [{}, {}]",
        tensor.shape(),
        grid.num_params(),
        Q::NAME,
        range.min(),
        range.max(),
    );

    let recip = qparams
        .scale
        .data()
        .iter()
        .map(|s| s.recip())
        .collect::<Vec<_>>();
    let zero_point = qparams.zero_point.data();
    let (min, max) = (range.min() as f32, range.max() as f32);

    let data = tensor
        .data()
        .par_iter()
        .enumerate()
        .map(|(i, x)| {
            let p = grid.param_of(i);
            let q = (x.to_f32() * recip[p]).round_ties_even() + zero_point[p] as f32;
            Q::from_i32(q.clamp(min, max) as _)
        })
        .collect();
    Ok(Tensor::from_parts(data, tensor.shape().to_vec()))
}

/// Maps every code back to `(q - zero_point) * scale` of its block.
///
/// Codes outside `range` are clamped into it before the zero point is
/// subtracted.
pub fn dequantize<Q: QuantInt, T: Element>(
    tensor: &Tensor<Q>,
    block_size: &BlockSize,
    qparams: &QParams,
    range: QuantRange,
) -> Result<Tensor<T>, QuantError> {
    let grid = BlockGrid::new(tensor.shape(), block_size)?;
    qparams.check(&grid, range)?;

    debug!(
        "dequantize {:?} with {} blocks from {} [{}, {}]",
        tensor.shape(),
        grid.num_params(),
        Q::NAME,
        range.min(),
        range.max(),
    );

    let scale = qparams.scale.data();
    let zero_point = qparams.zero_point.data();

    let data = tensor
        .data()
        .par_iter()
        .enumerate()
        .map(|(i, q)| {
            let p = grid.param_of(i);
            let q = q.to_i32().clamp(range.min(), range.max());
            let x = (q as i64 - zero_point[p] as i64) as f32 * scale[p];
            T::from_f32(x)
        })
        .collect();
    Ok(Tensor::from_parts(data, tensor.shape().to_vec()))
}

/// Quantizes and immediately reconstructs `tensor`, keeping its element type.
///
/// The result equals `dequantize(quantize(tensor))` without materializing the
/// integer tensor.
pub fn fake_quantize<T: Element>(
    tensor: &Tensor<T>,
    block_size: &BlockSize,
    qparams: &QParams,
    range: QuantRange,
) -> Result<Tensor<T>, QuantError> {
    let grid = BlockGrid::new(tensor.shape(), block_size)?;
    qparams.check(&grid, range)?;
    tensor.check_finite()?;

    let scale = qparams.scale.data();
    let zero_point = qparams.zero_point.data();
    let (min, max) = (range.min() as f32, range.max() as f32);

    let data = tensor
        .data()
        .par_iter()
        .enumerate()
        .map(|(i, x)| {
            let p = grid.param_of(i);
            let q = (x.to_f32() * scale[p].recip()).round_ties_even() + zero_point[p] as f32;
            let q = q.clamp(min, max) as i32;
            T::from_f32((q as i64 - zero_point[p] as i64) as f32 * scale[p])
        })
        .collect();
    Ok(Tensor::from_parts(data, tensor.shape().to_vec()))
}

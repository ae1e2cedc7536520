//! Bit-exact comparisons against the fixed-layout legacy routines.
//!
//! Each reference below works on a flat row-major buffer with its own layout
//! arithmetic, the way the per-tensor, per-channel and per-group kernels
//! compute their parameters and codes.

use crate::{
    choose_qparams, dequantize, f16, quantize, test_utils::random_tensor, BlockSize,
    ChooseConfig, IntDtype, MappingType, QParams, QuantRange, Tensor,
};

const EPS: f32 = f32::EPSILON;

fn aminmax(data: &[f32]) -> (f32, f32) {
    data.iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &x| {
            (min.min(x), max.max(x))
        })
}

/// Per-group symmetric scales over `(-1, group_size)` rows, zero points all 0.
fn group_qparams_symmetric(w: &[f32], n_bit: u32, group_size: usize) -> (Vec<f32>, Vec<i32>) {
    let max_int = (1i32 << (n_bit - 1)) - 1;
    let min_int = -(1i32 << (n_bit - 1));
    let scales = w
        .chunks_exact(group_size)
        .map(|group| {
            let (min_val, max_val) = aminmax(group);
            let min_val_neg = min_val.min(0.);
            let max_val_pos = max_val.max(0.);
            let max_val_abs = (-min_val_neg).max(max_val_pos);
            let scale = max_val_abs / ((max_int - min_int) as f32 / 2.);
            scale.max(EPS)
        })
        .collect::<Vec<_>>();
    let zeros = vec![0; scales.len()];
    (scales, zeros)
}

/// Per-tensor affine parameters.
fn choose_qparams_tensor(x: &[f32], quant_min: i32, quant_max: i32) -> (f32, i32) {
    let (min_val, max_val) = aminmax(x);
    let min_val_neg = min_val.min(0.);
    let max_val_pos = max_val.max(0.);
    let scale = ((max_val_pos - min_val_neg) / (quant_max - quant_min) as f32).max(EPS);
    let zero_point = quant_min as f32 - (min_val_neg / scale).round_ties_even();
    (scale, (zero_point as i32).clamp(quant_min, quant_max))
}

/// Per-tensor symmetric parameters.
fn choose_qparams_tensor_symmetric(x: &[f32], quant_min: i32, quant_max: i32) -> (f32, i32) {
    let (min_val, max_val) = aminmax(x);
    let max_val_pos = (-min_val.min(0.)).max(max_val.max(0.));
    let scale = (max_val_pos / ((quant_max - quant_min) as f32 / 2.)).max(EPS);
    (scale, 0)
}

/// Per-channel affine parameters of a 2-D `rows x cols` tensor along `axis`.
fn choose_qparams_channel(
    x: &[f32],
    rows: usize,
    cols: usize,
    axis: usize,
    quant_min: i32,
    quant_max: i32,
) -> (Vec<f32>, Vec<i32>) {
    let channels = if axis == 0 { rows } else { cols };
    (0..channels)
        .map(|c| {
            let values = if axis == 0 {
                x[c * cols..][..cols].to_vec()
            } else {
                (0..rows).map(|r| x[r * cols + c]).collect()
            };
            choose_qparams_tensor(&values, quant_min, quant_max)
        })
        .unzip()
}

fn quantize_per_tensor(x: &[f32], scale: f32, zp: i32, quant_min: i32, quant_max: i32) -> Vec<i8> {
    let inv_scale = 1. / scale;
    x.iter()
        .map(|&v| {
            let q = (v * inv_scale).round_ties_even() + zp as f32;
            q.clamp(quant_min as f32, quant_max as f32) as i8
        })
        .collect()
}

fn dequantize_per_tensor(q: &[i8], scale: f32, zp: i32) -> Vec<f32> {
    q.iter().map(|&v| (v as f32 - zp as f32) * scale).collect()
}

/// Channel index of element `i` for a `dims`-shaped tensor quantized along `axis`.
fn channel_of(i: usize, dims: &[usize], axis: usize) -> usize {
    let inner = dims[axis + 1..].iter().product::<usize>();
    (i / inner) % dims[axis]
}

fn quantize_per_channel(
    x: &[f32],
    dims: &[usize],
    scales: &[f32],
    zps: &[i32],
    axis: usize,
    quant_min: i32,
    quant_max: i32,
) -> Vec<i8> {
    let inv_scales = scales.iter().map(|s| 1. / s).collect::<Vec<_>>();
    x.iter()
        .enumerate()
        .map(|(i, &v)| {
            let c = channel_of(i, dims, axis);
            let q = (v * inv_scales[c]).round_ties_even() + zps[c] as f32;
            q.clamp(quant_min as f32, quant_max as f32) as i8
        })
        .collect()
}

fn dequantize_per_channel(
    q: &[i8],
    dims: &[usize],
    scales: &[f32],
    zps: &[i32],
    axis: usize,
) -> Vec<f32> {
    q.iter()
        .enumerate()
        .map(|(i, &v)| {
            let c = channel_of(i, dims, axis);
            (v as i32 - zps[c]) as f32 * scales[c]
        })
        .collect()
}

fn quantize_per_channel_group(
    x: &[f32],
    scales: &[f32],
    zps: &[i32],
    quant_min: i32,
    quant_max: i32,
    group_size: usize,
) -> Vec<i8> {
    x.chunks_exact(group_size)
        .zip(scales.iter().zip(zps))
        .flat_map(|(group, (&s, &zp))| {
            let inv = 1. / s;
            group.iter().map(move |&v| {
                let q = (v * inv + zp as f32).round_ties_even();
                q.clamp(quant_min as f32, quant_max as f32) as i8
            })
        })
        .collect()
}

fn dequantize_per_channel_group(
    q: &[i8],
    scales: &[f32],
    zps: &[i32],
    group_size: usize,
) -> Vec<f32> {
    q.chunks_exact(group_size)
        .zip(scales.iter().zip(zps))
        .flat_map(|(group, (&s, &zp))| group.iter().map(move |&v| (v as f32 - zp as f32) * s))
        .collect()
}

fn int8() -> QuantRange {
    IntDtype::Int8.range()
}

fn choose(input: &Tensor<f32>, mapping: MappingType, block: &BlockSize) -> QParams {
    choose_qparams(input, mapping, block, int8(), &ChooseConfig::default()).unwrap()
}

fn quantize_dequantize(
    input: &Tensor<f32>,
    block: &BlockSize,
    qparams: &QParams,
) -> (Vec<i8>, Vec<f32>) {
    let q = quantize::<_, i8>(input, block, qparams, int8()).unwrap();
    let deq = dequantize::<_, f32>(&q, block, qparams, int8()).unwrap();
    (q.into_vec(), deq.into_vec())
}

#[test]
fn test_group_qparams_symmetric_f16_rows() {
    // per-row symmetric int4 over f16 data, scales kept in f16
    let n_bit = 4;
    let (rows, cols) = (100, 256);
    let weight = random_tensor(&[rows, cols], 123);
    let weight = Tensor::from_fn(&[rows, cols], |i| f16::from_f32(weight.data()[i]));

    let range = QuantRange::signed(n_bit).unwrap();
    let block = BlockSize::per_group(weight.shape(), cols).unwrap();
    let qparams = choose_qparams(
        &weight,
        MappingType::Symmetric,
        &block,
        range,
        &ChooseConfig::default(),
    )
    .unwrap();
    assert_eq!(qparams.scale_dtype, crate::FloatDtype::F16);

    let half_span = (range.max() - range.min()) as f32 / 2.;
    for (r, &scale) in qparams.scale.data().iter().enumerate() {
        let row = &weight.data()[r * cols..][..cols];
        let (min, max) = aminmax(&row.iter().map(|x| x.to_f32()).collect::<Vec<_>>());
        let max_val_pos = (-min.min(0.)).max(max.max(0.));
        let expected = f16::from_f32(max_val_pos / half_span).to_f32().max(EPS);
        assert_eq!(scale.to_bits(), expected.to_bits());
    }
}

#[test]
fn test_choose_qparams_group_sym() {
    let input = random_tensor(&[10, 10], 1);
    let block = BlockSize::from([1, 2]);
    let qparams = choose(&input, MappingType::Symmetric, &block);

    let (scale_ref, zp_ref) = group_qparams_symmetric(input.data(), 8, 2);
    assert_eq!(qparams.shape(), &[10, 5]);
    assert_eq!(qparams.scale.data(), scale_ref);
    assert_eq!(qparams.zero_point.data(), zp_ref);
}

#[test]
fn test_choose_qparams_tensor_asym() {
    let input = random_tensor(&[10, 10], 2);
    let block = BlockSize::per_tensor(input.shape());
    let qparams = choose(&input, MappingType::Asymmetric, &block);

    let (scale_ref, zp_ref) = choose_qparams_tensor(input.data(), -128, 127);
    assert_eq!(qparams.shape(), &[1, 1]);
    assert_eq!(qparams.scale.data(), [scale_ref]);
    assert_eq!(qparams.zero_point.data(), [zp_ref]);
}

#[test]
fn test_choose_qparams_tensor_sym() {
    let input = random_tensor(&[10, 10], 3);
    let block = BlockSize::from([10, 10]);
    let qparams = choose(&input, MappingType::Symmetric, &block);

    let (scale_ref, zp_ref) = choose_qparams_tensor_symmetric(input.data(), -128, 127);
    assert_eq!(qparams.scale.data(), [scale_ref]);
    assert_eq!(qparams.zero_point.data(), [zp_ref]);
}

#[test]
fn test_choose_qparams_channel_asym() {
    let input = random_tensor(&[10, 10], 4);
    for axis in [0, 1] {
        let block = BlockSize::per_channel(input.shape(), axis).unwrap();
        let qparams = choose(&input, MappingType::Asymmetric, &block);

        let (scale_ref, zp_ref) = choose_qparams_channel(input.data(), 10, 10, axis, -128, 127);
        assert_eq!(qparams.scale.data(), scale_ref);
        assert_eq!(qparams.zero_point.data(), zp_ref);
    }
}

#[test]
fn test_quantize_dequantize_group_sym() {
    let input = random_tensor(&[10, 10], 5);
    let block = BlockSize::from([1, 2]);
    let qparams = choose(&input, MappingType::Symmetric, &block);
    let (quantized, dequantized) = quantize_dequantize(&input, &block, &qparams);

    let scale = qparams.scale.data();
    let zp = qparams.zero_point.data();
    let quantized_ref = quantize_per_channel_group(input.data(), scale, zp, -128, 127, 2);
    let dequantized_ref = dequantize_per_channel_group(&quantized_ref, scale, zp, 2);
    assert_eq!(quantized, quantized_ref);
    assert_eq!(dequantized, dequantized_ref);
}

#[test]
fn test_quantize_dequantize_channel_asym() {
    let input = random_tensor(&[10, 10], 6);
    let block = BlockSize::from([10, 1]);
    let qparams = choose(&input, MappingType::Asymmetric, &block);
    let (quantized, dequantized) = quantize_dequantize(&input, &block, &qparams);

    let dims = [10, 10];
    let scale = qparams.scale.data();
    let zp = qparams.zero_point.data();
    let quantized_ref = quantize_per_channel(input.data(), &dims, scale, zp, 1, -128, 127);
    let dequantized_ref = dequantize_per_channel(&quantized_ref, &dims, scale, zp, 1);
    assert_eq!(quantized, quantized_ref);
    assert_eq!(dequantized, dequantized_ref);
}

#[test]
fn test_quantize_dequantize_tensor_asym() {
    let input = random_tensor(&[10, 10], 7);
    let block = BlockSize::from([10, 10]);
    let qparams = choose(&input, MappingType::Asymmetric, &block);
    let (quantized, dequantized) = quantize_dequantize(&input, &block, &qparams);

    let scale = qparams.scale.data()[0];
    let zp = qparams.zero_point.data()[0];
    let quantized_ref = quantize_per_tensor(input.data(), scale, zp, -128, 127);
    let dequantized_ref = dequantize_per_tensor(&quantized_ref, scale, zp);
    assert_eq!(quantized, quantized_ref);
    assert_eq!(dequantized, dequantized_ref);
}

#[test]
fn test_quantize_dequantize_channel_asym_4d() {
    let input = random_tensor(&[3, 3, 10, 10], 8);
    let block = BlockSize::from([3, 3, 1, 10]);
    let qparams = choose(&input, MappingType::Asymmetric, &block);
    assert_eq!(qparams.shape(), &[1, 1, 10, 1]);
    let (quantized, dequantized) = quantize_dequantize(&input, &block, &qparams);

    let dims = [3, 3, 10, 10];
    let scale = qparams.scale.data();
    let zp = qparams.zero_point.data();
    let quantized_ref = quantize_per_channel(input.data(), &dims, scale, zp, 2, -128, 127);
    let dequantized_ref = dequantize_per_channel(&quantized_ref, &dims, scale, zp, 2);
    assert_eq!(quantized, quantized_ref);
    assert_eq!(dequantized, dequantized_ref);
}

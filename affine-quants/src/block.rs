//! Partitioning of a tensor into equally sized blocks.
//!
//! A block size has the same rank as the tensor shape, and every entry divides
//! the matching dimension. Each block shares one scale and zero point. Blocks
//! are enumerated in row-major order over the block grid, so the parameter
//! tensors are laid out exactly like a tensor of shape `shape / block`.

use crate::QuantError;
use std::ops::Range;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct BlockSize(Vec<usize>);

impl BlockSize {
    #[inline]
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    /// One block spanning the whole tensor.
    pub fn per_tensor(shape: &[usize]) -> Self {
        Self(shape.to_vec())
    }

    /// One block per index of `axis`.
    pub fn per_channel(shape: &[usize], axis: usize) -> Result<Self, QuantError> {
        if axis >= shape.len() {
            return Err(QuantError::AxisOutOfRange {
                axis,
                rank: shape.len(),
            });
        }
        let mut dims = shape.to_vec();
        dims[axis] = 1;
        Ok(Self(dims))
    }

    /// Groups of `group_len` consecutive elements along the last axis.
    pub fn per_group(shape: &[usize], group_len: usize) -> Result<Self, QuantError> {
        let Some((_, leading)) = shape.split_last() else {
            return Err(QuantError::AxisOutOfRange { axis: 0, rank: 0 });
        };
        if group_len == 0 {
            return Err(QuantError::ZeroBlock(leading.len()));
        }
        let mut dims = vec![1; leading.len()];
        dims.push(group_len);
        Ok(Self(dims))
    }

    /// One block per row of the last axis.
    pub fn per_token(shape: &[usize]) -> Result<Self, QuantError> {
        let &last = shape
            .last()
            .ok_or(QuantError::AxisOutOfRange { axis: 0, rank: 0 })?;
        Self::per_group(shape, last)
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<usize>> for BlockSize {
    #[inline]
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl<const N: usize> From<[usize; N]> for BlockSize {
    #[inline]
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

/// A validated partition of `shape` into blocks of `block`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BlockGrid {
    shape: Vec<usize>,
    block: Vec<usize>,
    grid: Vec<usize>,
    strides: Vec<usize>,
}

impl BlockGrid {
    pub fn new(shape: &[usize], block: &BlockSize) -> Result<Self, QuantError> {
        let block = block.dims();
        if block.len() != shape.len() {
            return Err(QuantError::RankMismatch {
                shape: shape.to_vec(),
                block: block.to_vec(),
            });
        }

        let mut grid = Vec::with_capacity(shape.len());
        for (axis, (&dim, &b)) in shape.iter().zip(block).enumerate() {
            if b == 0 {
                return Err(QuantError::ZeroBlock(axis));
            }
            if dim % b != 0 {
                return Err(QuantError::Indivisible {
                    axis,
                    dim,
                    block: b,
                });
            }
            grid.push(dim / b);
        }

        let mut strides = vec![1; shape.len()];
        for axis in (1..shape.len()).rev() {
            strides[axis - 1] = strides[axis] * shape[axis];
        }

        Ok(Self {
            shape: shape.to_vec(),
            block: block.to_vec(),
            grid,
            strides,
        })
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn block(&self) -> &[usize] {
        &self.block
    }

    /// Shape of the scale and zero-point tensors.
    #[inline]
    pub fn param_shape(&self) -> &[usize] {
        &self.grid
    }

    /// `(num_blocks, block_len)` for every axis.
    pub fn reduction_shape(&self) -> Vec<(usize, usize)> {
        self.grid
            .iter()
            .copied()
            .zip(self.block.iter().copied())
            .collect()
    }

    #[inline]
    pub fn num_params(&self) -> usize {
        self.grid.iter().product()
    }

    #[inline]
    pub fn block_len(&self) -> usize {
        self.block.iter().product()
    }

    #[inline]
    pub fn num_elements(&self) -> usize {
        self.shape.iter().product()
    }

    /// Row-major index of the block containing the element at `flat`, or
    /// `None` past the end of the tensor.
    #[inline]
    pub fn param_index(&self, flat: usize) -> Option<usize> {
        (flat < self.num_elements()).then(|| self.param_of(flat))
    }

    /// Contiguous element ranges covered by block `p`, in row-major order, or
    /// `None` if `p` is not a block of this grid.
    pub fn runs(&self, p: usize) -> Option<Runs<'_>> {
        (p < self.num_params()).then(|| self.runs_of(p))
    }

    /// [`Self::param_index`] for `flat < num_elements()`.
    #[inline]
    pub(crate) fn param_of(&self, flat: usize) -> usize {
        let mut p = 0;
        for axis in 0..self.shape.len() {
            let coord = (flat / self.strides[axis]) % self.shape[axis];
            p = p * self.grid[axis] + coord / self.block[axis];
        }
        p
    }

    /// [`Self::runs`] for `p < num_params()`.
    pub(crate) fn runs_of(&self, p: usize) -> Runs<'_> {
        debug_assert!(p < self.num_params());

        let mut base = 0;
        let mut rest = p;
        for axis in (0..self.shape.len()).rev() {
            let coord = rest % self.grid[axis];
            rest /= self.grid[axis];
            base += coord * self.block[axis] * self.strides[axis];
        }

        Runs {
            grid: self,
            base,
            counter: vec![0; self.shape.len().saturating_sub(1)],
            done: false,
        }
    }
}

/// Iterator over the contiguous last-axis runs of one block.
pub struct Runs<'a> {
    grid: &'a BlockGrid,
    base: usize,
    counter: Vec<usize>,
    done: bool,
}

impl Iterator for Runs<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let BlockGrid { block, strides, .. } = self.grid;
        let start = self.base
            + self
                .counter
                .iter()
                .zip(strides)
                .map(|(c, s)| c * s)
                .sum::<usize>();
        let len = block.last().copied().unwrap_or(1);

        self.done = true;
        for axis in (0..self.counter.len()).rev() {
            self.counter[axis] += 1;
            if self.counter[axis] < block[axis] {
                self.done = false;
                break;
            }
            self.counter[axis] = 0;
        }

        Some(start..start + len)
    }
}

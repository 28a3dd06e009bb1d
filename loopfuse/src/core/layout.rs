//! Strided view arithmetic.
//!
//! A [`Layout`] addresses elements of a flat base buffer through an offset,
//! a shape and per-dimension strides (all in elements). Everything here is
//! pure: engines own the buffers and decide what an out-of-range offset means.

use anyhow::{Result, anyhow, bail};

use crate::core::iterator::StaticSelector;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub offset: i64,
    pub shape: Vec<usize>,
    pub strides: Vec<i64>,
}

impl Layout {
    /// Row-major layout covering a whole base of `shape`.
    pub fn contiguous(shape: &[usize]) -> Self {
        let mut strides = vec![0i64; shape.len()];
        let mut step = 1i64;
        for (dim, len) in shape.iter().enumerate().rev() {
            strides[dim] = step;
            step *= *len as i64;
        }
        Self {
            offset: 0,
            shape: shape.to_vec(),
            strides,
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of addressed elements (1 for rank 0).
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply static selectors to the leading dimensions.
    ///
    /// Slices follow NumPy bound normalization; a scalar index drops its
    /// dimension and must be in range.
    pub fn select(&self, selectors: &[StaticSelector]) -> Result<Layout> {
        if selectors.len() > self.ndim() {
            bail!(
                "too many indices: {} selectors for a {}-d array",
                selectors.len(),
                self.ndim()
            );
        }

        let mut offset = self.offset;
        let mut shape = Vec::with_capacity(self.ndim());
        let mut strides = Vec::with_capacity(self.ndim());

        for (dim, selector) in selectors.iter().enumerate() {
            let len = self.shape[dim];
            let stride = self.strides[dim];
            match *selector {
                StaticSelector::Index(index) => {
                    let resolved = resolve_index(index, len).ok_or_else(|| {
                        anyhow!("index {index} out of bounds for dimension {dim} with size {len}")
                    })?;
                    offset += resolved * stride;
                }
                StaticSelector::Slice { start, stop, step } => {
                    let range = resolve_slice(start, stop, step, len)
                        .ok_or_else(|| anyhow!("slice step cannot be zero (dimension {dim})"))?;
                    if range.count > 0 {
                        offset += range.start * stride;
                    }
                    // A single-element dimension never walks its stride.
                    let step_stride = if range.count > 1 {
                        stride.checked_mul(range.step).ok_or_else(|| {
                            anyhow!("stride overflow on dimension {dim} (step {})", range.step)
                        })?
                    } else {
                        stride.saturating_mul(range.step)
                    };
                    shape.push(range.count);
                    strides.push(step_stride);
                }
            }
        }

        shape.extend_from_slice(&self.shape[selectors.len()..]);
        strides.extend_from_slice(&self.strides[selectors.len()..]);
        Ok(Layout {
            offset,
            shape,
            strides,
        })
    }

    /// Shift the view by `stride` steps along `dim`.
    pub fn advance(&mut self, dim: usize, stride: i64) -> Result<()> {
        let dim_stride = *self.strides.get(dim).ok_or_else(|| {
            anyhow!(
                "slide dimension {dim} out of range for a {}-d view",
                self.ndim()
            )
        })?;
        self.offset = stride
            .checked_mul(dim_stride)
            .and_then(|delta| self.offset.checked_add(delta))
            .ok_or_else(|| {
                anyhow!(
                    "sliding dimension {dim} by {stride} overflows offset {}",
                    self.offset
                )
            })?;
        Ok(())
    }

    /// Flat buffer offsets of every element, in row-major order.
    pub fn element_offsets(&self) -> Vec<i64> {
        let total = self.len();
        let mut offsets = Vec::with_capacity(total);
        if total == 0 {
            return offsets;
        }

        let mut index = vec![0usize; self.ndim()];
        for _ in 0..total {
            let position: i64 = index
                .iter()
                .zip(&self.strides)
                .map(|(i, stride)| *i as i64 * stride)
                .sum();
            offsets.push(self.offset + position);

            for dim in (0..index.len()).rev() {
                index[dim] += 1;
                if index[dim] < self.shape[dim] {
                    break;
                }
                index[dim] = 0;
            }
        }
        offsets
    }
}

struct SliceRange {
    start: i64,
    count: usize,
    step: i64,
}

fn resolve_index(index: i64, len: usize) -> Option<i64> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    (0..len).contains(&resolved).then_some(resolved)
}

/// NumPy `slice.indices` normalization. `None` for a zero step.
fn resolve_slice(
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
    len: usize,
) -> Option<SliceRange> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return None;
    }
    let len = len as i64;
    let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
    let clamp = |bound: i64| {
        if bound < 0 {
            (bound + len).max(lower)
        } else {
            bound.min(upper)
        }
    };
    let start = start.map_or(if step > 0 { lower } else { upper }, clamp);
    let stop = stop.map_or(if step > 0 { upper } else { lower }, clamp);

    let count = if step > 0 && stop > start {
        ((stop - start - 1) / step + 1) as u64
    } else if step < 0 && start > stop {
        (start - stop - 1) as u64 / step.unsigned_abs() + 1
    } else {
        0
    };

    Some(SliceRange {
        start,
        count: count as usize,
        step,
    })
}

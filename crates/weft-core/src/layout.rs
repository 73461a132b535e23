//! Storage order and linear layout arithmetic

use crate::error::{Error, Result};

/// Memory layout of a multi-dimensional buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageOrder {
    /// Last dimension varies fastest (C layout).
    #[default]
    RowMajor,
    /// First dimension varies fastest (Fortran layout).
    ColumnMajor,
}

impl StorageOrder {
    /// Short name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            StorageOrder::RowMajor => "row_major",
            StorageOrder::ColumnMajor => "column_major",
        }
    }
}

impl std::fmt::Display for StorageOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of elements a dimension list spans. The empty list is a scalar.
pub fn element_count(dims: &[usize]) -> usize {
    dims.iter().product()
}

/// Per-dimension strides (in elements) for the given layout.
pub fn strides(dims: &[usize], order: StorageOrder) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    match order {
        StorageOrder::RowMajor => {
            for i in (0..dims.len().saturating_sub(1)).rev() {
                strides[i] = strides[i + 1] * dims[i + 1];
            }
        }
        StorageOrder::ColumnMajor => {
            for i in 1..dims.len() {
                strides[i] = strides[i - 1] * dims[i - 1];
            }
        }
    }
    strides
}

/// Flat offset of a multi-dimensional index under the given layout.
pub fn linear_index(indices: &[usize], dims: &[usize], order: StorageOrder) -> Result<usize> {
    if indices.len() != dims.len() {
        return Err(Error::shape_mismatch("indexing", indices, dims));
    }
    for (axis, (&i, &d)) in indices.iter().zip(dims).enumerate() {
        if i >= d {
            return Err(Error::invalid_operation(format!(
                "index {i} out of range for dimension {axis} of extent {d}"
            )));
        }
    }
    let strides = strides(dims, order);
    Ok(indices.iter().zip(&strides).map(|(&i, &s)| i * s).sum())
}

/// Axis along which a contiguous range of the buffer corresponds to a
/// contiguous range of the slowest-varying dimension.
fn leading_axis(dims: &[usize], order: StorageOrder) -> Option<usize> {
    if dims.is_empty() {
        return None;
    }
    match order {
        StorageOrder::RowMajor => Some(0),
        StorageOrder::ColumnMajor => Some(dims.len() - 1),
    }
}

/// Layout of a contiguous slice of `len` entries starting at `start` along the
/// leading dimension. Returns the slice's dimension list and its element
/// offset into the parent buffer.
pub fn slice_layout(
    dims: &[usize],
    order: StorageOrder,
    start: usize,
    len: usize,
) -> Result<(Vec<usize>, usize)> {
    let axis = leading_axis(dims, order)
        .ok_or_else(|| Error::invalid_operation("cannot slice a dimensionless tensor"))?;
    let extent = dims[axis];
    if start + len > extent {
        return Err(Error::invalid_operation(format!(
            "slice {start}..{} exceeds leading extent {extent}",
            start + len
        )));
    }
    // One step along the leading dimension covers this many elements.
    let block: usize = element_count(dims) / extent.max(1);
    let mut out_dims = dims.to_vec();
    out_dims[axis] = len;
    Ok((out_dims, start * block))
}

//! Tensor storage leaves
//!
//! A [`Tensor`] owns a flat host buffer of `N` elements plus, lazily, a mirror
//! buffer on the accelerator. The buffer pair and its validity flags live in a
//! shared store behind the handle: cloning a tensor aliases the same storage,
//! which is what makes an assignment target appearing inside its own source
//! expression detectable (see the dispatcher's alias interposition).
//!
//! All mutation goes through the coherence API in [`crate::coherence`] or
//! through the host/device write entry points here, which record which side
//! holds the authoritative value.
//!
//! # Example
//!
//! ```rust
//! use weft_core::{Engine, Tensor};
//!
//! # fn main() -> weft_core::Result<()> {
//! let engine = Engine::new();
//! let t = Tensor::from_slice(&[2, 4], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])?;
//! assert_eq!(t.dims(), &[2, 4]);
//! assert_eq!(t.value_at(&engine, &[1, 2])?, 7.0);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use weft_num::Element;

use crate::coherence::Store;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::layout::{self, StorageOrder};

/// A storage leaf: dimensions plus a shared host/device buffer pair.
#[derive(Clone)]
pub struct Tensor<T: Element> {
    dims: Vec<usize>,
    size: usize,
    order: StorageOrder,
    pub(crate) store: Arc<RwLock<Store<T>>>,
}

impl<T: Element> Tensor<T> {
    /// Row-major tensor with zeroed, not-yet-written storage.
    pub fn new(dims: &[usize]) -> Self {
        Self::with_order(dims, StorageOrder::default())
    }

    /// Tensor with the given storage order and zeroed, not-yet-written storage.
    pub fn with_order(dims: &[usize], order: StorageOrder) -> Self {
        let size = layout::element_count(dims);
        Self {
            dims: dims.to_vec(),
            size,
            order,
            store: Arc::new(RwLock::new(Store::new(size))),
        }
    }

    /// Row-major tensor initialized from host data.
    pub fn from_slice(dims: &[usize], data: &[T]) -> Result<Self> {
        Self::from_slice_with_order(dims, StorageOrder::default(), data)
    }

    /// Tensor with the given storage order, initialized from host data.
    pub fn from_slice_with_order(dims: &[usize], order: StorageOrder, data: &[T]) -> Result<Self> {
        let tensor = Self::with_order(dims, order);
        tensor.copy_from_slice(data)?;
        Ok(tensor)
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Dimension extents.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Memory layout of the buffer.
    pub fn order(&self) -> StorageOrder {
        self.order
    }

    /// Per-dimension strides in elements.
    pub fn strides(&self) -> Vec<usize> {
        layout::strides(&self.dims, self.order)
    }

    /// True when both handles share one store.
    pub fn aliases(&self, other: &Tensor<T>) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    /// Overwrite every element with `value`. Host-side write.
    pub fn fill(&self, value: T) {
        let mut store = self.store.write();
        store.host.fill(value);
        store.mirror.host_written();
    }

    /// Overwrite the host buffer from a slice. Host-side write.
    pub fn copy_from_slice(&self, data: &[T]) -> Result<()> {
        if data.len() != self.size {
            return Err(Error::size_mismatch("host write", self.size, data.len()));
        }
        let mut store = self.store.write();
        store.host.copy_from_slice(data);
        store.mirror.host_written();
        Ok(())
    }

    /// Copy of the authoritative values, transferring from the device first
    /// when the host copy is stale.
    pub fn to_vec(&self, engine: &Engine) -> Result<Vec<T>> {
        self.ensure_host_up_to_date(engine)?;
        Ok(self.store.read().host.clone())
    }

    /// Read one element by multi-dimensional index.
    pub fn value_at(&self, engine: &Engine, indices: &[usize]) -> Result<T> {
        self.ensure_host_up_to_date(engine)?;
        let index = layout::linear_index(indices, &self.dims, self.order)?;
        Ok(self.store.read().host[index])
    }

    /// This tensor as an expression leaf.
    pub fn as_expr(&self) -> Expr<'_, T> {
        Expr::Leaf(self)
    }

    /// Reinterpret the buffer under new dimensions of the same extent.
    pub fn reshape(&self, dims: &[usize]) -> Result<Expr<'_, T>> {
        self.as_expr().reshape(dims)
    }

    /// Contiguous range of `len` entries starting at `start` along the
    /// leading dimension.
    pub fn slice(&self, start: usize, len: usize) -> Result<Expr<'_, T>> {
        self.as_expr().slice(start, len)
    }

    /// Store identity, used to dedup kernel operands.
    pub(crate) fn store_key(&self) -> *const () {
        Arc::as_ptr(&self.store) as *const ()
    }
}

impl<T: Element> std::fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("dims", &self.dims)
            .field("order", &self.order)
            .field("coherence", &self.coherence_status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coherence::CoherenceStatus;

    #[test]
    fn test_construction() {
        let t = Tensor::<f32>::new(&[2, 4]);
        assert_eq!(t.size(), 8);
        assert_eq!(t.dims(), &[2, 4]);
        assert_eq!(t.order(), StorageOrder::RowMajor);
        assert_eq!(t.coherence_status(), CoherenceStatus::Invalid);
    }

    #[test]
    fn test_from_slice() {
        let t = Tensor::from_slice(&[3], &[1.0f64, 2.0, 3.0]).unwrap();
        assert_eq!(t.coherence_status(), CoherenceStatus::HostOnly);
        assert!(Tensor::from_slice(&[3], &[1.0f64]).is_err());
    }

    #[test]
    fn test_fill_marks_host_written() {
        let t = Tensor::<f32>::new(&[4]);
        t.fill(7.0);
        assert!(t.is_host_up_to_date());
        assert!(!t.is_accel_up_to_date());
        let engine = Engine::new();
        assert_eq!(t.to_vec(&engine).unwrap(), vec![7.0; 4]);
    }

    #[test]
    fn test_clone_shares_storage() {
        let a = Tensor::from_slice(&[2], &[1.0f32, 2.0]).unwrap();
        let b = a.clone();
        assert!(a.aliases(&b));
        b.fill(5.0);
        let engine = Engine::new();
        assert_eq!(a.to_vec(&engine).unwrap(), vec![5.0, 5.0]);

        let c = Tensor::from_slice(&[2], &[1.0f32, 2.0]).unwrap();
        assert!(!a.aliases(&c));
    }

    #[test]
    fn test_value_at_both_orders() {
        let data: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let engine = Engine::new();

        let row = Tensor::from_slice(&[2, 3], &data).unwrap();
        assert_eq!(row.value_at(&engine, &[1, 0]).unwrap(), 3.0);

        let col = Tensor::from_slice_with_order(&[2, 3], StorageOrder::ColumnMajor, &data).unwrap();
        assert_eq!(col.value_at(&engine, &[1, 0]).unwrap(), 1.0);
    }

    #[test]
    fn test_strides() {
        let t = Tensor::<f32>::new(&[2, 3, 4]);
        assert_eq!(t.strides(), vec![12, 4, 1]);
        let t = Tensor::<f32>::with_order(&[2, 3, 4], StorageOrder::ColumnMajor);
        assert_eq!(t.strides(), vec![1, 2, 6]);
    }

    #[test]
    fn test_scalar_dims() {
        let t = Tensor::<f32>::new(&[]);
        assert_eq!(t.size(), 1);
        assert!(t.slice(0, 1).is_err());
    }
}

//! Host evaluation kernels
//!
//! Before a host kernel runs, the prepared expression tree is resolved
//! against locked host buffers into an [`RNode`] tree: every direct node
//! becomes a plain slice, every composite keeps its operator. Kernels then
//! read the resolved tree at a linear index with no locking and no view
//! arithmetic on the hot path.
//!
//! Three execution shapes share the same element semantics:
//! - scalar: one element at a time;
//! - grouped: fixed-width element groups with a scalar tail, applied when all
//!   buffers share one storage order;
//! - parallel: the output split into fixed chunks across the worker pool,
//!   each chunk running the grouped or scalar body.

use rayon::prelude::*;
use weft_num::{Element, GROUP_WIDTH};

use crate::dispatch::{AssignKind, Strategy, PARALLEL_CHUNK_SIZE};
use crate::engine::Engine;
use crate::error::Result;
use crate::expr::{Expr, Func, UnaryOp};
use crate::layout::StorageOrder;
use crate::tensor::Tensor;

/// Expression tree with every direct node resolved to a host slice.
pub(crate) enum RNode<'g, T: Element> {
    Slice(&'g [T]),
    Compose { func: Func<T>, args: Vec<RNode<'g, T>> },
}

/// Host slices of the locked stores one kernel reads, keyed by store
/// identity.
pub(crate) struct SliceTable<'g, T: Element> {
    entries: Vec<(*const (), &'g [T])>,
}

impl<'g, T: Element> SliceTable<'g, T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, key: *const (), slice: &'g [T]) {
        if !self.entries.iter().any(|(k, _)| *k == key) {
            self.entries.push((key, slice));
        }
    }

    fn slice_for(&self, key: *const ()) -> &'g [T] {
        match self.entries.iter().find(|(k, _)| *k == key) {
            Some(&(_, slice)) => slice,
            // Every base store is collected by `direct_tensors` before the
            // kernel locks anything.
            None => unreachable!("store missing from kernel slice table"),
        }
    }
}

/// Collect the distinct base tensors a prepared tree reads: leaves,
/// temporary storage, and the stores views resolve into.
pub(crate) fn direct_tensors<'e, T: Element>(expr: &'e Expr<'_, T>, out: &mut Vec<&'e Tensor<T>>) {
    match expr {
        Expr::Composite(node) => {
            for operand in &node.operands {
                direct_tensors(operand, out);
            }
        }
        _ => match expr.direct_parts() {
            Some((base, _, _)) => {
                if !out.iter().any(|t| t.aliases(base)) {
                    out.push(base);
                }
            }
            None => unreachable!("non-direct node survived the pre-assignment passes"),
        },
    }
}

/// True when every collected tensor stores its elements in `order`.
pub(crate) fn uniform_order<T: Element>(tensors: &[&Tensor<T>], order: StorageOrder) -> bool {
    tensors.iter().all(|t| t.order() == order)
}

/// Resolve a prepared tree against the slice table.
pub(crate) fn build<'g, T: Element>(expr: &Expr<'_, T>, table: &SliceTable<'g, T>) -> RNode<'g, T> {
    match expr {
        Expr::Composite(node) => RNode::Compose {
            func: node.func,
            args: node.operands.iter().map(|op| build(op, table)).collect(),
        },
        _ => match expr.direct_parts() {
            Some((base, offset, len)) => {
                let slice = table.slice_for(base.store_key());
                RNode::Slice(&slice[offset..offset + len])
            }
            None => unreachable!("non-direct node survived the pre-assignment passes"),
        },
    }
}

/// Read one element of the resolved tree at linear index `i`.
pub(crate) fn load_at<T: Element>(node: &RNode<'_, T>, i: usize) -> T {
    match node {
        RNode::Slice(slice) => slice[i],
        RNode::Compose { func, args } => match *func {
            Func::Binary(op) => op.apply(load_at(&args[0], i), load_at(&args[1], i)),
            Func::Unary(UnaryOp::Neg) => -load_at(&args[0], i),
            Func::Unary(UnaryOp::Softplus) => load_at(&args[0], i).softplus(),
            Func::Scale {
                op,
                scalar,
                scalar_left,
            } => {
                let x = load_at(&args[0], i);
                if scalar_left {
                    op.apply(scalar, x)
                } else {
                    op.apply(x, scalar)
                }
            }
            Func::Axpby { alpha, beta } => {
                alpha * load_at(&args[0], i) + beta * load_at(&args[1], i)
            }
        },
    }
}

/// Read one full-width group starting at linear index `i`.
///
/// `i + GROUP_WIDTH` must not exceed the tree's element count.
pub(crate) fn load_group<T: Element>(node: &RNode<'_, T>, i: usize) -> [T; GROUP_WIDTH] {
    match node {
        RNode::Slice(slice) => {
            let mut group = [T::ZERO; GROUP_WIDTH];
            group.copy_from_slice(&slice[i..i + GROUP_WIDTH]);
            group
        }
        RNode::Compose { func, args } => match *func {
            Func::Binary(op) => {
                let mut a = load_group(&args[0], i);
                let b = load_group(&args[1], i);
                for lane in 0..GROUP_WIDTH {
                    a[lane] = op.apply(a[lane], b[lane]);
                }
                a
            }
            Func::Unary(UnaryOp::Neg) => {
                let mut a = load_group(&args[0], i);
                for lane in 0..GROUP_WIDTH {
                    a[lane] = -a[lane];
                }
                a
            }
            Func::Unary(UnaryOp::Softplus) => {
                let mut a = load_group(&args[0], i);
                for lane in 0..GROUP_WIDTH {
                    a[lane] = a[lane].softplus();
                }
                a
            }
            Func::Scale {
                op,
                scalar,
                scalar_left,
            } => {
                let mut a = load_group(&args[0], i);
                for lane in 0..GROUP_WIDTH {
                    a[lane] = if scalar_left {
                        op.apply(scalar, a[lane])
                    } else {
                        op.apply(a[lane], scalar)
                    };
                }
                a
            }
            Func::Axpby { alpha, beta } => {
                let mut a = load_group(&args[0], i);
                let b = load_group(&args[1], i);
                for lane in 0..GROUP_WIDTH {
                    a[lane] = alpha * a[lane] + beta * b[lane];
                }
                a
            }
        },
    }
}

/// Combine the tree into `out` one element at a time. `base` is the linear
/// index of `out[0]` within the full assignment.
pub(crate) fn scalar_kernel<T: Element>(
    out: &mut [T],
    node: &RNode<'_, T>,
    kind: AssignKind,
    base: usize,
) {
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = kind.combine(*slot, load_at(node, base + i));
    }
}

/// Combine the tree into `out` in full-width groups, finishing the tail with
/// the scalar body.
pub(crate) fn vector_kernel<T: Element>(
    out: &mut [T],
    node: &RNode<'_, T>,
    kind: AssignKind,
    base: usize,
) {
    let mut offset = 0;
    let mut groups = out.chunks_exact_mut(GROUP_WIDTH);
    for group_out in &mut groups {
        let group = load_group(node, base + offset);
        match kind {
            AssignKind::Replace => group_out.copy_from_slice(&group),
            _ => {
                for lane in 0..GROUP_WIDTH {
                    group_out[lane] = kind.combine(group_out[lane], group[lane]);
                }
            }
        }
        offset += GROUP_WIDTH;
    }
    scalar_kernel(groups.into_remainder(), node, kind, base + offset);
}

/// Run the selected host strategy over the full output buffer.
pub(crate) fn execute<T: Element>(
    out: &mut [T],
    node: &RNode<'_, T>,
    kind: AssignKind,
    strategy: Strategy,
    grouped: bool,
) {
    match strategy {
        Strategy::Scalar => scalar_kernel(out, node, kind, 0),
        Strategy::Vectorized => vector_kernel(out, node, kind, 0),
        Strategy::Parallel => {
            out.par_chunks_mut(PARALLEL_CHUNK_SIZE)
                .enumerate()
                .for_each(|(chunk_index, chunk)| {
                    let base = chunk_index * PARALLEL_CHUNK_SIZE;
                    if grouped {
                        vector_kernel(chunk, node, kind, base);
                    } else {
                        scalar_kernel(chunk, node, kind, base);
                    }
                });
        }
        Strategy::Accel => unreachable!("device assignments do not reach the host kernels"),
    }
}

/// Evaluate `source` into `out`'s host buffer with replace semantics. Used to
/// materialize temporaries; `out` must not alias anything `source` reads.
pub(crate) fn evaluate_into<T: Element>(
    engine: &Engine,
    source: &Expr<'_, T>,
    out: &Tensor<T>,
) -> Result<()> {
    let mut tensors = Vec::new();
    direct_tensors(source, &mut tensors);
    for tensor in &tensors {
        debug_assert!(!tensor.aliases(out));
        tensor.ensure_host_up_to_date(engine)?;
    }

    let guards: Vec<_> = tensors.iter().map(|t| t.store.read()).collect();
    let mut table = SliceTable::new();
    for (tensor, guard) in tensors.iter().zip(&guards) {
        table.insert(tensor.store_key(), guard.host.as_slice());
    }
    let node = build(source, &table);

    let grouped = T::VECTORIZABLE && uniform_order(&tensors, out.order());
    let strategy = crate::dispatch::select_strategy(out.size(), grouped, source.thread_safe());

    let mut out_store = out.store.write();
    execute(
        out_store.host.as_mut_slice(),
        &node,
        AssignKind::Replace,
        strategy,
        grouped,
    );
    out_store.mirror.host_written();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BinaryOp;

    #[test]
    fn test_load_at_interprets_composites() {
        let a = [1.0f32, 2.0, 3.0, 4.0];
        let b = [10.0f32, 20.0, 30.0, 40.0];
        let node = RNode::Compose {
            func: Func::Binary(BinaryOp::Add),
            args: vec![RNode::Slice(&a), RNode::Slice(&b)],
        };
        assert_eq!(load_at(&node, 0), 11.0);
        assert_eq!(load_at(&node, 3), 44.0);
    }

    #[test]
    fn test_group_loads_match_scalar_loads() {
        let a: Vec<f32> = (0..GROUP_WIDTH).map(|i| i as f32).collect();
        let b: Vec<f32> = (0..GROUP_WIDTH).map(|i| (i * i) as f32).collect();
        let node = RNode::Compose {
            func: Func::Axpby {
                alpha: 2.0f32,
                beta: -1.0,
            },
            args: vec![RNode::Slice(&a), RNode::Slice(&b)],
        };
        let group = load_group(&node, 0);
        for (i, lane) in group.iter().enumerate() {
            assert_eq!(*lane, load_at(&node, i));
        }
    }

    #[test]
    fn test_scalar_kernel_compound_kinds() {
        let src = [2.0f32, 3.0];
        let node = RNode::Slice(&src[..]);

        let mut out = [10.0f32, 10.0];
        scalar_kernel(&mut out, &node, AssignKind::Sub, 0);
        assert_eq!(out, [8.0, 7.0]);

        let mut out = [10.0f32, 10.0];
        scalar_kernel(&mut out, &node, AssignKind::Div, 0);
        assert_eq!(out, [5.0, 10.0 / 3.0]);
    }

    #[test]
    fn test_vector_kernel_handles_tail() {
        let n = GROUP_WIDTH + 3;
        let src: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let node = RNode::Slice(&src[..]);
        let mut out = vec![1.0f32; n];
        vector_kernel(&mut out, &node, AssignKind::Add, 0);
        for (i, value) in out.iter().enumerate() {
            assert_eq!(*value, 1.0 + i as f32);
        }
    }

    #[test]
    fn test_base_offset_shifts_reads() {
        let src: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let node = RNode::Slice(&src[..]);
        let mut out = [0.0f32; 4];
        scalar_kernel(&mut out, &node, AssignKind::Replace, 8);
        assert_eq!(out, [8.0, 9.0, 10.0, 11.0]);
    }
}

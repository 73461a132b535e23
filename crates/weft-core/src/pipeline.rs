//! Pre-assignment tree passes
//!
//! The dispatcher runs three passes over an expression tree before any kernel
//! touches it, always in this order:
//!
//! 1. **Temporary allocation** ([`allocate_temporaries`]) wraps subtrees that
//!    must be materialized in [`Expr::Temp`] nodes with fresh storage. Today
//!    that is views over composites: a view needs a contiguous buffer to
//!    reinterpret. The pass is idempotent, so a tree that already carries
//!    temporaries (from alias interposition) passes through unchanged.
//! 2. **Offset resolution** ([`resolve_offsets`]) walks back up from the
//!    leaves caching each view's cumulative element offset into its backing
//!    store, so kernels slice buffers without re-walking view chains.
//! 3. **Demand propagation** ([`propagate_need_value`]) pushes the "is this
//!    subtree's value actually required" flag down the tree and computes each
//!    required temporary exactly once. The flag is saved and restored around
//!    every subtree so siblings stay independent.
//!
//! The first two passes rebuild or annotate the tree; only the third reads
//! tensor data.

use weft_num::Element;

use crate::engine::Engine;
use crate::error::Result;
use crate::expr::{Expr, TempNode};
use crate::kernel;

/// Per-assignment evaluation state threaded through the passes.
#[derive(Debug)]
pub(crate) struct EvalContext {
    /// Whether the subtree currently being visited must produce its value.
    pub(crate) need_value: bool,
    /// Temporaries inserted for this assignment.
    pub(crate) temporaries: usize,
}

impl EvalContext {
    pub(crate) fn new() -> Self {
        Self {
            need_value: true,
            temporaries: 0,
        }
    }
}

/// Pass 1: insert temporaries where a subtree must be materialized.
pub(crate) fn allocate_temporaries<'a, T: Element>(
    expr: Expr<'a, T>,
    ctx: &mut EvalContext,
) -> Expr<'a, T> {
    match expr {
        Expr::Leaf(t) => Expr::Leaf(t),
        Expr::Temp(mut node) => {
            node.source = Box::new(allocate_temporaries(*node.source, ctx));
            Expr::Temp(node)
        }
        Expr::View(mut view) => {
            let sub = allocate_temporaries(*view.sub, ctx);
            let sub = if sub.is_direct() {
                sub
            } else {
                ctx.temporaries += 1;
                Expr::Temp(TempNode::covering(sub))
            };
            view.sub = Box::new(sub);
            Expr::View(view)
        }
        Expr::Composite(mut node) => {
            node.operands = node
                .operands
                .into_iter()
                .map(|operand| allocate_temporaries(operand, ctx))
                .collect();
            Expr::Composite(node)
        }
    }
}

/// Pass 2: cache each view's cumulative offset into its backing store.
pub(crate) fn resolve_offsets<T: Element>(expr: &mut Expr<'_, T>) {
    match expr {
        Expr::Leaf(_) => {}
        Expr::Temp(node) => resolve_offsets(&mut node.source),
        Expr::View(view) => {
            resolve_offsets(&mut view.sub);
            if let Some((_, base_offset, _)) = view.sub.direct_parts() {
                view.resolved = Some(view.offset + base_offset);
            }
        }
        Expr::Composite(node) => {
            for operand in &mut node.operands {
                resolve_offsets(operand);
            }
        }
    }
}

/// Pass 3: propagate value demand and compute required temporaries.
pub(crate) fn propagate_need_value<T: Element>(
    engine: &Engine,
    expr: &mut Expr<'_, T>,
    ctx: &mut EvalContext,
) -> Result<()> {
    match expr {
        Expr::Leaf(_) => Ok(()),
        Expr::View(view) => propagate_need_value(engine, &mut view.sub, ctx),
        Expr::Composite(node) => {
            let saved = ctx.need_value;
            for operand in &mut node.operands {
                ctx.need_value = saved;
                propagate_need_value(engine, operand, ctx)?;
            }
            ctx.need_value = saved;
            Ok(())
        }
        Expr::Temp(node) => {
            let saved = ctx.need_value;
            propagate_need_value(engine, &mut node.source, ctx)?;
            if saved && !node.computed {
                kernel::evaluate_into(engine, &node.source, &node.storage)?;
                node.computed = true;
            }
            ctx.need_value = saved;
            Ok(())
        }
    }
}

/// Run the three passes in order, returning the prepared tree.
pub(crate) fn prepare<'a, T: Element>(
    engine: &Engine,
    expr: Expr<'a, T>,
    ctx: &mut EvalContext,
) -> Result<Expr<'a, T>> {
    let mut expr = allocate_temporaries(expr, ctx);
    resolve_offsets(&mut expr);
    propagate_need_value(engine, &mut expr, ctx)?;
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    fn pair() -> (Tensor<f32>, Tensor<f32>) {
        let a = Tensor::from_slice(&[8], &[1.0; 8]).unwrap();
        let b = Tensor::from_slice(&[8], &[2.0; 8]).unwrap();
        (a, b)
    }

    #[test]
    fn test_view_over_composite_gets_one_temporary() {
        let (a, b) = pair();
        let tree = (&a + &b).reshape(&[2, 4]).unwrap();
        let mut ctx = EvalContext::new();
        let tree = allocate_temporaries(tree, &mut ctx);
        assert_eq!(ctx.temporaries, 1);
        assert!(tree.is_direct());
    }

    #[test]
    fn test_allocation_is_idempotent() {
        let (a, b) = pair();
        let tree = (&a + &b).reshape(&[2, 4]).unwrap();
        let mut ctx = EvalContext::new();
        let tree = allocate_temporaries(tree, &mut ctx);
        let tree = allocate_temporaries(tree, &mut ctx);
        assert_eq!(ctx.temporaries, 1);
        assert!(tree.is_direct());
    }

    #[test]
    fn test_direct_trees_need_no_temporaries() {
        let (a, b) = pair();
        let mut ctx = EvalContext::new();
        let tree = allocate_temporaries(&a + &b, &mut ctx);
        assert_eq!(ctx.temporaries, 0);
        let tree = allocate_temporaries(tree.reshape(&[4, 2]).unwrap(), &mut ctx);
        assert_eq!(ctx.temporaries, 0);
        drop(tree);
    }

    #[test]
    fn test_offsets_resolved_through_nesting() {
        let (a, b) = pair();
        let tree = (&a + &b).reshape(&[4, 2]).unwrap();
        let mut ctx = EvalContext::new();
        let mut tree = allocate_temporaries(tree, &mut ctx);
        resolve_offsets(&mut tree);
        let mut tree = tree.slice(2, 2).unwrap();
        resolve_offsets(&mut tree);
        match &tree {
            Expr::View(v) => assert_eq!(v.resolved, Some(4)),
            _ => panic!("slice must build a view"),
        }
    }

    #[test]
    fn test_demand_computes_temporaries_once() {
        let engine = Engine::new();
        let (a, b) = pair();
        let tree = (&a + &b).reshape(&[2, 4]).unwrap();
        let mut ctx = EvalContext::new();
        let mut tree = allocate_temporaries(tree, &mut ctx);
        resolve_offsets(&mut tree);
        propagate_need_value(&engine, &mut tree, &mut ctx).unwrap();

        fn temp_of<'e, 'a>(e: &'e Expr<'a, f32>) -> &'e crate::expr::TempNode<'a, f32> {
            match e {
                Expr::View(v) => match v.sub.as_ref() {
                    Expr::Temp(t) => t,
                    _ => panic!("expected temp under view"),
                },
                _ => panic!("expected view"),
            }
        }
        let temp = temp_of(&tree);
        assert!(temp.computed);
        assert_eq!(temp.storage.to_vec(&engine).unwrap(), vec![3.0; 8]);

        // A second demand pass must not recompute.
        propagate_need_value(&engine, &mut tree, &mut ctx).unwrap();
    }

    #[test]
    fn test_unneeded_values_stay_uncomputed() {
        let engine = Engine::new();
        let (a, b) = pair();
        let tree = (&a + &b).reshape(&[2, 4]).unwrap();
        let mut ctx = EvalContext::new();
        let mut tree = allocate_temporaries(tree, &mut ctx);
        ctx.need_value = false;
        propagate_need_value(&engine, &mut tree, &mut ctx).unwrap();
        match &tree {
            Expr::View(v) => match v.sub.as_ref() {
                Expr::Temp(t) => assert!(!t.computed),
                _ => panic!("expected temp under view"),
            },
            _ => panic!("expected view"),
        }
    }
}

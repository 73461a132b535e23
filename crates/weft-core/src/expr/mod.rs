//! Lazy expression trees
//!
//! Building an expression performs no arithmetic. Operators over tensor
//! references and expressions produce an [`Expr`] tree that borrows its leaf
//! tensors; evaluation happens only when the tree is assigned into a target
//! (see [`crate::dispatch`]). A tree therefore never outlives the statement
//! it appears in.
//!
//! ```text
//!   &a + (&b * &c).scale(2.0)
//!
//!        Composite(Add)
//!        /            \
//!   Leaf(a)      Composite(Scale x2)
//!                      |
//!                Composite(Mul)
//!                /            \
//!           Leaf(b)          Leaf(c)
//! ```
//!
//! Node kinds:
//! - [`Expr::Leaf`] borrows a tensor.
//! - [`Expr::Temp`] owns scratch storage for a materialized subtree. Inserted
//!   by the pre-assignment passes, never by user code.
//! - [`Expr::View`] reinterprets its subtree's buffer under new dimensions
//!   and an element offset.
//! - [`Expr::Composite`] applies an elementwise operator to its operands.
//!
//! A node is *direct* when its elements live contiguously in some buffer:
//! leaves and temporaries are direct, views over direct nodes are direct, and
//! composites are not. Kernels read direct nodes straight from their backing
//! slice and interpret the rest element by element.

use weft_accel::RoutineKind;
use weft_num::{Element, ScalarValue};

use crate::error::{Error, Result};
use crate::layout::{self, StorageOrder};
use crate::tensor::Tensor;

mod ops;

/// Elementwise binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub(crate) fn apply<T: Element>(self, a: T, b: T) -> T {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }

    pub(crate) fn routine(self) -> RoutineKind {
        match self {
            BinaryOp::Add => RoutineKind::Add,
            BinaryOp::Sub => RoutineKind::Sub,
            BinaryOp::Mul => RoutineKind::Mul,
            BinaryOp::Div => RoutineKind::Div,
        }
    }
}

/// Elementwise unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Softplus,
}

/// Operator payload of a composite node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Func<T> {
    Binary(BinaryOp),
    /// `op(scalar, x)` when `scalar_left`, else `op(x, scalar)`.
    Scale {
        op: BinaryOp,
        scalar: T,
        scalar_left: bool,
    },
    Unary(UnaryOp),
    /// Fused `alpha * x + beta * y`.
    Axpby {
        alpha: T,
        beta: T,
    },
}

impl<T: Element> Func<T> {
    pub(crate) fn operand_count(&self) -> usize {
        match self {
            Func::Binary(_) | Func::Axpby { .. } => 2,
            Func::Scale { .. } | Func::Unary(_) => 1,
        }
    }

    /// The single device routine evaluating this operator, with its scalar
    /// arguments, when the routine table has a shape for it.
    pub(crate) fn accel_routine(&self) -> Option<(RoutineKind, ScalarValue, ScalarValue)> {
        let one = T::ONE.scalar_value();
        match *self {
            Func::Binary(op) => Some((op.routine(), one, one)),
            Func::Unary(UnaryOp::Softplus) => Some((RoutineKind::Softplus, one, one)),
            Func::Unary(UnaryOp::Neg) => {
                Some((RoutineKind::Scale, (-T::ONE).scalar_value(), one))
            }
            Func::Scale {
                op: BinaryOp::Mul,
                scalar,
                ..
            } => Some((RoutineKind::Scale, scalar.scalar_value(), one)),
            // Scalar add/sub/div have no dedicated device entry.
            Func::Scale { .. } => None,
            Func::Axpby { alpha, beta } => Some((
                RoutineKind::Axpby,
                alpha.scalar_value(),
                beta.scalar_value(),
            )),
        }
    }
}

/// Materialized subtree: owned scratch storage plus the source it caches.
#[derive(Debug)]
pub struct TempNode<'a, T: Element> {
    pub(crate) storage: Tensor<T>,
    pub(crate) source: Box<Expr<'a, T>>,
    pub(crate) computed: bool,
}

impl<'a, T: Element> TempNode<'a, T> {
    /// Fresh scratch covering `source`'s shape. Contents are computed by the
    /// demand-propagation pass.
    pub(crate) fn covering(source: Expr<'a, T>) -> Self {
        let storage = Tensor::with_order(source.dims(), source.order());
        Self {
            storage,
            source: Box::new(source),
            computed: false,
        }
    }
}

/// Shape reinterpretation of a subtree at an element offset.
#[derive(Debug)]
pub struct ViewNode<'a, T: Element> {
    pub(crate) sub: Box<Expr<'a, T>>,
    pub(crate) dims: Vec<usize>,
    pub(crate) size: usize,
    pub(crate) order: StorageOrder,
    /// Offset into `sub`, in elements.
    pub(crate) offset: usize,
    /// Cumulative offset into the backing store, cached by the offset pass.
    pub(crate) resolved: Option<usize>,
}

/// Elementwise operator over operand subtrees.
#[derive(Debug)]
pub struct CompositeNode<'a, T: Element> {
    pub(crate) func: Func<T>,
    pub(crate) operands: Vec<Expr<'a, T>>,
}

impl<'a, T: Element> CompositeNode<'a, T> {
    pub(crate) fn binary(op: BinaryOp, lhs: Expr<'a, T>, rhs: Expr<'a, T>) -> Self {
        Self {
            func: Func::Binary(op),
            operands: vec![lhs, rhs],
        }
    }

    pub(crate) fn unary(op: UnaryOp, operand: Expr<'a, T>) -> Self {
        Self {
            func: Func::Unary(op),
            operands: vec![operand],
        }
    }

    pub(crate) fn scale(op: BinaryOp, scalar: T, scalar_left: bool, operand: Expr<'a, T>) -> Self {
        Self {
            func: Func::Scale {
                op,
                scalar,
                scalar_left,
            },
            operands: vec![operand],
        }
    }

    pub(crate) fn axpby(alpha: T, x: Expr<'a, T>, beta: T, y: Expr<'a, T>) -> Self {
        Self {
            func: Func::Axpby { alpha, beta },
            operands: vec![x, y],
        }
    }
}

/// One node of a lazy expression tree.
#[derive(Debug)]
pub enum Expr<'a, T: Element> {
    Leaf(&'a Tensor<T>),
    Temp(TempNode<'a, T>),
    View(ViewNode<'a, T>),
    Composite(CompositeNode<'a, T>),
}

impl<'a, T: Element> Expr<'a, T> {
    /// Number of elements this node produces.
    pub fn size(&self) -> usize {
        match self {
            Expr::Leaf(t) => t.size(),
            Expr::Temp(n) => n.storage.size(),
            Expr::View(v) => v.size,
            Expr::Composite(c) => c.operands[0].size(),
        }
    }

    /// Dimension extents of this node.
    pub fn dims(&self) -> &[usize] {
        match self {
            Expr::Leaf(t) => t.dims(),
            Expr::Temp(n) => n.storage.dims(),
            Expr::View(v) => &v.dims,
            Expr::Composite(c) => c.operands[0].dims(),
        }
    }

    /// Storage order of this node's elements.
    pub fn order(&self) -> StorageOrder {
        match self {
            Expr::Leaf(t) => t.order(),
            Expr::Temp(n) => n.storage.order(),
            Expr::View(v) => v.order,
            Expr::Composite(c) => c.operands[0].order(),
        }
    }

    /// True when this node's elements live contiguously in a backing buffer.
    pub fn is_direct(&self) -> bool {
        match self {
            Expr::Leaf(_) | Expr::Temp(_) => true,
            Expr::View(v) => v.sub.is_direct(),
            Expr::Composite(_) => false,
        }
    }

    /// Backing tensor, element offset, and length of a direct node.
    pub(crate) fn direct_parts(&self) -> Option<(&Tensor<T>, usize, usize)> {
        match self {
            Expr::Leaf(t) => Some((t, 0, t.size())),
            Expr::Temp(n) => Some((&n.storage, 0, n.storage.size())),
            Expr::View(v) => {
                let (base, sub_offset, _) = v.sub.direct_parts()?;
                let offset = v.resolved.unwrap_or(v.offset + sub_offset);
                Some((base, offset, v.size))
            }
            Expr::Composite(_) => None,
        }
    }

    /// True when evaluating this tree would read `target`'s buffer.
    pub fn reads_from(&self, target: &Tensor<T>) -> bool {
        match self {
            Expr::Leaf(t) => t.aliases(target),
            // Temp storage is fresh scratch; it never aliases user tensors.
            Expr::Temp(_) => false,
            Expr::View(v) => v.sub.reads_from(target),
            Expr::Composite(c) => c.operands.iter().any(|op| op.reads_from(target)),
        }
    }

    /// True when the tree may be evaluated from multiple worker threads.
    /// Every operator payload is pure, so all trees currently qualify; the
    /// dispatcher still consults this before partitioning.
    pub fn thread_safe(&self) -> bool {
        true
    }

    /// Check operand arity and size agreement throughout the tree.
    pub fn validate(&self) -> Result<()> {
        match self {
            Expr::Leaf(_) => Ok(()),
            Expr::Temp(n) => n.source.validate(),
            Expr::View(v) => v.sub.validate(),
            Expr::Composite(c) => {
                if c.operands.len() != c.func.operand_count() {
                    return Err(Error::invalid_operation(format!(
                        "operator expects {} operands, tree has {}",
                        c.func.operand_count(),
                        c.operands.len()
                    )));
                }
                let size = c.operands[0].size();
                for operand in &c.operands {
                    if operand.size() != size {
                        return Err(Error::size_mismatch(
                            "operator operands",
                            size,
                            operand.size(),
                        ));
                    }
                    operand.validate()?;
                }
                Ok(())
            }
        }
    }

    /// Reinterpret this node under new dimensions of the same extent.
    pub fn reshape(self, dims: &[usize]) -> Result<Expr<'a, T>> {
        let size = layout::element_count(dims);
        if size != self.size() {
            return Err(Error::shape_mismatch("reshape", self.dims(), dims));
        }
        let order = self.order();
        Ok(Expr::View(ViewNode {
            dims: dims.to_vec(),
            size,
            order,
            offset: 0,
            resolved: None,
            sub: Box::new(self),
        }))
    }

    /// Contiguous range of `len` entries starting at `start` along the
    /// leading dimension.
    pub fn slice(self, start: usize, len: usize) -> Result<Expr<'a, T>> {
        let (dims, offset) = layout::slice_layout(self.dims(), self.order(), start, len)?;
        let size = layout::element_count(&dims);
        let order = self.order();
        Ok(Expr::View(ViewNode {
            dims,
            size,
            order,
            offset,
            resolved: None,
            sub: Box::new(self),
        }))
    }

    /// Multiply every element by `scalar`.
    pub fn scale(self, scalar: T) -> Expr<'a, T> {
        Expr::Composite(CompositeNode::scale(BinaryOp::Mul, scalar, true, self))
    }

    /// Add `scalar` to every element.
    pub fn offset_by(self, scalar: T) -> Expr<'a, T> {
        Expr::Composite(CompositeNode::scale(BinaryOp::Add, scalar, false, self))
    }

    /// Elementwise `ln(1 + e^x)`.
    pub fn softplus(self) -> Expr<'a, T> {
        Expr::Composite(CompositeNode::unary(UnaryOp::Softplus, self))
    }
}

impl<'a, T: Element> From<&'a Tensor<T>> for Expr<'a, T> {
    fn from(tensor: &'a Tensor<T>) -> Self {
        Expr::Leaf(tensor)
    }
}

/// Fused scaled sum `alpha * x + beta * y`, mirroring the device's combined
/// entry point.
pub fn axpby<'a, T: Element>(
    alpha: T,
    x: impl Into<Expr<'a, T>>,
    beta: T,
    y: impl Into<Expr<'a, T>>,
) -> Expr<'a, T> {
    Expr::Composite(CompositeNode::axpby(alpha, x.into(), beta, y.into()))
}

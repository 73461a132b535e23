//! Operator overloads for expression building
//!
//! Each arithmetic operator combines any mix of expressions and tensor
//! references into a composite node. Tensors enter by reference so the tree
//! borrows them for the duration of the statement.

use std::ops::{Add, Div, Mul, Neg, Sub};

use weft_num::Element;

use crate::expr::{BinaryOp, CompositeNode, Expr, UnaryOp};
use crate::tensor::Tensor;

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<'a, T: Element> $trait for Expr<'a, T> {
            type Output = Expr<'a, T>;

            fn $method(self, rhs: Expr<'a, T>) -> Expr<'a, T> {
                Expr::Composite(CompositeNode::binary($op, self, rhs))
            }
        }

        impl<'a, T: Element> $trait<&'a Tensor<T>> for Expr<'a, T> {
            type Output = Expr<'a, T>;

            fn $method(self, rhs: &'a Tensor<T>) -> Expr<'a, T> {
                Expr::Composite(CompositeNode::binary($op, self, rhs.as_expr()))
            }
        }

        impl<'a, T: Element> $trait<Expr<'a, T>> for &'a Tensor<T> {
            type Output = Expr<'a, T>;

            fn $method(self, rhs: Expr<'a, T>) -> Expr<'a, T> {
                Expr::Composite(CompositeNode::binary($op, self.as_expr(), rhs))
            }
        }

        impl<'a, T: Element> $trait for &'a Tensor<T> {
            type Output = Expr<'a, T>;

            fn $method(self, rhs: &'a Tensor<T>) -> Expr<'a, T> {
                Expr::Composite(CompositeNode::binary($op, self.as_expr(), rhs.as_expr()))
            }
        }
    };
}

impl_binary_operator!(Add, add, BinaryOp::Add);
impl_binary_operator!(Sub, sub, BinaryOp::Sub);
impl_binary_operator!(Mul, mul, BinaryOp::Mul);
impl_binary_operator!(Div, div, BinaryOp::Div);

impl<'a, T: Element> Neg for Expr<'a, T> {
    type Output = Expr<'a, T>;

    fn neg(self) -> Expr<'a, T> {
        Expr::Composite(CompositeNode::unary(UnaryOp::Neg, self))
    }
}

impl<'a, T: Element> Neg for &'a Tensor<T> {
    type Output = Expr<'a, T>;

    fn neg(self) -> Expr<'a, T> {
        Expr::Composite(CompositeNode::unary(UnaryOp::Neg, self.as_expr()))
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::{BinaryOp, Expr, Func, UnaryOp};
    use crate::tensor::Tensor;

    fn func_of(e: &Expr<'_, f32>) -> Func<f32> {
        match e {
            Expr::Composite(c) => c.func,
            _ => panic!("operator must build a composite"),
        }
    }

    #[test]
    fn test_operator_variants_build_composites() {
        let a = Tensor::from_slice(&[2], &[1.0f32, 2.0]).unwrap();
        let b = Tensor::from_slice(&[2], &[3.0f32, 4.0]).unwrap();

        assert_eq!(func_of(&(&a + &b)), Func::Binary(BinaryOp::Add));
        assert_eq!(func_of(&(&a - &b)), Func::Binary(BinaryOp::Sub));
        assert_eq!(func_of(&(&a * &b)), Func::Binary(BinaryOp::Mul));
        assert_eq!(func_of(&(&a / &b)), Func::Binary(BinaryOp::Div));
        assert_eq!(func_of(&(-&a)), Func::Unary(UnaryOp::Neg));
    }

    #[test]
    fn test_mixed_operand_kinds() {
        let a = Tensor::from_slice(&[2], &[1.0f32, 2.0]).unwrap();
        let b = Tensor::from_slice(&[2], &[3.0f32, 4.0]).unwrap();
        let c = Tensor::from_slice(&[2], &[5.0f32, 6.0]).unwrap();

        let tree = (&a + &b) * &c;
        match &tree {
            Expr::Composite(node) => {
                assert_eq!(node.func, Func::Binary(BinaryOp::Mul));
                assert_eq!(node.operands.len(), 2);
                assert!(matches!(node.operands[0], Expr::Composite(_)));
                assert!(matches!(node.operands[1], Expr::Leaf(_)));
            }
            _ => panic!("operator must build a composite"),
        }

        let tree = &c * (&a - &b);
        assert_eq!(func_of(&tree), Func::Binary(BinaryOp::Mul));
    }

    #[test]
    fn test_nested_tree_shape() {
        let a = Tensor::from_slice(&[4], &[1.0f32; 4]).unwrap();
        let b = Tensor::from_slice(&[4], &[2.0f32; 4]).unwrap();
        let tree = -((&a + &b).scale(0.5) - &a);
        assert_eq!(tree.size(), 4);
        assert!(tree.validate().is_ok());
    }
}

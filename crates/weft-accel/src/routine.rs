//! Routine ABI: entry-point identifiers and call marshalling
//!
//! An accelerator library exposes one entry point per (operation, element
//! type) pair. [`RoutineKind`] names the operation, [`RoutineId`] pins it to a
//! concrete element type, and [`CallArgs`] carries the launch arguments: an
//! element count, the scale/bias scalars, and buffer operands given as a
//! handle plus an element offset and stride (the "leading dimension" of the
//! underlying BLAS-style signatures).
//!
//! Scalars travel as [`ScalarValue`] so complex values keep their `(re, im)`
//! binary layout across the boundary; buffer contents are reinterpreted
//! bytewise on the device side.

use weft_num::{DType, ScalarValue};

use crate::device::DeviceBuffer;

/// Logical accelerator operations.
///
/// Semantics, writing `a` and `b` for the strided input streams:
///
/// | Kind       | Output element            |
/// |------------|---------------------------|
/// | `Add`      | `a + b`                   |
/// | `Sub`      | `a - b`                   |
/// | `Mul`      | `a * b`                   |
/// | `Div`      | `a / b`                   |
/// | `Axpby`    | `alpha*a + beta*b`        |
/// | `Scale`    | `alpha*a`                 |
/// | `Softplus` | `ln(1 + exp(alpha*a))`    |
///
/// `Add` through `Div` ignore the scalar arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineKind {
    Add,
    Sub,
    Mul,
    Div,
    Axpby,
    Scale,
    Softplus,
}

impl RoutineKind {
    /// All routine kinds, in a stable order (used when enumerating exports).
    pub const ALL: [RoutineKind; 7] = [
        RoutineKind::Add,
        RoutineKind::Sub,
        RoutineKind::Mul,
        RoutineKind::Div,
        RoutineKind::Axpby,
        RoutineKind::Scale,
        RoutineKind::Softplus,
    ];

    /// Number of input operands the routine consumes.
    pub fn operand_count(self) -> usize {
        match self {
            RoutineKind::Add | RoutineKind::Sub | RoutineKind::Mul | RoutineKind::Div | RoutineKind::Axpby => 2,
            RoutineKind::Scale | RoutineKind::Softplus => 1,
        }
    }

    /// Short lowercase name, stable across versions (used in logs).
    pub fn name(self) -> &'static str {
        match self {
            RoutineKind::Add => "add",
            RoutineKind::Sub => "sub",
            RoutineKind::Mul => "mul",
            RoutineKind::Div => "div",
            RoutineKind::Axpby => "axpby",
            RoutineKind::Scale => "scale",
            RoutineKind::Softplus => "softplus",
        }
    }
}

impl std::fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A routine entry point pinned to a concrete element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutineId {
    pub kind: RoutineKind,
    pub dtype: DType,
}

impl RoutineId {
    /// Create a routine identifier.
    pub const fn new(kind: RoutineKind, dtype: DType) -> Self {
        Self { kind, dtype }
    }
}

impl std::fmt::Display for RoutineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.dtype)
    }
}

/// One strided buffer operand of a routine call.
///
/// `offset` and `stride` are in elements of the routine's element type, not
/// bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferArg {
    pub buffer: DeviceBuffer,
    /// Index of the first element, from the start of the buffer.
    pub offset: usize,
    /// Distance between consecutive elements.
    pub stride: usize,
}

impl BufferArg {
    /// Create a strided buffer argument.
    pub const fn new(buffer: DeviceBuffer, offset: usize, stride: usize) -> Self {
        Self { buffer, offset, stride }
    }

    /// Dense argument starting at the beginning of the buffer.
    pub const fn contiguous(buffer: DeviceBuffer) -> Self {
        Self {
            buffer,
            offset: 0,
            stride: 1,
        }
    }
}

/// Arguments of one routine launch.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArgs {
    /// Number of elements to process.
    pub n: usize,
    /// Scale scalar (alpha).
    pub alpha: ScalarValue,
    /// Bias scalar (beta). Ignored by single-scalar routines.
    pub beta: ScalarValue,
    /// Input operands; length must match `RoutineKind::operand_count`.
    pub inputs: Vec<BufferArg>,
    /// Output operand. May alias an input for elementwise routines.
    pub output: BufferArg,
}

impl CallArgs {
    /// Arguments for a single-input routine.
    pub fn unary(n: usize, alpha: ScalarValue, input: BufferArg, output: BufferArg) -> Self {
        Self {
            n,
            alpha,
            beta: alpha,
            inputs: vec![input],
            output,
        }
    }

    /// Arguments for a two-input routine.
    pub fn binary(
        n: usize,
        alpha: ScalarValue,
        beta: ScalarValue,
        a: BufferArg,
        b: BufferArg,
        output: BufferArg,
    ) -> Self {
        Self {
            n,
            alpha,
            beta,
            inputs: vec![a, b],
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_counts() {
        assert_eq!(RoutineKind::Add.operand_count(), 2);
        assert_eq!(RoutineKind::Axpby.operand_count(), 2);
        assert_eq!(RoutineKind::Scale.operand_count(), 1);
        assert_eq!(RoutineKind::Softplus.operand_count(), 1);
    }

    #[test]
    fn test_display() {
        let id = RoutineId::new(RoutineKind::Axpby, DType::F64);
        assert_eq!(format!("{}", id), "axpby/f64");
        assert_eq!(format!("{}", RoutineKind::Softplus), "softplus");
    }

    #[test]
    fn test_call_args_constructors() {
        let buf = DeviceBuffer::new(7);
        let args = CallArgs::unary(16, ScalarValue::F32(1.0), BufferArg::contiguous(buf), BufferArg::contiguous(buf));
        assert_eq!(args.inputs.len(), 1);
        assert_eq!(args.n, 16);
        assert_eq!(args.inputs[0].stride, 1);

        let args = CallArgs::binary(
            8,
            ScalarValue::F64(2.0),
            ScalarValue::F64(3.0),
            BufferArg::new(buf, 4, 2),
            BufferArg::contiguous(buf),
            BufferArg::contiguous(buf),
        );
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.inputs[0].offset, 4);
        assert_eq!(args.inputs[0].stride, 2);
    }

    #[test]
    fn test_all_kinds_is_exhaustive() {
        assert_eq!(RoutineKind::ALL.len(), 7);
        for kind in RoutineKind::ALL {
            assert!(!kind.name().is_empty());
        }
    }
}

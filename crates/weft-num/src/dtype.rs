//! Runtime element-type classification
//!
//! `DType` is the runtime tag used wherever element types are compared or used
//! as lookup keys (the accelerator capability registry, call marshalling,
//! metrics). `ScalarValue` is the matching tagged scalar, used to carry the
//! scale/bias arguments of accelerator calls without erasing their type.

use crate::complex::Complex;

/// Element type tag for the four supported buffer element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit IEEE 754 float
    F32,
    /// 64-bit IEEE 754 float
    F64,
    /// Complex number with two `f32` components
    Complex32,
    /// Complex number with two `f64` components
    Complex64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
            DType::Complex32 => 8,
            DType::Complex64 => 16,
        }
    }

    /// True for the complex element types.
    pub fn is_complex(self) -> bool {
        matches!(self, DType::Complex32 | DType::Complex64)
    }

    /// True for the real element types.
    pub fn is_real(self) -> bool {
        !self.is_complex()
    }

    /// True when the grouped (fixed-width) kernels apply to this type.
    ///
    /// Complex arithmetic interleaves components and is handled by the scalar
    /// kernels only.
    pub fn is_vectorizable(self) -> bool {
        self.is_real()
    }

    /// Short lowercase name, stable across versions (used in logs).
    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::Complex32 => "c32",
            DType::Complex64 => "c64",
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar tagged with its element type.
///
/// Accelerator routines take scale/bias scalars alongside their buffer
/// arguments; this carries them through the dispatch layers with the same
/// binary layout guarantees as the buffers themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    F32(f32),
    F64(f64),
    Complex32(Complex<f32>),
    Complex64(Complex<f64>),
}

impl ScalarValue {
    /// The element type this scalar belongs to.
    pub fn dtype(self) -> DType {
        match self {
            ScalarValue::F32(_) => DType::F32,
            ScalarValue::F64(_) => DType::F64,
            ScalarValue::Complex32(_) => DType::Complex32,
            ScalarValue::Complex64(_) => DType::Complex64,
        }
    }

    /// Extract as `f32`, if that is the tagged type.
    pub fn as_f32(self) -> Option<f32> {
        match self {
            ScalarValue::F32(v) => Some(v),
            _ => None,
        }
    }

    /// Extract as `f64`, if that is the tagged type.
    pub fn as_f64(self) -> Option<f64> {
        match self {
            ScalarValue::F64(v) => Some(v),
            _ => None,
        }
    }

    /// Extract as `Complex<f32>`, if that is the tagged type.
    pub fn as_complex32(self) -> Option<Complex<f32>> {
        match self {
            ScalarValue::Complex32(v) => Some(v),
            _ => None,
        }
    }

    /// Extract as `Complex<f64>`, if that is the tagged type.
    pub fn as_complex64(self) -> Option<Complex<f64>> {
        match self {
            ScalarValue::Complex64(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::Complex32.size_in_bytes(), 8);
        assert_eq!(DType::Complex64.size_in_bytes(), 16);
    }

    #[test]
    fn test_classification() {
        assert!(DType::F32.is_real());
        assert!(DType::F64.is_real());
        assert!(DType::Complex32.is_complex());
        assert!(DType::Complex64.is_complex());
        assert!(!DType::Complex32.is_real());
    }

    #[test]
    fn test_vectorizable() {
        assert!(DType::F32.is_vectorizable());
        assert!(DType::F64.is_vectorizable());
        assert!(!DType::Complex32.is_vectorizable());
        assert!(!DType::Complex64.is_vectorizable());
    }

    #[test]
    fn test_names() {
        assert_eq!(DType::F32.name(), "f32");
        assert_eq!(DType::Complex64.name(), "c64");
        assert_eq!(format!("{}", DType::Complex32), "c32");
    }

    #[test]
    fn test_scalar_value_dtype() {
        assert_eq!(ScalarValue::F32(1.5).dtype(), DType::F32);
        assert_eq!(ScalarValue::F64(1.5).dtype(), DType::F64);
        assert_eq!(
            ScalarValue::Complex32(Complex::new(1.0, 2.0)).dtype(),
            DType::Complex32
        );
    }

    #[test]
    fn test_scalar_value_extraction() {
        assert_eq!(ScalarValue::F32(2.5).as_f32(), Some(2.5));
        assert_eq!(ScalarValue::F32(2.5).as_f64(), None);
        let c = Complex::new(1.0f64, -1.0);
        assert_eq!(ScalarValue::Complex64(c).as_complex64(), Some(c));
        assert_eq!(ScalarValue::Complex64(c).as_f64(), None);
    }
}

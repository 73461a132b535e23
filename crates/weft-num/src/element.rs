//! The `Element` trait implemented by every buffer element type
//!
//! Buffers, kernels, and the accelerator marshalling layer are generic over
//! [`Element`]: a `bytemuck::Pod` numeric type with elementwise arithmetic, a
//! runtime [`DType`] tag, and conversion into the tagged [`ScalarValue`] used
//! for accelerator call arguments.
//!
//! [`Real`] is the real-valued subset; the complex element implementations are
//! blanket-derived from it, so adding a real type automatically provides the
//! matching complex type.

use crate::complex::Complex;
use crate::dtype::{DType, ScalarValue};

/// Number of elements processed per grouped load/store.
///
/// Eight lanes spans a full 256-bit vector of `f32` and divides evenly into
/// the buffer sizes the engine prefers, leaving short scalar tails.
pub const GROUP_WIDTH: usize = 8;

/// A numeric buffer element.
///
/// Implemented for `f32`, `f64`, `Complex<f32>`, and `Complex<f64>`. The
/// `Pod` bound makes byte-level transfers and reinterpretation safe; the
/// arithmetic bounds are what the elementwise kernels use.
pub trait Element:
    bytemuck::Pod
    + PartialEq
    + std::fmt::Debug
    + Send
    + Sync
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Div<Output = Self>
    + std::ops::Neg<Output = Self>
{
    /// Runtime tag for this element type.
    const DTYPE: DType;
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;
    /// Whether the grouped kernels apply to this type.
    const VECTORIZABLE: bool;

    /// Lossy conversion from `f64`, used for literals and test fixtures.
    fn from_f64(v: f64) -> Self;

    /// Softplus activation `ln(1 + e^x)`.
    fn softplus(self) -> Self;

    /// Tagged scalar for accelerator call marshalling.
    fn scalar_value(self) -> ScalarValue;

    /// Recover a value from a tagged scalar; `None` on a type mismatch.
    fn from_scalar_value(v: ScalarValue) -> Option<Self>;

    /// Approximate comparison with tolerance scaled by magnitude.
    fn approx_eq(self, other: Self, tol: f64) -> bool;
}

/// Real-valued elements (`f32`, `f64`).
///
/// Carries the transcendental operations the complex functions are composed
/// from, plus the link to the matching complex element type.
pub trait Real: Element + PartialOrd {
    /// `DType` of `Complex<Self>`.
    const COMPLEX_DTYPE: DType;

    fn abs(self) -> Self;
    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn ln_1p(self) -> Self;
    fn hypot(self, other: Self) -> Self;
    fn atan2(self, other: Self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;

    /// Tagged scalar for `Complex<Self>` values.
    fn complex_scalar(z: Complex<Self>) -> ScalarValue;

    /// Recover a `Complex<Self>` from a tagged scalar.
    fn complex_from_scalar(v: ScalarValue) -> Option<Complex<Self>>;
}

macro_rules! impl_real_element {
    ($t:ty, $dtype:expr, $cdtype:expr, $sv:ident, $csv:ident) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;
            const VECTORIZABLE: bool = true;

            fn from_f64(v: f64) -> Self {
                v as $t
            }

            fn softplus(self) -> Self {
                // max(x, 0) + ln(1 + e^(-|x|)) stays finite for large |x|
                let m = if self > 0.0 { self } else { 0.0 };
                m + (-self.abs()).exp().ln_1p()
            }

            fn scalar_value(self) -> ScalarValue {
                ScalarValue::$sv(self)
            }

            fn from_scalar_value(v: ScalarValue) -> Option<Self> {
                match v {
                    ScalarValue::$sv(x) => Some(x),
                    _ => None,
                }
            }

            fn approx_eq(self, other: Self, tol: f64) -> bool {
                let a = self as f64;
                let b = other as f64;
                let scale = 1.0f64.max(a.abs()).max(b.abs());
                (a - b).abs() <= tol * scale
            }
        }

        impl Real for $t {
            const COMPLEX_DTYPE: DType = $cdtype;

            fn abs(self) -> Self {
                <$t>::abs(self)
            }
            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }
            fn exp(self) -> Self {
                <$t>::exp(self)
            }
            fn ln(self) -> Self {
                <$t>::ln(self)
            }
            fn ln_1p(self) -> Self {
                <$t>::ln_1p(self)
            }
            fn hypot(self, other: Self) -> Self {
                <$t>::hypot(self, other)
            }
            fn atan2(self, other: Self) -> Self {
                <$t>::atan2(self, other)
            }
            fn sin(self) -> Self {
                <$t>::sin(self)
            }
            fn cos(self) -> Self {
                <$t>::cos(self)
            }

            fn complex_scalar(z: Complex<Self>) -> ScalarValue {
                ScalarValue::$csv(z)
            }

            fn complex_from_scalar(v: ScalarValue) -> Option<Complex<Self>> {
                match v {
                    ScalarValue::$csv(z) => Some(z),
                    _ => None,
                }
            }
        }
    };
}

impl_real_element!(f32, DType::F32, DType::Complex32, F32, Complex32);
impl_real_element!(f64, DType::F64, DType::Complex64, F64, Complex64);

impl<T: Real> Element for Complex<T> {
    const DTYPE: DType = T::COMPLEX_DTYPE;
    const ZERO: Self = Complex::new(T::ZERO, T::ZERO);
    const ONE: Self = Complex::new(T::ONE, T::ZERO);
    const VECTORIZABLE: bool = false;

    fn from_f64(v: f64) -> Self {
        Complex::new(T::from_f64(v), T::ZERO)
    }

    fn softplus(self) -> Self {
        (Self::ONE + self.exp()).ln()
    }

    fn scalar_value(self) -> ScalarValue {
        T::complex_scalar(self)
    }

    fn from_scalar_value(v: ScalarValue) -> Option<Self> {
        T::complex_from_scalar(v)
    }

    fn approx_eq(self, other: Self, tol: f64) -> bool {
        self.re.approx_eq(other.re, tol) && self.im.approx_eq(other.im, tol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_mapping() {
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(f64::DTYPE, DType::F64);
        assert_eq!(<Complex<f32>>::DTYPE, DType::Complex32);
        assert_eq!(<Complex<f64>>::DTYPE, DType::Complex64);
    }

    #[test]
    fn test_identities() {
        assert_eq!(f64::ZERO + f64::ONE, 1.0);
        let one = <Complex<f32>>::ONE;
        assert_eq!(one, Complex::new(1.0, 0.0));
    }

    #[test]
    fn test_softplus_at_zero() {
        // softplus(0) = ln 2
        let v = 0.0f64.softplus();
        assert!((v - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn test_softplus_saturation() {
        // Large positive inputs approach the identity, large negative approach zero.
        assert!((40.0f64.softplus() - 40.0).abs() < 1e-12);
        assert!((-40.0f64).softplus() < 1e-12);
        assert!(100.0f32.softplus().is_finite());
    }

    #[test]
    fn test_softplus_complex_real_axis() {
        // On the real axis the complex softplus agrees with the real one.
        let z = Complex::new(0.75f64, 0.0);
        let s = z.softplus();
        assert!((s.re - 0.75f64.softplus()).abs() < 1e-12);
        assert!(s.im.abs() < 1e-12);
    }

    #[test]
    fn test_approx_eq() {
        assert!(1.0f32.approx_eq(1.0 + 1e-7, 1e-5));
        assert!(!1.0f32.approx_eq(1.1, 1e-5));
        // Tolerance scales with magnitude.
        assert!(1.0e9f64.approx_eq(1.0e9 + 1.0, 1e-6));
    }

    #[test]
    fn test_scalar_value_marshalling() {
        assert_eq!(2.0f32.scalar_value(), ScalarValue::F32(2.0));
        let z = Complex::new(1.0f64, -2.0);
        assert_eq!(z.scalar_value(), ScalarValue::Complex64(z));
    }

    #[test]
    fn test_scalar_value_roundtrip() {
        assert_eq!(f32::from_scalar_value(ScalarValue::F32(2.0)), Some(2.0));
        assert_eq!(f32::from_scalar_value(ScalarValue::F64(2.0)), None);
        let z = Complex::new(0.5f32, 1.5);
        assert_eq!(<Complex<f32>>::from_scalar_value(z.scalar_value()), Some(z));
    }

    #[test]
    fn test_from_f64() {
        assert_eq!(f32::from_f64(2.5), 2.5f32);
        assert_eq!(<Complex<f64>>::from_f64(3.0), Complex::new(3.0, 0.0));
    }
}

//! Complex number type with a fixed binary layout
//!
//! ## Binary layout
//!
//! `Complex<T>` is `#[repr(C)]` with the real component first, so a buffer of
//! `Complex<T>` reinterprets byte-for-byte as a buffer of interleaved
//! `(re, im)` scalar pairs. Accelerator transfers and kernels rely on this:
//! complex buffers cross the device boundary through `bytemuck` casts with no
//! copying, reordering, or padding adjustment.
//!
//! Arithmetic is implemented inline on the two components; the transcendental
//! functions (`exp`, `ln`) are built from the [`Real`] operations and exist to
//! support the elementwise function catalog over complex elements.

use crate::element::Real;

/// Complex number stored as `(re, im)` with no padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Complex<T> {
    /// Real component (first in memory).
    pub re: T,
    /// Imaginary component (second in memory).
    pub im: T,
}

// SAFETY: `Complex<T>` is `repr(C)` with two fields of the same type, so it
// has no padding; zeroed and arbitrary bit patterns are valid whenever they
// are valid for `T`.
unsafe impl<T: bytemuck::Zeroable> bytemuck::Zeroable for Complex<T> {}
unsafe impl<T: bytemuck::Pod> bytemuck::Pod for Complex<T> {}

impl<T> Complex<T> {
    /// Build a complex number from its two components.
    pub const fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

impl<T: Real> Complex<T> {
    /// Build a complex number with a zero imaginary component.
    pub fn from_real(re: T) -> Self {
        Self::new(re, T::ZERO)
    }

    /// Complex conjugate.
    pub fn conj(self) -> Self {
        Self::new(self.re, -self.im)
    }

    /// Squared modulus `re² + im²`.
    pub fn modulus_squared(self) -> T {
        self.re * self.re + self.im * self.im
    }

    /// Modulus `|z|`.
    pub fn modulus(self) -> T {
        self.re.hypot(self.im)
    }

    /// Multiplicative inverse `conj(z) / |z|²`.
    pub fn inverse(self) -> Self {
        let d = self.modulus_squared();
        Self::new(self.re / d, -self.im / d)
    }

    /// Complex exponential `e^re · (cos im + i·sin im)`.
    pub fn exp(self) -> Self {
        let r = self.re.exp();
        Self::new(r * self.im.cos(), r * self.im.sin())
    }

    /// Principal natural logarithm `(ln |z|, atan2(im, re))`.
    pub fn ln(self) -> Self {
        Self::new(self.modulus().ln(), self.im.atan2(self.re))
    }

    /// Scale both components by a real factor.
    pub fn scale(self, factor: T) -> Self {
        Self::new(self.re * factor, self.im * factor)
    }
}

impl<T: Real> std::ops::Add for Complex<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl<T: Real> std::ops::Sub for Complex<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl<T: Real> std::ops::Mul for Complex<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

impl<T: Real> std::ops::Div for Complex<T> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let d = rhs.modulus_squared();
        Self::new(
            (self.re * rhs.re + self.im * rhs.im) / d,
            (self.im * rhs.re - self.re * rhs.im) / d,
        )
    }
}

impl<T: Real> std::ops::Neg for Complex<T> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.re, -self.im)
    }
}

impl<T: Real + std::fmt::Display> std::fmt::Display for Complex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.im < T::ZERO {
            write!(f, "{}{}i", self.re, self.im)
        } else {
            write!(f, "{}+{}i", self.re, self.im)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_scalar_pairs() {
        let buf = [Complex::new(1.0f32, 2.0), Complex::new(3.0, 4.0)];
        let scalars: &[f32] = bytemuck::cast_slice(&buf);
        assert_eq!(scalars, &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_layout_size_and_alignment() {
        assert_eq!(std::mem::size_of::<Complex<f32>>(), 8);
        assert_eq!(std::mem::align_of::<Complex<f32>>(), 4);
        assert_eq!(std::mem::size_of::<Complex<f64>>(), 16);
        assert_eq!(std::mem::align_of::<Complex<f64>>(), 8);
    }

    #[test]
    fn test_roundtrip_through_bytes() {
        let original = [Complex::new(-1.5f64, 0.25)];
        let bytes: &[u8] = bytemuck::cast_slice(&original);
        let back: &[Complex<f64>] = bytemuck::cast_slice(bytes);
        assert_eq!(back, &original);
    }

    #[test]
    fn test_add_sub() {
        let a = Complex::new(1.0f64, 2.0);
        let b = Complex::new(3.0, -1.0);
        assert_eq!(a + b, Complex::new(4.0, 1.0));
        assert_eq!(a - b, Complex::new(-2.0, 3.0));
    }

    #[test]
    fn test_mul() {
        // (1 + 2i)(3 - i) = 3 - i + 6i - 2i² = 5 + 5i
        let a = Complex::new(1.0f64, 2.0);
        let b = Complex::new(3.0, -1.0);
        assert_eq!(a * b, Complex::new(5.0, 5.0));
    }

    #[test]
    fn test_div_inverts_mul() {
        let a = Complex::new(1.0f64, 2.0);
        let b = Complex::new(3.0, -1.0);
        let q = (a * b) / b;
        assert!((q.re - a.re).abs() < 1e-12);
        assert!((q.im - a.im).abs() < 1e-12);
    }

    #[test]
    fn test_conj_and_modulus() {
        let z = Complex::new(3.0f64, 4.0);
        assert_eq!(z.conj(), Complex::new(3.0, -4.0));
        assert_eq!(z.modulus(), 5.0);
        assert_eq!(z.modulus_squared(), 25.0);
    }

    #[test]
    fn test_inverse() {
        let z = Complex::new(2.0f64, -1.0);
        let one = z * z.inverse();
        assert!((one.re - 1.0).abs() < 1e-12);
        assert!(one.im.abs() < 1e-12);
    }

    #[test]
    fn test_exp_ln_roundtrip() {
        let z = Complex::new(0.5f64, 1.25);
        let back = z.exp().ln();
        assert!((back.re - z.re).abs() < 1e-12);
        assert!((back.im - z.im).abs() < 1e-12);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Complex::new(1.0f64, 2.0)), "1+2i");
        assert_eq!(format!("{}", Complex::new(1.0f64, -2.0)), "1-2i");
    }
}

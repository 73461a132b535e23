//! # weft-num - Element Types
//!
//! Numeric element types shared by the weft engine and its accelerator layer:
//!
//! - [`DType`] - runtime classification of the supported element types
//! - [`Complex`] - a `#[repr(C)]` complex number with a fixed binary layout,
//!   byte-for-byte compatible with the standard `(re, im)` pair so buffers can
//!   cross the accelerator boundary without conversion
//! - [`Element`] - the trait every buffer element implements (Pod semantics,
//!   arithmetic, scalar marshalling)
//! - [`Real`] - the real-valued subset (`f32`, `f64`) with the transcendental
//!   operations the complex functions are built from
//!
//! Supported element types: `f32`, `f64`, `Complex<f32>`, `Complex<f64>`.

pub mod complex;
pub mod dtype;
pub mod element;

pub use complex::Complex;
pub use dtype::{DType, ScalarValue};
pub use element::{Element, Real, GROUP_WIDTH};

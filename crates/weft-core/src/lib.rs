//! # weft-core
//!
//! Lazy tensor expressions with host/accelerator memory coherence.
//!
//! Arithmetic over tensors builds expression trees instead of computing;
//! values exist only when a tree is assigned into a target tensor. At that
//! point the dispatcher routes the whole statement either to the accelerator
//! (when the tree's root operator matches a routine the device exports) or
//! to the host kernels, and the coherence layer moves data between the two
//! memories at most once per side.
//!
//! # Architecture
//!
//! ```text
//!   &a + &b, x.scale(2.0), axpby(..)        user statements
//!        │
//!        ▼
//!   expr ──── lazy trees: Leaf / Temp / View / Composite
//!        │
//!        ▼
//!   dispatch ─ assign / assign_add / assign_sub / assign_mul / assign_div
//!        │         │
//!        │         ├─ pipeline: temporaries, view offsets, value demand
//!        │         ├─ kernel:   scalar / grouped / parallel host execution
//!        │         └─ shim:     device routine launches
//!        ▼
//!   coherence ─ per-tensor host/device validity, lazy device mirrors
//!        │
//!        ▼
//!   weft-accel ─ device trait, capability registry, reference device
//! ```
//!
//! # Example
//!
//! ```rust
//! use weft_core::{assign, assign_add, axpby, Engine, Tensor};
//!
//! # fn main() -> weft_core::Result<()> {
//! let engine = Engine::new();
//! let a = Tensor::from_slice(&[2, 4], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])?;
//! let b = Tensor::from_slice(&[2, 4], &[8.0f32, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0])?;
//! let out = Tensor::<f32>::new(&[2, 4]);
//!
//! assign(&engine, &out, &a + &b)?;
//! assert_eq!(out.to_vec(&engine)?, vec![9.0; 8]);
//!
//! assign_add(&engine, &out, axpby(2.0, &a, -1.0, &b))?;
//! assert_eq!(out.value_at(&engine, &[0, 0])?, 9.0 + 2.0 * 1.0 - 8.0);
//! # Ok(())
//! # }
//! ```

pub mod coherence;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod expr;
mod kernel;
pub mod layout;
pub mod metrics;
mod pipeline;
mod shim;
pub mod tensor;

pub use coherence::CoherenceStatus;
pub use dispatch::{
    assign, assign_add, assign_div, assign_mul, assign_sub, AssignKind, Strategy,
    PARALLEL_CHUNK_SIZE, PARALLEL_THRESHOLD,
};
pub use engine::Engine;
pub use error::{Error, Result};
pub use expr::{axpby, BinaryOp, Expr, Func, UnaryOp};
pub use layout::StorageOrder;
pub use metrics::{AssignMetrics, MetricsSink, MetricsSnapshot, TransferDirection};
pub use tensor::Tensor;

pub use weft_accel::{AccelDevice, DeviceBuffer, DeviceError, Registry, RoutineId, RoutineKind, SimDevice};
pub use weft_num::{Complex, DType, Element, Real, ScalarValue, GROUP_WIDTH};

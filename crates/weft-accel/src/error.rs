//! Error types for device operations

use weft_num::DType;

use crate::routine::RoutineId;

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors that can occur inside an accelerator device
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Invalid device buffer handle
    #[error("invalid device buffer handle: {0}")]
    InvalidHandle(u64),

    /// Buffer access out of bounds
    #[error("device buffer access out of bounds: offset {offset} + size {size} > buffer size {buffer_size}")]
    OutOfBounds {
        offset: usize,
        size: usize,
        buffer_size: usize,
    },

    /// Launch requested for a routine the device does not export
    #[error("routine {0} is not exported by this device")]
    UnsupportedRoutine(RoutineId),

    /// Scalar argument tagged with the wrong element type
    #[error("scalar type mismatch: expected {expected}, got {actual}")]
    ScalarTypeMismatch { expected: DType, actual: DType },

    /// Call arguments inconsistent with the routine signature
    #[error("malformed call: {0}")]
    MalformedCall(String),

    /// Generic device error
    #[error("{0}")]
    Other(String),
}

impl DeviceError {
    /// Create a malformed-call error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedCall(msg.into())
    }

    /// Create a scalar type mismatch error
    pub fn scalar_type_mismatch(expected: DType, actual: DType) -> Self {
        Self::ScalarTypeMismatch { expected, actual }
    }
}

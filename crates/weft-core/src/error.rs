//! Error types for the engine core
//!
//! Shape and size inconsistencies surface as [`Error`] values at the API call
//! that introduced them, never from inside an evaluation loop. Misrouted
//! dispatches and coherence violations are logic errors and panic instead
//! (see the shim and eviction documentation).

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by tensors, views, and assignments
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Dimension lists disagree
    #[error("shape mismatch in {context}: {left:?} vs {right:?}")]
    ShapeMismatch {
        context: &'static str,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    /// Element counts disagree
    #[error("size mismatch in {context}: expected {expected} elements, got {actual}")]
    SizeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Operation arguments invalid (bad view extents, malformed requests)
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Accelerator device failure
    #[error("device error: {0}")]
    Device(#[from] weft_accel::DeviceError),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(context: &'static str, left: &[usize], right: &[usize]) -> Self {
        Self::ShapeMismatch {
            context,
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }

    /// Create a size mismatch error
    pub fn size_mismatch(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            context,
            expected,
            actual,
        }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::size_mismatch("assignment", 8, 4);
        assert_eq!(
            err.to_string(),
            "size mismatch in assignment: expected 8 elements, got 4"
        );

        let err = Error::shape_mismatch("reshape", &[2, 4], &[3, 3]);
        assert!(err.to_string().contains("[2, 4]"));
        assert!(err.to_string().contains("[3, 3]"));
    }

    #[test]
    fn test_device_error_conversion() {
        let device_err = weft_accel::DeviceError::InvalidHandle(42);
        let err: Error = device_err.into();
        assert!(matches!(err, Error::Device(_)));
        assert!(err.to_string().contains("invalid device buffer handle: 42"));
    }
}

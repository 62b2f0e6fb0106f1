//! Error types for rasterblas operations

use thiserror::Error;

/// Result type for rasterblas operations
pub type Result<T> = std::result::Result<T, BlasError>;

/// Errors that can occur during rasterblas operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlasError {
    /// Compute-surface or context bootstrap failure
    #[error("allocation failed: {0}")]
    AllocFailed(String),

    /// Malformed transfer direction/size, unresolvable buffer handle, or
    /// invalid operand/shape combination
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Operation is not supported (e.g. direct device-to-device copy)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Requested or derived surface shape exceeds the context's capacity
    #[error("dimension overflow: {0}")]
    DimensionOverflow(String),

    /// Device-side execution failure (draw/readback)
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_failed_display() {
        let err = BlasError::AllocFailed("no adapter".to_string());
        assert_eq!(err.to_string(), "allocation failed: no adapter");
    }

    #[test]
    fn test_invalid_value_display() {
        let err = BlasError::InvalidValue("size exceeds buffer".to_string());
        assert!(err.to_string().contains("invalid value"));
    }

    #[test]
    fn test_not_supported_display() {
        let err = BlasError::NotSupported("device-to-device copy".to_string());
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn test_dimension_overflow_display() {
        let err = BlasError::DimensionOverflow("height 20 > 16".to_string());
        assert!(err.to_string().contains("dimension overflow"));
    }

    #[test]
    fn test_error_equality() {
        let a = BlasError::NotSupported("x".to_string());
        let b = BlasError::NotSupported("x".to_string());
        assert_eq!(a, b);
    }
}

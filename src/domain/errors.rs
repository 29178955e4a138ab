//! Domain errors for the signal memory subsystem.

use thiserror::Error;

/// Domain-level errors that can occur in the signal memory.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Signal not found: {0}")]
    SignalNotFound(String),

    #[error("Improvement action not found: {0}")]
    ImprovementNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding provider failed: {0}")]
    EmbeddingError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl DomainError {
    /// Whether retrying the same call later may succeed.
    ///
    /// Provider outages and storage hiccups are transient; validation and
    /// lookup failures will fail again with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingError(_) | Self::StorageError(_))
    }
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DomainError::EmbeddingError("timeout".into()).is_retryable());
        assert!(DomainError::StorageError("locked".into()).is_retryable());
        assert!(!DomainError::ValidationFailed("confidence".into()).is_retryable());
        assert!(!DomainError::SignalNotFound("abc".into()).is_retryable());
        assert!(!DomainError::DimensionMismatch { expected: 3, actual: 4 }.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = DomainError::DimensionMismatch { expected: 384, actual: 1536 };
        assert_eq!(err.to_string(), "Embedding dimension mismatch: expected 384, got 1536");

        let err = DomainError::SignalNotFound("sig-1".into());
        assert_eq!(err.to_string(), "Signal not found: sig-1");
    }
}

//! # Worker Errors

use thiserror::Error;

/// Result type for worker operations
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Worker errors
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    #[error("Invalid deployment descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Required worker library not found: {0}")]
    MissingLibrary(String),

    #[error("Multiple candidates for required worker library: {0}")]
    AmbiguousLibrary(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("No matching signature: {0}")]
    NoMatchingSignature(String),

    #[error("Pipeline contract violation: {0}")]
    PipelineMisuse(String),

    #[error("Function invocation failed: {0}")]
    InvocationFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Whether the error indicates a defect in the worker or an extension,
    /// as opposed to a rejected request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::PipelineMisuse(_) | WorkerError::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(WorkerError::PipelineMisuse("called twice".into()).is_fatal());
        assert!(WorkerError::Internal("lock poisoned".into()).is_fatal());
        assert!(!WorkerError::UnknownFunction("missing-1".into()).is_fatal());
        assert!(!WorkerError::NoMatchingSignature("no candidate".into()).is_fatal());
    }

    #[test]
    fn test_display_carries_detail() {
        let err = WorkerError::UnknownFunction("abc".into());
        assert!(err.to_string().contains("abc"));
    }
}

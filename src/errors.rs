//! Error types for the plantdoc diagnosis pipeline.
//!
//! Knowledge problems degrade (log and skip), network problems abort the
//! current diagnostic run, persistence problems are logged without masking
//! an otherwise successful run, and monitor problems never leave the
//! sampler thread.

use thiserror::Error;

/// Main error type for the diagnosis system
#[derive(Error, Debug)]
pub enum DiagnosisError {
    /// Malformed or unusable knowledge input (skippable, never fatal)
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Completion or health endpoint unreachable / non-2xx
    #[error("Completion endpoint error: {0}")]
    Api(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Streaming response errors
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// Invalid state transition in the diagnostic protocol
    #[error("Invalid stage transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Embedding backend errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Artifact persistence errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Resource monitor sampling errors (stay inside the sampler thread)
    #[error("Monitor error: {0}")]
    Monitor(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

/// Result type alias for diagnosis operations
pub type Result<T> = std::result::Result<T, DiagnosisError>;

impl From<anyhow::Error> for DiagnosisError {
    fn from(err: anyhow::Error) -> Self {
        DiagnosisError::Embedding(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiagnosisError::Timeout { duration_ms: 3000 };
        assert!(err.to_string().contains("3000"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = DiagnosisError::InvalidTransition {
            from: "Done".to_string(),
            to: "ContextAssessment".to_string(),
        };
        assert!(err.to_string().contains("Done"));
        assert!(err.to_string().contains("ContextAssessment"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DiagnosisError = io.into();
        assert!(matches!(err, DiagnosisError::Io(_)));
    }
}

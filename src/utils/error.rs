//! Error Handling Module
//!
//! Defines the error type shared by the payload model, the dispatch engine
//! and the reference augmentations. Uses thiserror for ergonomic definitions.

use thiserror::Error;

use crate::payload::PayloadKind;

/// Main error type for batchaug operations
#[derive(Error, Debug)]
pub enum AugmentError {
    /// Invalid dispatch or transform configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A payload does not provide a capability the engine needs
    #[error("Payload of kind '{kind}' does not support '{capability}'")]
    MissingCapability {
        kind: PayloadKind,
        capability: &'static str,
    },

    /// A slice was written back into a payload of a different kind
    #[error("Kind mismatch: expected '{expected}', got '{got}'")]
    KindMismatch {
        expected: PayloadKind,
        got: PayloadKind,
    },

    /// Shape or layout inconsistency
    #[error("Shape error: {0}")]
    Shape(String),

    /// Item index outside of the batch
    #[error("Index {index} out of bounds for batch of size {batch_size}")]
    IndexOutOfBounds { index: usize, batch_size: usize },

    /// Eligible payloads disagree on the batch size
    #[error("Batch size mismatch: expected {expected}, got {got}")]
    BatchSizeMismatch { expected: usize, got: usize },

    /// A transform asked for a parameter the sampler did not produce
    #[error("Missing parameter: {0}")]
    MissingParam(String),

    /// Failure raised by a transform kernel
    #[error("Transform '{name}' failed: {reason}")]
    Transform { name: &'static str, reason: String },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AugmentError {
    fn from(err: serde_json::Error) -> Self {
        AugmentError::Serialization(err.to_string())
    }
}

/// Convenience Result type for batchaug operations
pub type Result<T> = std::result::Result<T, AugmentError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| AugmentError::InvalidInput(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| AugmentError::InvalidInput(format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| AugmentError::InvalidInput(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| AugmentError::InvalidInput(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AugmentError::Config("p out of range".to_string());
        assert_eq!(format!("{}", err), "Configuration error: p out of range");
    }

    #[test]
    fn test_missing_capability_names_kind() {
        let err = AugmentError::MissingCapability {
            kind: PayloadKind::Value,
            capability: "select",
        };
        let msg = err.to_string();
        assert!(msg.contains("value"));
        assert!(msg.contains("select"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: AugmentError = parse.into();
        assert!(matches!(err, AugmentError::Serialization(_)));
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<i32, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));

        let with_context = result.context("Failed to read config");
        assert!(matches!(with_context, Err(AugmentError::InvalidInput(_))));
    }

    #[test]
    fn test_option_context() {
        let opt: Option<i32> = None;
        let err = opt.with_context(|| "leaf 3 missing".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: leaf 3 missing");
    }
}

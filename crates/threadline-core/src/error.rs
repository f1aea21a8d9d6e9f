//! Error taxonomy for the analysis pipeline.
//!
//! External-call failures, parse failures, and schema validation failures
//! are all fatal to the enclosing operation. Nothing in the core retries;
//! the scheduler re-runs the whole pipeline on the next edit instead.

use thiserror::Error;

/// Result alias used across the core crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The structured-generation backend failed (network, auth, HTTP status).
    #[error("Generation error: {0}")]
    Generation(String),

    /// The embedding backend failed or returned the wrong number of vectors.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Raw model output did not contain a JSON object.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A JSON object was found but does not have the expected shape.
    #[error("Validation error in {context}: {reason}")]
    Validation { context: String, reason: String },

    /// Requested note or document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document store read or write failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl Error {
    pub fn validation(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// True for failures caused by an opaque external call or its output.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Error::Generation(_) | Error::Embedding(_) | Error::Parse(_) | Error::Validation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = Error::validation("unit evaluations", "expected 3 items, got 2");
        assert_eq!(
            err.to_string(),
            "Validation error in unit evaluations: expected 3 items, got 2"
        );
    }

    #[test]
    fn test_is_external() {
        assert!(Error::Parse("x".into()).is_external());
        assert!(Error::Embedding("x".into()).is_external());
        assert!(!Error::NotFound("note".into()).is_external());
        assert!(!Error::Store("locked".into()).is_external());
    }
}

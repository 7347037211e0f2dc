//! Error types for the extraction analysis engine.
//!
//! Only host-level faults surface as [`ExtractError`]: failing to parse a
//! source file, I/O in the CLI, or serializing an outcome. Everything the
//! refactoring itself can object to — invalid selections, multiple return
//! candidates, missing insertion points — is reported through
//! [`crate::status::RefactoringStatus`] instead, so callers can inspect a
//! full diagnostic list rather than catching the first failure.

use thiserror::Error;

/// The main error type for extraction analysis.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Malformed syntax tree: {0}")]
    MalformedTree(String),
}

impl ExtractError {
    /// Build a parse error from a message.
    pub fn parse(message: impl Into<String>) -> Self {
        ExtractError::Parse {
            message: message.into(),
        }
    }
}

/// A specialized Result type for extraction analysis.
pub type Result<T> = std::result::Result<T, ExtractError>;

//! Domain-level error types.

use thiserror::Error;

/// Persistence errors.
///
/// `Clone` because a single physical write reports its result to every caller
/// that was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Failed to read document {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write document {path}: {message}")]
    Write { path: String, message: String },

    #[error("Failed to encode document {path}: {message}")]
    Encode { path: String, message: String },

    #[error("Document {0} was acquired with a different type")]
    TypeMismatch(String),

    #[error("Writer for document {0} is no longer running")]
    WriterClosed(String),
}

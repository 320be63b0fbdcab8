//! Error types for the assistant services.

use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur inside the assistant services.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The request is missing or misuses a field.
    #[error("{0}")]
    Validation(String),

    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] pai_embeddings::EmbeddingError),

    /// Knowledge or conversation storage error.
    #[error("memory error: {0}")]
    Memory(#[from] pai_memory::MemoryError),

    /// Completion capability error.
    #[error("completion error: {0}")]
    Completion(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrievalError {
    /// Caller error with a message safe to return.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Whether a failure is the caller's fault or ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    Internal,
}

/// Error returned across the service boundary.
///
/// Internal faults carry a generic message; the underlying cause is only
/// logged.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    /// Message every internal fault carries.
    pub const INTERNAL_MESSAGE: &'static str = "Internal server error";

    /// Error caused by the caller's input.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidRequest,
            message: message.into(),
        }
    }

    /// Fault on our side, with the generic message.
    pub fn internal() -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: Self::INTERNAL_MESSAGE.to_string(),
        }
    }

    /// Whether the caller is at fault.
    pub fn is_invalid_request(&self) -> bool {
        self.kind == ErrorKind::InvalidRequest
    }
}

impl From<RetrievalError> for ServiceError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Validation(message) => Self::invalid_request(message),
            other => {
                error!("Request failed: {other}");
                Self::internal()
            }
        }
    }
}

//! Error types for the memory system.

use thiserror::Error;

/// Result type alias for memory operations.
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors that can occur in the memory system.
#[derive(Error, Debug)]
pub enum MemoryError {
    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Sealing or unsealing failed.
    #[error("seal error: {0}")]
    Seal(#[from] SealError),

    /// Embedding length differs from the store's dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to create storage directory.
    #[error("failed to create directory: {0}")]
    CreateDirectory(String),

    /// Failed to read a record.
    #[error("failed to read file: {0}")]
    ReadFile(String),

    /// Failed to write a record.
    #[error("failed to write file: {0}")]
    WriteFile(String),

    /// Failed to delete a record.
    #[error("failed to delete file: {0}")]
    DeleteFile(String),

    /// A stored record could not be decoded.
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Errors from sealing operations.
///
/// These never carry plaintext, key material or ciphertext.
#[derive(Error, Debug)]
pub enum SealError {
    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid ciphertext: too short")]
    CiphertextTooShort,

    #[error("invalid sealed blob encoding")]
    InvalidEncoding,

    #[error("invalid key: expected 32 bytes of base64")]
    InvalidKey,
}

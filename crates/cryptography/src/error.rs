//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors produced by hashing, signing, verification, or compression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("point is not on curve")]
    InvalidPoint,

    #[error("compression error: {0}")]
    Compression(String),
}

pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

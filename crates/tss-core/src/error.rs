//! Error types for the threshold signing core

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during key generation, signing, or storage
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Wallet or share does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Wallet id is already in use
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Quorum requirements not met
    #[error("Threshold not met: required {required}, got {actual}")]
    ThresholdNotMet { required: usize, actual: usize },

    /// Cryptographic operation failed
    #[error("Crypto failure: {0}")]
    Crypto(String),

    /// Share store unreachable or timed out
    #[error("Storage error: {0}")]
    Io(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal invariant breach
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists(name) => Error::Conflict(name),
            StoreError::NotFound(name) => Error::NotFound(name),
            StoreError::Unavailable(reason) => Error::Io(reason),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

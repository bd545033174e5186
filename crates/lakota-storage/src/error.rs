//! Storage-surface errors.
//!
//! `NotFound` is ordinary control flow for callers (a cold cache, an empty
//! changelog); everything else is a backend fault or corruption detected at
//! the content-addressing boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("digest mismatch for {key}: expected {expected}, got {actual}")]
    DigestMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("invalid pod uri: {0}")]
    InvalidUri(String),
}

impl Error {
    /// True when the error only means "no such key".
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Error::ObjectStore(object_store::Error::NotFound { .. }) => true,
            _ => false,
        }
    }

    /// True for transient backend faults worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Io(_) | Error::ObjectStore(_)) && !self.is_not_found()
    }
}

//! Engine errors.
//!
//! Validation failures bubble up from `lakota-core`, backend faults from
//! `lakota-storage`. The variants added here are the engine's own: corrupt
//! or malformed stored objects, registry conflicts, and unknown revisions.
//! A missing *changelog* is an empty history; a missing *segment* is
//! corruption and surfaces as `Integrity`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] lakota_core::Error),

    #[error(transparent)]
    Storage(#[from] lakota_storage::Error),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("malformed changelog entry name: {0}")]
    MalformedName(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("schema mismatch for collection {0}")]
    SchemaMismatch(String),

    #[error("collection already exists: {0}")]
    CollectionExists(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    #[error("invalid label: {0:?}")]
    InvalidLabel(String),
}

impl Error {
    /// Digest mismatches from the content store count as integrity faults,
    /// not backend faults.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Error::Integrity(_)
                | Error::Decompression(_)
                | Error::MalformedName(_)
                | Error::MalformedPayload(_)
                | Error::Storage(lakota_storage::Error::DigestMismatch { .. })
        )
    }
}

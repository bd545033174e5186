//! Data-model errors.
//!
//! Everything here is a validation failure: a frame that does not match its
//! schema, a key column that is not usable as a key, or a malformed digest.
//! I/O and integrity failures live in the storage and engine crates.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("dtype mismatch for column {column}: expected {expected}, got {actual}")]
    DTypeMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("column {column} has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("key column {0} is not non-decreasing")]
    UnsortedKey(String),

    #[error("NaN in key column {0}")]
    NullKey(String),

    #[error("schema declares no key column")]
    NoKeyColumn,

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("empty frame")]
    EmptyFrame,

    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    #[error("invalid compression id: {0}")]
    InvalidCompression(u8),

    #[error("invalid schema document: {0}")]
    InvalidSchema(String),
}

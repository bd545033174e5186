//! Segment descriptors.
//!
//! A segment is the persisted form of a frame slice: one compressed object
//! per column, addressed by digest. The descriptor below is what travels
//! inside revision payloads; the bytes themselves live in the content store
//! and never record their own codec — identity lives here.

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::interval::Interval;
use crate::value::Key;

/// Codec applied to a column's raw bytes before storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Lz4 = 1,
    Zstd = 2,
}

impl TryFrom<u8> for Compression {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lz4),
            2 => Ok(Compression::Zstd),
            other => Err(Error::InvalidCompression(other)),
        }
    }
}

/// Descriptor of one immutable column segment.
///
/// `start` and `stop` are the first and last primary-key tuples of the
/// slice, both inclusive; `columns` pairs each column name with the digest
/// of its compressed bytes, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    pub columns: Vec<(String, Digest)>,
    pub compression: Compression,
    pub start: Key,
    pub stop: Key,
    pub rows: u64,
}

impl SegmentRef {
    /// The key range physically present in this segment.
    pub fn interval(&self) -> Interval {
        Interval::closed(self.start.clone(), self.stop.clone())
    }

    pub fn digest_of(&self, column: &str) -> Option<&Digest> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, d)| d)
    }
}

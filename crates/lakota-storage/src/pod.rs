//! The pod: a uniform key → bytes surface over pluggable backends.
//!
//! Keys are slash-separated relative paths. Three backends exist —
//! filesystem, S3 and in-memory — plus a cache composition over an ordered
//! list of pods. All writes are atomic last-writer-wins: a partially written
//! object is never observable.
//!
//! ## URIs
//!
//! | Scheme | Backend |
//! |---|---|
//! | `file:///some/path` (or a bare path) | local filesystem |
//! | `s3://bucket[/prefix]` | S3-compatible object store |
//! | `memory://` | per-instance in-memory map |
//!
//! A list of URIs builds a cache chain: first entry is the nearest cache,
//! last entry is authoritative.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::CachePod;
use crate::error::{Error, Result};
use crate::file::FilePod;
use crate::memory::MemoryPod;
use crate::s3::S3Pod;

/// Uniform storage surface. Implementations must tolerate concurrent calls.
#[async_trait]
pub trait Pod: Send + Sync {
    /// Bytes at `key`, or `NotFound`.
    async fn read(&self, key: &str) -> Result<Bytes>;

    /// Store `data` at `key`. Atomic; rewriting an existing key with the
    /// same bytes is a no-op.
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Names of the entries directly under `prefix`. Order is unspecified.
    async fn ls(&self, prefix: &str) -> Result<Vec<String>>;

    /// Every key under `prefix`, recursively. Missing prefixes list empty.
    async fn walk(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove `key`, or `NotFound`.
    async fn rm(&self, key: &str) -> Result<()>;
}

/// Join two key fragments, tolerating empty parts.
pub(crate) fn join_key(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}/{}", prefix.trim_end_matches('/'), name),
    }
}

/// Build a pod from a single URI.
pub fn from_uri(uri: &str) -> Result<Arc<dyn Pod>> {
    if let Some(rest) = uri.strip_prefix("memory://") {
        if !rest.is_empty() {
            return Err(Error::InvalidUri(uri.to_string()));
        }
        return Ok(Arc::new(MemoryPod::new()));
    }
    if let Some(path) = uri.strip_prefix("file://") {
        if path.is_empty() {
            return Err(Error::InvalidUri(uri.to_string()));
        }
        return Ok(Arc::new(FilePod::new(path)));
    }
    if let Some(rest) = uri.strip_prefix("s3://") {
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix),
            None => (rest, ""),
        };
        if bucket.is_empty() {
            return Err(Error::InvalidUri(uri.to_string()));
        }
        return Ok(Arc::new(S3Pod::open(bucket, prefix)?));
    }
    if uri.contains("://") {
        return Err(Error::InvalidUri(uri.to_string()));
    }
    // A bare path is a filesystem pod.
    Ok(Arc::new(FilePod::new(uri)))
}

/// Build a pod from an ordered URI list: `[cache, …, authoritative]`.
pub fn from_uris(uris: &[&str]) -> Result<Arc<dyn Pod>> {
    match uris {
        [] => Err(Error::InvalidUri("empty uri list".to_string())),
        [single] => from_uri(single),
        [first, rest @ ..] => {
            let local = from_uri(first)?;
            let remote = from_uris(rest)?;
            Ok(Arc::new(CachePod::new(local, remote)))
        }
    }
}

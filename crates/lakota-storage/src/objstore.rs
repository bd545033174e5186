//! Content-addressed store.
//!
//! A thin skin over a pod: `put` hashes the bytes and files them under the
//! digest's hashed path, `get` re-hashes on the way out and refuses
//! corrupted objects. There are no object types — callers know what shape
//! to parse from where the digest came from.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use lakota_core::Digest;

use crate::error::{Error, Result};
use crate::pod::Pod;

#[derive(Clone)]
pub struct ContentStore {
    pod: Arc<dyn Pod>,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore").finish_non_exhaustive()
    }
}

impl ContentStore {
    pub fn new(pod: Arc<dyn Pod>) -> Self {
        ContentStore { pod }
    }

    pub fn pod(&self) -> &Arc<dyn Pod> {
        &self.pod
    }

    /// Store `data` and return its digest. Writing bytes that are already
    /// present is free.
    pub async fn put(&self, data: &[u8]) -> Result<Digest> {
        let digest = Digest::compute(data);
        if self.contains(&digest).await? {
            debug!(%digest, "object already stored");
            return Ok(digest);
        }
        self.pod.write(&digest.hashed_path(), data).await?;
        Ok(digest)
    }

    /// Fetch and verify the object named by `digest`.
    pub async fn get(&self, digest: &Digest) -> Result<Bytes> {
        let key = digest.hashed_path();
        let data = self.pod.read(&key).await?;
        let actual = Digest::compute(&data);
        if actual != *digest {
            return Err(Error::DigestMismatch {
                key,
                expected: digest.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(data)
    }

    /// Presence check via the parent directory listing — no object bytes
    /// are moved.
    pub async fn contains(&self, digest: &Digest) -> Result<bool> {
        let hex = digest.to_hex();
        let parent = format!("{}/{}", &hex[..2], &hex[2..4]);
        match self.pod.ls(&parent).await {
            Ok(names) => Ok(names.iter().any(|n| n == &hex[4..])),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

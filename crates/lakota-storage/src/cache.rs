//! Cache composition over an ordered pod list.
//!
//! `CachePod` pairs a nearby pod with an authoritative one (chains of any
//! length fold into nested pairs). The split of duties:
//!
//! - `read` tries the local pod first and back-fills it on a miss — warm
//!   data never touches the remote again;
//! - `write` lands on the local pod only; propagation is an explicit push;
//! - `ls` / `walk` always go to the authoritative pod, so upstream
//!   deletions and new changelog entries are visible even with a warm
//!   cache.
//!
//! Back-filling is best effort: a failing cache write downgrades to a
//! warning, never to a failed read.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::Result;
use crate::pod::Pod;

pub struct CachePod {
    local: Arc<dyn Pod>,
    remote: Arc<dyn Pod>,
}

impl CachePod {
    pub fn new(local: Arc<dyn Pod>, remote: Arc<dyn Pod>) -> Self {
        CachePod { local, remote }
    }

    pub fn local(&self) -> &Arc<dyn Pod> {
        &self.local
    }

    pub fn remote(&self) -> &Arc<dyn Pod> {
        &self.remote
    }
}

#[async_trait]
impl Pod for CachePod {
    async fn read(&self, key: &str) -> Result<Bytes> {
        match self.local.read(key).await {
            Ok(data) => {
                debug!(key, "cache hit");
                return Ok(data);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let data = self.remote.read(key).await?;
        if let Err(e) = self.local.write(key, &data).await {
            warn!(key, error = %e, "failed to populate cache");
        }
        Ok(data)
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        self.local.write(key, data).await
    }

    async fn ls(&self, prefix: &str) -> Result<Vec<String>> {
        self.remote.ls(prefix).await
    }

    async fn walk(&self, prefix: &str) -> Result<Vec<String>> {
        self.remote.walk(prefix).await
    }

    async fn rm(&self, key: &str) -> Result<()> {
        self.remote.rm(key).await?;
        match self.local.rm(key).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPod;

    fn cache() -> (MemoryPod, MemoryPod, CachePod) {
        let local = MemoryPod::new();
        let remote = MemoryPod::new();
        let pod = CachePod::new(Arc::new(local.clone()), Arc::new(remote.clone()));
        (local, remote, pod)
    }

    #[tokio::test]
    async fn test_read_populates_local() {
        let (local, remote, pod) = cache();
        remote.write("k", b"v").await.unwrap();

        assert_eq!(pod.read("k").await.unwrap().as_ref(), b"v");
        // Back-filled into the cache tier.
        assert_eq!(local.read("k").await.unwrap().as_ref(), b"v");
    }

    #[tokio::test]
    async fn test_warm_read_skips_remote() {
        let (local, remote, pod) = cache();
        remote.write("k", b"v").await.unwrap();
        pod.read("k").await.unwrap();

        // Remote loses the object; the warm cache still serves it.
        remote.rm("k").await.unwrap();
        assert_eq!(pod.read("k").await.unwrap().as_ref(), b"v");
        assert_eq!(local.read("k").await.unwrap().as_ref(), b"v");
    }

    #[tokio::test]
    async fn test_write_is_local_only() {
        let (local, remote, pod) = cache();
        pod.write("k", b"v").await.unwrap();
        assert_eq!(local.read("k").await.unwrap().as_ref(), b"v");
        assert!(remote.read("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_listings_are_authoritative() {
        let (local, remote, pod) = cache();
        local.write("only-local", b"1").await.unwrap();
        remote.write("only-remote", b"2").await.unwrap();

        assert_eq!(pod.ls("").await.unwrap(), vec!["only-remote"]);
        assert_eq!(pod.walk("").await.unwrap(), vec!["only-remote"]);
    }

    #[tokio::test]
    async fn test_miss_on_both_is_not_found() {
        let (_local, _remote, pod) = cache();
        assert!(pod.read("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rm_clears_both_tiers() {
        let (local, remote, pod) = cache();
        remote.write("k", b"v").await.unwrap();
        pod.read("k").await.unwrap();

        pod.rm("k").await.unwrap();
        assert!(remote.read("k").await.unwrap_err().is_not_found());
        assert!(local.read("k").await.unwrap_err().is_not_found());
    }
}

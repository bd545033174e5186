//! S3 pod.
//!
//! A thin adapter from the pod surface onto the `object_store` crate.
//! Credentials and region come from the environment; `allow_http` is on so
//! MinIO-style local endpoints work out of the box. Object stores already
//! give us atomic, last-writer-wins puts, which is exactly the pod write
//! contract.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StorePath;
use object_store::ObjectStore;
use tracing::debug;

use crate::error::{Error, Result};
use crate::pod::{join_key, Pod};

pub struct S3Pod {
    store: Arc<dyn ObjectStore>,
    base: String,
}

impl S3Pod {
    /// Connect to `bucket`, scoping every key under `prefix`.
    pub fn open(bucket: &str, prefix: &str) -> Result<Self> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_allow_http(true)
            .build()?;
        Ok(S3Pod::with_store(Arc::new(store), prefix))
    }

    /// Wrap an already-built object store (used by tests with the in-memory
    /// implementation).
    pub fn with_store(store: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        S3Pod {
            store,
            base: prefix.trim_matches('/').to_string(),
        }
    }

    fn location(&self, key: &str) -> StorePath {
        StorePath::from(join_key(&self.base, key))
    }

    /// Strip the base prefix from an absolute object path.
    fn relative(&self, location: &StorePath) -> String {
        let full = location.to_string();
        if self.base.is_empty() {
            full
        } else {
            full.strip_prefix(&self.base)
                .map(|r| r.trim_start_matches('/').to_string())
                .unwrap_or(full)
        }
    }

    fn map_err(err: object_store::Error, key: &str) -> Error {
        match err {
            object_store::Error::NotFound { .. } => Error::NotFound(key.to_string()),
            other => Error::ObjectStore(other),
        }
    }
}

#[async_trait]
impl Pod for S3Pod {
    async fn read(&self, key: &str) -> Result<Bytes> {
        debug!(key, "s3 read");
        let result = self
            .store
            .get(&self.location(key))
            .await
            .map_err(|e| Self::map_err(e, key))?;
        let data = result.bytes().await.map_err(|e| Self::map_err(e, key))?;
        Ok(data)
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        debug!(key, size = data.len(), "s3 write");
        self.store
            .put(&self.location(key), Bytes::copy_from_slice(data).into())
            .await?;
        Ok(())
    }

    async fn ls(&self, prefix: &str) -> Result<Vec<String>> {
        debug!(prefix, "s3 ls");
        let location = self.location(prefix);
        let listing = self
            .store
            .list_with_delimiter(Some(&location))
            .await
            .map_err(|e| Self::map_err(e, prefix))?;
        let mut names = Vec::new();
        for dir in &listing.common_prefixes {
            if let Some(name) = dir.parts().last() {
                names.push(name.as_ref().to_string());
            }
        }
        for object in &listing.objects {
            if let Some(name) = object.location.parts().last() {
                names.push(name.as_ref().to_string());
            }
        }
        Ok(names)
    }

    async fn walk(&self, prefix: &str) -> Result<Vec<String>> {
        let location = self.location(prefix);
        let objects: Vec<_> = self
            .store
            .list(Some(&location))
            .try_collect()
            .await
            .map_err(|e| Self::map_err(e, prefix))?;
        Ok(objects
            .iter()
            .map(|meta| self.relative(&meta.location))
            .collect())
    }

    async fn rm(&self, key: &str) -> Result<()> {
        debug!(key, "s3 rm");
        self.store
            .delete(&self.location(key))
            .await
            .map_err(|e| Self::map_err(e, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn pod() -> S3Pod {
        S3Pod::with_store(Arc::new(InMemory::new()), "repo")
    }

    #[tokio::test]
    async fn test_read_write_roundtrip() {
        let pod = pod();
        pod.write("aa/bb/object", b"payload").await.unwrap();
        assert_eq!(pod.read("aa/bb/object").await.unwrap().as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_read_missing() {
        let pod = pod();
        assert!(pod.read("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_keys_scoped_under_prefix() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let a = S3Pod::with_store(store.clone(), "repo-a");
        let b = S3Pod::with_store(store, "repo-b");
        a.write("k", b"v").await.unwrap();
        assert!(b.read("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_ls_dirs_and_files() {
        let pod = pod();
        pod.write("aa/bb/one", b"1").await.unwrap();
        pod.write("aa/two", b"2").await.unwrap();
        let mut names = pod.ls("aa").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["bb", "two"]);
    }

    #[tokio::test]
    async fn test_walk_returns_relative_keys() {
        let pod = pod();
        pod.write("aa/bb/one", b"1").await.unwrap();
        pod.write("aa/bb/cc/two", b"2").await.unwrap();
        let mut keys = pod.walk("aa").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["aa/bb/cc/two", "aa/bb/one"]);
    }

    #[tokio::test]
    async fn test_rm() {
        let pod = pod();
        pod.write("k", b"v").await.unwrap();
        pod.rm("k").await.unwrap();
        assert!(pod.read("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_overwrite_last_writer_wins() {
        let pod = pod();
        pod.write("k", b"one").await.unwrap();
        pod.write("k", b"two").await.unwrap();
        assert_eq!(pod.read("k").await.unwrap().as_ref(), b"two");
    }
}

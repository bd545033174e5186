//! In-memory pod.
//!
//! A sorted map of key → bytes behind an async lock. State is strictly
//! per-instance: two `memory://` pods never share anything, which is what
//! makes it usable both as a test backend and as the cache tier of a
//! composed pod.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::pod::Pod;

#[derive(Clone, Default)]
pub struct MemoryPod {
    store: Arc<RwLock<BTreeMap<String, Bytes>>>,
}

impl MemoryPod {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

#[async_trait]
impl Pod for MemoryPod {
    async fn read(&self, key: &str) -> Result<Bytes> {
        debug!(key, "memory read");
        self.store
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        debug!(key, size = data.len(), "memory write");
        self.store
            .write()
            .await
            .insert(key.to_string(), Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn ls(&self, prefix: &str) -> Result<Vec<String>> {
        debug!(prefix, "memory ls");
        let store = self.store.read().await;
        let mut names = BTreeSet::new();
        for key in store.keys() {
            let rest = if prefix.is_empty() {
                key.as_str()
            } else {
                match key
                    .strip_prefix(prefix)
                    .and_then(|r| r.strip_prefix('/'))
                {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            if rest.is_empty() {
                continue;
            }
            // First path component only: deeper levels show up as "dirs".
            let name = rest.split('/').next().unwrap_or(rest);
            names.insert(name.to_string());
        }
        Ok(names.into_iter().collect())
    }

    async fn walk(&self, prefix: &str) -> Result<Vec<String>> {
        let store = self.store.read().await;
        let keys = store
            .keys()
            .filter(|key| {
                prefix.is_empty()
                    || key
                        .strip_prefix(prefix)
                        .map(|r| r.starts_with('/'))
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        Ok(keys)
    }

    async fn rm(&self, key: &str) -> Result<()> {
        debug!(key, "memory rm");
        self.store
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

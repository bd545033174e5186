//! Filesystem pod.
//!
//! Writes go to a temp file in the destination directory, then rename into
//! place: readers either see the whole object or nothing. Content-addressed
//! callers write the same bytes under the same key, so an existing key is
//! simply left alone.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::pod::{join_key, Pod};

pub struct FilePod {
    root: PathBuf,
}

impl FilePod {
    pub fn new(root: impl AsRef<Path>) -> Self {
        FilePod {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }
}

fn map_io(err: std::io::Error, key: &str) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound(key.to_string())
    } else {
        Error::Io(err)
    }
}

#[async_trait]
impl Pod for FilePod {
    async fn read(&self, key: &str) -> Result<Bytes> {
        debug!(root = %self.root.display(), key, "file read");
        let data = tokio::fs::read(self.resolve(key))
            .await
            .map_err(|e| map_io(e, key))?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.resolve(key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(root = %self.root.display(), key, "file skip-write");
            return Ok(());
        }
        debug!(root = %self.root.display(), key, size = data.len(), "file write");
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Temp file in the same directory so the rename stays on one
        // filesystem and is atomic. Key names may contain dots, so the
        // suffix is appended rather than swapped in as an extension.
        let mut tmp = path.clone().into_os_string();
        tmp.push(format!(".tmp-{}", Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, data).await?;
        match tokio::fs::rename(&tmp, &path).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                Err(Error::Io(e))
            }
        }
    }

    async fn ls(&self, prefix: &str) -> Result<Vec<String>> {
        debug!(root = %self.root.display(), prefix, "file ls");
        let mut dir = tokio::fs::read_dir(self.resolve(prefix))
            .await
            .map_err(|e| map_io(e, prefix))?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    async fn walk(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.resolve(prefix);
        if !tokio::fs::try_exists(&base).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        let mut stack = vec![prefix.trim_matches('/').to_string()];
        while let Some(current) = stack.pop() {
            let path = self.resolve(&current);
            if path.is_dir() {
                let mut dir = tokio::fs::read_dir(&path)
                    .await
                    .map_err(|e| map_io(e, &current))?;
                while let Some(entry) = dir.next_entry().await? {
                    if let Some(name) = entry.file_name().to_str() {
                        stack.push(join_key(&current, name));
                    }
                }
            } else {
                keys.push(current);
            }
        }
        Ok(keys)
    }

    async fn rm(&self, key: &str) -> Result<()> {
        debug!(root = %self.root.display(), key, "file rm");
        tokio::fs::remove_file(self.resolve(key))
            .await
            .map_err(|e| map_io(e, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod() -> (tempfile::TempDir, FilePod) {
        let dir = tempfile::tempdir().unwrap();
        let pod = FilePod::new(dir.path());
        (dir, pod)
    }

    #[tokio::test]
    async fn test_read_write_roundtrip() {
        let (_dir, pod) = pod();
        pod.write("aa/bb/object", b"payload").await.unwrap();
        assert_eq!(pod.read("aa/bb/object").await.unwrap().as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_read_missing() {
        let (_dir, pod) = pod();
        assert!(pod.read("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_write_existing_key_is_noop() {
        let (_dir, pod) = pod();
        pod.write("k", b"first").await.unwrap();
        pod.write("k", b"second").await.unwrap();
        // Content-addressed keys never change bytes; first write sticks.
        assert_eq!(pod.read("k").await.unwrap().as_ref(), b"first");
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let (dir, pod) = pod();
        pod.write("aa/object", b"data").await.unwrap();
        let names = pod.ls("aa").await.unwrap();
        assert_eq!(names, vec!["object"]);
        drop(dir);
    }

    #[tokio::test]
    async fn test_ls_missing_prefix_errors() {
        let (_dir, pod) = pod();
        assert!(pod.ls("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_ls_and_walk() {
        let (_dir, pod) = pod();
        pod.write("aa/bb/one", b"1").await.unwrap();
        pod.write("aa/bb/two", b"2").await.unwrap();
        pod.write("aa/cc/three", b"3").await.unwrap();

        let mut names = pod.ls("aa/bb").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["one", "two"]);

        let mut keys = pod.walk("aa").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["aa/bb/one", "aa/bb/two", "aa/cc/three"]);
    }

    #[tokio::test]
    async fn test_walk_missing_prefix_is_empty() {
        let (_dir, pod) = pod();
        assert!(pod.walk("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rm() {
        let (_dir, pod) = pod();
        pod.write("k", b"v").await.unwrap();
        pod.rm("k").await.unwrap();
        assert!(pod.read("k").await.unwrap_err().is_not_found());
        assert!(pod.rm("k").await.unwrap_err().is_not_found());
    }
}

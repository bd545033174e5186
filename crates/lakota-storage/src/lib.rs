//! Storage surface for lakota.
//!
//! Everything below the engine speaks [`Pod`]: a uniform, async key → bytes
//! interface with three backends (filesystem, S3, in-memory) and a cache
//! composition over an ordered pod list. [`ContentStore`] layers content
//! addressing on top — objects named by digest, verified on every read.
//!
//! ```ignore
//! let pod = lakota_storage::from_uris(&["memory://", "s3://bucket/repo"])?;
//! let store = ContentStore::new(pod.clone());
//! let digest = store.put(b"bytes").await?;
//! assert_eq!(store.get(&digest).await?.as_ref(), b"bytes");
//! ```

pub mod cache;
pub mod error;
pub mod file;
pub mod memory;
pub mod objstore;
pub mod pod;
pub mod s3;

pub use cache::CachePod;
pub use error::{Error, Result};
pub use file::FilePod;
pub use memory::MemoryPod;
pub use objstore::ContentStore;
pub use pod::{from_uri, from_uris, Pod};
pub use s3::S3Pod;

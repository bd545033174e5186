//! Lakota — a version-controlled store for numerical time series.
//!
//! A repository holds named collections; a collection holds named series;
//! a series is an append/overwrite-friendly table ordered by its primary
//! key. The object model is git-like — content-addressed objects, a
//! Merkle-linked log — but the leaves are column segments and the log
//! records *interval-valued* revisions over the key space, so concurrent
//! writes are detected and merged by interval overlap instead of text
//! diff.
//!
//! ## Layers
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Repo / Collection / Series   │  registry, merge, push/pull
//! ├──────────────────────────────┤
//! │ Changelog                    │  fork-capable revision DAG
//! ├──────────────────────────────┤
//! │ Segments / payloads          │  column codec, revision bodies
//! ├──────────────────────────────┤
//! │ ContentStore over a Pod      │  digest-addressed bytes
//! ├──────────────────────────────┤
//! │ file:// · s3:// · memory://  │  backends + cache composition
//! └──────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use lakota::{ColumnDef, DType, Frame, Repo, Schema};
//!
//! let repo = Repo::open("file:///var/lib/lakota")?;
//! let schema = Schema::new(vec![
//!     ColumnDef::key("timestamp", DType::Timestamp),
//!     ColumnDef::value("value", DType::Float),
//! ])?;
//! let clct = repo.create_collection(&schema, "temperature").await?;
//! let series = clct.series("Brussels")?;
//! series.write(&frame).await?;
//! let out = series.read(None, None).await?;
//! ```
//!
//! Writes never block each other: two writers against the same parent fork
//! the changelog, reads pin a deterministic head, and
//! [`Collection::merge`] reconverges all heads onto one payload.

pub mod changelog;
pub mod collection;
pub mod commit;
pub mod config;
pub mod error;
pub mod repo;
pub mod segment;
pub mod series;
pub mod sync;

pub use changelog::{Changelog, Revision, RevisionId};
pub use collection::Collection;
pub use commit::{CommitPayload, SeriesEntry};
pub use config::WriteConfig;
pub use error::{Error, Result};
pub use repo::Repo;
pub use series::{Series, WriteOutcome};
pub use sync::SyncStats;

// The data model is part of the public surface.
pub use lakota_core::{
    Array, Closed, ColumnDef, Compression, DType, Digest, Frame, Interval, Key, Schema,
    SegmentRef, Value,
};
pub use lakota_storage::{from_uri, from_uris, ContentStore, Pod};

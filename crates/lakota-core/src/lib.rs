//! Core data model for lakota.
//!
//! This crate defines the types every other layer is built from:
//!
//! - [`Digest`] — the 160-bit content hash that names every stored object
//! - [`DType`] / [`Value`] / [`Array`] / [`Key`] — scalar types, dense
//!   columns and lexicographic primary keys
//! - [`Schema`] — ordered column definitions with key flags
//! - [`Frame`] — a validated, column-aligned chunk of rows
//! - [`Interval`] — the inclusive key-range algebra used for shadow
//!   resolution and merge
//! - [`SegmentRef`] / [`Compression`] — the descriptor of one persisted
//!   column segment
//!
//! Nothing in this crate performs I/O.

pub mod digest;
pub mod error;
pub mod frame;
pub mod interval;
pub mod schema;
pub mod segment;
pub mod value;

pub use digest::{Digest, DIGEST_LEN};
pub use error::{Error, Result};
pub use frame::Frame;
pub use interval::{Closed, Interval};
pub use schema::{ColumnDef, Schema};
pub use segment::{Compression, SegmentRef};
pub use value::{Array, DType, Key, Value};

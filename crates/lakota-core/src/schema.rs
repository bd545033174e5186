//! Schema definitions.
//!
//! A schema is an ordered list of columns; the columns flagged as keys form,
//! in declaration order, the lexicographic primary key of every series in a
//! collection. Schemas serialize to small JSON documents which are stored
//! content-addressed, so the registry only carries their digest.

use serde::{Deserialize, Serialize};

use crate::digest::Digest;
use crate::error::{Error, Result};
use crate::value::DType;

/// One column: name, dtype and whether it participates in the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub dtype: DType,
    #[serde(default)]
    pub key: bool,
}

impl ColumnDef {
    /// A key column.
    pub fn key(name: impl Into<String>, dtype: DType) -> Self {
        ColumnDef {
            name: name.into(),
            dtype,
            key: true,
        }
    }

    /// A plain value column.
    pub fn value(name: impl Into<String>, dtype: DType) -> Self {
        ColumnDef {
            name: name.into(),
            dtype,
            key: false,
        }
    }
}

/// Ordered column definitions shared by every series of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnDef>,
}

impl Schema {
    /// Build a schema; at least one key column is required and names must
    /// be unique.
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        if !columns.iter().any(|c| c.key) {
            return Err(Error::NoKeyColumn);
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(Error::DuplicateColumn(col.name.clone()));
            }
        }
        Ok(Schema { columns })
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Key columns in primary-key order.
    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.key)
    }

    pub fn key_width(&self) -> usize {
        self.columns.iter().filter(|c| c.key).count()
    }

    /// JSON document bytes, as stored in the content store.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Field layout is stable so the document digests deterministically.
        serde_json::to_vec(self).expect("schema serialization is infallible")
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let schema: Schema = serde_json::from_slice(data)
            .map_err(|e| Error::InvalidSchema(e.to_string()))?;
        if !schema.columns.iter().any(|c| c.key) {
            return Err(Error::NoKeyColumn);
        }
        Ok(schema)
    }

    /// Digest of the JSON document; the registry stores this.
    pub fn digest(&self) -> Digest {
        Digest::compute(&self.to_bytes())
    }
}

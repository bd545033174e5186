//! Column-aligned row chunks.
//!
//! A [`Frame`] is the in-memory currency of the store: every write takes
//! one, every read returns one. Construction is where the schema contract is
//! enforced — column presence, dtypes, equal lengths, non-decreasing and
//! NaN-free keys — so the rest of the engine can assume frames are sound.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::interval::Interval;
use crate::schema::Schema;
use crate::value::{Array, Key};

/// A validated chunk of rows, columns aligned with the schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    schema: Schema,
    columns: Vec<Array>,
}

impl Frame {
    /// Build a frame from `(name, column)` pairs. Order of the pairs does
    /// not matter; every schema column must be present and nothing else.
    pub fn new(schema: Schema, columns: Vec<(String, Array)>) -> Result<Self> {
        for (name, _) in &columns {
            if schema.column(name).is_none() {
                return Err(Error::UnknownColumn(name.clone()));
            }
        }

        let mut ordered = Vec::with_capacity(schema.columns().len());
        for def in schema.columns() {
            let arr = columns
                .iter()
                .find(|(name, _)| name == &def.name)
                .map(|(_, arr)| arr.clone())
                .ok_or_else(|| Error::MissingColumn(def.name.clone()))?;
            if arr.dtype() != def.dtype {
                return Err(Error::DTypeMismatch {
                    column: def.name.clone(),
                    expected: def.dtype.to_string(),
                    actual: arr.dtype().to_string(),
                });
            }
            ordered.push(arr);
        }

        let frame = Frame {
            schema,
            columns: ordered,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Zero-row frame.
    pub fn empty(schema: Schema) -> Self {
        let columns = schema
            .columns()
            .iter()
            .map(|def| Array::empty(def.dtype))
            .collect();
        Frame { schema, columns }
    }

    fn validate(&self) -> Result<()> {
        let len = self.columns.first().map(Array::len).unwrap_or(0);
        for (def, arr) in self.schema.columns().iter().zip(&self.columns) {
            if arr.len() != len {
                return Err(Error::LengthMismatch {
                    column: def.name.clone(),
                    expected: len,
                    actual: arr.len(),
                });
            }
        }

        // Key columns: NaN-free, and the key tuples non-decreasing.
        for (def, arr) in self.schema.columns().iter().zip(&self.columns) {
            if !def.key {
                continue;
            }
            if let Array::Float(values) = arr {
                if values.iter().any(|v| v.is_nan()) {
                    return Err(Error::NullKey(def.name.clone()));
                }
            }
        }
        for row in 1..len {
            if self.key_at(row - 1) > self.key_at(row) {
                let first_key = self
                    .schema
                    .key_columns()
                    .next()
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                return Err(Error::UnsortedKey(first_key));
            }
        }
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.columns.first().map(Array::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column(&self, name: &str) -> Option<&Array> {
        self.schema.position(name).map(|pos| &self.columns[pos])
    }

    pub fn columns(&self) -> &[Array] {
        &self.columns
    }

    /// The primary-key tuple at `row`.
    pub fn key_at(&self, row: usize) -> Key {
        let values = self
            .schema
            .columns()
            .iter()
            .zip(&self.columns)
            .filter(|(def, _)| def.key)
            .map(|(_, arr)| arr.get(row))
            .collect();
        Key::new(values)
    }

    /// First key, or `None` when empty.
    pub fn start(&self) -> Option<Key> {
        if self.is_empty() {
            None
        } else {
            Some(self.key_at(0))
        }
    }

    /// Last key, or `None` when empty.
    pub fn stop(&self) -> Option<Key> {
        if self.is_empty() {
            None
        } else {
            Some(self.key_at(self.len() - 1))
        }
    }

    /// Rows `[start, stop)` as a new frame.
    pub fn slice(&self, start: usize, stop: usize) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|arr| arr.slice(start, stop))
            .collect();
        Frame {
            schema: self.schema.clone(),
            columns,
        }
    }

    /// Rows whose key falls inside `keep`, preserving order.
    pub fn filter(&self, keep: &Interval) -> Frame {
        let indices: Vec<usize> = (0..self.len())
            .filter(|&row| keep.contains(&self.key_at(row)))
            .collect();
        let columns = self
            .columns
            .iter()
            .map(|arr| arr.take(&indices))
            .collect();
        Frame {
            schema: self.schema.clone(),
            columns,
        }
    }

    /// Concatenate frames sharing one schema. The inputs are expected to be
    /// key-ordered and non-overlapping; the result's key order is verified.
    pub fn concat(schema: &Schema, frames: &[Frame]) -> Result<Frame> {
        if let Some(off) = frames.iter().find(|f| f.schema != *schema) {
            return Err(Error::InvalidSchema(format!(
                "cannot concatenate frame with schema {:?}",
                off.schema
            )));
        }
        let mut columns = Vec::with_capacity(schema.columns().len());
        for (pos, def) in schema.columns().iter().enumerate() {
            let parts: Vec<&Array> = frames.iter().map(|f| &f.columns[pos]).collect();
            if parts.is_empty() {
                columns.push(Array::empty(def.dtype));
            } else {
                columns.push(Array::concat(&parts)?);
            }
        }
        let out = Frame {
            schema: schema.clone(),
            columns,
        };
        out.validate()?;
        Ok(out)
    }

    /// True when keys strictly increase (no duplicate rows).
    pub fn keys_strictly_increasing(&self) -> bool {
        (1..self.len()).all(|row| self.key_at(row - 1).cmp(&self.key_at(row)) == Ordering::Less)
    }
}

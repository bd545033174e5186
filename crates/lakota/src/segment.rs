//! Column segment codec.
//!
//! A frame slice persists as one object per column: fixed-width big-endian
//! words for numeric columns, length-prefixed utf-8 for strings, the whole
//! buffer run through the configured codec. The object carries no header —
//! dtype, row count and codec identity all travel in the [`SegmentRef`]
//! descriptor, and the digest is the only integrity mechanism needed.
//!
//! [`SegmentWriter`] slices frames at the configured row target and stores
//! every column concurrently; [`SegmentReader`] is its inverse, filtering
//! rows down to the interval a revision chain left visible.

use bytes::{BufMut, BytesMut};
use futures::future::try_join_all;

use lakota_core::{Array, Compression, DType, Frame, Interval, Schema, SegmentRef};
use lakota_storage::ContentStore;

use crate::config::WriteConfig;
use crate::error::{Error, Result};

/// Raw (uncompressed) bytes of one column.
fn encode_raw(arr: &Array) -> Vec<u8> {
    let mut buf = BytesMut::new();
    match arr {
        Array::Int(values) | Array::Timestamp(values) => {
            for v in values {
                buf.put_i64(*v);
            }
        }
        Array::Float(values) => {
            for v in values {
                buf.put_u64(v.to_bits());
            }
        }
        Array::Str(values) => {
            for v in values {
                buf.put_u32(v.len() as u32);
                buf.put_slice(v.as_bytes());
            }
        }
    }
    buf.to_vec()
}

fn decode_raw(data: &[u8], dtype: DType, rows: u64) -> Result<Array> {
    let rows = rows as usize;
    let truncated = || Error::Integrity("truncated column bytes".to_string());
    match dtype {
        DType::Int | DType::Timestamp => {
            if data.len() != rows * 8 {
                return Err(truncated());
            }
            let values: Vec<i64> = data
                .chunks_exact(8)
                .map(|c| i64::from_be_bytes(c.try_into().unwrap()))
                .collect();
            Ok(match dtype {
                DType::Int => Array::Int(values),
                _ => Array::Timestamp(values),
            })
        }
        DType::Float => {
            if data.len() != rows * 8 {
                return Err(truncated());
            }
            let values = data
                .chunks_exact(8)
                .map(|c| f64::from_bits(u64::from_be_bytes(c.try_into().unwrap())))
                .collect();
            Ok(Array::Float(values))
        }
        DType::Str => {
            let mut values = Vec::with_capacity(rows);
            let mut pos = 0usize;
            for _ in 0..rows {
                if pos + 4 > data.len() {
                    return Err(truncated());
                }
                let len = u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
                pos += 4;
                if pos + len > data.len() {
                    return Err(truncated());
                }
                let s = std::str::from_utf8(&data[pos..pos + len])
                    .map_err(|_| Error::Integrity("invalid utf-8 in column".to_string()))?;
                values.push(s.to_string());
                pos += len;
            }
            if pos != data.len() {
                return Err(Error::Integrity("trailing column bytes".to_string()));
            }
            Ok(Array::Str(values))
        }
    }
}

pub(crate) fn compress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        Compression::Zstd => {
            zstd::stream::encode_all(data, 0).map_err(|e| Error::Decompression(e.to_string()))
        }
    }
}

pub(crate) fn decompress(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| Error::Decompression(e.to_string())),
        Compression::Zstd => {
            zstd::stream::decode_all(data).map_err(|e| Error::Decompression(e.to_string()))
        }
    }
}

/// Turns frames into stored segments.
pub struct SegmentWriter<'a> {
    store: &'a ContentStore,
    config: &'a WriteConfig,
}

impl<'a> SegmentWriter<'a> {
    pub fn new(store: &'a ContentStore, config: &'a WriteConfig) -> Self {
        SegmentWriter { store, config }
    }

    /// Slice `frame` at the configured row target and store every column.
    /// Descriptors come back in key order.
    pub async fn write(&self, frame: &Frame) -> Result<Vec<SegmentRef>> {
        let max_rows = self.config.segment_max_rows.max(1);
        let compression = self.config.compression;
        let mut refs = Vec::new();

        let mut offset = 0;
        while offset < frame.len() {
            let end = (offset + max_rows).min(frame.len());
            let chunk = frame.slice(offset, end);

            let stores = frame
                .schema()
                .columns()
                .iter()
                .zip(chunk.columns())
                .map(|(def, arr)| async move {
                    let compressed = compress(&encode_raw(arr), compression)?;
                    let digest = self.store.put(&compressed).await?;
                    Ok::<_, Error>((def.name.clone(), digest))
                });
            let columns = try_join_all(stores).await?;

            refs.push(SegmentRef {
                columns,
                compression,
                start: chunk.start().expect("chunk is never empty"),
                stop: chunk.stop().expect("chunk is never empty"),
                rows: chunk.len() as u64,
            });
            offset = end;
        }

        Ok(refs)
    }
}

/// Re-materializes stored segments as frames.
pub struct SegmentReader<'a> {
    store: &'a ContentStore,
    schema: &'a Schema,
}

impl<'a> SegmentReader<'a> {
    pub fn new(store: &'a ContentStore, schema: &'a Schema) -> Self {
        SegmentReader { store, schema }
    }

    /// Load a segment's columns and keep the rows inside `keep`.
    ///
    /// A referenced column object that is absent from the store is
    /// corruption, not an empty result.
    pub async fn read(&self, seg: &SegmentRef, keep: &Interval) -> Result<Frame> {
        let fetches = self.schema.columns().iter().map(|def| async move {
            let digest = seg.digest_of(&def.name).ok_or_else(|| {
                Error::Integrity(format!("segment lacks column {}", def.name))
            })?;
            let compressed = match self.store.get(digest).await {
                Ok(data) => data,
                Err(e) if e.is_not_found() => {
                    return Err(Error::Integrity(format!(
                        "segment object {digest} missing for column {}",
                        def.name
                    )))
                }
                Err(e) => return Err(e.into()),
            };
            let raw = decompress(&compressed, seg.compression)?;
            let arr = decode_raw(&raw, def.dtype, seg.rows)?;
            Ok::<_, Error>((def.name.clone(), arr))
        });
        let columns = try_join_all(fetches).await?;

        let frame = Frame::new(self.schema.clone(), columns)?;
        Ok(frame.filter(keep))
    }
}

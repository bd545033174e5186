//! Revision payload codec.
//!
//! A revision's body lists, per affected series, the claimed key interval
//! and the segments backing it. The encoding is a plain length-prefixed
//! binary layout, big-endian throughout:
//!
//! ```text
//! version:u8  author:str16
//! entry_count:u32
//!   series:str16  interval(start-key, stop-key, closed:u8)
//!   segment_count:u32
//!     compression:u8  rows:u64  start-key  stop-key
//!     column_count:u16  (name:str16, digest:20B)*
//! key   := width:u8 (dtype:u8, value)*
//! value := i64 | f64-bits | str32
//! ```
//!
//! The author token is part of the body, so the child digest — the digest
//! of these bytes — covers payload and author alike, and every payload read
//! stays self-verifying.

use bytes::{BufMut, BytesMut};

use lakota_core::{Closed, Compression, Digest, Interval, Key, SegmentRef, Value, DIGEST_LEN};

use crate::error::{Error, Result};

const PAYLOAD_VERSION: u8 = 1;

/// One series' claim inside a revision.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEntry {
    pub series: String,
    pub interval: Interval,
    pub segments: Vec<SegmentRef>,
}

/// Decoded revision body.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitPayload {
    pub author: String,
    pub entries: Vec<SeriesEntry>,
}

impl CommitPayload {
    pub fn new(author: String, entries: Vec<SeriesEntry>) -> Self {
        CommitPayload { author, entries }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(PAYLOAD_VERSION);
        put_str16(&mut buf, &self.author);
        buf.put_u32(self.entries.len() as u32);
        for entry in &self.entries {
            put_str16(&mut buf, &entry.series);
            put_key(&mut buf, &entry.interval.start);
            put_key(&mut buf, &entry.interval.stop);
            buf.put_u8(entry.interval.closed.code());
            buf.put_u32(entry.segments.len() as u32);
            for seg in &entry.segments {
                buf.put_u8(seg.compression as u8);
                buf.put_u64(seg.rows);
                put_key(&mut buf, &seg.start);
                put_key(&mut buf, &seg.stop);
                buf.put_u16(seg.columns.len() as u16);
                for (name, digest) in &seg.columns {
                    put_str16(&mut buf, name);
                    buf.put_slice(digest.as_bytes());
                }
            }
        }
        buf.to_vec()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let version = r.u8()?;
        if version != PAYLOAD_VERSION {
            return Err(Error::MalformedPayload(format!(
                "unsupported payload version {version}"
            )));
        }
        let author = r.str16()?;
        let entry_count = r.u32()?;
        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let series = r.str16()?;
            let start = r.key()?;
            let stop = r.key()?;
            let closed = Closed::from_code(r.u8()?)
                .map_err(|e| Error::MalformedPayload(e.to_string()))?;
            let segment_count = r.u32()?;
            let mut segments = Vec::with_capacity(segment_count as usize);
            for _ in 0..segment_count {
                let compression = Compression::try_from(r.u8()?)
                    .map_err(|e| Error::MalformedPayload(e.to_string()))?;
                let rows = r.u64()?;
                let seg_start = r.key()?;
                let seg_stop = r.key()?;
                let column_count = r.u16()?;
                let mut columns = Vec::with_capacity(column_count as usize);
                for _ in 0..column_count {
                    let name = r.str16()?;
                    let mut digest = [0u8; DIGEST_LEN];
                    digest.copy_from_slice(r.slice(DIGEST_LEN)?);
                    columns.push((name, Digest::from_bytes(digest)));
                }
                segments.push(SegmentRef {
                    columns,
                    compression,
                    start: seg_start,
                    stop: seg_stop,
                    rows,
                });
            }
            entries.push(SeriesEntry {
                series,
                interval: Interval::new(start, stop, closed),
                segments,
            });
        }
        r.finish()?;
        Ok(CommitPayload { author, entries })
    }
}

fn put_str16(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

fn put_value(buf: &mut BytesMut, value: &Value) {
    buf.put_u8(value.dtype().code());
    match value {
        Value::Int(v) | Value::Timestamp(v) => buf.put_i64(*v),
        Value::Float(v) => buf.put_u64(v.to_bits()),
        Value::Str(v) => {
            buf.put_u32(v.len() as u32);
            buf.put_slice(v.as_bytes());
        }
    }
}

fn put_key(buf: &mut BytesMut, key: &Key) {
    buf.put_u8(key.len() as u8);
    for value in key.values() {
        put_value(buf, value);
    }
}

/// Bounds-checked cursor; truncated input decodes to an error, never a
/// panic.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn slice(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(Error::MalformedPayload("truncated payload".to_string()));
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.slice(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.slice(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.slice(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.slice(8)?.try_into().unwrap()))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.slice(8)?.try_into().unwrap()))
    }

    fn str16(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let bytes = self.slice(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::MalformedPayload("invalid utf-8".to_string()))
    }

    fn value(&mut self) -> Result<Value> {
        let code = self.u8()?;
        match code {
            0 => Ok(Value::Int(self.i64()?)),
            1 => Ok(Value::Float(f64::from_bits(self.u64()?))),
            2 => {
                let len = self.u32()? as usize;
                let bytes = self.slice(len)?;
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|_| Error::MalformedPayload("invalid utf-8".to_string()))?;
                Ok(Value::Str(s))
            }
            3 => Ok(Value::Timestamp(self.i64()?)),
            other => Err(Error::MalformedPayload(format!(
                "unknown value tag {other}"
            ))),
        }
    }

    fn key(&mut self) -> Result<Key> {
        let width = self.u8()? as usize;
        let mut values = Vec::with_capacity(width);
        for _ in 0..width {
            values.push(self.value()?);
        }
        Ok(Key::new(values))
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(Error::MalformedPayload(format!(
                "{} trailing bytes",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}

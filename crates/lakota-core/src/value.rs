//! Scalar values, dense columns and primary keys.
//!
//! Rows never exist as objects: a series is a set of dense [`Array`] columns,
//! and a row is an implicit position. [`Key`] is the tuple of key-column
//! values at one position; keys order lexicographically, which is the only
//! ordering the store relies on.
//!
//! Floats use `f64::total_cmp` so that [`Value`] is totally ordered; NaN is
//! rejected from key columns before it ever reaches a comparison.

use std::cmp::Ordering;
use std::fmt;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scalar column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 string.
    Str,
    /// Seconds since the Unix epoch, stored as i64.
    Timestamp,
}

impl DType {
    /// Wire tag for payload encoding.
    pub fn code(&self) -> u8 {
        match self {
            DType::Int => 0,
            DType::Float => 1,
            DType::Str => 2,
            DType::Timestamp => 3,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(DType::Int),
            1 => Ok(DType::Float),
            2 => Ok(DType::Str),
            3 => Ok(DType::Timestamp),
            other => Err(Error::InvalidSchema(format!("unknown dtype code {other}"))),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Int => "int",
            DType::Float => "float",
            DType::Str => "str",
            DType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

/// A single cell value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(i64),
}

impl Value {
    pub fn dtype(&self) -> DType {
        match self {
            Value::Int(_) => DType::Int,
            Value::Float(_) => DType::Float,
            Value::Str(_) => DType::Str,
            Value::Timestamp(_) => DType::Timestamp,
        }
    }

    /// True for a float NaN; every other value is a usable key.
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Float(f) if f.is_nan())
    }

    fn rank(&self) -> u8 {
        self.dtype().code()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            // Mixed dtypes only meet through programming errors; order by
            // dtype rank so the ordering stays total.
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Timestamp(secs) => match DateTime::from_timestamp(*secs, 0) {
                Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
                None => write!(f, "{secs}"),
            },
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// A primary-key tuple: the key-column values of one row, in schema order.
///
/// Keys compare lexicographically. A key may be *partial* — a read range
/// endpoint can name fewer columns than the schema declares — and
/// [`Key::cmp_prefix`] compares only the shared prefix in that case, so an
/// inclusive partial endpoint covers every full key sharing the prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key(pub Vec<Value>);

impl Key {
    pub fn new(values: Vec<Value>) -> Self {
        Key(values)
    }

    pub fn single(value: impl Into<Value>) -> Self {
        Key(vec![value.into()])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Compare over the shorter key's width; equal prefixes compare equal.
    pub fn cmp_prefix(&self, other: &Key) -> Ordering {
        let width = self.0.len().min(other.0.len());
        for i in 0..width {
            match self.0[i].cmp(&other.0[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, ")")
    }
}

/// A dense column of values, all of one dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
    Timestamp(Vec<i64>),
}

impl Array {
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::Int => Array::Int(Vec::new()),
            DType::Float => Array::Float(Vec::new()),
            DType::Str => Array::Str(Vec::new()),
            DType::Timestamp => Array::Timestamp(Vec::new()),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Array::Int(_) => DType::Int,
            Array::Float(_) => DType::Float,
            Array::Str(_) => DType::Str,
            Array::Timestamp(_) => DType::Timestamp,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Array::Int(v) => v.len(),
            Array::Float(v) => v.len(),
            Array::Str(v) => v.len(),
            Array::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `pos`; panics when out of bounds, like slice indexing.
    pub fn get(&self, pos: usize) -> Value {
        match self {
            Array::Int(v) => Value::Int(v[pos]),
            Array::Float(v) => Value::Float(v[pos]),
            Array::Str(v) => Value::Str(v[pos].clone()),
            Array::Timestamp(v) => Value::Timestamp(v[pos]),
        }
    }

    pub fn push(&mut self, value: Value) -> Result<()> {
        match (self, value) {
            (Array::Int(v), Value::Int(x)) => v.push(x),
            (Array::Float(v), Value::Float(x)) => v.push(x),
            (Array::Str(v), Value::Str(x)) => v.push(x),
            (Array::Timestamp(v), Value::Timestamp(x)) => v.push(x),
            (arr, value) => {
                return Err(Error::DTypeMismatch {
                    column: String::new(),
                    expected: arr.dtype().to_string(),
                    actual: value.dtype().to_string(),
                })
            }
        }
        Ok(())
    }

    /// Copy of the positions in `indices`, in the given order.
    pub fn take(&self, indices: &[usize]) -> Array {
        match self {
            Array::Int(v) => Array::Int(indices.iter().map(|&i| v[i]).collect()),
            Array::Float(v) => Array::Float(indices.iter().map(|&i| v[i]).collect()),
            Array::Str(v) => Array::Str(indices.iter().map(|&i| v[i].clone()).collect()),
            Array::Timestamp(v) => Array::Timestamp(indices.iter().map(|&i| v[i]).collect()),
        }
    }

    pub fn slice(&self, start: usize, stop: usize) -> Array {
        match self {
            Array::Int(v) => Array::Int(v[start..stop].to_vec()),
            Array::Float(v) => Array::Float(v[start..stop].to_vec()),
            Array::Str(v) => Array::Str(v[start..stop].to_vec()),
            Array::Timestamp(v) => Array::Timestamp(v[start..stop].to_vec()),
        }
    }

    pub fn concat(parts: &[&Array]) -> Result<Array> {
        let first = parts.first().ok_or(Error::EmptyFrame)?;
        let mut out = Array::empty(first.dtype());
        for part in parts {
            if part.dtype() != first.dtype() {
                return Err(Error::DTypeMismatch {
                    column: String::new(),
                    expected: first.dtype().to_string(),
                    actual: part.dtype().to_string(),
                });
            }
            match (&mut out, part) {
                (Array::Int(o), Array::Int(p)) => o.extend_from_slice(p),
                (Array::Float(o), Array::Float(p)) => o.extend_from_slice(p),
                (Array::Str(o), Array::Str(p)) => o.extend_from_slice(p),
                (Array::Timestamp(o), Array::Timestamp(p)) => o.extend_from_slice(p),
                _ => unreachable!(),
            }
        }
        Ok(out)
    }
}

impl From<Vec<i64>> for Array {
    fn from(v: Vec<i64>) -> Self {
        Array::Int(v)
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::Float(v)
    }
}

impl From<Vec<String>> for Array {
    fn from(v: Vec<String>) -> Self {
        Array::Str(v)
    }
}

impl From<Vec<&str>> for Array {
    fn from(v: Vec<&str>) -> Self {
        Array::Str(v.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_ordering_int() {
        assert!(Value::Int(1) < Value::Int(2));
        assert_eq!(Value::Int(3), Value::Int(3));
    }

    #[test]
    fn test_value_ordering_float_total() {
        assert!(Value::Float(-1.0) < Value::Float(0.0));
        assert!(Value::Float(f64::NEG_INFINITY) < Value::Float(f64::INFINITY));
        // total_cmp puts NaN above +inf; keys never contain NaN anyway
        assert!(Value::Float(f64::NAN) > Value::Float(f64::INFINITY));
    }

    #[test]
    fn test_value_is_nan() {
        assert!(Value::Float(f64::NAN).is_nan());
        assert!(!Value::Float(0.0).is_nan());
        assert!(!Value::Int(0).is_nan());
    }

    #[test]
    fn test_key_lexicographic() {
        let a = Key::new(vec![Value::Int(1), Value::Str("a".into())]);
        let b = Key::new(vec![Value::Int(1), Value::Str("b".into())]);
        let c = Key::new(vec![Value::Int(2), Value::Str("a".into())]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_key_prefix_comparison() {
        let full = Key::new(vec![Value::Int(5), Value::Str("x".into())]);
        let partial = Key::single(5i64);
        // Plain Ord: shorter sorts first on equal prefix.
        assert!(partial < full);
        // Prefix compare: equal.
        assert_eq!(partial.cmp_prefix(&full), Ordering::Equal);
        assert_eq!(Key::single(4i64).cmp_prefix(&full), Ordering::Less);
        assert_eq!(Key::single(6i64).cmp_prefix(&full), Ordering::Greater);
    }

    #[test]
    fn test_array_take_and_slice() {
        let arr = Array::Int(vec![10, 20, 30, 40]);
        assert_eq!(arr.take(&[3, 1]), Array::Int(vec![40, 20]));
        assert_eq!(arr.slice(1, 3), Array::Int(vec![20, 30]));
    }

    #[test]
    fn test_array_concat() {
        let a = Array::Float(vec![1.0, 2.0]);
        let b = Array::Float(vec![3.0]);
        assert_eq!(
            Array::concat(&[&a, &b]).unwrap(),
            Array::Float(vec![1.0, 2.0, 3.0])
        );
    }

    #[test]
    fn test_array_concat_dtype_mismatch() {
        let a = Array::Float(vec![1.0]);
        let b = Array::Int(vec![1]);
        assert!(Array::concat(&[&a, &b]).is_err());
    }

    #[test]
    fn test_array_push_dtype_checked() {
        let mut arr = Array::Str(vec![]);
        arr.push(Value::Str("ok".into())).unwrap();
        assert!(arr.push(Value::Int(1)).is_err());
        assert_eq!(arr.len(), 1);
    }

    #[test]
    fn test_dtype_code_roundtrip() {
        for dt in [DType::Int, DType::Float, DType::Str, DType::Timestamp] {
            assert_eq!(DType::from_code(dt.code()).unwrap(), dt);
        }
        assert!(DType::from_code(9).is_err());
    }

    #[test]
    fn test_timestamp_display() {
        let v = Value::Timestamp(0);
        assert_eq!(v.to_string(), "1970-01-01T00:00:00");
    }
}

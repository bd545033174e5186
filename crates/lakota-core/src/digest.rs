//! Content digests.
//!
//! Every stored object — column segment, revision payload, schema document —
//! is named by the digest of its bytes. Two payloads with the same digest are
//! the same object; collisions are treated as impossible. The digest is
//! SHA-256 truncated to 160 bits, rendered as 40 lowercase hex characters.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};

use crate::error::{Error, Result};

/// Digest width in bytes.
pub const DIGEST_LEN: usize = 20;

/// Identity of a stored byte payload.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// The all-zero digest, used as the parent of root revisions.
    pub const ZERO: Digest = Digest([0u8; DIGEST_LEN]);

    /// Hash a payload.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let full = hasher.finalize();
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&full[..DIGEST_LEN]);
        Digest(out)
    }

    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Digest::ZERO
    }

    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(DIGEST_LEN * 2);
        for b in self.0 {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != DIGEST_LEN * 2 {
            return Err(Error::InvalidDigest(hex.to_string()));
        }
        let mut out = [0u8; DIGEST_LEN];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk)
                .map_err(|_| Error::InvalidDigest(hex.to_string()))?;
            out[i] = u8::from_str_radix(pair, 16)
                .map_err(|_| Error::InvalidDigest(hex.to_string()))?;
        }
        Ok(Digest(out))
    }

    /// Storage path for this digest: the first two hex pairs become
    /// directories, the rest is the file name (`aabbcc…` → `aa/bb/cc…`).
    pub fn hashed_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}/{}", &hex[..2], &hex[2..4], &hex[4..])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Digest::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_is_deterministic() {
        let a = Digest::compute(b"hello");
        let b = Digest::compute(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_payloads_distinct_digests() {
        assert_ne!(Digest::compute(b"hello"), Digest::compute(b"hello!"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let d = Digest::compute(b"roundtrip");
        let hex = d.to_hex();
        assert_eq!(hex.len(), 40);
        assert_eq!(Digest::from_hex(&hex).unwrap(), d);
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Digest::from_hex("short").is_err());
        assert!(Digest::from_hex(&"z".repeat(40)).is_err());
    }

    #[test]
    fn test_zero_digest() {
        assert!(Digest::ZERO.is_zero());
        assert_eq!(Digest::ZERO.to_hex(), "0".repeat(40));
        assert!(!Digest::compute(b"x").is_zero());
    }

    #[test]
    fn test_hashed_path_layout() {
        let d = Digest::from_hex(&format!("aabb{}", "c".repeat(36))).unwrap();
        let path = d.hashed_path();
        assert!(path.starts_with("aa/bb/"));
        assert_eq!(path.len(), 2 + 1 + 2 + 1 + 36);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let d = Digest::compute(b"serde");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{}\"", d.to_hex()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}

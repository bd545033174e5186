//! Write-path configuration.
//!
//! One small struct threaded from the repo down to every series. The
//! defaults are the ones the tests and tooling assume; serde support exists
//! so deployments can load it from a config file.

use lakota_core::Compression;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Maximum rows per column segment before a frame is sliced
    /// (default: 100_000).
    #[serde(default = "default_segment_max_rows")]
    pub segment_max_rows: usize,

    /// Codec for column bytes (default: LZ4).
    #[serde(default = "default_compression")]
    pub compression: Compression,

    /// Opaque writer identity recorded in every revision payload; used as
    /// the final merge tie-break. Defaults to a fresh random token.
    #[serde(default = "default_author")]
    pub author: String,

    /// Retry attempts for transient backend faults during push/pull
    /// (default: 3).
    #[serde(default = "default_sync_retries")]
    pub sync_retries: u32,

    /// Initial backoff between retries, doubled per attempt
    /// (default: 100ms).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            segment_max_rows: default_segment_max_rows(),
            compression: default_compression(),
            author: default_author(),
            sync_retries: default_sync_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_segment_max_rows() -> usize {
    100_000
}

fn default_compression() -> Compression {
    Compression::Lz4
}

fn default_author() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("w-{}", &id[..8])
}

fn default_sync_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WriteConfig::default();
        assert_eq!(config.segment_max_rows, 100_000);
        assert_eq!(config.compression, Compression::Lz4);
        assert!(config.author.starts_with("w-"));
        assert_eq!(config.sync_retries, 3);
    }

    #[test]
    fn test_authors_are_distinct() {
        assert_ne!(WriteConfig::default().author, WriteConfig::default().author);
    }

    #[test]
    fn test_serde_fills_defaults() {
        let config: WriteConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.segment_max_rows, 100_000);
    }
}

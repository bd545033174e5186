//! Push / pull between collections.
//!
//! The algorithm is a digest diff: list the remote revisions absent from
//! the local changelog, then copy each one's dependencies before the
//! revision entry itself — segment objects first, the tiny changelog file
//! last. A crash mid-pull therefore never leaves a revision that references
//! missing segments, and a rerun picks up exactly where it stopped.
//! Repeated pulls are no-ops once converged.
//!
//! Transient backend faults are retried with exponential backoff; missing
//! objects and integrity failures are surfaced immediately.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use lakota_storage::Pod;

use crate::collection::Collection;
use crate::commit::CommitPayload;
use crate::config::WriteConfig;
use crate::error::{Error, Result};

/// Counts of objects moved by one push/pull.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Changelog entries copied.
    pub revisions: usize,
    /// Content-addressed objects copied (segment columns, schema
    /// documents).
    pub objects: usize,
}

impl SyncStats {
    pub fn merge(&mut self, other: SyncStats) {
        self.revisions += other.revisions;
        self.objects += other.objects;
    }

    pub fn is_noop(&self) -> bool {
        self.revisions == 0 && self.objects == 0
    }
}

fn is_retryable(err: &Error) -> bool {
    matches!(err, Error::Storage(e) if e.is_retryable())
}

/// Run `op`, retrying transient backend faults with doubling backoff.
pub(crate) async fn with_retry<T, F, Fut>(config: &WriteConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = config.retry_backoff_ms;
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.sync_retries && is_retryable(&e) => {
                warn!(error = %e, attempt, "transient backend fault, retrying");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                backoff = backoff.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Copy every revision `remote` has and `local` lacks, dependencies first.
/// The two collections may carry different names — the copied entries land
/// under `local`'s changelog prefix unchanged.
pub(crate) async fn pull_collection(local: &Collection, remote: &Collection) -> Result<SyncStats> {
    let remote_state = remote.changelog().state().await?;
    let local_names = local.changelog().state().await?.names();

    // Ascending child (epoch, digest) order: parents land before children.
    let mut missing: Vec<_> = remote_state
        .revisions
        .iter()
        .filter(|rev| !local_names.contains(&rev.name()))
        .cloned()
        .collect();
    missing.sort_by(|a, b| (&a.child, &a.parent).cmp(&(&b.child, &b.parent)));

    let mut stats = SyncStats::default();
    for rev in &missing {
        let payload_bytes = with_retry(local.config(), || {
            remote.changelog().payload(&remote_state, rev)
        })
        .await?;
        let payload = CommitPayload::decode(&payload_bytes)?;

        for entry in &payload.entries {
            for seg in &entry.segments {
                for (_, digest) in &seg.columns {
                    if local.store().contains(digest).await? {
                        continue;
                    }
                    let data = with_retry(local.config(), || async {
                        remote.store().get(digest).await.map_err(Error::from)
                    })
                    .await?;
                    local.store().put(&data).await?;
                    stats.objects += 1;
                }
            }
        }

        let key = local.changelog().entry_key(&rev.name());
        with_retry(local.config(), || async {
            local
                .changelog()
                .pod()
                .write(&key, &payload_bytes)
                .await
                .map_err(Error::from)
        })
        .await?;
        stats.revisions += 1;
    }

    if !stats.is_noop() {
        info!(
            from = %remote.label(),
            to = %local.label(),
            revisions = stats.revisions,
            objects = stats.objects,
            "pulled collection"
        );
    }
    Ok(stats)
}

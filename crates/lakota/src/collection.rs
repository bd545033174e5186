//! A namespace of series sharing one schema and one changelog.
//!
//! The collection is where forks get reconciled: `merge` finds the common
//! ancestor of all heads, unions the per-head deltas with later epochs
//! winning, and commits one revision per head — all sharing a single child
//! identifier, so the log keeps its one-parent-per-entry shape while every
//! former head converges on the same payload.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use lakota_core::Schema;
use lakota_storage::{ContentStore, Pod};

use crate::changelog::{Changelog, Revision, RevisionId};
use crate::commit::{CommitPayload, SeriesEntry};
use crate::config::WriteConfig;
use crate::error::{Error, Result};
use crate::series::{shadow, sort_pieces, Series};
use crate::sync::{pull_collection, SyncStats};

#[derive(Clone, Debug)]
pub struct Collection {
    label: String,
    schema: Schema,
    store: ContentStore,
    changelog: Changelog,
    config: WriteConfig,
}

impl Collection {
    pub(crate) fn new(
        label: String,
        schema: Schema,
        pod: Arc<dyn Pod>,
        prefix: String,
        config: WriteConfig,
    ) -> Self {
        Collection {
            label,
            schema,
            store: ContentStore::new(pod.clone()),
            changelog: Changelog::new(pod, prefix),
            config,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn changelog(&self) -> &Changelog {
        &self.changelog
    }

    pub(crate) fn store(&self) -> &ContentStore {
        &self.store
    }

    pub(crate) fn config(&self) -> &WriteConfig {
        &self.config
    }

    /// Handle on one named series.
    pub fn series(&self, name: &str) -> Result<Series> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidLabel(name.to_string()));
        }
        Ok(Series::new(
            name.to_string(),
            self.schema.clone(),
            self.store.clone(),
            self.changelog.clone(),
            self.config.clone(),
        ))
    }

    /// Sorted names of every series visible from the latest head.
    pub async fn ls(&self) -> Result<Vec<String>> {
        let state = self.changelog.state().await?;
        let Some(head) = state.head().cloned() else {
            return Ok(Vec::new());
        };
        let mut names = HashSet::new();
        for rev in state.ancestry(&head.child) {
            let payload = CommitPayload::decode(&self.changelog.payload(&state, &rev).await?)?;
            names.extend(payload.entries.into_iter().map(|e| e.series));
        }
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort();
        Ok(names)
    }

    /// Reconcile diverging heads.
    ///
    /// Deltas from the common ancestor to each head are unioned with later
    /// epochs winning (ties: larger child digest, then author token), then
    /// resolved through the same interval subtraction reads use, so the
    /// merge payload again has disjoint, sorted intervals per series. One
    /// revision per head is committed, all sharing the merge child.
    /// Returns the new revisions, empty when already converged.
    pub async fn merge(&self) -> Result<Vec<Revision>> {
        let state = self.changelog.state().await?;
        let leafs: Vec<Revision> = state.leafs().into_iter().cloned().collect();

        let distinct: HashSet<_> = leafs.iter().map(|r| r.child.digest).collect();
        if distinct.len() < 2 {
            return Ok(Vec::new());
        }

        // Ancestor sets per head; their intersection is shared history.
        let ancestor_sets: Vec<HashSet<RevisionId>> = leafs
            .iter()
            .map(|leaf| {
                state
                    .ancestry(&leaf.child)
                    .into_iter()
                    .map(|r| r.child)
                    .collect()
            })
            .collect();
        let common: HashSet<RevisionId> = ancestor_sets
            .iter()
            .skip(1)
            .fold(ancestor_sets[0].clone(), |acc, set| {
                acc.intersection(set).cloned().collect()
            });
        debug!(
            collection = %self.label,
            heads = leafs.len(),
            shared = common.len(),
            "merging heads"
        );

        // Union of deltas, deduped by child id, ascending (epoch, digest).
        // Entries inside one payload keep their order; the author token
        // settles nothing further since equal digests mean equal payloads.
        let mut delta_revs: BTreeMap<RevisionId, Revision> = BTreeMap::new();
        for leaf in &leafs {
            for rev in state.ancestry(&leaf.child) {
                if !common.contains(&rev.child) {
                    delta_revs.entry(rev.child.clone()).or_insert(rev);
                }
            }
        }

        let mut entries_by_series: BTreeMap<String, Vec<SeriesEntry>> = BTreeMap::new();
        for rev in delta_revs.values() {
            let payload = CommitPayload::decode(&self.changelog.payload(&state, rev).await?)?;
            for entry in payload.entries {
                entries_by_series
                    .entry(entry.series.clone())
                    .or_default()
                    .push(entry);
            }
        }

        // Resolve overlaps eagerly so the committed payload honors the
        // disjoint-and-sorted invariant.
        let mut merged_entries = Vec::new();
        for (series, entries) in &entries_by_series {
            let refs: Vec<&SeriesEntry> = entries.iter().collect();
            let mut pieces = shadow(&refs);
            sort_pieces(&mut pieces);
            for piece in pieces {
                merged_entries.push(SeriesEntry {
                    series: series.clone(),
                    interval: piece.keep,
                    segments: vec![piece.seg],
                });
            }
        }

        let payload = CommitPayload::new(self.config.author.clone(), merged_entries);

        let mut parents = Vec::new();
        let mut seen = HashSet::new();
        for leaf in &leafs {
            if seen.insert(leaf.child.clone()) {
                parents.push(leaf.child.clone());
            }
        }

        let revs = self.changelog.commit(&parents, &payload.encode()).await?;
        info!(collection = %self.label, parents = parents.len(), "merged");
        Ok(revs)
    }

    /// Copy everything `remote` has that we lack: segment objects first,
    /// then revision entries, so a partial failure never leaves a dangling
    /// revision. Works across differently-named collections — the data
    /// lands under this collection's prefix.
    pub async fn pull(&self, remote: &Collection) -> Result<SyncStats> {
        pull_collection(self, remote).await
    }

    /// `self.push(remote)` is `remote.pull(self)`.
    pub async fn push(&self, remote: &Collection) -> Result<SyncStats> {
        remote.pull(self).await
    }
}

//! Top-level repository.
//!
//! The registry of collections is not a special format: it is a collection
//! itself, living under the zero digest's hashed path, with one series
//! (`collection`) mapping names to schema digests. Creating a collection is
//! a normal series write covering only `[name, name]`, so concurrent
//! creations of different names never shadow each other, and the repo's own
//! state is versioned, forked and merged by the exact machinery it manages.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use lakota_core::{Array, ColumnDef, DType, Digest, Frame, Key, Schema};
use lakota_storage::{from_uri, from_uris, ContentStore, Pod};

use crate::changelog::{Changelog, Revision};
use crate::collection::Collection;
use crate::commit::CommitPayload;
use crate::config::WriteConfig;
use crate::error::{Error, Result};
use crate::segment::SegmentReader;
use crate::sync::{with_retry, SyncStats};

/// The registry series every collection row lives in.
const REGISTRY_SERIES: &str = "collection";

fn registry_schema() -> Schema {
    Schema::new(vec![
        ColumnDef::key("name", DType::Str),
        ColumnDef::value("schema", DType::Str),
    ])
    .expect("static registry schema is valid")
}

pub struct Repo {
    pod: Arc<dyn Pod>,
    store: ContentStore,
    config: WriteConfig,
    registry: Collection,
}

impl Repo {
    /// Open a repository over a single storage location.
    pub fn open(uri: &str) -> Result<Repo> {
        Ok(Repo::with_pod(from_uri(uri)?, WriteConfig::default()))
    }

    /// Open over an ordered URI list: first is the cache tier, last is
    /// authoritative.
    pub fn open_many(uris: &[&str]) -> Result<Repo> {
        Ok(Repo::with_pod(from_uris(uris)?, WriteConfig::default()))
    }

    pub fn with_pod(pod: Arc<dyn Pod>, config: WriteConfig) -> Repo {
        let registry = Collection::new(
            "registry".to_string(),
            registry_schema(),
            pod.clone(),
            Digest::ZERO.hashed_path(),
            config.clone(),
        );
        Repo {
            store: ContentStore::new(pod.clone()),
            pod,
            config,
            registry,
        }
    }

    pub fn config(&self) -> &WriteConfig {
        &self.config
    }

    /// The registry collection; exposed mostly for merge and inspection.
    pub fn registry(&self) -> &Collection {
        &self.registry
    }

    fn collection_prefix(name: &str) -> String {
        Digest::compute(name.as_bytes()).hashed_path()
    }

    fn make_collection(&self, name: &str, schema: Schema) -> Collection {
        Collection::new(
            name.to_string(),
            schema,
            self.pod.clone(),
            Self::collection_prefix(name),
            self.config.clone(),
        )
    }

    /// Current registry rows: `(collection name, schema digest)`.
    async fn registry_rows(&self) -> Result<Vec<(String, Digest)>> {
        let series = self.registry.series(REGISTRY_SERIES)?;
        let frame = series.read(None, None).await?;
        let (Some(Array::Str(names)), Some(Array::Str(digests))) =
            (frame.column("name"), frame.column("schema"))
        else {
            return Ok(Vec::new());
        };
        names
            .iter()
            .zip(digests)
            .map(|(name, hex)| {
                let digest = Digest::from_hex(hex).map_err(|_| {
                    Error::Integrity(format!("registry row for {name} holds bad digest {hex}"))
                })?;
                Ok((name.clone(), digest))
            })
            .collect()
    }

    async fn registry_lookup(&self, name: &str) -> Result<Option<Digest>> {
        let series = self.registry.series(REGISTRY_SERIES)?;
        let key = Key::single(name);
        let frame = series.read(Some(&key), Some(&key)).await?;
        if frame.is_empty() {
            return Ok(None);
        }
        let Some(Array::Str(digests)) = frame.column("schema") else {
            return Ok(None);
        };
        let hex = &digests[digests.len() - 1];
        let digest = Digest::from_hex(hex).map_err(|_| {
            Error::Integrity(format!("registry row for {name} holds bad digest {hex}"))
        })?;
        Ok(Some(digest))
    }

    /// Register a new collection. The schema document goes into the content
    /// store; the registry gains one row covering `[name, name]`.
    pub async fn create_collection(&self, schema: &Schema, name: &str) -> Result<Collection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidLabel(name.to_string()));
        }
        if self.registry_lookup(name).await?.is_some() {
            return Err(Error::CollectionExists(name.to_string()));
        }

        self.store.put(&schema.to_bytes()).await?;
        let row = Frame::new(
            registry_schema(),
            vec![
                ("name".to_string(), Array::from(vec![name])),
                (
                    "schema".to_string(),
                    Array::from(vec![schema.digest().to_hex()]),
                ),
            ],
        )?;
        self.registry.series(REGISTRY_SERIES)?.write(&row).await?;
        debug!(collection = name, "created collection");
        Ok(self.make_collection(name, schema.clone()))
    }

    /// Existing collection with a matching schema, or create it.
    pub(crate) async fn ensure_collection(
        &self,
        schema: &Schema,
        name: &str,
    ) -> Result<Collection> {
        match self.registry_lookup(name).await? {
            Some(digest) if digest == schema.digest() => {
                Ok(self.make_collection(name, schema.clone()))
            }
            Some(_) => Err(Error::SchemaMismatch(name.to_string())),
            None => self.create_collection(schema, name).await,
        }
    }

    /// Open a registered collection, or `None`.
    pub async fn collection(&self, name: &str) -> Result<Option<Collection>> {
        let Some(digest) = self.registry_lookup(name).await? else {
            return Ok(None);
        };
        let data = match self.store.get(&digest).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                return Err(Error::Integrity(format!(
                    "schema object {digest} for collection {name} is missing"
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let schema = Schema::from_bytes(&data)?;
        Ok(Some(self.make_collection(name, schema)))
    }

    /// Sorted collection names.
    pub async fn ls(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .registry_rows()
            .await?
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Bring everything `remote` has into this repo: registry first, then
    /// schema documents, then each collection. Idempotent.
    pub async fn pull(&self, remote: &Repo) -> Result<SyncStats> {
        let mut stats = self.registry.pull(&remote.registry).await?;

        // A pull can fork the registry (collections created on both ends);
        // merge it right away so every collection is enumerable below.
        // Collection changelogs are left forked for the caller to merge.
        self.registry.merge().await?;

        // Schema documents are referenced by digest from registry rows, not
        // by segments, so they are copied separately.
        for (name, digest) in self.registry_rows().await? {
            if self.store.contains(&digest).await? {
                continue;
            }
            let data = with_retry(&self.config, || async {
                remote.store.get(&digest).await.map_err(Error::from)
            })
            .await
            .map_err(|e| match e {
                Error::Storage(s) if s.is_not_found() => Error::Integrity(format!(
                    "schema object {digest} for collection {name} is missing from remote"
                )),
                other => other,
            })?;
            self.store.put(&data).await?;
            stats.objects += 1;
        }

        for name in remote.ls().await? {
            let Some(remote_clct) = remote.collection(&name).await? else {
                continue;
            };
            let local_clct = self.ensure_collection(remote_clct.schema(), &name).await?;
            stats.merge(local_clct.pull(&remote_clct).await?);
        }

        info!(
            revisions = stats.revisions,
            objects = stats.objects,
            "repo pull complete"
        );
        Ok(stats)
    }

    pub async fn push(&self, remote: &Repo) -> Result<SyncStats> {
        remote.pull(self).await
    }

    /// Merge the registry's heads; needed after collections were created
    /// concurrently on both ends of a sync.
    pub async fn merge(&self) -> Result<Vec<Revision>> {
        self.registry.merge().await
    }

    /// Garbage-collect unreferenced content objects.
    ///
    /// Walks every changelog ever referenced by any registry revision,
    /// keeps every segment column and schema document those revisions can
    /// reach, and deletes the rest of the content-addressed files. Returns
    /// the number of deleted objects. Changelog entries are never touched.
    pub async fn gc(&self) -> Result<usize> {
        let mut referenced: HashSet<Digest> = HashSet::new();
        let mut collection_names: HashSet<String> = HashSet::new();

        // The registry itself: its segments hold every (name, schema) row
        // ever written, which also names every collection prefix in use.
        let reg_state = self.registry.changelog().state().await?;
        let reader = SegmentReader::new(self.registry.store(), self.registry.schema());
        for rev in &reg_state.revisions {
            let payload =
                CommitPayload::decode(&self.registry.changelog().payload(&reg_state, rev).await?)?;
            for entry in &payload.entries {
                for seg in &entry.segments {
                    for (_, digest) in &seg.columns {
                        referenced.insert(*digest);
                    }
                    let rows = reader.read(seg, &seg.interval()).await?;
                    if let (Some(Array::Str(names)), Some(Array::Str(digests))) =
                        (rows.column("name"), rows.column("schema"))
                    {
                        for (name, hex) in names.iter().zip(digests) {
                            collection_names.insert(name.clone());
                            if let Ok(digest) = Digest::from_hex(hex) {
                                referenced.insert(digest);
                            }
                        }
                    }
                }
            }
        }

        // Every collection changelog, every revision, every segment.
        for name in &collection_names {
            let changelog = Changelog::new(self.pod.clone(), Self::collection_prefix(name));
            let state = changelog.state().await?;
            for rev in &state.revisions {
                let payload = CommitPayload::decode(&changelog.payload(&state, rev).await?)?;
                for entry in &payload.entries {
                    for seg in &entry.segments {
                        for (_, digest) in &seg.columns {
                            referenced.insert(*digest);
                        }
                    }
                }
            }
        }

        // Sweep: content objects are exactly the three-component keys under
        // two-hex-char top directories; changelog entries live deeper.
        let mut deleted = 0usize;
        let top = match self.pod.ls("").await {
            Ok(top) => top,
            Err(e) if e.is_not_found() => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        for dir in top {
            if dir.len() != 2 || !dir.chars().all(|c| c.is_ascii_hexdigit()) {
                continue;
            }
            for key in self.pod.walk(&dir).await? {
                let parts: Vec<&str> = key.split('/').collect();
                if parts.len() != 3 {
                    continue;
                }
                let hex: String = parts.concat();
                let Ok(digest) = Digest::from_hex(&hex) else {
                    continue;
                };
                if referenced.contains(&digest) {
                    continue;
                }
                match self.pod.rm(&key).await {
                    Ok(()) => deleted += 1,
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        info!(deleted, "gc complete");
        Ok(deleted)
    }
}

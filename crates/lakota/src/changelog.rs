//! Per-collection changelog.
//!
//! An append-only, fork-capable log of revisions stored as tiny objects
//! under the collection's prefix. The file name carries the whole DAG
//! structure:
//!
//! ```text
//! {parent_epoch}-{parent_digest}.{child_epoch}-{child_digest}
//! ```
//!
//! so parent discovery is a prefix scan and no two writers can ever collide
//! on a name without also agreeing on the bytes. The body is the revision
//! payload; the child digest is the digest of that body, which makes every
//! payload read self-verifying.
//!
//! Concurrent commits against the same parent simply fork the log. Nothing
//! here prevents that — `merge` reconciles it later, and readers pin a
//! deterministic head.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, info};

use lakota_core::Digest;
use lakota_storage::Pod;

use crate::error::{Error, Result};

/// Epochs are 44-bit millisecond counters, rendered as 11 hex chars.
const EPOCH_MASK: u64 = (1 << 44) - 1;
const PACK_VERSION: u8 = 1;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
        & EPOCH_MASK
}

/// One endpoint of a changelog entry: epoch plus payload digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionId {
    pub epoch: u64,
    pub digest: Digest,
}

impl RevisionId {
    /// The `phi` identifier: parent of every root revision.
    pub fn zero() -> Self {
        RevisionId {
            epoch: 0,
            digest: Digest::ZERO,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.epoch == 0 && self.digest.is_zero()
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (epoch, digest) = s
            .split_once('-')
            .ok_or_else(|| Error::MalformedName(s.to_string()))?;
        let epoch =
            u64::from_str_radix(epoch, 16).map_err(|_| Error::MalformedName(s.to_string()))?;
        let digest =
            Digest::from_hex(digest).map_err(|_| Error::MalformedName(s.to_string()))?;
        Ok(RevisionId { epoch, digest })
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:011x}-{}", self.epoch, self.digest)
    }
}

/// One changelog entry. Merge points appear as several entries sharing one
/// child identifier; every entry still has exactly one parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub parent: RevisionId,
    pub child: RevisionId,
    pub is_leaf: bool,
}

impl Revision {
    pub fn name(&self) -> String {
        format!("{}.{}", self.parent, self.child)
    }

    pub fn from_name(name: &str) -> Result<Self> {
        let (parent, child) = name
            .split_once('.')
            .ok_or_else(|| Error::MalformedName(name.to_string()))?;
        Ok(Revision {
            parent: RevisionId::parse(parent)?,
            child: RevisionId::parse(child)?,
            is_leaf: false,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.child.epoch
    }
}

/// Snapshot of the log, loaded once per operation so readers see a fixed
/// revision set.
#[derive(Debug, Default)]
pub(crate) struct LogState {
    /// Depth-first DAG order, leaves marked.
    pub revisions: Vec<Revision>,
    /// Payload bodies recovered from pack objects, keyed by entry name.
    pub packed: HashMap<String, Bytes>,
}

impl LogState {
    pub fn leafs(&self) -> Vec<&Revision> {
        self.revisions.iter().filter(|r| r.is_leaf).collect()
    }

    /// Deterministic "latest" head: maximum `(epoch, digest)` among leaves.
    pub fn head(&self) -> Option<&Revision> {
        self.leafs().into_iter().max_by_key(|r| r.child.clone())
    }

    pub fn find(&self, child: &RevisionId) -> Option<&Revision> {
        self.revisions.iter().find(|r| &r.child == child)
    }

    pub fn names(&self) -> HashSet<String> {
        self.revisions.iter().map(Revision::name).collect()
    }

    /// Every revision reachable backwards from `target`, one entry per
    /// child identifier, ascending by `(epoch, digest)`. With merge points
    /// this fans out through all parents.
    pub fn ancestry(&self, target: &RevisionId) -> Vec<Revision> {
        let mut by_child: BTreeMap<RevisionId, Vec<&Revision>> = BTreeMap::new();
        for rev in &self.revisions {
            by_child.entry(rev.child.clone()).or_default().push(rev);
        }

        let mut out: BTreeMap<RevisionId, Revision> = BTreeMap::new();
        let mut queue = vec![target.clone()];
        while let Some(child) = queue.pop() {
            if child.is_zero() || out.contains_key(&child) {
                continue;
            }
            let Some(revs) = by_child.get(&child) else {
                continue;
            };
            // All entries for one child carry the same payload; keep the
            // first as representative but follow every parent.
            out.insert(child.clone(), (*revs[0]).clone());
            for rev in revs {
                queue.push(rev.parent.clone());
            }
        }
        out.into_values().collect()
    }

    /// Revisions strictly after `from` on the way to `to`, ascending.
    pub fn range(&self, from: Option<&RevisionId>, to: &RevisionId) -> Vec<Revision> {
        let excluded: HashSet<RevisionId> = match from {
            Some(from) => self
                .ancestry(from)
                .into_iter()
                .map(|r| r.child)
                .collect(),
            None => HashSet::new(),
        };
        self.ancestry(to)
            .into_iter()
            .filter(|r| !excluded.contains(&r.child))
            .collect()
    }
}

/// The changelog of one collection.
#[derive(Clone)]
pub struct Changelog {
    pod: Arc<dyn Pod>,
    prefix: String,
}

impl std::fmt::Debug for Changelog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Changelog")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl Changelog {
    pub fn new(pod: Arc<dyn Pod>, prefix: impl Into<String>) -> Self {
        Changelog {
            pod,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn pod(&self) -> &Arc<dyn Pod> {
        &self.pod
    }

    pub(crate) fn entry_key(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }

    fn pack_prefix(&self) -> String {
        format!("{}/pack", self.prefix)
    }

    /// Entry names currently stored loose (not packed).
    async fn loose_names(&self) -> Result<Vec<String>> {
        match self.pod.ls(&self.prefix).await {
            Ok(names) => Ok(names.into_iter().filter(|n| n.contains('.')).collect()),
            // A missing changelog directory is an empty history.
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn packed_entries(&self) -> Result<HashMap<String, Bytes>> {
        let mut entries = HashMap::new();
        let packs = match self.pod.ls(&self.pack_prefix()).await {
            Ok(names) => names,
            Err(e) if e.is_not_found() => return Ok(entries),
            Err(e) => return Err(e.into()),
        };
        for pack in packs {
            let key = format!("{}/{}", self.pack_prefix(), pack);
            let data = self.pod.read(&key).await?;
            decode_pack(&data, &mut entries)?;
        }
        Ok(entries)
    }

    /// Load a point-in-time snapshot: loose and packed entries, DAG-ordered
    /// with leaves marked.
    pub(crate) async fn state(&self) -> Result<LogState> {
        let packed = self.packed_entries().await?;
        let mut names: BTreeSet<String> = packed.keys().cloned().collect();
        names.extend(self.loose_names().await?);

        // Parent -> children, insertion-ordered by name so traversal is
        // stable across processes.
        let mut children: BTreeMap<String, Vec<Revision>> = BTreeMap::new();
        let mut all_children: HashSet<String> = HashSet::new();
        for name in &names {
            let rev = Revision::from_name(name)?;
            if rev.parent == rev.child {
                continue;
            }
            all_children.insert(rev.child.to_string());
            children.entry(rev.parent.to_string()).or_default().push(rev);
        }

        // Depth-first from the root generation, oldest branch first.
        let roots: Vec<&String> = children
            .keys()
            .filter(|parent| !all_children.contains(*parent))
            .collect();
        let mut queue: Vec<Revision> = roots
            .iter()
            .flat_map(|parent| children[*parent].clone())
            .rev()
            .collect();

        let mut revisions = Vec::new();
        // Merge points put several entries on one child; expand that
        // child's descendants only once.
        let mut expanded: HashSet<String> = HashSet::new();
        while let Some(mut rev) = queue.pop() {
            let child_str = rev.child.to_string();
            let kids = children.get(&child_str);
            rev.is_leaf = kids.map(|k| k.is_empty()).unwrap_or(true);
            if expanded.insert(child_str) {
                if let Some(kids) = kids {
                    queue.extend(kids.iter().cloned().rev());
                }
            }
            revisions.push(rev);
        }

        Ok(LogState { revisions, packed })
    }

    /// All revisions in DAG order.
    pub async fn log(&self) -> Result<Vec<Revision>> {
        Ok(self.state().await?.revisions)
    }

    /// Childless revisions.
    pub async fn leafs(&self) -> Result<Vec<Revision>> {
        Ok(self
            .state()
            .await?
            .leafs()
            .into_iter()
            .cloned()
            .collect())
    }

    /// The deterministic latest head, if any history exists.
    pub async fn head(&self) -> Result<Option<Revision>> {
        Ok(self.state().await?.head().cloned())
    }

    /// DAG traversal: revisions after `from` up to and including `to`.
    pub async fn walk(
        &self,
        from: Option<&RevisionId>,
        to: &RevisionId,
    ) -> Result<Vec<Revision>> {
        Ok(self.state().await?.range(from, to))
    }

    /// Append one revision per parent, all sharing a single child computed
    /// from the payload. Parents whose digest equals the child digest are
    /// skipped — committing the same payload twice is a no-op.
    pub async fn commit(&self, parents: &[RevisionId], payload: &[u8]) -> Result<Vec<Revision>> {
        let digest = Digest::compute(payload);
        let max_parent_epoch = parents.iter().map(|p| p.epoch).max().unwrap_or(0);
        let epoch = now_ms().max(max_parent_epoch + 1) & EPOCH_MASK;
        let child = RevisionId { epoch, digest };

        let mut seen: HashSet<&RevisionId> = HashSet::new();
        let mut revs = Vec::new();
        for parent in parents {
            if !seen.insert(parent) || parent.digest == digest {
                continue;
            }
            let rev = Revision {
                parent: parent.clone(),
                child: child.clone(),
                is_leaf: true,
            };
            debug!(name = %rev.name(), "commit revision");
            self.pod.write(&self.entry_key(&rev.name()), payload).await?;
            revs.push(rev);
        }
        Ok(revs)
    }

    /// Body of `rev`, verified against the child digest.
    pub(crate) async fn payload(&self, state: &LogState, rev: &Revision) -> Result<Bytes> {
        let data = match state.packed.get(&rev.name()) {
            Some(data) => data.clone(),
            None => self.pod.read(&self.entry_key(&rev.name())).await?,
        };
        let actual = Digest::compute(&data);
        if actual != rev.child.digest {
            return Err(Error::Integrity(format!(
                "revision {} payload digest mismatch ({actual})",
                rev.name()
            )));
        }
        Ok(data)
    }

    /// Verified body of `rev` against a fresh snapshot.
    pub async fn read_payload(&self, rev: &Revision) -> Result<Bytes> {
        let state = self.state().await?;
        self.payload(&state, rev).await
    }

    /// Rewrite the loose entries into a single packed object and delete
    /// them. Returns the number of entries packed. Purely an object-count
    /// optimization; readers merge packed and loose entries transparently.
    pub async fn pack(&self) -> Result<usize> {
        let mut names = self.loose_names().await?;
        names.sort();
        if names.is_empty() {
            return Ok(0);
        }

        let mut entries = Vec::with_capacity(names.len());
        for name in &names {
            let rev = Revision::from_name(name)?;
            let data = self.pod.read(&self.entry_key(name)).await?;
            if Digest::compute(&data) != rev.child.digest {
                return Err(Error::Integrity(format!(
                    "refusing to pack corrupt entry {name}"
                )));
            }
            entries.push((name.clone(), data));
        }

        let packed = encode_pack(&entries);
        let pack_name = Digest::compute(&packed).to_hex();
        self.pod
            .write(&format!("{}/{}", self.pack_prefix(), pack_name), &packed)
            .await?;

        for name in &names {
            match self.pod.rm(&self.entry_key(name)).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(count = names.len(), pack = %pack_name, "packed changelog");
        Ok(names.len())
    }
}

fn encode_pack(entries: &[(String, Bytes)]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u8(PACK_VERSION);
    buf.put_u32(entries.len() as u32);
    for (name, payload) in entries {
        buf.put_u16(name.len() as u16);
        buf.put_slice(name.as_bytes());
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload);
    }
    buf.to_vec()
}

fn decode_pack(data: &[u8], out: &mut HashMap<String, Bytes>) -> Result<()> {
    fn take<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
        if *pos + len > data.len() {
            return Err(Error::MalformedPayload(
                "truncated pack object".to_string(),
            ));
        }
        let slice = &data[*pos..*pos + len];
        *pos += len;
        Ok(slice)
    }
    let malformed = || Error::MalformedPayload("truncated pack object".to_string());
    let mut pos = 0usize;

    let version = take(data, &mut pos, 1)?[0];
    if version != PACK_VERSION {
        return Err(Error::MalformedPayload(format!(
            "unsupported pack version {version}"
        )));
    }
    let count = u32::from_be_bytes(take(data, &mut pos, 4)?.try_into().unwrap());
    for _ in 0..count {
        let name_len =
            u16::from_be_bytes(take(data, &mut pos, 2)?.try_into().unwrap()) as usize;
        let name = String::from_utf8(take(data, &mut pos, name_len)?.to_vec())
            .map_err(|_| malformed())?;
        let payload_len =
            u32::from_be_bytes(take(data, &mut pos, 4)?.try_into().unwrap()) as usize;
        let payload = Bytes::copy_from_slice(take(data, &mut pos, payload_len)?);
        out.insert(name, payload);
    }
    if pos != data.len() {
        return Err(malformed());
    }
    Ok(())
}

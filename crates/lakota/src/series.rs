//! One named, versioned table.
//!
//! A series combines the content store and its collection's changelog.
//! Writing slices a frame into segments and appends one revision claiming
//! the frame's key interval. Reading replays the revision chain: later
//! claims hide earlier ones over the overlap — interval subtraction, not
//! row diffing — then whatever survives is clipped to the caller's range,
//! fetched concurrently and concatenated in key order.
//!
//! The state machine is `{single-head, forked}`: writes against a forked
//! changelog pick the deterministic latest head and report the fork in
//! [`WriteOutcome::forked`]; reads see only that head until `merge`
//! reconverges the collection.

use std::cmp::Ordering;

use futures::future::try_join_all;
use tracing::debug;

use lakota_core::{Frame, Interval, Key, Schema, SegmentRef};
use lakota_storage::ContentStore;

use crate::changelog::{Changelog, Revision, RevisionId};
use crate::commit::{CommitPayload, SeriesEntry};
use crate::config::WriteConfig;
use crate::error::{Error, Result};
use crate::segment::{SegmentReader, SegmentWriter};

/// A surviving slice of one segment after shadow resolution.
#[derive(Debug, Clone)]
pub(crate) struct Piece {
    pub keep: Interval,
    pub seg: SegmentRef,
}

/// Replay entries in revision order: each claim trims every earlier piece
/// by interval subtraction, then contributes its own segments clipped to
/// the claimed interval.
pub(crate) fn shadow(entries: &[&SeriesEntry]) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = Vec::new();
    for entry in entries {
        let mut trimmed = Vec::with_capacity(pieces.len() + entry.segments.len());
        for piece in pieces {
            for keep in piece.keep.subtract(&entry.interval) {
                trimmed.push(Piece {
                    keep,
                    seg: piece.seg.clone(),
                });
            }
        }
        pieces = trimmed;
        for seg in &entry.segments {
            if let Some(keep) = seg.interval().intersect(&entry.interval) {
                pieces.push(Piece {
                    keep,
                    seg: seg.clone(),
                });
            }
        }
    }
    pieces
}

/// Key order over kept intervals. Subtraction already removed overlaps, so
/// ties can only differ in closedness; a closed start comes first.
pub(crate) fn sort_pieces(pieces: &mut [Piece]) {
    pieces.sort_by(|a, b| match a.keep.start.cmp(&b.keep.start) {
        Ordering::Equal => b.keep.closed.left().cmp(&a.keep.closed.left()),
        ord => ord,
    });
}

/// Result of a series write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// The revision now covering the written frame.
    pub revision: Revision,
    /// True when the collection has diverging heads after this write —
    /// not an error; `merge` reconciles.
    pub forked: bool,
}

pub struct Series {
    name: String,
    schema: Schema,
    store: ContentStore,
    changelog: Changelog,
    config: WriteConfig,
}

impl Series {
    pub(crate) fn new(
        name: String,
        schema: Schema,
        store: ContentStore,
        changelog: Changelog,
        config: WriteConfig,
    ) -> Self {
        Series {
            name,
            schema,
            store,
            changelog,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Persist `frame`: store its segments, then append a revision claiming
    /// `[frame.start, frame.stop]` under this series' name, parented on the
    /// deterministic latest head.
    pub async fn write(&self, frame: &Frame) -> Result<WriteOutcome> {
        if frame.is_empty() {
            return Err(lakota_core::Error::EmptyFrame.into());
        }
        if frame.schema() != &self.schema {
            return Err(Error::SchemaMismatch(self.name.clone()));
        }

        let segments = SegmentWriter::new(&self.store, &self.config)
            .write(frame)
            .await?;
        let interval = Interval::closed(
            frame.start().expect("frame is non-empty"),
            frame.stop().expect("frame is non-empty"),
        );
        debug!(series = %self.name, rows = frame.len(), segments = segments.len(), %interval, "write");

        let head = self.changelog.head().await?;
        let parent = head
            .as_ref()
            .map(|h| h.child.clone())
            .unwrap_or_else(RevisionId::zero);

        let payload = CommitPayload::new(
            self.config.author.clone(),
            vec![SeriesEntry {
                series: self.name.clone(),
                interval,
                segments,
            }],
        );
        let mut revs = self.changelog.commit(&[parent], &payload.encode()).await?;

        let revision = match revs.pop() {
            Some(rev) => rev,
            // Same payload as the head: the write was already recorded.
            None => head.expect("double write implies an existing head"),
        };

        let state = self.changelog.state().await?;
        let head_digests: std::collections::HashSet<_> =
            state.leafs().iter().map(|r| r.child.digest).collect();

        Ok(WriteOutcome {
            revision,
            forked: head_digests.len() > 1,
        })
    }

    /// Read `[lo, hi]` (both inclusive, either open-ended) at the latest
    /// head.
    pub async fn read(&self, lo: Option<&Key>, hi: Option<&Key>) -> Result<Frame> {
        self.read_at(lo, hi, None).await
    }

    /// Read at a pinned revision. The snapshot of the changelog is taken
    /// once, so the result is stable however long the fetch takes.
    pub async fn read_at(
        &self,
        lo: Option<&Key>,
        hi: Option<&Key>,
        at: Option<&RevisionId>,
    ) -> Result<Frame> {
        let state = self.changelog.state().await?;
        let target = match at {
            Some(id) => state
                .find(id)
                .cloned()
                .ok_or_else(|| Error::RevisionNotFound(id.to_string()))?,
            None => match state.head() {
                Some(head) => head.clone(),
                None => return Ok(Frame::empty(self.schema.clone())),
            },
        };

        let mut entries = Vec::new();
        for rev in state.ancestry(&target.child) {
            let data = self.changelog.payload(&state, &rev).await?;
            let payload = CommitPayload::decode(&data)?;
            entries.extend(
                payload
                    .entries
                    .into_iter()
                    .filter(|e| e.series == self.name),
            );
        }

        let entry_refs: Vec<&SeriesEntry> = entries.iter().collect();
        let mut pieces: Vec<Piece> = shadow(&entry_refs)
            .into_iter()
            .filter_map(|p| {
                p.keep
                    .clamp(lo, hi)
                    .map(|keep| Piece { keep, seg: p.seg })
            })
            .collect();
        sort_pieces(&mut pieces);

        let reader = SegmentReader::new(&self.store, &self.schema);
        let frames =
            try_join_all(pieces.iter().map(|p| reader.read(&p.seg, &p.keep))).await?;
        Ok(Frame::concat(&self.schema, &frames)?)
    }
}

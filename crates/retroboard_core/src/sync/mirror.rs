//! In-memory mirror of one board's buckets and notes.
//!
//! # Responsibility
//! - Hold the derived view a board session renders and exports from.
//! - Apply bucket and note collection updates in receipt order.
//!
//! # Invariants
//! - Only the session's coordinator task mutates a mirror; readers receive
//!   immutable `Arc` snapshots.
//! - Buckets are kept in `ordinal` order (ties in store order); each
//!   bucket's notes are kept in display order.
//! - The mirror is eventually consistent. A bucket may be present with
//!   `notes_loaded == false` until its note subscription delivers; this is
//!   the expected steady state between updates, not an error.
//! - A failed note subscription is visible as `BucketView::notes_error`
//!   until a later delivery for that bucket clears it.

use crate::model::board::{Board, BoardId, Bucket, BucketId};
use crate::model::note::Note;
use crate::ordering::sort_notes;
use crate::store::StoreError;
use std::collections::HashSet;

/// One bucket and its currently mirrored notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketView {
    pub bucket: Bucket,
    /// Notes in display order.
    pub notes: Vec<Note>,
    /// Whether the bucket's note subscription has delivered at least once.
    pub notes_loaded: bool,
    /// Last note subscription failure, cleared by the next delivery.
    pub notes_error: Option<StoreError>,
}

/// Bucket ids added and removed by one bucket-list update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketDiff {
    pub added: Vec<BucketId>,
    pub removed: Vec<BucketId>,
}

/// Derived, eventually-consistent copy of one board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardMirror {
    pub board_id: BoardId,
    /// `None` until the board record is seen, or after it is deleted.
    pub board: Option<Board>,
    pub buckets: Vec<BucketView>,
    /// Whether the bucket subscription has delivered at least once.
    pub buckets_loaded: bool,
    /// Incremented on every applied change.
    pub version: u64,
}

impl BoardMirror {
    pub fn new(board_id: impl Into<BoardId>) -> Self {
        Self {
            board_id: board_id.into(),
            board: None,
            buckets: Vec::new(),
            buckets_loaded: false,
            version: 0,
        }
    }

    pub fn bucket(&self, bucket_id: &str) -> Option<&BucketView> {
        self.buckets.iter().find(|view| view.bucket.id == bucket_id)
    }

    pub fn note(&self, bucket_id: &str, note_id: &str) -> Option<&Note> {
        self.bucket(bucket_id)?
            .notes
            .iter()
            .find(|note| note.id == note_id)
    }

    /// Bucket entities in display order.
    pub fn bucket_list(&self) -> Vec<Bucket> {
        self.buckets.iter().map(|view| view.bucket.clone()).collect()
    }

    /// Whether the bucket list and every mirrored bucket's notes arrived.
    pub fn all_notes_loaded(&self) -> bool {
        self.buckets_loaded && self.buckets.iter().all(|view| view.notes_loaded)
    }

    /// Buckets whose note subscription is currently failing.
    pub fn failed_buckets(&self) -> Vec<(&BucketId, &StoreError)> {
        self.buckets
            .iter()
            .filter_map(|view| {
                view.notes_error
                    .as_ref()
                    .map(|err| (&view.bucket.id, err))
            })
            .collect()
    }

    pub fn note_count(&self) -> usize {
        self.buckets.iter().map(|view| view.notes.len()).sum()
    }

    pub(crate) fn apply_board(&mut self, board: Option<Board>) {
        self.board = board;
        self.version += 1;
    }

    /// Replaces the bucket list, keeping notes of buckets that remain.
    pub(crate) fn apply_buckets(&mut self, mut buckets: Vec<Bucket>) -> BucketDiff {
        buckets.sort_by_key(|bucket| bucket.ordinal);

        let incoming: HashSet<&str> = buckets.iter().map(|bucket| bucket.id.as_str()).collect();
        let removed = self
            .buckets
            .iter()
            .filter(|view| !incoming.contains(view.bucket.id.as_str()))
            .map(|view| view.bucket.id.clone())
            .collect();

        let mut previous = std::mem::take(&mut self.buckets);
        let mut added = Vec::new();
        for bucket in buckets {
            match previous.iter().position(|view| view.bucket.id == bucket.id) {
                Some(index) => {
                    let mut view = previous.swap_remove(index);
                    view.bucket = bucket;
                    self.buckets.push(view);
                }
                None => {
                    added.push(bucket.id.clone());
                    self.buckets.push(BucketView {
                        bucket,
                        notes: Vec::new(),
                        notes_loaded: false,
                        notes_error: None,
                    });
                }
            }
        }

        self.buckets_loaded = true;
        self.version += 1;
        BucketDiff { added, removed }
    }

    /// Replaces one bucket's notes. Returns `false` for an unknown bucket.
    pub(crate) fn apply_notes(&mut self, bucket_id: &str, mut notes: Vec<Note>) -> bool {
        let Some(view) = self
            .buckets
            .iter_mut()
            .find(|view| view.bucket.id == bucket_id)
        else {
            return false;
        };
        sort_notes(&mut notes);
        view.notes = notes;
        view.notes_loaded = true;
        view.notes_error = None;
        self.version += 1;
        true
    }

    /// Records a note subscription failure. Returns `false` for an unknown
    /// bucket. Previously mirrored notes are kept.
    pub(crate) fn apply_notes_error(&mut self, bucket_id: &str, err: StoreError) -> bool {
        let Some(view) = self
            .buckets
            .iter_mut()
            .find(|view| view.bucket.id == bucket_id)
        else {
            return false;
        };
        if view.notes_error.as_ref() == Some(&err) {
            return false;
        }
        view.notes_error = Some(err);
        self.version += 1;
        true
    }

    /// Drops one note ahead of the store echo. Returns whether it was present.
    pub(crate) fn evict_note(&mut self, bucket_id: &str, note_id: &str) -> bool {
        let Some(view) = self
            .buckets
            .iter_mut()
            .find(|view| view.bucket.id == bucket_id)
        else {
            return false;
        };
        let before = view.notes.len();
        view.notes.retain(|note| note.id != note_id);
        if view.notes.len() == before {
            return false;
        }
        self.version += 1;
        true
    }
}

//! Export document built from a board mirror.
//!
//! # Responsibility
//! - Flatten the mirror into a normalized, serializable document.
//! - Provide ordered rows for consumers that render text or HTML.
//!
//! # Invariants
//! - Building an export is pure: no store access, same mirror gives the
//!   same document.
//! - Every mirrored note appears exactly once, keyed by bucket id then note
//!   id; buckets without notes are omitted.
//! - `votes` is the note's `totalVotes`, zero when unset.

use crate::model::board::BucketId;
use crate::model::note::NoteId;
use crate::sync::mirror::BoardMirror;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One exported note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    pub bucket_type: String,
    pub bucket_name: String,
    pub message: String,
    pub votes: i64,
}

/// Point-in-time projection: bucket id -> note id -> entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportDocument {
    buckets: BTreeMap<BucketId, BTreeMap<NoteId, ExportEntry>>,
}

/// Exported note in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub bucket_id: BucketId,
    pub note_id: NoteId,
    pub entry: ExportEntry,
}

impl ExportDocument {
    pub fn get(&self, bucket_id: &str, note_id: &str) -> Option<&ExportEntry> {
        self.buckets.get(bucket_id)?.get(note_id)
    }

    pub fn bucket(&self, bucket_id: &str) -> Option<&BTreeMap<NoteId, ExportEntry>> {
        self.buckets.get(bucket_id)
    }

    /// Total number of exported notes.
    pub fn len(&self) -> usize {
        self.buckets.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds the export document for the mirror's current contents.
pub fn build_export(mirror: &BoardMirror) -> ExportDocument {
    let mut buckets = BTreeMap::new();
    for row in export_rows(mirror) {
        buckets
            .entry(row.bucket_id)
            .or_insert_with(BTreeMap::new)
            .insert(row.note_id, row.entry);
    }
    ExportDocument { buckets }
}

/// Exported notes ordered by bucket, then by display order within a bucket.
pub fn export_rows(mirror: &BoardMirror) -> Vec<ExportRow> {
    mirror
        .buckets
        .iter()
        .flat_map(|view| {
            view.notes.iter().map(move |note| ExportRow {
                bucket_id: view.bucket.id.clone(),
                note_id: note.id.clone(),
                entry: ExportEntry {
                    bucket_type: view.bucket.kind.clone(),
                    bucket_name: view.bucket.name.clone(),
                    message: note.message.clone(),
                    votes: note.score(),
                },
            })
        })
        .collect()
}

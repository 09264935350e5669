//! Note domain model.
//!
//! # Responsibility
//! - Define the `Note` entity and its record mapping.
//!
//! # Invariants
//! - `votes` never contains an explicit "no vote" entry; malformed entries
//!   are dropped while mapping.
//! - `total_votes` is a cache of the store's `totalVotes` field. Its source
//!   of truth is `votes`; see `Note::is_consistent`.

use crate::model::board::BucketId;
use crate::model::record::{int_field, record_from, str_field, Record, RecordId, StoreEntry};
use crate::vote::{total_votes, votes_from_value, votes_to_value, VoteMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type NoteId = RecordId;

pub(crate) const FIELD_MESSAGE: &str = "message";
pub(crate) const FIELD_VOTES: &str = "votes";
pub(crate) const FIELD_TOTAL_VOTES: &str = "totalVotes";

/// Single feedback item with a message and votes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub bucket_id: BucketId,
    pub message: String,
    pub votes: VoteMap,
    /// `None` when the record carries no `totalVotes` field.
    pub total_votes: Option<i64>,
}

impl Note {
    /// Maps one `notes/{bucket_id}` collection entry.
    pub fn from_entry(bucket_id: &str, entry: &StoreEntry) -> Self {
        Self {
            id: entry.id.clone(),
            bucket_id: bucket_id.to_string(),
            message: str_field(&entry.record, FIELD_MESSAGE).unwrap_or_default(),
            votes: votes_from_value(entry.record.get(FIELD_VOTES)),
            total_votes: int_field(&entry.record, FIELD_TOTAL_VOTES),
        }
    }

    /// Builds the record written on note creation: empty votes, zero total.
    pub fn new_record(message: &str) -> Record {
        record_from([
            (FIELD_MESSAGE, Value::from(message)),
            (FIELD_VOTES, votes_to_value(&VoteMap::new())),
            (FIELD_TOTAL_VOTES, Value::from(0)),
        ])
    }

    /// Aggregate score with an absent total read as zero.
    pub fn score(&self) -> i64 {
        self.total_votes.unwrap_or(0)
    }

    /// Whether the cached total matches a recomputation from `votes`.
    pub fn is_consistent(&self) -> bool {
        self.score() == total_votes(&self.votes)
    }
}

#[cfg(test)]
mod tests {
    use super::Note;
    use crate::model::record::{record_from, StoreEntry};
    use serde_json::json;

    #[test]
    fn missing_votes_and_total_map_to_empty() {
        let entry = StoreEntry::new("n1", record_from([("message", json!("hi"))]));
        let note = Note::from_entry("k1", &entry);
        assert!(note.votes.is_empty());
        assert_eq!(note.total_votes, None);
        assert_eq!(note.score(), 0);
        assert!(note.is_consistent());
    }

    #[test]
    fn new_record_starts_with_zero_total() {
        let note = Note::from_entry("k1", &StoreEntry::new("n1", Note::new_record("Great demo")));
        assert_eq!(note.message, "Great demo");
        assert_eq!(note.total_votes, Some(0));
        assert!(note.votes.is_empty());
    }

    #[test]
    fn detects_drifted_total() {
        let entry = StoreEntry::new(
            "n1",
            record_from([
                ("message", json!("x")),
                ("votes", json!({"u1": true})),
                ("totalVotes", json!(5)),
            ]),
        );
        assert!(!Note::from_entry("k1", &entry).is_consistent());
    }
}

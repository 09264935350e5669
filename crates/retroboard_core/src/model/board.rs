//! Board and bucket domain model.
//!
//! # Responsibility
//! - Define `Board` and `Bucket` entities and their record mapping.
//! - Define `BucketTemplate`, the input shape used when creating buckets.
//!
//! # Invariants
//! - A board exclusively owns its buckets; `Bucket::board_id` always names
//!   the board collection the record was read from.
//! - Bucket order is carried by `ordinal`, never by record position.

use crate::model::record::{int_field, record_from, str_field, Record, RecordId, StoreEntry};
use crate::model::UserId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static NON_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

pub type BoardId = RecordId;
pub type BucketId = RecordId;

pub(crate) const FIELD_NAME: &str = "name";
pub(crate) const FIELD_OWNER: &str = "owner";
pub(crate) const FIELD_CREATED_AT: &str = "createdAt";
pub(crate) const FIELD_TYPE: &str = "type";
pub(crate) const FIELD_ORDINAL: &str = "ordinal";

/// Single retrospective session container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    /// Participant who created the board, when recorded.
    pub owner: Option<UserId>,
    /// Unix epoch milliseconds.
    pub created_at: Option<i64>,
}

impl Board {
    /// Maps one `boards` collection entry.
    pub fn from_entry(entry: &StoreEntry) -> Self {
        Self {
            id: entry.id.clone(),
            name: str_field(&entry.record, FIELD_NAME).unwrap_or_default(),
            owner: str_field(&entry.record, FIELD_OWNER),
            created_at: int_field(&entry.record, FIELD_CREATED_AT),
        }
    }

    /// Builds the record written on board creation.
    pub fn new_record(name: &str, owner: Option<&str>, created_at: i64) -> Record {
        let mut record = record_from([
            (FIELD_NAME, Value::from(name)),
            (FIELD_CREATED_AT, Value::from(created_at)),
        ]);
        if let Some(owner) = owner {
            record.insert(FIELD_OWNER.to_string(), Value::from(owner));
        }
        record
    }
}

/// Named category of notes within a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: BucketId,
    pub board_id: BoardId,
    pub name: String,
    /// Serialized as `type` to match the store field name.
    #[serde(rename = "type")]
    pub kind: String,
    pub ordinal: i64,
}

impl Bucket {
    /// Maps one `buckets/{board_id}` collection entry.
    ///
    /// `position` is used as the ordinal when the record carries none.
    pub fn from_entry(board_id: &str, position: usize, entry: &StoreEntry) -> Self {
        let fallback_ordinal = i64::try_from(position).unwrap_or(i64::MAX);
        Self {
            id: entry.id.clone(),
            board_id: board_id.to_string(),
            name: str_field(&entry.record, FIELD_NAME).unwrap_or_default(),
            kind: str_field(&entry.record, FIELD_TYPE).unwrap_or_default(),
            ordinal: int_field(&entry.record, FIELD_ORDINAL).unwrap_or(fallback_ordinal),
        }
    }

    /// Builds the record written on bucket creation.
    pub fn new_record(template: &BucketTemplate, ordinal: i64) -> Record {
        record_from([
            (FIELD_NAME, Value::from(template.name.as_str())),
            (FIELD_TYPE, Value::from(template.kind.as_str())),
            (FIELD_ORDINAL, Value::from(ordinal)),
        ])
    }
}

/// Name and type of a bucket to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTemplate {
    pub name: String,
    pub kind: String,
}

impl BucketTemplate {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Template for a caller-supplied name; the type is a slug of the name.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let kind = bucket_kind_slug(&name);
        Self { name, kind }
    }

    /// Built-in three-bucket retrospective layout.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("What went well?", "good"),
            Self::new("What can be improved?", "improve"),
            Self::new("Action items", "action"),
        ]
    }
}

/// Derives a lowercase `snake_case` bucket type from a display name.
///
/// Returns `custom` when the name has no ASCII alphanumerics.
pub fn bucket_kind_slug(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let slug = NON_SLUG_RE.replace_all(&lowered, "_");
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "custom".to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{bucket_kind_slug, Board, Bucket, BucketTemplate};
    use crate::model::record::{record_from, StoreEntry};
    use serde_json::json;

    #[test]
    fn slug_normalizes_punctuation_and_case() {
        assert_eq!(bucket_kind_slug("What went well?"), "what_went_well");
        assert_eq!(bucket_kind_slug("  Action -- Items "), "action_items");
        assert_eq!(bucket_kind_slug("???"), "custom");
    }

    #[test]
    fn bucket_mapping_falls_back_to_position_for_ordinal() {
        let entry = StoreEntry::new("k1", record_from([("name", json!("Well"))]));
        let bucket = Bucket::from_entry("b1", 3, &entry);
        assert_eq!(bucket.id, "k1");
        assert_eq!(bucket.board_id, "b1");
        assert_eq!(bucket.ordinal, 3);
        assert_eq!(bucket.kind, "");
    }

    #[test]
    fn bucket_record_roundtrips_through_mapping() {
        let record = Bucket::new_record(&BucketTemplate::new("Well", "good"), 0);
        let bucket = Bucket::from_entry("b1", 9, &StoreEntry::new("k1", record));
        assert_eq!(bucket.name, "Well");
        assert_eq!(bucket.kind, "good");
        assert_eq!(bucket.ordinal, 0);
    }

    #[test]
    fn board_owner_is_optional() {
        let record = Board::new_record("Sprint 1", None, 1_000);
        let board = Board::from_entry(&StoreEntry::new("b1", record));
        assert_eq!(board.name, "Sprint 1");
        assert_eq!(board.owner, None);
        assert_eq!(board.created_at, Some(1_000));
    }
}

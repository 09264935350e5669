//! Vote aggregation.
//!
//! # Responsibility
//! - Apply per-user vote toggles to a vote map.
//! - Recompute aggregate totals from the map.
//! - Normalize vote maps read from the store.
//!
//! # Invariants
//! - A user without an opinion is absent from the map.
//! - `total_votes(map)` is always `#true - #false`; totals are recomputed,
//!   never adjusted incrementally.
//! - Toggling the same direction twice restores the original map.

use crate::model::UserId;
use log::warn;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Per-user vote record: `true` = upvote, `false` = downvote.
pub type VoteMap = BTreeMap<UserId, bool>;

/// Result of one vote toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteToggle {
    pub votes: VoteMap,
    pub total_votes: i64,
}

/// Applies one vote from `user_id`.
///
/// Casting the vote the user already holds retracts it; otherwise the entry
/// is set to `want_upvote`, replacing an opposite vote.
pub fn toggle_vote(current: &VoteMap, user_id: &str, want_upvote: bool) -> VoteToggle {
    let mut votes = current.clone();
    if votes.get(user_id) == Some(&want_upvote) {
        votes.remove(user_id);
    } else {
        votes.insert(user_id.to_string(), want_upvote);
    }
    let total_votes = total_votes(&votes);
    VoteToggle { votes, total_votes }
}

/// Signed aggregate: upvotes minus downvotes.
pub fn total_votes(votes: &VoteMap) -> i64 {
    votes
        .values()
        .fold(0, |total, up| if *up { total + 1 } else { total - 1 })
}

/// Whether `user_id` currently holds a vote in the given direction.
pub fn has_voted(votes: &VoteMap, user_id: &str, upvote: bool) -> bool {
    votes.get(user_id) == Some(&upvote)
}

/// Reads a vote map from a raw store value.
///
/// Absent, `null` and non-object values read as an empty map. Entries that
/// are not booleans are dropped.
pub fn votes_from_value(value: Option<&Value>) -> VoteMap {
    let Some(value) = value else {
        return VoteMap::new();
    };
    let Some(entries) = value.as_object() else {
        if !value.is_null() {
            warn!("event=vote_map_normalized module=vote status=warn reason=not_object");
        }
        return VoteMap::new();
    };

    let mut votes = VoteMap::new();
    let mut dropped = 0usize;
    for (user_id, vote) in entries {
        match vote.as_bool() {
            Some(up) => {
                votes.insert(user_id.clone(), up);
            }
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(
            "event=vote_map_normalized module=vote status=warn reason=non_boolean_entry dropped={}",
            dropped
        );
    }
    votes
}

/// Encodes a vote map as a store value.
pub fn votes_to_value(votes: &VoteMap) -> Value {
    Value::Object(
        votes
            .iter()
            .map(|(user_id, up)| (user_id.clone(), Value::Bool(*up)))
            .collect::<Map<String, Value>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::{has_voted, toggle_vote, total_votes, votes_from_value, VoteMap};
    use serde_json::json;

    fn map(entries: &[(&str, bool)]) -> VoteMap {
        entries
            .iter()
            .map(|(user, up)| (user.to_string(), *up))
            .collect()
    }

    #[test]
    fn first_vote_is_recorded() {
        let toggled = toggle_vote(&VoteMap::new(), "u1", true);
        assert_eq!(toggled.votes, map(&[("u1", true)]));
        assert_eq!(toggled.total_votes, 1);
    }

    #[test]
    fn same_direction_twice_retracts() {
        let start = map(&[("u2", false)]);
        let once = toggle_vote(&start, "u1", true);
        let twice = toggle_vote(&once.votes, "u1", true);
        assert_eq!(twice.votes, start);
        assert_eq!(twice.total_votes, -1);
    }

    #[test]
    fn opposite_direction_flips_vote() {
        let toggled = toggle_vote(&map(&[("u1", true)]), "u1", false);
        assert_eq!(toggled.votes, map(&[("u1", false)]));
        assert_eq!(toggled.total_votes, -1);
    }

    #[test]
    fn toggle_leaves_other_users_untouched() {
        let toggled = toggle_vote(&map(&[("u2", true), ("u3", false)]), "u1", false);
        assert_eq!(toggled.votes.get("u2"), Some(&true));
        assert_eq!(toggled.votes.get("u3"), Some(&false));
        assert_eq!(toggled.total_votes, -1);
    }

    #[test]
    fn total_counts_up_minus_down() {
        assert_eq!(total_votes(&VoteMap::new()), 0);
        assert_eq!(
            total_votes(&map(&[("a", true), ("b", true), ("c", false)])),
            1
        );
    }

    #[test]
    fn normalization_drops_non_boolean_entries() {
        let raw = json!({"u1": true, "u2": "yes", "u3": null, "u4": false});
        assert_eq!(
            votes_from_value(Some(&raw)),
            map(&[("u1", true), ("u4", false)])
        );
    }

    #[test]
    fn normalization_treats_absent_and_non_object_as_empty() {
        assert!(votes_from_value(None).is_empty());
        assert!(votes_from_value(Some(&json!(null))).is_empty());
        assert!(votes_from_value(Some(&json!([true, false]))).is_empty());
    }

    #[test]
    fn has_voted_checks_direction() {
        let votes = map(&[("u1", false)]);
        assert!(has_voted(&votes, "u1", false));
        assert!(!has_voted(&votes, "u1", true));
        assert!(!has_voted(&votes, "u2", false));
    }
}

//! Display/export ordering of notes within a bucket.
//!
//! # Invariants
//! - Higher `totalVotes` sorts first.
//! - Absent and zero totals fall into the unscored tier, which ranks the
//!   same as a total of `-1`.
//! - Equal keys keep their store order; `sort_notes` is a stable sort.

use crate::model::note::Note;
use std::cmp::Ordering;

/// Sort key assigned to notes without a non-zero total.
pub const UNSCORED_TIER: i64 = -1;

/// Sort key for one note.
pub fn sort_score(note: &Note) -> i64 {
    match note.total_votes {
        Some(total) if total != 0 => total,
        _ => UNSCORED_TIER,
    }
}

/// Compares two notes by descending sort key.
pub fn compare_notes(a: &Note, b: &Note) -> Ordering {
    sort_score(b).cmp(&sort_score(a))
}

/// Sorts notes in place for display, preserving store order among ties.
pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(compare_notes);
}

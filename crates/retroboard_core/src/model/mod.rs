//! Typed entities for boards, buckets and notes.
//!
//! # Responsibility
//! - Define the canonical shapes the engine works with after mapping raw
//!   store records.
//! - Keep the mapping between flat store records and typed entities in one
//!   place.
//!
//! # Invariants
//! - Every entity keeps the id assigned by the store; ids are never minted
//!   by the mapping layer.
//! - Missing or mistyped record fields map to empty/zero values, never to
//!   errors.

pub mod board;
pub mod note;
pub mod record;

/// Stable identifier of an authenticated participant.
pub type UserId = String;

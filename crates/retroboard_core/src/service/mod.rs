//! Mutation use-case services.
//!
//! # Responsibility
//! - Translate note, vote and board use-cases into store writes.
//! - Keep callers decoupled from store paths and record field names.
//!
//! # Invariants
//! - Every write is a partial update of the fields the use-case owns.
//! - Targets are passed explicitly; services hold no selection state.

pub mod board_service;
pub mod error;
pub mod note_service;

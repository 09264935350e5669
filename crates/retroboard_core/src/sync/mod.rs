//! Live bucket/note synchronization for one board view.
//!
//! # Responsibility
//! - Follow a board's bucket collection and fan out one note subscription
//!   per bucket.
//! - Maintain the session mirror used for rendering and export.
//!
//! # Invariants
//! - Subscriptions are independent: a bucket-list update never waits on a
//!   note subscription, and one bucket's notes never touch a sibling's.
//! - Closing a view cancels the bucket subscription and every note
//!   subscription together.

pub mod mirror;
mod registry;
pub mod synchronizer;

use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Board view lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// View opened without a board id.
    MissingBoardId,
    /// Initial subscription could not be established.
    Subscribe(StoreError),
    /// View was already torn down.
    Closed,
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingBoardId => write!(f, "board id must not be blank"),
            Self::Subscribe(err) => write!(f, "subscription failed: {err}"),
            Self::Closed => write!(f, "board view is closed"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Subscribe(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Subscribe(value)
    }
}

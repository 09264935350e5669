//! Mutation service errors.

use crate::model::board::BucketId;
use crate::model::note::NoteId;
use crate::service::board_service::CascadeStep;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Cascade delete that stopped after some steps succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeFailure {
    /// Steps that completed before the failure, in execution order.
    pub completed: Vec<CascadeStep>,
    /// Failed step followed by every step not attempted.
    pub remaining: Vec<CascadeStep>,
    pub cause: StoreError,
}

/// Errors from note and board mutation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Store operation did not complete. Nothing is retried in core.
    StoreUnavailable(StoreError),
    /// Operation invoked without a target bucket, note or board.
    MissingActiveEntity(&'static str),
    /// Operation requires an authenticated participant.
    MissingIdentity,
    /// Target note does not exist in the store.
    NoteNotFound {
        bucket_id: BucketId,
        note_id: NoteId,
    },
    /// Board or bucket name is blank after trim.
    InvalidName(String),
    /// Cascade delete left remnants behind.
    PartialCascadeFailure(CascadeFailure),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreUnavailable(err) => write!(f, "{err}"),
            Self::MissingActiveEntity(entity) => write!(f, "no active {entity} selected"),
            Self::MissingIdentity => write!(f, "no authenticated participant"),
            Self::NoteNotFound { bucket_id, note_id } => {
                write!(f, "note not found: notes/{bucket_id}/{note_id}")
            }
            Self::InvalidName(value) => write!(f, "name must not be blank: `{value}`"),
            Self::PartialCascadeFailure(failure) => write!(
                f,
                "board delete partially failed: {} step(s) done, {} remaining: {}",
                failure.completed.len(),
                failure.remaining.len(),
                failure.cause
            ),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreUnavailable(err) => Some(err),
            Self::PartialCascadeFailure(failure) => Some(&failure.cause),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::StoreUnavailable(value)
    }
}

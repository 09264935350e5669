//! Note and vote use-case service.
//!
//! # Responsibility
//! - Create, edit and delete notes in a bucket.
//! - Cast per-user votes and keep `totalVotes` in step with `votes`.
//!
//! # Invariants
//! - New notes start with an empty vote map and a zero total.
//! - Message edits write only `message`; vote casts write only `votes` and
//!   `totalVotes`.
//! - Vote casts read the note fresh from the store and rewrite only the
//!   vote fields. Two users voting concurrently only race on the
//!   read-modify-write window; the same user on two devices resolves
//!   last-write-wins in store order.

use crate::model::board::BucketId;
use crate::model::note::{Note, NoteId, FIELD_MESSAGE, FIELD_TOTAL_VOTES, FIELD_VOTES};
use crate::model::record::record_from;
use crate::service::error::ServiceError;
use crate::store::{BoardStore, CollectionPath, StoreError};
use crate::vote::{toggle_vote, votes_from_value, votes_to_value, VoteToggle};
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

/// Explicit address of one note.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoteTarget {
    pub bucket_id: BucketId,
    pub note_id: NoteId,
}

impl NoteTarget {
    pub fn new(bucket_id: impl Into<BucketId>, note_id: impl Into<NoteId>) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            note_id: note_id.into(),
        }
    }

    /// Target of an already mirrored note.
    pub fn of(note: &Note) -> Self {
        Self::new(note.bucket_id.clone(), note.id.clone())
    }

    fn validate(&self) -> Result<CollectionPath, ServiceError> {
        let path = bucket_path(&self.bucket_id)?;
        if self.note_id.trim().is_empty() {
            return Err(ServiceError::MissingActiveEntity("note"));
        }
        Ok(path)
    }
}

/// Note service facade over a board store.
pub struct NoteService<S: BoardStore + ?Sized> {
    store: Arc<S>,
}

impl<S: BoardStore + ?Sized> NoteService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Appends a new note to `bucket_id` and returns its store id.
    pub async fn create_note(&self, bucket_id: &str, message: &str) -> Result<NoteId, ServiceError> {
        let path = bucket_path(bucket_id)?;
        let note_id = self
            .store
            .append(&path, Note::new_record(message))
            .await
            .map_err(|err| failed("note_create", &path, err.into()))?;
        debug!("event=note_create module=service status=ok path={path} note_id={note_id}");
        Ok(note_id)
    }

    /// Replaces the message of one note, leaving votes untouched.
    pub async fn update_note_message(
        &self,
        target: &NoteTarget,
        message: &str,
    ) -> Result<(), ServiceError> {
        let path = target.validate()?;
        self.store
            .update(
                &path,
                &target.note_id,
                record_from([(FIELD_MESSAGE, Value::from(message))]),
            )
            .await
            .map_err(|err| failed("note_update", &path, note_error(target, err)))?;
        debug!(
            "event=note_update module=service status=ok path={} note_id={}",
            path, target.note_id
        );
        Ok(())
    }

    /// Casts or retracts `user_id`'s vote on one note.
    ///
    /// Casting the direction the user already holds retracts the vote.
    pub async fn cast_vote(
        &self,
        target: &NoteTarget,
        user_id: &str,
        want_upvote: bool,
    ) -> Result<VoteToggle, ServiceError> {
        let path = target.validate()?;
        if user_id.trim().is_empty() {
            return Err(ServiceError::MissingIdentity);
        }

        let record = self
            .store
            .get(&path, &target.note_id)
            .await
            .map_err(|err| failed("vote_cast", &path, err.into()))?
            .ok_or_else(|| ServiceError::NoteNotFound {
                bucket_id: target.bucket_id.clone(),
                note_id: target.note_id.clone(),
            })?;

        let current = votes_from_value(record.get(FIELD_VOTES));
        let toggled = toggle_vote(&current, user_id, want_upvote);
        self.store
            .update(
                &path,
                &target.note_id,
                record_from([
                    (FIELD_VOTES, votes_to_value(&toggled.votes)),
                    (FIELD_TOTAL_VOTES, Value::from(toggled.total_votes)),
                ]),
            )
            .await
            .map_err(|err| failed("vote_cast", &path, note_error(target, err)))?;

        debug!(
            "event=vote_cast module=service status=ok path={} note_id={} upvote={} total={}",
            path, target.note_id, want_upvote, toggled.total_votes
        );
        Ok(toggled)
    }

    pub async fn upvote(&self, target: &NoteTarget, user_id: &str) -> Result<VoteToggle, ServiceError> {
        self.cast_vote(target, user_id, true).await
    }

    pub async fn downvote(
        &self,
        target: &NoteTarget,
        user_id: &str,
    ) -> Result<VoteToggle, ServiceError> {
        self.cast_vote(target, user_id, false).await
    }

    /// Removes one note record.
    pub async fn delete_note(&self, target: &NoteTarget) -> Result<(), ServiceError> {
        let path = target.validate()?;
        self.store
            .remove(&path, &target.note_id)
            .await
            .map_err(|err| failed("note_delete", &path, err.into()))?;
        debug!(
            "event=note_delete module=service status=ok path={} note_id={}",
            path, target.note_id
        );
        Ok(())
    }
}

fn bucket_path(bucket_id: &str) -> Result<CollectionPath, ServiceError> {
    if bucket_id.trim().is_empty() {
        return Err(ServiceError::MissingActiveEntity("bucket"));
    }
    Ok(CollectionPath::Notes(bucket_id.to_string()))
}

fn note_error(target: &NoteTarget, err: StoreError) -> ServiceError {
    match err {
        StoreError::NotFound { .. } => ServiceError::NoteNotFound {
            bucket_id: target.bucket_id.clone(),
            note_id: target.note_id.clone(),
        },
        other => ServiceError::StoreUnavailable(other),
    }
}

fn failed(event: &str, path: &CollectionPath, err: ServiceError) -> ServiceError {
    warn!("event={event} module=service status=error path={path} error={err}");
    err
}

//! Board use-case service.
//!
//! # Responsibility
//! - Create boards with their initial buckets.
//! - Rename boards and edit bucket metadata.
//! - Delete a board with all of its buckets and notes as one logical
//!   operation.
//!
//! # Invariants
//! - Buckets are created in list order with `ordinal` equal to position.
//! - Cascade delete covers the listed buckets plus every bucket the store
//!   holds for the board. It runs notes, then bucket records, then a sweep
//!   of the bucket collection, then the board record, and stops at the
//!   first failure. Any failure after the first completed step
//!   is reported as `PartialCascadeFailure`; success is reported only when
//!   every step completed.

use crate::model::board::{
    Board, BoardId, Bucket, BucketId, BucketTemplate, FIELD_NAME, FIELD_ORDINAL,
};
use crate::model::record::record_from;
use crate::model::UserId;
use crate::service::error::{CascadeFailure, ServiceError};
use crate::store::{BoardStore, CollectionPath, StoreResult};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Request model for creating a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBoardRequest {
    pub name: String,
    /// Buckets to create, in display order.
    pub buckets: Vec<BucketTemplate>,
    pub owner: Option<UserId>,
}

impl CreateBoardRequest {
    /// Request whose bucket types are derived from the bucket names.
    pub fn from_names<T: AsRef<str>>(name: impl Into<String>, bucket_names: &[T]) -> Self {
        Self {
            name: name.into(),
            buckets: bucket_names
                .iter()
                .map(|bucket_name| BucketTemplate::from_name(bucket_name.as_ref()))
                .collect(),
            owner: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<UserId>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Bucket entry of a board edit; `id == None` creates a new bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDraft {
    pub id: Option<BucketId>,
    pub name: String,
}

impl BucketDraft {
    pub fn existing(id: impl Into<BucketId>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }

    pub fn new_bucket(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

/// Board edit: new name plus the full bucket list in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardUpdate {
    pub name: String,
    pub buckets: Vec<BucketDraft>,
}

/// One deletion performed by a cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeStep {
    /// Every note of one bucket.
    Notes { bucket_id: BucketId },
    /// One bucket record.
    Bucket {
        board_id: BoardId,
        bucket_id: BucketId,
    },
    /// Whatever is left of the board's bucket collection.
    Buckets { board_id: BoardId },
    /// The board record.
    Board { board_id: BoardId },
}

impl Display for CascadeStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Notes { bucket_id } => write!(f, "notes/{bucket_id}"),
            Self::Bucket {
                board_id,
                bucket_id,
            } => write!(f, "buckets/{board_id}/{bucket_id}"),
            Self::Buckets { board_id } => write!(f, "buckets/{board_id}"),
            Self::Board { board_id } => write!(f, "boards/{board_id}"),
        }
    }
}

/// Completed cascade delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeReport {
    pub board_id: BoardId,
    pub acting_user: UserId,
    pub steps: Vec<CascadeStep>,
}

/// Board service facade over a board store.
pub struct BoardService<S: BoardStore + ?Sized> {
    store: Arc<S>,
    default_buckets: Vec<BucketTemplate>,
}

impl<S: BoardStore + ?Sized> BoardService<S> {
    /// Creates a service using the built-in bucket template.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_default_buckets(store, BucketTemplate::defaults())
    }

    pub fn with_default_buckets(store: Arc<S>, default_buckets: Vec<BucketTemplate>) -> Self {
        Self {
            store,
            default_buckets,
        }
    }

    pub fn default_buckets(&self) -> &[BucketTemplate] {
        &self.default_buckets
    }

    /// Creates the board record, then one bucket per template in order.
    pub async fn create_board(&self, request: &CreateBoardRequest) -> Result<BoardId, ServiceError> {
        let name = normalize_name(&request.name)?;
        for template in &request.buckets {
            normalize_name(&template.name)?;
        }

        let board_id = self
            .store
            .append(
                &CollectionPath::Boards,
                Board::new_record(&name, request.owner.as_deref(), now_epoch_ms()),
            )
            .await
            .inspect_err(|err| {
                warn!("event=board_create module=service status=error stage=board error={err}");
            })?;

        let buckets_path = CollectionPath::Buckets(board_id.clone());
        for (ordinal, template) in request.buckets.iter().enumerate() {
            let template = BucketTemplate::new(template.name.trim(), template.kind.as_str());
            self.store
                .append(&buckets_path, Bucket::new_record(&template, ordinal_of(ordinal)))
                .await
                .inspect_err(|err| {
                    warn!(
                        "event=board_create module=service status=error stage=bucket board_id={} ordinal={} error={}",
                        board_id, ordinal, err
                    );
                })?;
        }

        info!(
            "event=board_create module=service status=ok board_id={} buckets={}",
            board_id,
            request.buckets.len()
        );
        Ok(board_id)
    }

    /// Creates a board using the service's default buckets.
    pub async fn create_board_from_template(
        &self,
        name: &str,
        owner: Option<&str>,
    ) -> Result<BoardId, ServiceError> {
        let request = CreateBoardRequest {
            name: name.to_string(),
            buckets: self.default_buckets.clone(),
            owner: owner.map(ToString::to_string),
        };
        self.create_board(&request).await
    }

    /// Renames the board and rewrites bucket names and order.
    ///
    /// Drafts with an id are partially updated; drafts without one are
    /// appended as new buckets. Buckets absent from `update` are untouched.
    pub async fn update_board(&self, board_id: &str, update: &BoardUpdate) -> Result<(), ServiceError> {
        if board_id.trim().is_empty() {
            return Err(ServiceError::MissingActiveEntity("board"));
        }
        let name = normalize_name(&update.name)?;
        for draft in &update.buckets {
            normalize_name(&draft.name)?;
        }

        self.store
            .update(
                &CollectionPath::Boards,
                board_id,
                record_from([(FIELD_NAME, Value::from(name))]),
            )
            .await?;

        let buckets_path = CollectionPath::Buckets(board_id.to_string());
        for (ordinal, draft) in update.buckets.iter().enumerate() {
            let ordinal = ordinal_of(ordinal);
            match &draft.id {
                Some(bucket_id) => {
                    self.store
                        .update(
                            &buckets_path,
                            bucket_id,
                            record_from([
                                (FIELD_NAME, Value::from(draft.name.trim())),
                                (FIELD_ORDINAL, Value::from(ordinal)),
                            ]),
                        )
                        .await?;
                }
                None => {
                    let template = BucketTemplate::from_name(draft.name.trim());
                    self.store
                        .append(&buckets_path, Bucket::new_record(&template, ordinal))
                        .await?;
                }
            }
        }

        info!(
            "event=board_update module=service status=ok board_id={} buckets={}",
            board_id,
            update.buckets.len()
        );
        Ok(())
    }

    /// Deletes every note of every bucket, every bucket, then the board.
    ///
    /// `buckets` is merged with the store's current bucket list, so an empty
    /// or stale list still removes everything.
    ///
    /// # Errors
    /// - `MissingIdentity` / `MissingActiveEntity` before anything is deleted.
    /// - `StoreUnavailable` when the bucket list cannot be read or the first
    ///   step fails (nothing deleted).
    /// - `PartialCascadeFailure` when a later step fails; the payload lists
    ///   what was deleted and what remains.
    pub async fn delete_board(
        &self,
        buckets: &[Bucket],
        board: &Board,
        acting_user: &str,
    ) -> Result<CascadeReport, ServiceError> {
        if acting_user.trim().is_empty() {
            return Err(ServiceError::MissingIdentity);
        }
        if board.id.trim().is_empty() {
            return Err(ServiceError::MissingActiveEntity("board"));
        }

        let owned = buckets
            .iter()
            .filter(|bucket| {
                let matches = bucket.board_id == board.id;
                if !matches {
                    warn!(
                        "event=board_delete module=service status=warn reason=foreign_bucket board_id={} bucket_id={}",
                        board.id, bucket.id
                    );
                }
                matches
            })
            .collect::<Vec<_>>();

        // Buckets the caller has not seen yet still own notes.
        let stored = self
            .store
            .snapshot(&CollectionPath::Buckets(board.id.clone()))
            .await
            .inspect_err(|err| {
                error!(
                    "event=board_delete module=service status=error stage=bucket_list board_id={} user={} error={}",
                    board.id, acting_user, err
                );
            })?;
        let mut bucket_ids = owned
            .iter()
            .map(|bucket| bucket.id.clone())
            .collect::<Vec<BucketId>>();
        for entry in stored {
            if !bucket_ids.contains(&entry.id) {
                debug!(
                    "event=board_delete module=service status=ok reason=unlisted_bucket board_id={} bucket_id={}",
                    board.id, entry.id
                );
                bucket_ids.push(entry.id);
            }
        }

        let mut plan = bucket_ids
            .iter()
            .map(|bucket_id| CascadeStep::Notes {
                bucket_id: bucket_id.clone(),
            })
            .collect::<Vec<_>>();
        plan.extend(bucket_ids.iter().map(|bucket_id| CascadeStep::Bucket {
            board_id: board.id.clone(),
            bucket_id: bucket_id.clone(),
        }));
        plan.push(CascadeStep::Buckets {
            board_id: board.id.clone(),
        });
        plan.push(CascadeStep::Board {
            board_id: board.id.clone(),
        });

        let mut completed = Vec::with_capacity(plan.len());
        let mut pending = plan.into_iter();
        while let Some(step) = pending.next() {
            if let Err(cause) = self.run_step(&step).await {
                let done = completed.len();
                let mut remaining = vec![step];
                remaining.extend(pending);
                if done == 0 {
                    error!(
                        "event=board_delete module=service status=error board_id={} user={} error={}",
                        board.id, acting_user, cause
                    );
                    return Err(ServiceError::StoreUnavailable(cause));
                }
                error!(
                    "event=board_delete module=service status=partial board_id={} user={} completed={} remaining={} error={}",
                    board.id,
                    acting_user,
                    done,
                    remaining.len(),
                    cause
                );
                return Err(ServiceError::PartialCascadeFailure(CascadeFailure {
                    completed,
                    remaining,
                    cause,
                }));
            }
            completed.push(step);
        }

        info!(
            "event=board_delete module=service status=ok board_id={} user={} steps={}",
            board.id,
            acting_user,
            completed.len()
        );
        Ok(CascadeReport {
            board_id: board.id.clone(),
            acting_user: acting_user.to_string(),
            steps: completed,
        })
    }

    async fn run_step(&self, step: &CascadeStep) -> StoreResult<()> {
        match step {
            CascadeStep::Notes { bucket_id } => {
                self.store
                    .remove_collection(&CollectionPath::Notes(bucket_id.clone()))
                    .await
            }
            CascadeStep::Bucket {
                board_id,
                bucket_id,
            } => {
                self.store
                    .remove(&CollectionPath::Buckets(board_id.clone()), bucket_id)
                    .await
            }
            CascadeStep::Buckets { board_id } => {
                self.store
                    .remove_collection(&CollectionPath::Buckets(board_id.clone()))
                    .await
            }
            CascadeStep::Board { board_id } => {
                self.store.remove(&CollectionPath::Boards, board_id).await
            }
        }
    }
}

fn normalize_name(value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidName(value.to_string()));
    }
    Ok(trimmed.to_string())
}

fn ordinal_of(position: usize) -> i64 {
    i64::try_from(position).unwrap_or(i64::MAX)
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

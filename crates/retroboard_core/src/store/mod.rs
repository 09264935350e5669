//! Board store contract.
//!
//! # Responsibility
//! - Define the async operations the engine needs from the external
//!   real-time document store.
//! - Name the collections the engine reads and writes.
//!
//! # Invariants
//! - The store is the single source of truth; nothing in core caches store
//!   state beyond one view session's mirror.
//! - A subscription delivers the full ordered collection on every change,
//!   starting with the current contents.
//! - No retry or timeout policy lives here; both belong to store clients.

pub mod memory;

use crate::model::board::{BoardId, BucketId};
use crate::model::record::{Record, RecordId, StoreEntry};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::mpsc;

pub type StoreResult<T> = Result<T, StoreError>;

/// Full ordered contents of one collection at one point in time.
pub type CollectionSnapshot = Vec<StoreEntry>;

/// Store collection addressed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectionPath {
    /// `boards`
    Boards,
    /// `boards/{board_id}`: single-record view of one board.
    Board(BoardId),
    /// `buckets/{board_id}`
    Buckets(BoardId),
    /// `notes/{bucket_id}`
    Notes(BucketId),
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boards => write!(f, "boards"),
            Self::Board(board_id) => write!(f, "boards/{board_id}"),
            Self::Buckets(board_id) => write!(f, "buckets/{board_id}"),
            Self::Notes(bucket_id) => write!(f, "notes/{bucket_id}"),
        }
    }
}

/// Store operation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Network/server failure; the operation did not complete.
    Unavailable(String),
    /// Partial update targeted a record that does not exist.
    NotFound { path: CollectionPath, id: RecordId },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(details) => write!(f, "store unavailable: {details}"),
            Self::NotFound { path, id } => write!(f, "record not found: {path}/{id}"),
        }
    }
}

impl Error for StoreError {}

/// Live feed of one collection.
///
/// Dropping the subscription cancels it on the store side.
#[derive(Debug)]
pub struct Subscription {
    path: CollectionPath,
    receiver: mpsc::UnboundedReceiver<CollectionSnapshot>,
}

impl Subscription {
    pub fn new(path: CollectionPath, receiver: mpsc::UnboundedReceiver<CollectionSnapshot>) -> Self {
        Self { path, receiver }
    }

    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    /// Waits for the next collection snapshot.
    ///
    /// Returns `None` once the store stops delivering for this subscription.
    pub async fn next(&mut self) -> Option<CollectionSnapshot> {
        self.receiver.recv().await
    }
}

/// Async document store holding boards, buckets and notes.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Opens a live subscription over one collection.
    ///
    /// `CollectionPath::Board(id)` delivers the matching `boards` record
    /// only (zero or one entry).
    async fn subscribe(&self, path: &CollectionPath) -> StoreResult<Subscription>;
    /// Reads the current contents of one collection.
    async fn snapshot(&self, path: &CollectionPath) -> StoreResult<CollectionSnapshot> {
        let mut subscription = self.subscribe(path).await?;
        subscription.next().await.ok_or_else(|| {
            StoreError::Unavailable(format!("subscription on {path} closed before delivering"))
        })
    }
    /// Reads one record.
    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Record>>;
    /// Appends a record and returns its store-assigned id.
    async fn append(&self, path: &CollectionPath, record: Record) -> StoreResult<RecordId>;
    /// Merges `patch` into an existing record, leaving other fields untouched.
    async fn update(&self, path: &CollectionPath, id: &str, patch: Record) -> StoreResult<()>;
    /// Deletes one record. Deleting a missing record succeeds.
    async fn remove(&self, path: &CollectionPath, id: &str) -> StoreResult<()>;
    /// Deletes a whole collection. Deleting a missing collection succeeds.
    async fn remove_collection(&self, path: &CollectionPath) -> StoreResult<()>;
}

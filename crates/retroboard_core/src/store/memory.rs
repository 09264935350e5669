//! In-process board store.
//!
//! # Responsibility
//! - Implement `BoardStore` over in-memory collections for the CLI and tests.
//! - Push a full collection snapshot to every live subscriber on each change.
//! - Offer failure injection so callers can exercise store outages.
//!
//! # Invariants
//! - Collection order is append order.
//! - Subscribers whose receiving side was dropped are pruned on the next
//!   delivery or count.

use crate::model::record::{Record, RecordId, StoreEntry};
use crate::store::{
    BoardStore, CollectionPath, CollectionSnapshot, StoreError, StoreResult, Subscription,
};
use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<CollectionPath, Vec<StoreEntry>>,
    subscribers: BTreeMap<CollectionPath, Vec<mpsc::UnboundedSender<CollectionSnapshot>>>,
    unavailable: bool,
    /// Remaining successful mutations before injected failures start.
    mutation_budget: Option<usize>,
}

impl MemoryState {
    fn snapshot(&self, path: &CollectionPath) -> CollectionSnapshot {
        match path {
            CollectionPath::Board(board_id) => self
                .collections
                .get(&CollectionPath::Boards)
                .map(|entries| {
                    entries
                        .iter()
                        .filter(|entry| &entry.id == board_id)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
            _ => self.collections.get(path).cloned().unwrap_or_default(),
        }
    }

    /// Notifies subscribers of `path` and of single-record views it backs.
    ///
    /// `record_id` narrows the `boards/{id}` views notified; `None` notifies
    /// all of them.
    fn publish(&mut self, path: &CollectionPath, record_id: Option<&str>) {
        let mut targets = vec![path.clone()];
        if *path == CollectionPath::Boards {
            match record_id {
                Some(id) => targets.push(CollectionPath::Board(id.to_string())),
                None => targets.extend(
                    self.subscribers
                        .keys()
                        .filter(|key| matches!(key, CollectionPath::Board(_)))
                        .cloned(),
                ),
            }
        }
        for target in targets {
            let snapshot = self.snapshot(&target);
            if let Some(senders) = self.subscribers.get_mut(&target) {
                senders.retain(|tx| tx.send(snapshot.clone()).is_ok());
            }
        }
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable {
            return Err(StoreError::Unavailable("store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn begin_mutation(&mut self) -> StoreResult<()> {
        self.check_available()?;
        match self.mutation_budget {
            Some(0) => Err(StoreError::Unavailable("injected mutation failure".to_string())),
            Some(remaining) => {
                self.mutation_budget = Some(remaining - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Collection holding the records addressed by `path`.
fn storage_path(path: &CollectionPath) -> CollectionPath {
    match path {
        CollectionPath::Board(_) => CollectionPath::Boards,
        other => other.clone(),
    }
}

/// `BoardStore` backed by process memory.
#[derive(Default)]
pub struct InMemoryBoardStore {
    state: Mutex<MemoryState>,
}

impl InMemoryBoardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with `StoreError::Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.unavailable = unavailable;
        }
    }

    /// Lets `successes` more mutations through, then fails every later one.
    ///
    /// `None` removes the limit.
    pub fn fail_mutations_after(&self, successes: Option<usize>) {
        if let Ok(mut state) = self.state.lock() {
            state.mutation_budget = successes;
        }
    }

    /// Number of live subscriptions on one collection.
    pub fn subscriber_count(&self, path: &CollectionPath) -> usize {
        self.state
            .lock()
            .map(|mut state| {
                let senders = state.subscribers.entry(path.clone()).or_default();
                senders.retain(|tx| !tx.is_closed());
                senders.len()
            })
            .unwrap_or(0)
    }

    /// Number of live subscriptions across all collections.
    pub fn total_subscribers(&self) -> usize {
        self.state
            .lock()
            .map(|mut state| {
                state
                    .subscribers
                    .values_mut()
                    .map(|senders| {
                        senders.retain(|tx| !tx.is_closed());
                        senders.len()
                    })
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Current contents of one collection.
    pub fn entries(&self, path: &CollectionPath) -> CollectionSnapshot {
        self.state
            .lock()
            .map(|state| state.snapshot(path))
            .unwrap_or_default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("store state lock poisoned".to_string()))
    }
}

#[async_trait]
impl BoardStore for InMemoryBoardStore {
    async fn subscribe(&self, path: &CollectionPath) -> StoreResult<Subscription> {
        let mut state = self.lock()?;
        state.check_available()?;
        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive here, so the initial delivery cannot fail.
        let _ = tx.send(state.snapshot(path));
        state.subscribers.entry(path.clone()).or_default().push(tx);
        debug!("event=store_subscribe module=store status=ok path={path}");
        Ok(Subscription::new(path.clone(), rx))
    }

    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Record>> {
        let path = &storage_path(path);
        let state = self.lock()?;
        state.check_available()?;
        Ok(state
            .collections
            .get(path)
            .and_then(|entries| entries.iter().find(|entry| entry.id == id))
            .map(|entry| entry.record.clone()))
    }

    async fn append(&self, path: &CollectionPath, record: Record) -> StoreResult<RecordId> {
        let path = &storage_path(path);
        let mut state = self.lock()?;
        state.begin_mutation()?;
        let id = Uuid::new_v4().to_string();
        state
            .collections
            .entry(path.clone())
            .or_default()
            .push(StoreEntry::new(id.clone(), record));
        state.publish(path, Some(&id));
        Ok(id)
    }

    async fn update(&self, path: &CollectionPath, id: &str, patch: Record) -> StoreResult<()> {
        let path = &storage_path(path);
        let mut state = self.lock()?;
        state.begin_mutation()?;
        let entry = state
            .collections
            .get_mut(path)
            .and_then(|entries| entries.iter_mut().find(|entry| entry.id == id))
            .ok_or_else(|| StoreError::NotFound {
                path: path.clone(),
                id: id.to_string(),
            })?;
        for (field, value) in patch {
            entry.record.insert(field, value);
        }
        state.publish(path, Some(id));
        Ok(())
    }

    async fn remove(&self, path: &CollectionPath, id: &str) -> StoreResult<()> {
        let path = &storage_path(path);
        let mut state = self.lock()?;
        state.begin_mutation()?;
        if let Some(entries) = state.collections.get_mut(path) {
            entries.retain(|entry| entry.id != id);
        }
        state.publish(path, Some(id));
        Ok(())
    }

    async fn remove_collection(&self, path: &CollectionPath) -> StoreResult<()> {
        let path = &storage_path(path);
        let mut state = self.lock()?;
        state.begin_mutation()?;
        state.collections.remove(path);
        state.publish(path, None);
        Ok(())
    }
}

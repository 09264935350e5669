//! Board view: live subscriptions feeding the session mirror.
//!
//! # Responsibility
//! - Open the bucket and board subscriptions for one board id.
//! - Run the coordinator task that owns the mirror and the note
//!   subscription registry.
//! - Publish immutable mirror snapshots to readers.
//!
//! # Invariants
//! - The coordinator is the only writer of the mirror. Note subscription
//!   tasks and the view handle talk to it through one bounded channel.
//! - The coordinator never awaits a store call; each note subscription is
//!   opened, and reopened after a failure, by its own task.
//! - Updates from one note subscription are applied in receipt order
//!   (last write wins per note id).
//! - `BoardView::close` returns after every subscription task has exited;
//!   dropping a view cancels the same tasks without waiting.
//!
//! # See also
//! - `sync::mirror` for the consistency model readers observe.

use crate::config::EngineConfig;
use crate::model::board::{Board, BoardId, Bucket, BucketId};
use crate::model::note::{Note, NoteId};
use crate::model::record::StoreEntry;
use crate::store::{BoardStore, CollectionPath, CollectionSnapshot, StoreError, Subscription};
use crate::sync::mirror::BoardMirror;
use crate::sync::registry::SubscriptionRegistry;
use crate::sync::SyncError;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tuning for one board view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    /// Capacity of the channel between note subscription tasks and the
    /// coordinator.
    pub subscription_buffer: usize,
    /// Pause before a failed or ended note subscription is opened again.
    pub resubscribe_delay: Duration,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ViewOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            subscription_buffer: config.subscription_buffer,
            resubscribe_delay: Duration::from_millis(config.resubscribe_delay_ms),
        }
    }
}

enum MirrorEvent {
    Notes { bucket_id: BucketId, notes: Vec<Note> },
    NotesFailed { bucket_id: BucketId, error: StoreError },
    Evict { bucket_id: BucketId, note_id: NoteId },
}

/// Handle to one open board view session.
pub struct BoardView {
    board_id: BoardId,
    mirror: watch::Receiver<Arc<BoardMirror>>,
    events: mpsc::Sender<MirrorEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Opens a live view of `board_id`.
///
/// Fails only when the initial bucket or board subscription cannot be
/// established. Note subscriptions are opened in the background; their
/// failures surface as `BucketView::notes_error` and are retried.
pub async fn open_board_view<S>(
    store: Arc<S>,
    board_id: &str,
    options: ViewOptions,
) -> Result<BoardView, SyncError>
where
    S: BoardStore + ?Sized + 'static,
{
    let board_id = board_id.trim();
    if board_id.is_empty() {
        return Err(SyncError::MissingBoardId);
    }

    let buckets = store
        .subscribe(&CollectionPath::Buckets(board_id.to_string()))
        .await?;
    let boards = store
        .subscribe(&CollectionPath::Board(board_id.to_string()))
        .await?;

    let cancel = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(options.subscription_buffer.max(1));
    let initial = Arc::new(BoardMirror::new(board_id));
    let (publisher, mirror_rx) = watch::channel(Arc::clone(&initial));

    let coordinator = Coordinator {
        store,
        board_id: board_id.to_string(),
        mirror: initial,
        publisher,
        registry: SubscriptionRegistry::new(cancel.child_token()),
        events_tx: events_tx.clone(),
        resubscribe_delay: options.resubscribe_delay,
    };
    let task = tokio::spawn(coordinator.run(buckets, boards, events_rx, cancel.clone()));

    info!("event=view_open module=sync status=ok board_id={board_id}");
    Ok(BoardView {
        board_id: board_id.to_string(),
        mirror: mirror_rx,
        events: events_tx,
        cancel,
        task: Some(task),
    })
}

impl BoardView {
    pub fn board_id(&self) -> &str {
        &self.board_id
    }

    /// Latest published mirror.
    pub fn snapshot(&self) -> Arc<BoardMirror> {
        Arc::clone(&self.mirror.borrow())
    }

    /// Change feed of mirror snapshots.
    pub fn changes(&self) -> watch::Receiver<Arc<BoardMirror>> {
        self.mirror.clone()
    }

    /// Waits until a published mirror satisfies `predicate`.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Result<Arc<BoardMirror>, SyncError>
    where
        F: FnMut(&BoardMirror) -> bool,
    {
        let mut changes = self.mirror.clone();
        let current = changes
            .wait_for(|mirror| predicate(mirror.as_ref()))
            .await
            .map_err(|_| SyncError::Closed)?;
        Ok(Arc::clone(&current))
    }

    /// Drops one note from the mirror without waiting for the store echo.
    pub async fn evict_note(&self, bucket_id: &str, note_id: &str) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Closed);
        }
        self.events
            .send(MirrorEvent::Evict {
                bucket_id: bucket_id.to_string(),
                note_id: note_id.to_string(),
            })
            .await
            .map_err(|_| SyncError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels every subscription of this view and waits for teardown.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                error!(
                    "event=view_close module=sync status=error board_id={} error={}",
                    self.board_id, err
                );
                return;
            }
        }
        info!(
            "event=view_close module=sync status=ok board_id={}",
            self.board_id
        );
    }
}

impl Drop for BoardView {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Coordinator<S: ?Sized> {
    store: Arc<S>,
    board_id: BoardId,
    mirror: Arc<BoardMirror>,
    publisher: watch::Sender<Arc<BoardMirror>>,
    registry: SubscriptionRegistry,
    events_tx: mpsc::Sender<MirrorEvent>,
    resubscribe_delay: Duration,
}

impl<S> Coordinator<S>
where
    S: BoardStore + ?Sized + 'static,
{
    async fn run(
        mut self,
        mut buckets: Subscription,
        mut boards: Subscription,
        mut events: mpsc::Receiver<MirrorEvent>,
        cancel: CancellationToken,
    ) {
        let mut buckets_open = true;
        let mut boards_open = true;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                snapshot = buckets.next(), if buckets_open => match snapshot {
                    Some(entries) => self.on_buckets(entries),
                    None => {
                        buckets_open = false;
                        warn!(
                            "event=subscription_end module=sync status=warn path={}",
                            buckets.path()
                        );
                    }
                },
                snapshot = boards.next(), if boards_open => match snapshot {
                    Some(entries) => self.on_boards(&entries),
                    None => {
                        boards_open = false;
                        warn!(
                            "event=subscription_end module=sync status=warn path={}",
                            boards.path()
                        );
                    }
                },
                event = events.recv() => match event {
                    Some(event) => self.on_event(event),
                    None => break,
                },
            }
        }

        drop(buckets);
        drop(boards);
        let note_subscriptions = self.registry.len();
        self.registry.shutdown().await;
        debug!(
            "event=view_teardown module=sync status=ok board_id={} note_subscriptions={}",
            self.board_id, note_subscriptions
        );
    }

    fn on_buckets(&mut self, entries: CollectionSnapshot) {
        let buckets = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| Bucket::from_entry(&self.board_id, position, entry))
            .collect::<Vec<_>>();
        let diff = Arc::make_mut(&mut self.mirror).apply_buckets(buckets);
        for bucket_id in &diff.removed {
            self.registry.cancel(bucket_id);
        }
        debug!(
            "event=buckets_applied module=sync status=ok board_id={} added={} removed={}",
            self.board_id,
            diff.added.len(),
            diff.removed.len()
        );
        self.publish();

        let pending = self
            .mirror
            .buckets
            .iter()
            .map(|view| view.bucket.id.clone())
            .filter(|bucket_id| !self.registry.contains(bucket_id))
            .collect::<Vec<_>>();
        for bucket_id in pending {
            self.spawn_note_subscription(bucket_id);
        }
    }

    fn spawn_note_subscription(&mut self, bucket_id: BucketId) {
        let token = self.registry.child_token();
        let task = tokio::spawn(forward_notes(
            Arc::clone(&self.store),
            bucket_id.clone(),
            self.events_tx.clone(),
            token.clone(),
            self.resubscribe_delay,
        ));
        self.registry.insert(bucket_id, token, task);
    }

    fn on_boards(&mut self, entries: &[StoreEntry]) {
        let board = entries
            .iter()
            .find(|entry| entry.id == self.board_id)
            .map(Board::from_entry);
        if board == self.mirror.board {
            return;
        }
        Arc::make_mut(&mut self.mirror).apply_board(board);
        self.publish();
    }

    fn on_event(&mut self, event: MirrorEvent) {
        let changed = match event {
            MirrorEvent::Notes { bucket_id, notes } => {
                if self.mirror.bucket(&bucket_id).is_none() {
                    debug!(
                        "event=notes_dropped module=sync status=ok reason=unknown_bucket bucket_id={bucket_id}"
                    );
                    return;
                }
                let count = notes.len();
                let applied = Arc::make_mut(&mut self.mirror).apply_notes(&bucket_id, notes);
                debug!(
                    "event=notes_applied module=sync status=ok bucket_id={} notes={}",
                    bucket_id, count
                );
                applied
            }
            MirrorEvent::NotesFailed { bucket_id, error } => {
                if self.mirror.bucket(&bucket_id).is_none() {
                    return;
                }
                Arc::make_mut(&mut self.mirror).apply_notes_error(&bucket_id, error)
            }
            MirrorEvent::Evict { bucket_id, note_id } => {
                if self.mirror.note(&bucket_id, &note_id).is_none() {
                    return;
                }
                Arc::make_mut(&mut self.mirror).evict_note(&bucket_id, &note_id)
            }
        };
        if changed {
            self.publish();
        }
    }

    fn publish(&self) {
        self.publisher.send_replace(Arc::clone(&self.mirror));
    }
}

enum PumpEnd {
    Stopped,
    Ended,
}

/// Follows one bucket's notes until cancelled, reopening the subscription
/// after each failure.
async fn forward_notes<S>(
    store: Arc<S>,
    bucket_id: BucketId,
    events: mpsc::Sender<MirrorEvent>,
    token: CancellationToken,
    resubscribe_delay: Duration,
) where
    S: BoardStore + ?Sized + 'static,
{
    let path = CollectionPath::Notes(bucket_id.clone());
    loop {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            opened = store.subscribe(&path) => opened,
        };
        let failure = match opened {
            Ok(subscription) => {
                debug!("event=subscription_start module=sync status=ok path={path}");
                match pump_notes(&bucket_id, subscription, &events, &token).await {
                    PumpEnd::Stopped => break,
                    PumpEnd::Ended => {
                        StoreError::Unavailable(format!("subscription on {path} ended"))
                    }
                }
            }
            Err(err) => err,
        };

        warn!(
            "event=subscription_start module=sync status=error path={} retry_ms={} error={}",
            path,
            resubscribe_delay.as_millis(),
            failure
        );
        let event = MirrorEvent::NotesFailed {
            bucket_id: bucket_id.clone(),
            error: failure,
        };
        if !deliver(&events, event, &token).await {
            break;
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(resubscribe_delay) => {}
        }
    }
    debug!("event=subscription_stop module=sync status=ok path={path}");
}

async fn pump_notes(
    bucket_id: &str,
    mut subscription: Subscription,
    events: &mpsc::Sender<MirrorEvent>,
    token: &CancellationToken,
) -> PumpEnd {
    loop {
        let entries = tokio::select! {
            biased;
            _ = token.cancelled() => return PumpEnd::Stopped,
            snapshot = subscription.next() => match snapshot {
                Some(entries) => entries,
                None => return PumpEnd::Ended,
            },
        };
        let notes = entries
            .iter()
            .map(|entry| Note::from_entry(bucket_id, entry))
            .collect();
        let event = MirrorEvent::Notes {
            bucket_id: bucket_id.to_string(),
            notes,
        };
        if !deliver(events, event, token).await {
            return PumpEnd::Stopped;
        }
    }
}

/// Sends one event unless the subscription is cancelled first. Returns
/// `false` when the forwarder should stop.
async fn deliver(
    events: &mpsc::Sender<MirrorEvent>,
    event: MirrorEvent,
    token: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

use async_trait::async_trait;
use retroboard_core::model::record::record_from;
use retroboard_core::{
    open_board_view, BoardMirror, BoardService, BoardStore, BoardUpdate, BoardView, BucketDraft,
    CollectionPath, CreateBoardRequest, InMemoryBoardStore, NoteService, Record, RecordId,
    StoreError, StoreResult, Subscription, SyncError, ViewOptions,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

async fn settle<F>(view: &BoardView, predicate: F) -> Arc<BoardMirror>
where
    F: FnMut(&BoardMirror) -> bool,
{
    timeout(Duration::from_secs(5), view.wait_until(predicate))
        .await
        .expect("mirror did not settle")
        .unwrap()
}

async fn seeded_board(store: &Arc<InMemoryBoardStore>, buckets: &[&str]) -> String {
    BoardService::new(Arc::clone(store))
        .create_board(&CreateBoardRequest::from_names("Sprint 12", buckets))
        .await
        .unwrap()
}

fn bucket_ids(store: &InMemoryBoardStore, board_id: &str) -> Vec<String> {
    store
        .entries(&CollectionPath::Buckets(board_id.to_string()))
        .into_iter()
        .map(|entry| entry.id)
        .collect()
}

#[tokio::test]
async fn view_mirrors_board_buckets_and_notes() {
    let store = Arc::new(InMemoryBoardStore::new());
    let board_id = seeded_board(&store, &["Went well", "To improve"]).await;
    let buckets = bucket_ids(&store, &board_id);
    let notes = NoteService::new(Arc::clone(&store));
    notes.create_note(&buckets[0], "Great demo").await.unwrap();
    notes.create_note(&buckets[1], "Flaky CI").await.unwrap();

    let view = open_board_view(Arc::clone(&store), &board_id, ViewOptions::default()).await.unwrap();
    let mirror = settle(&view, |mirror| {
        mirror.board.is_some() && mirror.all_notes_loaded() && mirror.note_count() == 2
    })
    .await;

    assert_eq!(mirror.board.as_ref().unwrap().name, "Sprint 12");
    let names = mirror
        .bucket_list()
        .into_iter()
        .map(|bucket| bucket.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Went well", "To improve"]);
    assert_eq!(mirror.bucket(&buckets[0]).unwrap().notes[0].message, "Great demo");
    assert_eq!(mirror.bucket(&buckets[1]).unwrap().notes[0].message, "Flaky CI");

    view.close().await;
}

#[tokio::test]
async fn notes_are_ordered_by_score_with_unscored_last() {
    let store = Arc::new(InMemoryBoardStore::new());
    let board_id = seeded_board(&store, &["Went well"]).await;
    let bucket_id = bucket_ids(&store, &board_id).remove(0);
    let notes = NoteService::new(Arc::clone(&store));
    let view = open_board_view(Arc::clone(&store), &board_id, ViewOptions::default()).await.unwrap();

    let quiet = notes.create_note(&bucket_id, "quiet").await.unwrap();
    let loud = notes.create_note(&bucket_id, "loud").await.unwrap();
    let target = retroboard_core::NoteTarget::new(bucket_id.clone(), loud.clone());
    notes.upvote(&target, "u1").await.unwrap();
    notes.upvote(&target, "u2").await.unwrap();

    let mirror = settle(&view, |mirror| {
        mirror
            .note(&bucket_id, &loud)
            .is_some_and(|note| note.score() == 2)
            && mirror.note(&bucket_id, &quiet).is_some()
    })
    .await;
    let order = mirror
        .bucket(&bucket_id)
        .unwrap()
        .notes
        .iter()
        .map(|note| note.message.as_str())
        .collect::<Vec<_>>();
    assert_eq!(order, vec!["loud", "quiet"]);

    view.close().await;
}

#[tokio::test]
async fn bucket_updates_are_independent() {
    let store = Arc::new(InMemoryBoardStore::new());
    let board_id = seeded_board(&store, &["A", "B"]).await;
    let buckets = bucket_ids(&store, &board_id);
    let notes = NoteService::new(Arc::clone(&store));
    notes.create_note(&buckets[1], "stays").await.unwrap();

    let view = open_board_view(Arc::clone(&store), &board_id, ViewOptions::default()).await.unwrap();
    settle(&view, |mirror| mirror.all_notes_loaded() && mirror.note_count() == 1).await;

    notes.create_note(&buckets[0], "fresh").await.unwrap();
    let mirror = settle(&view, |mirror| {
        mirror
            .bucket(&buckets[0])
            .is_some_and(|view| view.notes.len() == 1)
    })
    .await;
    assert_eq!(mirror.bucket(&buckets[1]).unwrap().notes[0].message, "stays");

    view.close().await;
}

#[tokio::test]
async fn removed_bucket_drops_its_note_subscription() {
    let store = Arc::new(InMemoryBoardStore::new());
    let board_id = seeded_board(&store, &["A", "B"]).await;
    let buckets = bucket_ids(&store, &board_id);
    let view = open_board_view(Arc::clone(&store), &board_id, ViewOptions::default()).await.unwrap();
    settle(&view, |mirror| mirror.all_notes_loaded() && mirror.buckets.len() == 2).await;

    let removed = CollectionPath::Notes(buckets[0].clone());
    assert_eq!(store.subscriber_count(&removed), 1);

    store
        .remove(&CollectionPath::Buckets(board_id.clone()), &buckets[0])
        .await
        .unwrap();
    let mirror = settle(&view, |mirror| mirror.buckets.len() == 1).await;
    assert!(mirror.bucket(&buckets[0]).is_none());

    timeout(Duration::from_secs(5), async {
        while store.subscriber_count(&removed) != 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("note subscription was not released");
    assert_eq!(store.subscriber_count(&CollectionPath::Notes(buckets[1].clone())), 1);

    view.close().await;
}

#[tokio::test]
async fn close_releases_every_subscription() {
    let store = Arc::new(InMemoryBoardStore::new());
    let board_id = seeded_board(&store, &["A", "B", "C"]).await;
    let buckets = bucket_ids(&store, &board_id);
    let view = open_board_view(Arc::clone(&store), &board_id, ViewOptions::default()).await.unwrap();
    settle(&view, |mirror| mirror.all_notes_loaded() && mirror.buckets.len() == 3).await;
    assert_eq!(store.total_subscribers(), 5);

    let changes = view.changes();
    let before = view.snapshot().version;
    view.close().await;
    assert_eq!(store.total_subscribers(), 0);

    NoteService::new(Arc::clone(&store))
        .create_note(&buckets[0], "after close")
        .await
        .unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(changes.borrow().version, before);
    assert_eq!(store.total_subscribers(), 0);
}

#[tokio::test]
async fn board_rename_and_new_bucket_reach_the_mirror() {
    let store = Arc::new(InMemoryBoardStore::new());
    let board_id = seeded_board(&store, &["A"]).await;
    let first = bucket_ids(&store, &board_id).remove(0);
    let view = open_board_view(Arc::clone(&store), &board_id, ViewOptions::default()).await.unwrap();
    settle(&view, |mirror| mirror.all_notes_loaded() && mirror.board.is_some()).await;

    BoardService::new(Arc::clone(&store))
        .update_board(
            &board_id,
            &BoardUpdate {
                name: "Sprint 12 retro".to_string(),
                buckets: vec![
                    BucketDraft::new_bucket("Puzzles"),
                    BucketDraft::existing(first.clone(), "Kept"),
                ],
            },
        )
        .await
        .unwrap();

    let mirror = settle(&view, |mirror| {
        mirror.buckets.len() == 2
            && mirror.all_notes_loaded()
            && mirror
                .board
                .as_ref()
                .is_some_and(|board| board.name == "Sprint 12 retro")
            && mirror.bucket(&first).is_some_and(|view| view.bucket.name == "Kept")
    })
    .await;
    assert_eq!(mirror.buckets[0].bucket.name, "Puzzles");
    assert_eq!(mirror.buckets[1].bucket.id, first);

    view.close().await;
}

#[tokio::test]
async fn opening_without_board_id_fails() {
    let store = Arc::new(InMemoryBoardStore::new());
    let err = open_board_view(store, "  ", ViewOptions::default()).await.err().unwrap();
    assert!(matches!(err, SyncError::MissingBoardId));
}

#[tokio::test]
async fn opening_against_unavailable_store_fails() {
    let store = Arc::new(InMemoryBoardStore::new());
    store.set_unavailable(true);
    let err = open_board_view(Arc::clone(&store), "b1", ViewOptions::default()).await.err().unwrap();
    assert!(matches!(err, SyncError::Subscribe(_)));
    assert_eq!(store.total_subscribers(), 0);
}

fn quick_retry() -> ViewOptions {
    ViewOptions {
        resubscribe_delay: Duration::from_millis(10),
        ..ViewOptions::default()
    }
}

#[tokio::test]
async fn failed_note_subscription_is_reported_and_retried() {
    let store = Arc::new(InMemoryBoardStore::new());
    let board_id = seeded_board(&store, &["A"]).await;
    let bucket_id = bucket_ids(&store, &board_id).remove(0);

    let view = open_board_view(Arc::clone(&store), &board_id, quick_retry())
        .await
        .unwrap();
    // The coordinator has not run yet; every note subscribe attempt fails.
    store.set_unavailable(true);
    let failing = settle(&view, |mirror| !mirror.failed_buckets().is_empty()).await;
    let (failed_bucket, err) = failing.failed_buckets()[0];
    assert_eq!(failed_bucket, &bucket_id);
    assert!(matches!(err, StoreError::Unavailable(_)));
    assert!(!failing.all_notes_loaded());

    store.set_unavailable(false);
    let note_id = NoteService::new(Arc::clone(&store))
        .create_note(&bucket_id, "after recovery")
        .await
        .unwrap();
    let recovered = settle(&view, |mirror| mirror.note(&bucket_id, &note_id).is_some()).await;
    assert!(recovered.failed_buckets().is_empty());
    assert!(recovered.all_notes_loaded());
    assert_eq!(store.subscriber_count(&CollectionPath::Notes(bucket_id)), 1);

    view.close().await;
    assert_eq!(store.total_subscribers(), 0);
}

#[tokio::test]
async fn other_boards_do_not_touch_the_mirror() {
    let store = Arc::new(InMemoryBoardStore::new());
    let board_id = seeded_board(&store, &["A"]).await;
    let other_id = seeded_board(&store, &["B"]).await;
    let view = open_board_view(Arc::clone(&store), &board_id, ViewOptions::default())
        .await
        .unwrap();
    settle(&view, |mirror| mirror.board.is_some() && mirror.all_notes_loaded()).await;
    let before = view.snapshot().version;

    store
        .update(
            &CollectionPath::Boards,
            &other_id,
            record_from([("name", json!("Elsewhere"))]),
        )
        .await
        .unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(view.snapshot().version, before);
    assert_eq!(store.subscriber_count(&CollectionPath::Boards), 0);

    view.close().await;
}

/// Store whose note subscriptions wait for a permit before opening.
struct GatedStore {
    inner: Arc<InMemoryBoardStore>,
    gate: Semaphore,
}

#[async_trait]
impl BoardStore for GatedStore {
    async fn subscribe(&self, path: &CollectionPath) -> StoreResult<Subscription> {
        if matches!(path, CollectionPath::Notes(_)) {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| StoreError::Unavailable("gate closed".to_string()))?;
            permit.forget();
        }
        self.inner.subscribe(path).await
    }

    async fn get(&self, path: &CollectionPath, id: &str) -> StoreResult<Option<Record>> {
        self.inner.get(path, id).await
    }

    async fn append(&self, path: &CollectionPath, record: Record) -> StoreResult<RecordId> {
        self.inner.append(path, record).await
    }

    async fn update(&self, path: &CollectionPath, id: &str, patch: Record) -> StoreResult<()> {
        self.inner.update(path, id, patch).await
    }

    async fn remove(&self, path: &CollectionPath, id: &str) -> StoreResult<()> {
        self.inner.remove(path, id).await
    }

    async fn remove_collection(&self, path: &CollectionPath) -> StoreResult<()> {
        self.inner.remove_collection(path).await
    }
}

#[tokio::test]
async fn pending_note_subscriptions_do_not_block_the_view() {
    let inner = Arc::new(InMemoryBoardStore::new());
    let board_id = seeded_board(&inner, &["A", "B"]).await;
    let store = Arc::new(GatedStore {
        inner: Arc::clone(&inner),
        gate: Semaphore::new(0),
    });
    let view = open_board_view(Arc::clone(&store), &board_id, ViewOptions::default())
        .await
        .unwrap();
    settle(&view, |mirror| mirror.buckets.len() == 2 && mirror.board.is_some()).await;

    inner
        .update(
            &CollectionPath::Boards,
            &board_id,
            record_from([("name", json!("Renamed while waiting"))]),
        )
        .await
        .unwrap();
    let mirror = settle(&view, |mirror| {
        mirror
            .board
            .as_ref()
            .is_some_and(|board| board.name == "Renamed while waiting")
    })
    .await;
    assert!(!mirror.all_notes_loaded());

    store.gate.add_permits(2);
    settle(&view, BoardMirror::all_notes_loaded).await;

    view.close().await;
    assert_eq!(inner.total_subscribers(), 0);
}

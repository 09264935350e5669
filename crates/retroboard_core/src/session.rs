//! Board session: one open board view plus the operations a participant
//! performs on it.
//!
//! # Responsibility
//! - Own the live view of one board for the session lifetime.
//! - Route note, vote and board mutations with explicit targets.
//! - Resolve the acting participant from the identity provider.
//!
//! # Invariants
//! - The session never writes the mirror directly; deletions are evicted
//!   through the view so the coordinator stays the only writer.
//! - Vote and cascade operations fail fast without an authenticated
//!   participant.
//! - A cascade is planned only after the bucket list has been mirrored.

use crate::config::EngineConfig;
use crate::export::{build_export, export_rows, ExportDocument, ExportRow};
use crate::identity::IdentityProvider;
use crate::model::board::{Board, BoardId};
use crate::model::note::{Note, NoteId};
use crate::model::UserId;
use crate::service::board_service::{BoardService, BoardUpdate, CascadeReport};
use crate::service::error::ServiceError;
use crate::service::note_service::{NoteService, NoteTarget};
use crate::store::BoardStore;
use crate::sync::mirror::BoardMirror;
use crate::sync::synchronizer::{open_board_view, BoardView, ViewOptions};
use crate::sync::SyncError;
use crate::vote::{has_voted, VoteToggle};
use log::{info, warn};
use std::sync::Arc;

/// One participant's open board.
pub struct BoardSession<S: BoardStore + ?Sized + 'static, I: IdentityProvider> {
    view: BoardView,
    notes: NoteService<S>,
    boards: BoardService<S>,
    identity: I,
}

impl<S, I> BoardSession<S, I>
where
    S: BoardStore + ?Sized + 'static,
    I: IdentityProvider,
{
    /// Opens the live view of `board_id`.
    pub async fn open(
        store: Arc<S>,
        identity: I,
        board_id: &str,
        config: &EngineConfig,
    ) -> Result<Self, SyncError> {
        let view =
            open_board_view(Arc::clone(&store), board_id, ViewOptions::from_config(config)).await?;
        Ok(Self {
            view,
            notes: NoteService::new(Arc::clone(&store)),
            boards: BoardService::with_default_buckets(store, config.default_buckets.clone()),
            identity,
        })
    }

    pub fn board_id(&self) -> &str {
        self.view.board_id()
    }

    pub fn view(&self) -> &BoardView {
        &self.view
    }

    pub fn snapshot(&self) -> Arc<BoardMirror> {
        self.view.snapshot()
    }

    pub async fn add_note(&self, bucket_id: &str, message: &str) -> Result<NoteId, ServiceError> {
        self.notes.create_note(bucket_id, message).await
    }

    pub async fn update_note(&self, target: &NoteTarget, message: &str) -> Result<(), ServiceError> {
        self.notes.update_note_message(target, message).await
    }

    pub async fn upvote(&self, target: &NoteTarget) -> Result<VoteToggle, ServiceError> {
        let user_id = self.acting_user()?;
        self.notes.upvote(target, &user_id).await
    }

    pub async fn downvote(&self, target: &NoteTarget) -> Result<VoteToggle, ServiceError> {
        let user_id = self.acting_user()?;
        self.notes.downvote(target, &user_id).await
    }

    /// Whether the acting participant holds a vote in `upvote`'s direction.
    ///
    /// Returns `false` without an authenticated participant.
    pub fn has_voted(&self, note: &Note, upvote: bool) -> bool {
        self.identity
            .current_user_id()
            .is_some_and(|user_id| has_voted(&note.votes, &user_id, upvote))
    }

    /// Deletes one note and evicts it from the mirror.
    pub async fn delete_note(&self, target: &NoteTarget) -> Result<(), ServiceError> {
        self.notes.delete_note(target).await?;
        if let Err(err) = self.view.evict_note(&target.bucket_id, &target.note_id).await {
            warn!(
                "event=note_evict module=session status=warn bucket_id={} note_id={} error={}",
                target.bucket_id, target.note_id, err
            );
        }
        Ok(())
    }

    pub async fn update_board(&self, update: &BoardUpdate) -> Result<(), ServiceError> {
        self.boards.update_board(self.view.board_id(), update).await
    }

    /// Deletes this board with every bucket and their notes.
    ///
    /// Waits until the bucket list has been mirrored at least once.
    pub async fn delete_board(&self) -> Result<CascadeReport, ServiceError> {
        let user_id = self.acting_user()?;
        let mirror = self
            .view
            .wait_until(|mirror| mirror.buckets_loaded)
            .await
            .map_err(|_| ServiceError::MissingActiveEntity("board"))?;
        let board = mirror.board.clone().unwrap_or_else(|| Board {
            id: mirror.board_id.clone(),
            name: String::new(),
            owner: None,
            created_at: None,
        });
        self.boards
            .delete_board(&mirror.bucket_list(), &board, &user_id)
            .await
    }

    /// Export document of the current mirror.
    pub fn export(&self) -> ExportDocument {
        build_export(&self.view.snapshot())
    }

    /// Exported notes in display order.
    pub fn export_rows(&self) -> Vec<ExportRow> {
        export_rows(&self.view.snapshot())
    }

    /// Tears down every subscription of this session.
    pub async fn close(self) -> BoardId {
        let board_id = self.view.board_id().to_string();
        self.view.close().await;
        info!("event=session_close module=session status=ok board_id={board_id}");
        board_id
    }

    fn acting_user(&self) -> Result<UserId, ServiceError> {
        self.identity
            .current_user_id()
            .filter(|user_id| !user_id.trim().is_empty())
            .ok_or(ServiceError::MissingIdentity)
    }
}

//! Core engine for collaborative retrospective boards.
//! This crate owns vote aggregation, note ordering, live board
//! synchronization, mutations and export.

pub mod config;
pub mod export;
pub mod identity;
pub mod logging;
pub mod model;
pub mod ordering;
pub mod service;
pub mod session;
pub mod store;
pub mod sync;
pub mod vote;

pub use config::{load_config, ConfigError, EngineConfig};
pub use export::{build_export, export_rows, ExportDocument, ExportEntry, ExportRow};
pub use identity::{IdentityProvider, StaticIdentity};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::board::{Board, BoardId, Bucket, BucketId, BucketTemplate};
pub use model::note::{Note, NoteId};
pub use model::record::{Record, RecordId, StoreEntry};
pub use model::UserId;
pub use ordering::{compare_notes, sort_notes};
pub use service::board_service::{
    BoardService, BoardUpdate, BucketDraft, CascadeReport, CascadeStep, CreateBoardRequest,
};
pub use service::error::{CascadeFailure, ServiceError};
pub use service::note_service::{NoteService, NoteTarget};
pub use session::BoardSession;
pub use store::memory::InMemoryBoardStore;
pub use store::{BoardStore, CollectionPath, StoreError, StoreResult, Subscription};
pub use sync::mirror::{BoardMirror, BucketView};
pub use sync::synchronizer::{open_board_view, BoardView, ViewOptions};
pub use sync::SyncError;
pub use vote::{has_voted, toggle_vote, total_votes, VoteMap, VoteToggle};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

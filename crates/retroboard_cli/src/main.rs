//! CLI demo entry point.
//!
//! # Responsibility
//! - Run one board session against the in-memory store end to end.
//! - Print the export document so the output can be diffed by hand.
//!
//! Usage: `retroboard_cli [config.toml]`

use log::info;
use retroboard_core::{
    core_version, init_logging_from_config, load_config, BoardMirror, BoardService, BoardSession,
    EngineConfig, InMemoryBoardStore, NoteTarget, StaticIdentity,
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_USER: &str = "demo-user";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => load_config(&path)?,
        None => EngineConfig::default().with_env_overrides()?,
    };
    init_logging_from_config(&config)?;
    println!("retroboard_core version={}", core_version());

    let store = Arc::new(InMemoryBoardStore::new());
    let boards = BoardService::with_default_buckets(Arc::clone(&store), config.default_buckets.clone());
    let board_id = boards
        .create_board_from_template("Demo retro", Some(DEMO_USER))
        .await?;

    let session = BoardSession::open(
        Arc::clone(&store),
        StaticIdentity::authenticated(DEMO_USER),
        &board_id,
        &config,
    )
    .await?;
    let expected_buckets = boards.default_buckets().len();
    let mirror = session
        .view()
        .wait_until(|mirror| mirror.buckets.len() == expected_buckets && mirror.all_notes_loaded())
        .await?;

    if let Some(first) = mirror.buckets.first() {
        let bucket_id = first.bucket.id.clone();
        let shipped = session.add_note(&bucket_id, "Shipped the release on time").await?;
        let pairing = session.add_note(&bucket_id, "Pairing sessions helped").await?;
        session
            .upvote(&NoteTarget::new(bucket_id.clone(), shipped.clone()))
            .await?;
        let settled = session
            .view()
            .wait_until(|mirror: &BoardMirror| {
                mirror.bucket(&bucket_id).is_some_and(|view| view.notes.len() == 2)
                    && mirror
                        .note(&bucket_id, &shipped)
                        .is_some_and(|note| note.score() == 1)
            })
            .await?;
        if let Some(note) = settled.note(&bucket_id, &pairing) {
            session.downvote(&NoteTarget::of(note)).await?;
            session
                .view()
                .wait_until(|mirror: &BoardMirror| {
                    mirror
                        .note(&bucket_id, &pairing)
                        .is_some_and(|note| note.score() == -1)
                })
                .await?;
        }
    }

    println!("{}", session.export().to_json_pretty()?);
    let board_id = session.close().await;
    info!("event=cli_demo module=cli status=ok board_id={board_id}");
    Ok(())
}

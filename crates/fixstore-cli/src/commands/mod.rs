//! CLI command implementations.

pub mod admin;
pub mod check;
pub mod config;
pub mod inspect;
pub mod messages;

use anyhow::Context;

use fixstore_core::config::StoreConfig;
use fixstore_core::SessionId;
use fixstore_session::{FileStore, FileStoreOptions, StorePaths};

use crate::AppContext;

/// Open the selected session's store, creating its files if needed.
pub fn open_store(ctx: &AppContext) -> anyhow::Result<FileStore> {
    let session_id = ctx.session_id()?;
    open_at(&ctx.config.store, &session_id)
}

/// Open the selected session's store, failing if none of its files exist.
pub fn open_existing_store(ctx: &AppContext) -> anyhow::Result<FileStore> {
    let session_id = ctx.session_id()?;
    let paths = StorePaths::new(&ctx.config.store.path, &session_id);
    if !paths.all().iter().any(|p| p.exists()) {
        anyhow::bail!(
            "No store for {} under {}",
            session_id,
            ctx.config.store.path.display()
        );
    }
    open_at(&ctx.config.store, &session_id)
}

fn open_at(config: &StoreConfig, session_id: &SessionId) -> anyhow::Result<FileStore> {
    FileStore::open(
        Some(&config.path),
        session_id,
        FileStoreOptions::from_config(config),
    )
    .with_context(|| {
        format!(
            "Failed to open store for {} under {}",
            session_id,
            config.path.display()
        )
    })
}

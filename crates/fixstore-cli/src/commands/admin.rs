//! Counter and lifecycle commands.

use anyhow::Context;

use fixstore_core::UtcTimestamp;
use fixstore_session::{FileStore, MessageStore};

use crate::AppContext;

pub fn set_seq(
    ctx: &AppContext,
    next_sender: Option<u64>,
    next_target: Option<u64>,
) -> anyhow::Result<()> {
    if next_sender.is_none() && next_target.is_none() {
        anyhow::bail!("Nothing to set; pass --next-sender and/or --next-target");
    }
    let mut store = super::open_store(ctx)?;
    apply_seq(&mut store, next_sender, next_target)?;

    println!(
        "Next sender seq: {}, next target seq: {}",
        store.next_sender_seq(),
        store.next_target_seq()
    );
    Ok(())
}

pub fn apply_seq(
    store: &mut FileStore,
    next_sender: Option<u64>,
    next_target: Option<u64>,
) -> anyhow::Result<()> {
    if let Some(next) = next_sender {
        store
            .set_next_sender_seq(next)
            .context("Failed to store next sender seq")?;
    }
    if let Some(next) = next_target {
        store
            .set_next_target_seq(next)
            .context("Failed to store next target seq")?;
    }
    Ok(())
}

pub fn reset(ctx: &AppContext) -> anyhow::Result<()> {
    let mut store = super::open_store(ctx)?;
    store.reset().context("Failed to reset store")?;

    let created = store
        .creation_time()
        .map(|t| UtcTimestamp::encode(&t))
        .unwrap_or_default();
    println!(
        "Reset {}; counters at 1, created {}. {} stored messages kept.",
        store.session_id(),
        created,
        store.indexed_sequences().len()
    );
    Ok(())
}

pub fn wipe(ctx: &AppContext, confirmed: bool) -> anyhow::Result<()> {
    let session_id = ctx.session_id()?;
    if !confirmed {
        anyhow::bail!(
            "Refusing to delete the files of {} without --yes",
            session_id
        );
    }

    let mut store = super::open_store(ctx)?;
    store.reset_and_wipe().context("Failed to wipe store")?;
    println!("Wiped {}; store starts over at sequence 1.", session_id);
    Ok(())
}

//! Store inspection.

use serde::Serialize;

use fixstore_core::UtcTimestamp;
use fixstore_session::{FileStore, MessageStore};

use crate::AppContext;

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub session: String,
    pub body_file: String,
    pub body_len: u64,
    pub index_format: String,
    pub next_sender_seq: u64,
    pub next_target_seq: u64,
    pub creation_time: Option<String>,
    pub messages: Vec<IndexedMessage>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct IndexedMessage {
    pub sequence: u64,
    pub offset: u64,
    pub size: u64,
}

pub fn report(store: &FileStore) -> anyhow::Result<InspectReport> {
    let messages = store
        .indexed_sequences()
        .into_iter()
        .filter_map(|sequence| {
            store.index_entry(sequence).map(|entry| IndexedMessage {
                sequence,
                offset: entry.offset,
                size: entry.size,
            })
        })
        .collect();

    Ok(InspectReport {
        session: store.session_id().to_string(),
        body_file: store.body_path().display().to_string(),
        body_len: store.body_len()?,
        index_format: store.options().index_format.to_string(),
        next_sender_seq: store.next_sender_seq(),
        next_target_seq: store.next_target_seq(),
        creation_time: store.creation_time().map(|t| UtcTimestamp::encode(&t)),
        messages,
    })
}

pub fn run(ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let store = super::open_existing_store(ctx)?;
    let report = report(&store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Session:         {}", report.session);
    println!("Body file:       {} ({} bytes)", report.body_file, report.body_len);
    println!("Index format:    {}", report.index_format);
    println!("Next sender seq: {}", report.next_sender_seq);
    println!("Next target seq: {}", report.next_target_seq);
    println!(
        "Created:         {}",
        report.creation_time.as_deref().unwrap_or("(never reset)")
    );

    if report.messages.is_empty() {
        println!("\nNo stored messages.");
        return Ok(());
    }

    println!("\nStored messages ({}):", report.messages.len());
    println!("  {:>10}  {:>12}  {:>8}", "SEQ", "OFFSET", "SIZE");
    for message in &report.messages {
        println!(
            "  {:>10}  {:>12}  {:>8}",
            message.sequence, message.offset, message.size
        );
    }

    Ok(())
}

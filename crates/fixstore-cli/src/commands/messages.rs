//! Reading stored messages back out.

use anyhow::Context;
use tracing::info;

use fixstore_log::{CompositeLog, Log, LogFactory, ScreenLogFactory, SqliteLogFactory};
use fixstore_session::MessageStore;

use crate::AppContext;

const SOH: char = '\u{1}';

/// Render a raw message for the terminal.
pub fn display_text(message: &[u8], pipes: bool) -> String {
    let text = String::from_utf8_lossy(message);
    if pipes {
        text.replace(SOH, "|")
    } else {
        text.into_owned()
    }
}

pub fn get(ctx: &AppContext, start: u64, end: u64, pipes: bool) -> anyhow::Result<()> {
    if start > end {
        anyhow::bail!("Start {} is after end {}", start, end);
    }
    let mut store = super::open_existing_store(ctx)?;

    let mut messages = Vec::new();
    store
        .get(start, end, &mut messages)
        .with_context(|| format!("Failed to read messages {}..={}", start, end))?;

    if messages.is_empty() {
        println!("No stored messages in {}..={}.", start, end);
        return Ok(());
    }
    for message in &messages {
        println!("{}", display_text(message, pipes));
    }
    Ok(())
}

/// Build the logs configured for the selected session.
pub fn configured_logs(ctx: &AppContext, force_screen: bool) -> anyhow::Result<CompositeLog> {
    let session_id = ctx.session_id()?;
    let mut logs = CompositeLog::default();

    let screen = if force_screen {
        ScreenLogFactory::new(true, true, true)
    } else {
        ScreenLogFactory::from_config(&ctx.config.screen_log)
    };
    logs.push(screen.create(&session_id)?);

    if let Some(sqlite) = SqliteLogFactory::from_config(&ctx.config.sqlite_log) {
        let log = sqlite
            .create(&session_id)
            .with_context(|| format!("Failed to open SQLite log {}", sqlite.path().display()))?;
        logs.push(log);
    }
    Ok(logs)
}

pub fn replay(
    ctx: &AppContext,
    start: u64,
    end: u64,
    incoming: bool,
    force_screen: bool,
) -> anyhow::Result<()> {
    if start > end {
        anyhow::bail!("Start {} is after end {}", start, end);
    }
    let mut store = super::open_existing_store(ctx)?;
    let mut logs = configured_logs(ctx, force_screen)?;

    let count = replay_into(&mut store, &mut logs, start, end, incoming)?;
    info!(count, start, end, "Replayed stored messages");
    Ok(())
}

/// Feed messages `start..=end` to `log`, bracketed by two events.
pub fn replay_into(
    store: &mut impl MessageStore,
    log: &mut dyn Log,
    start: u64,
    end: u64,
    incoming: bool,
) -> anyhow::Result<usize> {
    let mut messages = Vec::new();
    store
        .get(start, end, &mut messages)
        .with_context(|| format!("Failed to read messages {}..={}", start, end))?;

    log.on_event(&format!("Replaying messages {} to {}", start, end));
    for message in &messages {
        let text = String::from_utf8_lossy(message);
        if incoming {
            log.on_incoming(&text);
        } else {
            log.on_outgoing(&text);
        }
    }
    log.on_event(&format!("Replayed {} messages", messages.len()));
    Ok(messages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{open_store, test_support};
    use fixstore_core::SessionId;
    use fixstore_log::SqliteLog;
    use tempfile::TempDir;

    #[test]
    fn test_display_text_pipes() {
        assert_eq!(display_text(b"8=FIX.4.2\x0135=0\x01", true), "8=FIX.4.2|35=0|");
        assert_eq!(display_text(b"plain", false), "plain");
    }

    #[test]
    fn test_replay_into_sqlite_log() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_support::context(temp_dir.path());
        let mut store = open_store(&ctx).unwrap();
        store.set(1, b"A").unwrap();
        store.set(3, b"CCC").unwrap();

        let session_id = SessionId::new("FIX.4.2", "BANZAI", "EXEC");
        let mut log = SqliteLog::open_in_memory(session_id).unwrap();
        let count = replay_into(&mut store, &mut log, 1, 5, true).unwrap();

        assert_eq!(count, 2);
        let texts: Vec<_> = log.messages().unwrap().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["A", "CCC"]);
        assert_eq!(log.events().unwrap().len(), 2);
    }

    #[test]
    fn test_configured_logs_adds_sqlite_when_set() {
        let temp_dir = TempDir::new().unwrap();
        let mut ctx = test_support::context(temp_dir.path());
        assert_eq!(configured_logs(&ctx, false).unwrap().len(), 1);

        ctx.config.sqlite_log.path = Some(temp_dir.path().join("log.db"));
        assert_eq!(configured_logs(&ctx, false).unwrap().len(), 2);
    }
}

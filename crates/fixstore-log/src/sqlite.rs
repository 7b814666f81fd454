//! SQLite-backed session log.
//!
//! Incoming and outgoing messages share the `messages_log` table; events go
//! to `event_log`. Rows carry the session identity so several sessions can
//! log into one database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection};
use tracing::{debug, error};

use fixstore_core::config::SqliteLogConfig;
use fixstore_core::{SessionId, SystemTimeSource, TimeSource};

use crate::{Log, LogFactory, LogFlags, Result};

const MESSAGES_TABLE: &str = "messages_log";
const EVENTS_TABLE: &str = "event_log";

/// One stored log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    /// RFC 3339 insertion time
    pub time: String,
    pub text: String,
}

pub struct SqliteLog {
    conn: Connection,
    session_id: SessionId,
    flags: LogFlags,
    time_source: Arc<dyn TimeSource>,
}

impl SqliteLog {
    /// Open (creating if needed) the log database at `path`.
    pub fn open(path: impl AsRef<Path>, session_id: SessionId) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        debug!(path = %path.display(), session = %session_id, "Opened SQLite log");
        Self::with_connection(conn, session_id)
    }

    /// Log held in memory, mostly for tests.
    pub fn open_in_memory(session_id: SessionId) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, session_id)
    }

    fn with_connection(conn: Connection, session_id: SessionId) -> Result<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn,
            session_id,
            flags: LogFlags::ALL,
            time_source: Arc::new(SystemTimeSource),
        })
    }

    pub fn with_flags(mut self, flags: LogFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Delete this session's rows from both tables.
    pub fn clear(&mut self) -> Result<()> {
        for table in [MESSAGES_TABLE, EVENTS_TABLE] {
            let sql = format!(
                "DELETE FROM {} WHERE beginstring = ?1 AND sendercompid = ?2 \
                 AND targetcompid = ?3 AND session_qualifier = ?4",
                table
            );
            self.conn.execute(
                &sql,
                params![
                    self.session_id.begin_string(),
                    self.session_id.sender_comp_id(),
                    self.session_id.target_comp_id(),
                    self.qualifier(),
                ],
            )?;
        }
        Ok(())
    }

    /// This session's messages in insertion order.
    pub fn messages(&self) -> Result<Vec<LogRow>> {
        self.rows(MESSAGES_TABLE)
    }

    /// This session's events in insertion order.
    pub fn events(&self) -> Result<Vec<LogRow>> {
        self.rows(EVENTS_TABLE)
    }

    fn rows(&self, table: &str) -> Result<Vec<LogRow>> {
        let sql = format!(
            "SELECT time, text FROM {} WHERE beginstring = ?1 AND sendercompid = ?2 \
             AND targetcompid = ?3 AND session_qualifier = ?4 ORDER BY id",
            table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    self.session_id.begin_string(),
                    self.session_id.sender_comp_id(),
                    self.session_id.target_comp_id(),
                    self.qualifier(),
                ],
                |row| {
                    Ok(LogRow {
                        time: row.get(0)?,
                        text: row.get(1)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn qualifier(&self) -> &str {
        self.session_id.session_qualifier().unwrap_or("")
    }

    fn insert(&self, table: &str, text: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (time, beginstring, sendercompid, targetcompid, \
             session_qualifier, text) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            table
        );
        self.conn.execute(
            &sql,
            params![
                self.time_source.now().to_rfc3339(),
                self.session_id.begin_string(),
                self.session_id.sender_comp_id(),
                self.session_id.target_comp_id(),
                self.qualifier(),
                text,
            ],
        )?;
        Ok(())
    }

    fn record(&self, table: &str, text: &str) {
        if let Err(e) = self.insert(table, text) {
            error!(session = %self.session_id, table, error = %e, "Failed to write SQLite log");
        }
    }
}

impl Log for SqliteLog {
    fn on_incoming(&mut self, message: &str) {
        if self.flags.incoming {
            self.record(MESSAGES_TABLE, message);
        }
    }

    fn on_outgoing(&mut self, message: &str) {
        if self.flags.outgoing {
            self.record(MESSAGES_TABLE, message);
        }
    }

    fn on_event(&mut self, text: &str) {
        if self.flags.events {
            self.record(EVENTS_TABLE, text);
        }
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    // The table does not exist before the first migration.
    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        let migration = include_str!("../migrations/001_log_tables.sql");
        conn.execute_batch(migration)?;
        debug!("Applied log schema version 1");
    }

    Ok(())
}

/// Opens one [`SqliteLog`] per session, all sharing a database file.
#[derive(Debug, Clone)]
pub struct SqliteLogFactory {
    path: PathBuf,
}

impl SqliteLogFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `None` when no database path is configured.
    pub fn from_config(config: &SqliteLogConfig) -> Option<Self> {
        config.path.clone().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogFactory for SqliteLogFactory {
    fn create(&self, session_id: &SessionId) -> Result<Box<dyn Log>> {
        Ok(Box::new(SqliteLog::open(&self.path, session_id.clone())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fixstore_core::MockTimeSource;
    use tempfile::TempDir;

    fn session_id() -> SessionId {
        SessionId::new("FIX.4.2", "BANZAI", "EXEC")
    }

    #[test]
    fn test_messages_and_events_go_to_separate_tables() {
        let mut log = SqliteLog::open_in_memory(session_id()).unwrap();
        log.on_incoming("8=FIX.4.2|35=A");
        log.on_outgoing("8=FIX.4.2|35=0");
        log.on_event("Logon complete");

        let messages: Vec<_> = log.messages().unwrap().into_iter().map(|r| r.text).collect();
        assert_eq!(messages, vec!["8=FIX.4.2|35=A", "8=FIX.4.2|35=0"]);
        let events = log.events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text, "Logon complete");
    }

    #[test]
    fn test_time_comes_from_time_source() {
        let clock = Arc::new(MockTimeSource::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        ));
        let mut log = SqliteLog::open_in_memory(session_id())
            .unwrap()
            .with_time_source(clock);
        log.on_event("hello");

        assert_eq!(log.events().unwrap()[0].time, "2024-03-01T12:30:00+00:00");
    }

    #[test]
    fn test_flags_filter_categories() {
        let mut log = SqliteLog::open_in_memory(session_id())
            .unwrap()
            .with_flags(LogFlags::new(false, true, false));
        log.on_incoming("in");
        log.on_outgoing("out");
        log.on_event("event");

        assert_eq!(log.messages().unwrap().len(), 1);
        assert!(log.events().unwrap().is_empty());
    }

    #[test]
    fn test_sessions_share_file_but_not_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("fix.db");
        let factory = SqliteLogFactory::new(&path);

        let mut first = factory.create(&session_id()).unwrap();
        first.on_event("first");
        let qualified = session_id().with_qualifier("east");
        let mut second = factory.create(&qualified).unwrap();
        second.on_event("second");

        let reopened = SqliteLog::open(&path, session_id()).unwrap();
        let events: Vec<_> = reopened.events().unwrap().into_iter().map(|r| r.text).collect();
        assert_eq!(events, vec!["first"]);

        let reopened = SqliteLog::open(&path, qualified).unwrap();
        assert_eq!(reopened.events().unwrap().len(), 1);
    }

    #[test]
    fn test_clear_only_touches_own_session() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fix.db");

        let mut mine = SqliteLog::open(&path, session_id()).unwrap();
        let mut other = SqliteLog::open(&path, SessionId::new("FIX.4.4", "A", "B")).unwrap();
        mine.on_incoming("mine");
        other.on_incoming("other");

        mine.clear().unwrap();
        assert!(mine.messages().unwrap().is_empty());
        assert_eq!(other.messages().unwrap().len(), 1);
    }

    #[test]
    fn test_factory_from_config() {
        assert!(SqliteLogFactory::from_config(&SqliteLogConfig::default()).is_none());
        let config = SqliteLogConfig {
            path: Some(PathBuf::from("/tmp/fix.db")),
        };
        let factory = SqliteLogFactory::from_config(&config).unwrap();
        assert_eq!(factory.path(), Path::new("/tmp/fix.db"));
    }
}

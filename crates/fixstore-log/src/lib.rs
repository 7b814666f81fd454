//! # fixstore-log
//!
//! Free-text session logs, kept separate from the message store.
//!
//! This crate provides:
//! - The [`Log`] / [`LogFactory`] boundary a protocol session writes to
//! - [`ScreenLog`], printing enabled categories to stdout
//! - [`SqliteLog`], inserting rows into `messages_log` and `event_log`
//!
//! Each category (incoming, outgoing, events) is switched with the
//! `LogIncoming`, `LogOutgoing` and `LogEvents` options (`Y`/`N`).

pub mod screen;
pub mod sqlite;

use thiserror::Error;

use fixstore_core::SessionId;

pub use screen::{ScreenLog, ScreenLogFactory};
pub use sqlite::{LogRow, SqliteLog, SqliteLogFactory};

/// Errors that can occur while opening or writing a log.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LogError>;

/// Receives notifications from a protocol session.
///
/// Logging never fails the session: implementations report their own write
/// failures through `tracing`.
pub trait Log: Send {
    fn on_incoming(&mut self, message: &str);

    fn on_outgoing(&mut self, message: &str);

    fn on_event(&mut self, text: &str);
}

/// Creates one log per session.
pub trait LogFactory {
    fn create(&self, session_id: &SessionId) -> Result<Box<dyn Log>>;
}

/// Which categories a log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogFlags {
    pub incoming: bool,
    pub outgoing: bool,
    pub events: bool,
}

impl LogFlags {
    pub const ALL: LogFlags = LogFlags {
        incoming: true,
        outgoing: true,
        events: true,
    };

    pub fn new(incoming: bool, outgoing: bool, events: bool) -> Self {
        Self {
            incoming,
            outgoing,
            events,
        }
    }
}

/// Fans every notification out to several logs.
#[derive(Default)]
pub struct CompositeLog {
    logs: Vec<Box<dyn Log>>,
}

impl CompositeLog {
    pub fn new(logs: Vec<Box<dyn Log>>) -> Self {
        Self { logs }
    }

    pub fn push(&mut self, log: Box<dyn Log>) {
        self.logs.push(log);
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

impl Log for CompositeLog {
    fn on_incoming(&mut self, message: &str) {
        for log in &mut self.logs {
            log.on_incoming(message);
        }
    }

    fn on_outgoing(&mut self, message: &str) {
        for log in &mut self.logs {
            log.on_outgoing(message);
        }
    }

    fn on_event(&mut self, text: &str) {
        for log in &mut self.logs {
            log.on_event(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Log for Recorder {
        fn on_incoming(&mut self, message: &str) {
            self.0.lock().push(format!("in:{}", message));
        }

        fn on_outgoing(&mut self, message: &str) {
            self.0.lock().push(format!("out:{}", message));
        }

        fn on_event(&mut self, text: &str) {
            self.0.lock().push(format!("event:{}", text));
        }
    }

    #[test]
    fn test_composite_log_fans_out() {
        let first = Recorder::default();
        let second = Recorder::default();
        let mut log = CompositeLog::new(vec![Box::new(first.clone())]);
        log.push(Box::new(second.clone()));
        assert_eq!(log.len(), 2);

        log.on_incoming("a");
        log.on_event("b");

        assert_eq!(*first.0.lock(), vec!["in:a", "event:b"]);
        assert_eq!(*second.0.lock(), vec!["in:a", "event:b"]);
    }
}

//! Message store contract.
//!
//! The owning protocol session drives a store through [`MessageStore`]: it
//! persists every message it sends under its sequence number and advances the
//! two counters as messages flow in each direction.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use fixstore_core::{SessionId, TimestampError};

use crate::index::IndexError;

/// Errors that can occur during message store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("Store files are closed")]
    Closed,

    #[error("Message {sequence} at {offset}+{size} lies past the body length {body_len}")]
    OutOfBounds {
        sequence: u64,
        offset: u64,
        size: u64,
        body_len: u64,
    },

    #[error("Next {0} sequence number would overflow")]
    SequenceOverflow(&'static str),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Configuration error: {0}")]
    Config(#[from] fixstore_core::Error),
}

/// Reasons a store file could not be parsed at load time.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid creation time: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("malformed sequence record: {0}")]
    SequenceRecord(String),

    #[error("malformed header index: {0}")]
    HeaderIndex(#[from] IndexError),
}

impl StoreError {
    pub(crate) fn load(path: impl Into<PathBuf>, source: impl Into<LoadError>) -> Self {
        StoreError::Load {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence contract used by a protocol session.
///
/// Implementations are not internally synchronized; every mutating call takes
/// `&mut self` and the owner serializes access.
pub trait MessageStore {
    /// Store `message` under `sequence`, superseding any earlier message with
    /// the same sequence number.
    fn set(&mut self, sequence: u64, message: &[u8]) -> Result<bool>;

    /// Append every stored message in `[start, end]` to `messages`, in
    /// sequence order. Missing sequence numbers are skipped.
    fn get(&mut self, start: u64, end: u64, messages: &mut Vec<Vec<u8>>) -> Result<()>;

    /// Legacy single-message lookup. Use [`MessageStore::get`] with equal
    /// bounds instead.
    fn get_single(&mut self, sequence: u64, message: &mut Vec<u8>) -> Result<bool>;

    fn next_sender_seq(&self) -> u64;

    fn next_target_seq(&self) -> u64;

    fn set_next_sender_seq(&mut self, next: u64) -> Result<()>;

    fn set_next_target_seq(&mut self, next: u64) -> Result<()>;

    fn incr_next_sender_seq(&mut self) -> Result<()>;

    fn incr_next_target_seq(&mut self) -> Result<()>;

    /// Creation time of the current session, absent until the first reset.
    fn creation_time(&self) -> Option<DateTime<Utc>>;

    /// Restart both counters at 1 and stamp a new creation time.
    fn reset(&mut self) -> Result<()>;
}

/// A store whose in-memory state can be rebuilt from its backing files.
pub trait RefreshableMessageStore: MessageStore {
    fn refresh(&mut self) -> Result<()>;
}

/// Creates one store per session.
pub trait MessageStoreFactory {
    type Store: MessageStore;

    fn create(&self, session_id: &SessionId) -> Result<Self::Store>;
}

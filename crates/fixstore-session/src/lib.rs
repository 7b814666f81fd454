//! # fixstore-session
//!
//! Durable message store for a protocol session.
//!
//! This crate provides:
//! - An append-only body file holding raw message bytes
//! - An append-only header index mapping sequence numbers to body ranges
//! - Persistent next-sender / next-target sequence numbers
//! - The session creation time
//! - Recovery that rebuilds all in-memory state from those files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fixstore_core::SessionId;
//! use fixstore_session::{FileStore, FileStoreOptions, MessageStore};
//!
//! let id = SessionId::new("FIX.4.2", "BANZAI", "EXEC");
//! let mut store = FileStore::open(Some("data".as_ref()), &id, FileStoreOptions::default())?;
//!
//! store.set(1, b"8=FIX.4.2\x01...")?;
//! store.incr_next_sender_seq()?;
//!
//! let mut resend = Vec::new();
//! store.get(1, 1, &mut resend)?;
//! ```
//!
//! ## Storage Layout
//!
//! For a session `FIX.4.2-BANZAI-EXEC` the store keeps, under its base directory:
//! - `FIX.4.2-BANZAI-EXEC.body` - message bytes, append-only
//! - `FIX.4.2-BANZAI-EXEC.header` - `seq,offset,size` records, append-only
//! - `FIX.4.2-BANZAI-EXEC.seqnums` - counters, rewritten in place
//! - `FIX.4.2-BANZAI-EXEC.session` - creation time, rewritten on reset
//!
//! Re-storing a sequence number never reclaims the earlier bytes; the body
//! file only grows until the store is wiped.

pub mod cache;
pub mod file_store;
pub mod files;
pub mod index;
pub mod recovery;
pub mod store;

pub use cache::{SessionCache, INITIAL_SEQ_NUM};
pub use file_store::{FileStore, FileStoreFactory, FileStoreOptions};
pub use files::StorePaths;
pub use index::{DigitRuns, IndexEntry, IndexRecord};
pub use recovery::{IssueSeverity, ValidationIssue, ValidationResult};
pub use store::{
    LoadError, MessageStore, MessageStoreFactory, RefreshableMessageStore, Result, StoreError,
};

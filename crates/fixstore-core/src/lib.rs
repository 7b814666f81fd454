//! # fixstore-core
//!
//! Shared building blocks for the fixstore message store.
//!
//! This crate provides:
//! - Session identity and the file-name prefix derived from it
//! - The fixed-width UTC timestamp codec used by the session file
//! - An injectable time source (system clock or settable mock)
//! - Layered configuration
//! - Common error types

pub mod config;
pub mod error;
pub mod session_id;
pub mod time;
pub mod timestamp;

pub use config::{Config, IndexFormat, YesNo};
pub use error::{Error, Result};
pub use session_id::SessionId;
pub use time::{MockTimeSource, SystemTimeSource, TimeSource};
pub use timestamp::{TimestampError, UtcTimestamp, TIMESTAMP_LEN};

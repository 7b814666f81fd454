//! Fixed-width UTC timestamp codec.
//!
//! Session creation times are stored as exactly [`TIMESTAMP_LEN`] ASCII bytes
//! in the layout `YYYYMMDD-HH:MM:SS`, always UTC and without sub-seconds.

use chrono::{DateTime, NaiveDateTime, SubsecRound, TimeZone, Utc};
use thiserror::Error;

/// Length in bytes of an encoded timestamp.
pub const TIMESTAMP_LEN: usize = 17;

const FORMAT: &str = "%Y%m%d-%H:%M:%S";

/// Errors produced while decoding a timestamp.
#[derive(Error, Debug)]
pub enum TimestampError {
    #[error("Timestamp must be 17 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Timestamp is not ASCII text")]
    NotText,

    #[error("Invalid timestamp '{input}': {source}")]
    Parse {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Codec for the `YYYYMMDD-HH:MM:SS` layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcTimestamp;

impl UtcTimestamp {
    /// Render a time as 17 ASCII bytes. Sub-second precision is dropped.
    pub fn encode(time: &DateTime<Utc>) -> String {
        time.format(FORMAT).to_string()
    }

    /// Parse a 17-byte timestamp.
    pub fn decode(text: &str) -> Result<DateTime<Utc>, TimestampError> {
        if text.len() != TIMESTAMP_LEN {
            return Err(TimestampError::InvalidLength(text.len()));
        }
        let naive = NaiveDateTime::parse_from_str(text, FORMAT).map_err(|source| {
            TimestampError::Parse {
                input: text.to_string(),
                source,
            }
        })?;
        Ok(Utc.from_utc_datetime(&naive))
    }

    /// Parse a timestamp straight from file bytes.
    pub fn decode_bytes(bytes: &[u8]) -> Result<DateTime<Utc>, TimestampError> {
        let text = std::str::from_utf8(bytes).map_err(|_| TimestampError::NotText)?;
        Self::decode(text)
    }

    /// Truncate a time to the precision the codec can represent.
    pub fn truncate(time: DateTime<Utc>) -> DateTime<Utc> {
        time.trunc_subsecs(0)
    }
}

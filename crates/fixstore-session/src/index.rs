//! Header index record codecs.
//!
//! Each stored message is described by one `(sequence, offset, size)` record
//! appended to the header file. Two layouts exist:
//!
//! - **Text**: `seq,offset,size` records separated by a single space, the first
//!   record without a leading separator. There is no length prefix; records
//!   are recovered by scanning digit runs.
//! - **Binary**: fixed-width records of three big-endian `u64`s.

use fixstore_core::IndexFormat;
use thiserror::Error;
use tracing::warn;

/// Size of one binary header record.
pub const BINARY_RECORD_LEN: usize = 24;

/// Location of one message inside the body file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: u64,
    pub size: u64,
}

/// One header record as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub sequence: u64,
    pub offset: u64,
    pub size: u64,
}

impl IndexEntry {
    /// One past the last body byte, `None` when the range overflows.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

impl IndexRecord {
    pub fn entry(&self) -> IndexEntry {
        IndexEntry {
            offset: self.offset,
            size: self.size,
        }
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("digit run at byte {position} overflows a 64-bit integer")]
    Overflow { position: usize },
}

/// Scans a byte slice for runs of ASCII digits.
///
/// Each call to [`DigitRuns::next_run`] skips any non-digit bytes, then
/// accumulates consecutive digits into an unsigned integer.
#[derive(Debug)]
pub struct DigitRuns<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DigitRuns<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Byte position of the scanner.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Next digit run, or `None` once the input is exhausted.
    pub fn next_run(&mut self) -> Result<Option<u64>, IndexError> {
        while self.pos < self.data.len() && !self.data[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos >= self.data.len() {
            return Ok(None);
        }

        let start = self.pos;
        let mut value: u64 = 0;
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_digit() {
            let digit = u64::from(self.data[self.pos] - b'0');
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or(IndexError::Overflow { position: start })?;
            self.pos += 1;
        }
        Ok(Some(value))
    }
}

/// Encode one record for appending to a header file of `header_len` bytes.
pub fn encode_record(format: IndexFormat, record: &IndexRecord, header_len: u64) -> Vec<u8> {
    match format {
        IndexFormat::Text => {
            let separator = if header_len > 0 { " " } else { "" };
            format!(
                "{}{},{},{}",
                separator, record.sequence, record.offset, record.size
            )
            .into_bytes()
        }
        IndexFormat::Binary => {
            let mut buf = Vec::with_capacity(BINARY_RECORD_LEN);
            buf.extend_from_slice(&record.sequence.to_be_bytes());
            buf.extend_from_slice(&record.offset.to_be_bytes());
            buf.extend_from_slice(&record.size.to_be_bytes());
            buf
        }
    }
}

/// Decode every complete record of a header file, in file order.
pub fn decode_records(format: IndexFormat, data: &[u8]) -> Result<Vec<IndexRecord>, IndexError> {
    match format {
        IndexFormat::Text => decode_text(data),
        IndexFormat::Binary => Ok(decode_binary(data)),
    }
}

fn decode_text(data: &[u8]) -> Result<Vec<IndexRecord>, IndexError> {
    let mut runs = DigitRuns::new(data);
    let mut records = Vec::new();

    while let Some(sequence) = runs.next_run()? {
        let offset = runs.next_run()?;
        let size = runs.next_run()?;
        match (offset, size) {
            (Some(offset), Some(size)) => records.push(IndexRecord {
                sequence,
                offset,
                size,
            }),
            _ => {
                warn!(
                    sequence,
                    position = runs.position(),
                    "Dropping truncated header record"
                );
                break;
            }
        }
    }

    Ok(records)
}

fn decode_binary(data: &[u8]) -> Vec<IndexRecord> {
    let chunks = data.chunks_exact(BINARY_RECORD_LEN);
    let trailing = chunks.remainder().len();
    let records = chunks
        .map(|chunk| IndexRecord {
            sequence: read_u64(&chunk[0..8]),
            offset: read_u64(&chunk[8..16]),
            size: read_u64(&chunk[16..24]),
        })
        .collect();

    if trailing > 0 {
        warn!(trailing, "Ignoring partial binary header record");
    }
    records
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}

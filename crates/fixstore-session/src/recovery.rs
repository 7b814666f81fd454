//! Recovery load and integrity checks.
//!
//! The store keeps no checkpoint: its whole in-memory state is rebuilt from
//! the four files every time they are opened or refreshed.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use tracing::{debug, info, warn};

use fixstore_core::{IndexFormat, UtcTimestamp, TIMESTAMP_LEN};

use crate::cache::SessionCache;
use crate::files::{decode_sequence_text, OpenFiles, StorePaths};
use crate::index::{decode_records, IndexEntry};
use crate::store::{LoadError, Result, StoreError};

/// State reconstructed from disk.
#[derive(Debug, Default)]
pub(crate) struct RecoveredState {
    pub cache: SessionCache,
    pub index: BTreeMap<u64, IndexEntry>,
}

/// Rebuild the cache and message index from the open files.
///
/// Empty counter and session files leave the corresponding cache fields at
/// their defaults. Any parse failure aborts the whole load.
pub(crate) fn load(
    files: &mut OpenFiles,
    paths: &StorePaths,
    format: IndexFormat,
) -> Result<RecoveredState> {
    let mut state = RecoveredState::default();

    let body_len = files.body.metadata()?.len();
    let records = load_message_index(
        &mut files.header,
        paths,
        format,
        body_len,
        &mut state.index,
    )?;
    load_sequence_numbers(&mut files.seqnums, paths, &mut state.cache)?;
    load_creation_time(&mut files.session, paths, &mut state.cache)?;

    info!(
        records,
        messages = state.index.len(),
        next_sender_seq = state.cache.next_sender_seq(),
        next_target_seq = state.cache.next_target_seq(),
        "Recovered message store"
    );
    Ok(state)
}

fn load_message_index(
    header: &mut File,
    paths: &StorePaths,
    format: IndexFormat,
    body_len: u64,
    index: &mut BTreeMap<u64, IndexEntry>,
) -> Result<usize> {
    let mut data = Vec::new();
    header.seek(SeekFrom::Start(0))?;
    header.read_to_end(&mut data)?;

    let records =
        decode_records(format, &data).map_err(|e| StoreError::load(&paths.header, e))?;
    for record in &records {
        let entry = record.entry();
        if entry.end().map_or(true, |end| end > body_len) {
            warn!(
                sequence = record.sequence,
                offset = record.offset,
                size = record.size,
                body_len,
                "Skipping header record past end of body"
            );
            continue;
        }
        index.insert(record.sequence, entry);
    }
    debug!(bytes = data.len(), records = records.len(), "Scanned header index");
    Ok(records.len())
}

fn load_sequence_numbers(
    seqnums: &mut File,
    paths: &StorePaths,
    cache: &mut SessionCache,
) -> Result<()> {
    if seqnums.metadata()?.len() == 0 {
        return Ok(());
    }

    seqnums.seek(SeekFrom::Start(0))?;
    let text = read_length_prefixed(seqnums)
        .map_err(|e| StoreError::load(&paths.seqnums, sequence_error(e)))?;
    let text = String::from_utf8(text).map_err(|_| {
        StoreError::load(
            &paths.seqnums,
            LoadError::SequenceRecord("record is not UTF-8".to_string()),
        )
    })?;
    let (sender, target) = decode_sequence_text(&text)
        .map_err(|e| StoreError::load(&paths.seqnums, LoadError::SequenceRecord(e)))?;

    cache.set_next_sender_seq(sender);
    cache.set_next_target_seq(target);
    Ok(())
}

fn read_length_prefixed(file: &mut File) -> io::Result<Vec<u8>> {
    let mut len = [0u8; 2];
    file.read_exact(&mut len)?;
    let mut buf = vec![0u8; u16::from_be_bytes(len) as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn sequence_error(err: io::Error) -> LoadError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        LoadError::SequenceRecord("record is truncated".to_string())
    } else {
        LoadError::SequenceRecord(err.to_string())
    }
}

fn load_creation_time(
    session: &mut File,
    paths: &StorePaths,
    cache: &mut SessionCache,
) -> Result<()> {
    if session.metadata()?.len() == 0 {
        return Ok(());
    }

    session.seek(SeekFrom::Start(0))?;
    let mut data = Vec::with_capacity(TIMESTAMP_LEN);
    session.take(TIMESTAMP_LEN as u64).read_to_end(&mut data)?;
    let time =
        UtcTimestamp::decode_bytes(&data).map_err(|e| StoreError::load(&paths.session, e))?;
    cache.set_creation_time(time);
    Ok(())
}

/// Result of an integrity check.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the store is usable as-is.
    pub is_valid: bool,
    /// List of issues found.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            is_valid: true,
            issues: Vec::new(),
        }
    }

    fn push(&mut self, severity: IssueSeverity, description: String) {
        if severity == IssueSeverity::Error {
            self.is_valid = false;
        }
        self.issues.push(ValidationIssue {
            severity,
            description,
        });
    }
}

/// An issue found during validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub description: String,
}

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Informational, no action needed.
    Info,
    /// Warning, store works but a reset is advisable.
    Warning,
    /// Error, some stored messages cannot be read back.
    Error,
}

/// Check the recovered state against the body file length.
pub(crate) fn verify(
    cache: &SessionCache,
    index: &BTreeMap<u64, IndexEntry>,
    body_len: u64,
) -> ValidationResult {
    let mut result = ValidationResult::new();

    if cache.creation_time().is_none() {
        result.push(
            IssueSeverity::Warning,
            "No creation time recorded; the store has never been reset".to_string(),
        );
    }

    if cache.next_sender_seq() == 0 || cache.next_target_seq() == 0 {
        result.push(
            IssueSeverity::Warning,
            format!(
                "Sequence numbers are uninitialized (sender {}, target {})",
                cache.next_sender_seq(),
                cache.next_target_seq()
            ),
        );
    }

    for (sequence, entry) in index {
        if entry.end().map_or(true, |end| end > body_len) {
            result.push(
                IssueSeverity::Error,
                format!(
                    "Message {} points at bytes {}+{} past the body length {}",
                    sequence, entry.offset, entry.size, body_len
                ),
            );
        }
    }

    let referenced = index
        .values()
        .fold(0u64, |total, e| total.saturating_add(e.size));
    if referenced < body_len {
        result.push(
            IssueSeverity::Info,
            format!(
                "{} of {} body bytes are superseded or unindexed",
                body_len - referenced,
                body_len
            ),
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(offset: u64, size: u64) -> IndexEntry {
        IndexEntry { offset, size }
    }

    #[test]
    fn test_verify_fresh_store_warns() {
        let result = verify(&SessionCache::new(), &BTreeMap::new(), 0);
        assert!(result.is_valid);
        assert_eq!(
            result
                .issues
                .iter()
                .filter(|i| i.severity == IssueSeverity::Warning)
                .count(),
            2
        );
    }

    #[test]
    fn test_verify_entry_past_body_end_is_error() {
        let mut cache = SessionCache::new();
        cache.reset(Utc::now());
        let index = BTreeMap::from([(1, entry(0, 1)), (2, entry(1, 10))]);

        let result = verify(&cache, &index, 5);
        assert!(!result.is_valid);
        assert!(result
            .issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error && i.description.contains("Message 2")));
    }

    #[test]
    fn test_verify_reports_superseded_bytes() {
        let mut cache = SessionCache::new();
        cache.reset(Utc::now());
        let index = BTreeMap::from([(1, entry(2, 3))]);

        let result = verify(&cache, &index, 5);
        assert!(result.is_valid);
        assert!(result
            .issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Info && i.description.starts_with("2 of 5")));
    }
}

//! File-backed message store.
//!
//! Messages are appended to the body file and located through an in-memory
//! index that is rebuilt from the header file whenever the store is opened or
//! refreshed. Counters and the creation time live in two small files that are
//! overwritten in place.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use fixstore_core::config::StoreConfig;
use fixstore_core::{IndexFormat, SessionId, SystemTimeSource, TimeSource, UtcTimestamp};

use crate::cache::SessionCache;
use crate::files::{self, OpenFiles, StorePaths};
use crate::index::{self, IndexEntry, IndexRecord};
use crate::recovery::{self, ValidationResult};
use crate::store::{
    MessageStore, MessageStoreFactory, RefreshableMessageStore, Result, StoreError,
};

/// Options for opening a [`FileStore`].
#[derive(Debug, Clone)]
pub struct FileStoreOptions {
    /// Sync every write to disk before returning.
    pub sync_writes: bool,
    /// Header index layout.
    pub index_format: IndexFormat,
    /// Clock used to stamp the creation time on reset.
    pub time_source: Arc<dyn TimeSource>,
}

impl Default for FileStoreOptions {
    fn default() -> Self {
        Self {
            sync_writes: true,
            index_format: IndexFormat::Text,
            time_source: Arc::new(SystemTimeSource),
        }
    }
}

impl FileStoreOptions {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            sync_writes: config.sync_writes,
            index_format: config.index_format,
            ..Default::default()
        }
    }

    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn with_index_format(mut self, format: IndexFormat) -> Self {
        self.index_format = format;
        self
    }

    /// Skip the per-write sync.
    pub fn buffered(mut self) -> Self {
        self.sync_writes = false;
        self
    }
}

/// Message store backed by four files per session.
///
/// Not internally synchronized; the owning session serializes all calls.
#[derive(Debug)]
pub struct FileStore {
    session_id: SessionId,
    paths: StorePaths,
    files: Option<OpenFiles>,
    cache: SessionCache,
    index: BTreeMap<u64, IndexEntry>,
    options: FileStoreOptions,
}

impl FileStore {
    /// Open (or create) the store for `session_id` under `base_dir`, which
    /// defaults to the current directory.
    pub fn open(
        base_dir: Option<&Path>,
        session_id: &SessionId,
        options: FileStoreOptions,
    ) -> Result<Self> {
        let base_dir = base_dir.unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(base_dir)?;

        let mut store = Self {
            session_id: session_id.clone(),
            paths: StorePaths::new(base_dir, session_id),
            files: None,
            cache: SessionCache::new(),
            index: BTreeMap::new(),
            options,
        };
        store.initialize_files(false)?;
        Ok(store)
    }

    /// Close any open handles, optionally delete the files, then reopen them
    /// and rebuild the in-memory state.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub fn initialize_files(&mut self, delete: bool) -> Result<()> {
        self.close_files();
        self.cache = SessionCache::new();
        self.index.clear();
        if delete {
            self.paths.delete_all()?;
            info!("Deleted store files");
        }

        let mut files = OpenFiles::open(&self.paths)?;
        let state = recovery::load(&mut files, &self.paths, self.options.index_format)?;

        self.cache = state.cache;
        self.index = state.index;
        self.files = Some(files);
        Ok(())
    }

    /// Release all file handles. Safe to call when already closed.
    pub fn close_files(&mut self) {
        if let Some(files) = self.files.take() {
            files.close();
            debug!(session = %self.session_id, "Closed store files");
        }
    }

    /// Close the store and remove its files.
    pub fn delete_files(&mut self) -> Result<()> {
        self.close_files();
        self.paths.delete_all()?;
        Ok(())
    }

    /// Delete every file and start over with an empty store.
    ///
    /// Unlike [`MessageStore::reset`], this discards all stored messages.
    pub fn reset_and_wipe(&mut self) -> Result<()> {
        self.initialize_files(true)?;
        self.reset()
    }

    pub fn is_open(&self) -> bool {
        self.files.is_some()
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn body_path(&self) -> &Path {
        &self.paths.body
    }

    pub fn header_path(&self) -> &Path {
        &self.paths.header
    }

    pub fn seqnums_path(&self) -> &Path {
        &self.paths.seqnums
    }

    pub fn session_path(&self) -> &Path {
        &self.paths.session
    }

    pub fn options(&self) -> &FileStoreOptions {
        &self.options
    }

    /// Stored sequence numbers in ascending order.
    pub fn indexed_sequences(&self) -> Vec<u64> {
        self.index.keys().copied().collect()
    }

    pub fn index_entry(&self, sequence: u64) -> Option<IndexEntry> {
        self.index.get(&sequence).copied()
    }

    /// Current length of the body file, superseded bytes included.
    pub fn body_len(&self) -> Result<u64> {
        let files = self.files.as_ref().ok_or(StoreError::Closed)?;
        Ok(files.body.metadata()?.len())
    }

    /// Read one message by sequence number. Absence is not an error.
    pub fn get_message(&mut self, sequence: u64) -> Result<Option<Vec<u8>>> {
        match self.index.get(&sequence).copied() {
            Some(entry) => self.read_entry(sequence, entry).map(Some),
            None => Ok(None),
        }
    }

    /// Read the body bytes of one entry, refusing ranges past the end of the
    /// body file before allocating.
    fn read_entry(&mut self, sequence: u64, entry: IndexEntry) -> Result<Vec<u8>> {
        let files = self.files_mut()?;
        let body_len = files.body.metadata()?.len();
        let out_of_bounds = StoreError::OutOfBounds {
            sequence,
            offset: entry.offset,
            size: entry.size,
            body_len,
        };
        if entry.end().map_or(true, |end| end > body_len) {
            return Err(out_of_bounds);
        }
        let size = usize::try_from(entry.size).map_err(|_| out_of_bounds)?;

        files.body.seek(SeekFrom::Start(entry.offset))?;
        let mut data = vec![0u8; size];
        files.body.read_exact(&mut data)?;
        Ok(data)
    }

    /// Check the index against the body file.
    pub fn verify(&self) -> Result<ValidationResult> {
        let body_len = self.body_len()?;
        Ok(recovery::verify(&self.cache, &self.index, body_len))
    }

    fn files_mut(&mut self) -> Result<&mut OpenFiles> {
        self.files.as_mut().ok_or(StoreError::Closed)
    }

    fn store_sequence_numbers(&mut self) -> Result<()> {
        let record =
            files::encode_sequence_record(self.cache.next_sender_seq(), self.cache.next_target_seq());
        let sync = self.options.sync_writes;
        let files = self.files_mut()?;
        files::overwrite(&mut files.seqnums, &record, sync)?;
        Ok(())
    }

    fn store_creation_time(&mut self, time: DateTime<Utc>) -> Result<()> {
        let record = files::encode_creation_time(&time);
        let sync = self.options.sync_writes;
        let files = self.files_mut()?;
        files::overwrite(&mut files.session, &record, sync)?;
        Ok(())
    }
}

impl MessageStore for FileStore {
    /// Append `message` to the body file and its location to the header file.
    ///
    /// Storing a sequence number again points the index at the new bytes; the
    /// old bytes stay in the body file, unreferenced. The body is written
    /// before the header, so a crash in between leaves orphaned body bytes
    /// rather than an index record pointing past the end of the body.
    #[instrument(skip(self, message), fields(size = message.len()))]
    fn set(&mut self, sequence: u64, message: &[u8]) -> Result<bool> {
        let sync = self.options.sync_writes;
        let format = self.options.index_format;
        let files = self.files_mut()?;

        let offset = files::append(&mut files.body, message, sync)?;
        let record = IndexRecord {
            sequence,
            offset,
            size: message.len() as u64,
        };
        let header_len = files.header.metadata()?.len();
        files::append(
            &mut files.header,
            &index::encode_record(format, &record, header_len),
            sync,
        )?;

        if let Some(previous) = self.index.insert(sequence, record.entry()) {
            debug!(previous_offset = previous.offset, "Superseded stored message");
        }
        Ok(true)
    }

    fn get(&mut self, start: u64, end: u64, messages: &mut Vec<Vec<u8>>) -> Result<()> {
        if start > end {
            return Ok(());
        }
        let entries: Vec<(u64, IndexEntry)> = self
            .index
            .range(start..=end)
            .map(|(sequence, entry)| (*sequence, *entry))
            .collect();
        for (sequence, entry) in entries {
            messages.push(self.read_entry(sequence, entry)?);
        }
        Ok(())
    }

    fn get_single(&mut self, _sequence: u64, _message: &mut Vec<u8>) -> Result<bool> {
        Err(StoreError::Unsupported(
            "single message get; use get(sequence, sequence, ..) instead",
        ))
    }

    fn next_sender_seq(&self) -> u64 {
        self.cache.next_sender_seq()
    }

    fn next_target_seq(&self) -> u64 {
        self.cache.next_target_seq()
    }

    fn set_next_sender_seq(&mut self, next: u64) -> Result<()> {
        self.cache.set_next_sender_seq(next);
        self.store_sequence_numbers()
    }

    fn set_next_target_seq(&mut self, next: u64) -> Result<()> {
        self.cache.set_next_target_seq(next);
        self.store_sequence_numbers()
    }

    fn incr_next_sender_seq(&mut self) -> Result<()> {
        self.cache
            .incr_next_sender_seq()
            .ok_or(StoreError::SequenceOverflow("sender"))?;
        self.store_sequence_numbers()
    }

    fn incr_next_target_seq(&mut self) -> Result<()> {
        self.cache
            .incr_next_target_seq()
            .ok_or(StoreError::SequenceOverflow("target"))?;
        self.store_sequence_numbers()
    }

    fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.cache.creation_time()
    }

    /// Restart the counters and stamp a new creation time. Stored messages
    /// and the header index are kept; use [`FileStore::reset_and_wipe`] to
    /// discard them.
    fn reset(&mut self) -> Result<()> {
        let now = UtcTimestamp::truncate(self.options.time_source.now());
        self.cache.reset(now);
        self.store_sequence_numbers()?;
        self.store_creation_time(now)?;
        info!(
            session = %self.session_id,
            creation_time = %UtcTimestamp::encode(&now),
            "Reset message store"
        );
        Ok(())
    }
}

impl RefreshableMessageStore for FileStore {
    fn refresh(&mut self) -> Result<()> {
        let files = self.files.as_mut().ok_or(StoreError::Closed)?;
        let state = recovery::load(files, &self.paths, self.options.index_format)?;
        self.cache = state.cache;
        self.index = state.index;
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        self.close_files();
    }
}

/// Builds [`FileStore`]s under one base directory.
///
/// A store that has never been reset (no creation time on disk) is reset on
/// creation so it starts at sequence number 1.
#[derive(Debug, Clone)]
pub struct FileStoreFactory {
    base_dir: PathBuf,
    options: FileStoreOptions,
}

impl FileStoreFactory {
    pub fn new(base_dir: impl Into<PathBuf>, options: FileStoreOptions) -> Self {
        Self {
            base_dir: base_dir.into(),
            options,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.path.clone(), FileStoreOptions::from_config(config))
    }

    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.options.time_source = time_source;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl MessageStoreFactory for FileStoreFactory {
    type Store = FileStore;

    fn create(&self, session_id: &SessionId) -> Result<FileStore> {
        let mut store = FileStore::open(Some(&self.base_dir), session_id, self.options.clone())?;
        if store.creation_time().is_none() {
            store.reset()?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fixstore_core::MockTimeSource;
    use tempfile::TempDir;

    fn session_id() -> SessionId {
        SessionId::new("FIX.4.2", "SENDER", "TARGET")
    }

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store =
            FileStore::open(Some(temp_dir.path()), &session_id(), FileStoreOptions::default())
                .unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_open_creates_all_files() {
        let (store, _tmp) = create_test_store();
        for path in store.paths().all() {
            assert!(path.exists(), "{} should exist", path.display());
        }
        assert!(store.is_open());
        assert_eq!(store.creation_time(), None);
    }

    #[test]
    fn test_open_creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b");
        let store = FileStore::open(Some(&nested), &session_id(), FileStoreOptions::default())
            .unwrap();
        assert!(store.body_path().starts_with(&nested));
        assert!(nested.is_dir());
    }

    #[test]
    fn test_set_and_get_message() {
        let (mut store, _tmp) = create_test_store();
        assert!(store.set(1, b"8=FIX.4.2\x019=5\x01").unwrap());
        assert_eq!(
            store.get_message(1).unwrap().as_deref(),
            Some(&b"8=FIX.4.2\x019=5\x01"[..])
        );
        assert_eq!(store.get_message(2).unwrap(), None);
    }

    #[test]
    fn test_header_bytes_for_three_messages() {
        let (mut store, _tmp) = create_test_store();
        store.set(1, b"A").unwrap();
        store.set(2, b"BB").unwrap();
        store.set(3, b"CCC").unwrap();

        assert_eq!(store.body_len().unwrap(), 6);
        assert_eq!(fs::read(store.header_path()).unwrap(), b"1,0,1 2,1,2 3,3,3");
    }

    #[test]
    fn test_empty_first_message_keeps_separator() {
        let (mut store, _tmp) = create_test_store();
        store.set(1, b"").unwrap();
        store.set(2, b"x").unwrap();
        assert_eq!(fs::read(store.header_path()).unwrap(), b"1,0,0 2,0,1");

        store.refresh().unwrap();
        assert_eq!(store.get_message(1).unwrap(), Some(Vec::new()));
        assert_eq!(store.get_message(2).unwrap(), Some(b"x".to_vec()));
    }

    #[test]
    fn test_reset_uses_injected_time() {
        let tmp = TempDir::new().unwrap();
        let pinned = Utc.with_ymd_and_hms(2006, 2, 3, 4, 5, 6).unwrap();
        let clock = Arc::new(MockTimeSource::new(pinned));
        let options = FileStoreOptions::default().with_time_source(clock.clone());
        let mut store = FileStore::open(Some(tmp.path()), &session_id(), options).unwrap();

        store.reset().unwrap();
        assert_eq!(store.creation_time(), Some(pinned));
        assert_eq!(fs::read(store.session_path()).unwrap(), b"20060203-04:05:06");
    }

    #[test]
    fn test_get_single_is_unsupported() {
        let (mut store, _tmp) = create_test_store();
        store.set(1, b"A").unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            store.get_single(1, &mut out),
            Err(StoreError::Unsupported(_))
        ));
        assert!(matches!(
            store.get_single(99, &mut out),
            Err(StoreError::Unsupported(_))
        ));
    }

    #[test]
    fn test_operations_after_close_fail() {
        let (mut store, _tmp) = create_test_store();
        store.close_files();
        store.close_files();
        assert!(!store.is_open());
        assert!(matches!(store.set(1, b"A"), Err(StoreError::Closed)));
        assert!(matches!(store.incr_next_sender_seq(), Err(StoreError::Closed)));
        assert!(matches!(store.refresh(), Err(StoreError::Closed)));
    }

    #[test]
    fn test_delete_files_removes_everything() {
        let (mut store, _tmp) = create_test_store();
        store.set(1, b"A").unwrap();
        store.delete_files().unwrap();
        for path in store.paths().all() {
            assert!(!path.exists());
        }
        store.delete_files().unwrap();
    }

    #[test]
    fn test_range_get_visits_only_stored_entries() {
        let (mut store, _tmp) = create_test_store();
        store.set(7, b"seven").unwrap();

        let mut out = Vec::new();
        store.get(1, u64::MAX, &mut out).unwrap();
        assert_eq!(out, vec![b"seven".to_vec()]);

        let mut out = Vec::new();
        store.get(9, 3, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_get_message_rejects_entry_past_body_end() {
        let (mut store, _tmp) = create_test_store();
        store.set(1, b"AAAA").unwrap();
        store.set(2, b"BBBB").unwrap();
        store.index.insert(
            3,
            IndexEntry {
                offset: 0,
                size: u64::MAX,
            },
        );

        assert!(matches!(
            store.get_message(3),
            Err(StoreError::OutOfBounds { sequence: 3, .. })
        ));
        assert_eq!(store.get_message(2).unwrap(), Some(b"BBBB".to_vec()));
    }

    #[test]
    fn test_incr_at_max_fails_without_persisting() {
        let (mut store, _tmp) = create_test_store();
        store.set_next_target_seq(u64::MAX).unwrap();

        assert!(matches!(
            store.incr_next_target_seq(),
            Err(StoreError::SequenceOverflow("target"))
        ));
        store.refresh().unwrap();
        assert_eq!(store.next_target_seq(), u64::MAX);
    }

    #[test]
    fn test_failed_initialize_keeps_no_stale_state() {
        let (mut store, _tmp) = create_test_store();
        store.reset().unwrap();
        store.set(1, b"A").unwrap();
        fs::write(store.session_path(), b"not a timestamp!!").unwrap();

        assert!(matches!(
            store.initialize_files(false),
            Err(StoreError::Load { .. })
        ));
        assert!(!store.is_open());
        assert_eq!(store.next_sender_seq(), 0);
        assert_eq!(store.creation_time(), None);
        assert!(store.indexed_sequences().is_empty());
    }

    #[test]
    fn test_factory_resets_new_store() {
        let tmp = TempDir::new().unwrap();
        let clock = Arc::new(MockTimeSource::from_millis(86_400_000));
        let factory = FileStoreFactory::new(tmp.path(), FileStoreOptions::default())
            .with_time_source(clock);

        let store = factory.create(&session_id()).unwrap();
        assert_eq!(store.next_sender_seq(), 1);
        assert_eq!(store.next_target_seq(), 1);
        assert_eq!(
            store.creation_time(),
            Some(Utc.with_ymd_and_hms(1970, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_factory_keeps_existing_counters() {
        let tmp = TempDir::new().unwrap();
        let factory = FileStoreFactory::new(tmp.path(), FileStoreOptions::default());
        {
            let mut store = factory.create(&session_id()).unwrap();
            store.set_next_sender_seq(40).unwrap();
        }
        let store = factory.create(&session_id()).unwrap();
        assert_eq!(store.next_sender_seq(), 40);
    }
}

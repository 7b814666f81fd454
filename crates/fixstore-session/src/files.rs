//! On-disk files of one session store.
//!
//! | Suffix    | Contents                        | Write policy              |
//! |-----------|---------------------------------|---------------------------|
//! | `body`    | raw message bytes               | append                    |
//! | `header`  | `(seq, offset, size)` records   | append                    |
//! | `seqnums` | `"<sender> : <target>"`         | overwrite at offset 0     |
//! | `session` | 17-byte creation timestamp      | overwrite at offset 0     |

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use fixstore_core::{SessionId, UtcTimestamp};

/// Separator between the two counters of the sequence record.
pub const SEQUENCE_SEPARATOR: &str = " : ";

/// Paths of the four files of a session, all sharing the
/// `begin-sender-target[-qualifier].` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub body: PathBuf,
    pub header: PathBuf,
    pub seqnums: PathBuf,
    pub session: PathBuf,
}

impl StorePaths {
    pub fn new(base_dir: &Path, session_id: &SessionId) -> Self {
        let stem = session_id.file_stem();
        let path = |suffix: &str| base_dir.join(format!("{}.{}", stem, suffix));
        Self {
            body: path("body"),
            header: path("header"),
            seqnums: path("seqnums"),
            session: path("session"),
        }
    }

    pub fn all(&self) -> [&Path; 4] {
        [&self.body, &self.header, &self.seqnums, &self.session]
    }

    /// Remove every file. Files that do not exist are skipped.
    pub fn delete_all(&self) -> io::Result<()> {
        for path in self.all() {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Deleted store file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Open handles to all four files. Either all four are open or none is.
#[derive(Debug)]
pub(crate) struct OpenFiles {
    pub body: File,
    pub header: File,
    pub seqnums: File,
    pub session: File,
}

impl OpenFiles {
    pub fn open(paths: &StorePaths) -> io::Result<Self> {
        Ok(Self {
            body: open_read_write(&paths.body)?,
            header: open_read_write(&paths.header)?,
            seqnums: open_read_write(&paths.seqnums)?,
            session: open_read_write(&paths.session)?,
        })
    }

    /// Flush and release every handle. Failures are logged, not returned.
    pub fn close(self) {
        for (name, file) in [
            ("body", self.body),
            ("header", self.header),
            ("seqnums", self.seqnums),
            ("session", self.session),
        ] {
            if let Err(e) = file.sync_all() {
                warn!(file = name, error = %e, "Failed to flush store file on close");
            }
        }
    }
}

fn open_read_write(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

/// Append `bytes` at the end of `file`, returning the offset they start at.
pub(crate) fn append(file: &mut File, bytes: &[u8], sync: bool) -> io::Result<u64> {
    let offset = file.seek(SeekFrom::End(0))?;
    file.write_all(bytes)?;
    if sync {
        file.sync_data()?;
    }
    Ok(offset)
}

/// Overwrite the start of `file` without truncating it.
pub(crate) fn overwrite(file: &mut File, bytes: &[u8], sync: bool) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(bytes)?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

/// Length-prefixed `"<sender> : <target>"` record.
///
/// The 2-byte big-endian length lets a shorter record overwrite a longer one
/// in place; stale bytes past the record are never read.
pub(crate) fn encode_sequence_record(sender: u64, target: u64) -> Vec<u8> {
    let text = format!("{}{}{}", sender, SEQUENCE_SEPARATOR, target);
    let len = text.len() as u16;
    let mut buf = Vec::with_capacity(2 + text.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(text.as_bytes());
    buf
}

/// Parse the text of a sequence record into `(sender, target)`.
pub(crate) fn decode_sequence_text(text: &str) -> Result<(u64, u64), String> {
    let (sender, target) = text
        .split_once(SEQUENCE_SEPARATOR)
        .ok_or_else(|| format!("missing '{}' in '{}'", SEQUENCE_SEPARATOR, text))?;
    let sender = sender
        .parse::<u64>()
        .map_err(|e| format!("sender '{}': {}", sender, e))?;
    let target = target
        .parse::<u64>()
        .map_err(|e| format!("target '{}': {}", target, e))?;
    Ok((sender, target))
}

pub(crate) fn encode_creation_time(time: &DateTime<Utc>) -> Vec<u8> {
    UtcTimestamp::encode(time).into_bytes()
}

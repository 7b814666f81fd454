//! Consistency check: reload the store from disk and compare.

use chrono::{DateTime, Utc};

use fixstore_session::{
    FileStore, IndexEntry, IssueSeverity, MessageStore, RefreshableMessageStore,
};

use crate::AppContext;

/// Everything the store keeps in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub next_sender_seq: u64,
    pub next_target_seq: u64,
    pub creation_time: Option<DateTime<Utc>>,
    pub index: Vec<(u64, IndexEntry)>,
}

impl Snapshot {
    pub fn of(store: &FileStore) -> Self {
        Self {
            next_sender_seq: store.next_sender_seq(),
            next_target_seq: store.next_target_seq(),
            creation_time: store.creation_time(),
            index: store
                .indexed_sequences()
                .into_iter()
                .filter_map(|seq| store.index_entry(seq).map(|entry| (seq, entry)))
                .collect(),
        }
    }

    /// Human-readable differences from `other`.
    pub fn differences(&self, other: &Snapshot) -> Vec<String> {
        let mut diffs = Vec::new();
        if self.next_sender_seq != other.next_sender_seq {
            diffs.push(format!(
                "next sender seq {} vs {}",
                self.next_sender_seq, other.next_sender_seq
            ));
        }
        if self.next_target_seq != other.next_target_seq {
            diffs.push(format!(
                "next target seq {} vs {}",
                self.next_target_seq, other.next_target_seq
            ));
        }
        if self.creation_time != other.creation_time {
            diffs.push(format!(
                "creation time {:?} vs {:?}",
                self.creation_time, other.creation_time
            ));
        }
        if self.index != other.index {
            diffs.push(format!(
                "index has {} entries vs {}",
                self.index.len(),
                other.index.len()
            ));
        }
        diffs
    }
}

pub fn run(ctx: &AppContext) -> anyhow::Result<()> {
    let mut store = super::open_existing_store(ctx)?;
    let before = Snapshot::of(&store);

    store.refresh()?;
    let refreshed = Snapshot::of(&store);
    let reopened = Snapshot::of(&super::open_existing_store(ctx)?);

    let mut diffs = before.differences(&refreshed);
    diffs.extend(before.differences(&reopened));

    let validation = store.verify()?;
    for issue in &validation.issues {
        let marker = match issue.severity {
            IssueSeverity::Info => "info",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Error => "error",
        };
        println!("  [{}] {}", marker, issue.description);
    }

    if !diffs.is_empty() {
        for diff in &diffs {
            println!("  [mismatch] {}", diff);
        }
        anyhow::bail!("State reloaded from disk differs from the open store");
    }
    if !validation.is_valid {
        anyhow::bail!("Store has index entries that cannot be read back");
    }

    println!(
        "OK: {} messages, next sender seq {}, next target seq {}",
        before.index.len(),
        before.next_sender_seq,
        before.next_target_seq
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{open_store, test_support};
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_survives_refresh() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = test_support::context(temp_dir.path());
        let mut store = open_store(&ctx).unwrap();
        store.reset().unwrap();
        store.set(1, b"A").unwrap();
        store.set(2, b"BB").unwrap();
        store.incr_next_sender_seq().unwrap();

        let before = Snapshot::of(&store);
        store.refresh().unwrap();
        assert!(before.differences(&Snapshot::of(&store)).is_empty());
        assert!(run(&ctx).is_ok());
    }

    #[test]
    fn test_differences_are_reported() {
        let base = Snapshot {
            next_sender_seq: 1,
            next_target_seq: 1,
            creation_time: None,
            index: vec![(1, IndexEntry { offset: 0, size: 1 })],
        };
        let other = Snapshot {
            next_sender_seq: 2,
            index: Vec::new(),
            ..base.clone()
        };

        let diffs = base.differences(&other);
        assert_eq!(diffs.len(), 2);
        assert!(diffs[0].starts_with("next sender seq"));
    }
}

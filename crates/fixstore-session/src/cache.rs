//! In-memory session state.

use chrono::{DateTime, Utc};

/// First sequence number of a session in either direction.
pub const INITIAL_SEQ_NUM: u64 = 1;

/// Creation time and the two next-sequence-number counters.
///
/// Holds no persistence logic; [`crate::FileStore`] writes every change
/// through to the sequence and session files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCache {
    creation_time: Option<DateTime<Utc>>,
    next_sender_seq: u64,
    next_target_seq: u64,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.creation_time
    }

    pub fn set_creation_time(&mut self, time: DateTime<Utc>) {
        self.creation_time = Some(time);
    }

    pub fn next_sender_seq(&self) -> u64 {
        self.next_sender_seq
    }

    pub fn next_target_seq(&self) -> u64 {
        self.next_target_seq
    }

    pub fn set_next_sender_seq(&mut self, next: u64) {
        self.next_sender_seq = next;
    }

    pub fn set_next_target_seq(&mut self, next: u64) {
        self.next_target_seq = next;
    }

    /// Advance the sender counter. Returns `None`, leaving the counter
    /// unchanged, if it is already at `u64::MAX`.
    pub fn incr_next_sender_seq(&mut self) -> Option<u64> {
        self.next_sender_seq = self.next_sender_seq.checked_add(1)?;
        Some(self.next_sender_seq)
    }

    /// Advance the target counter. Returns `None`, leaving the counter
    /// unchanged, if it is already at `u64::MAX`.
    pub fn incr_next_target_seq(&mut self) -> Option<u64> {
        self.next_target_seq = self.next_target_seq.checked_add(1)?;
        Some(self.next_target_seq)
    }

    /// Restart both counters and stamp a new creation time.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.next_sender_seq = INITIAL_SEQ_NUM;
        self.next_target_seq = INITIAL_SEQ_NUM;
        self.creation_time = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_cache_is_uninitialized() {
        let cache = SessionCache::new();
        assert_eq!(cache.creation_time(), None);
        assert_eq!(cache.next_sender_seq(), 0);
        assert_eq!(cache.next_target_seq(), 0);
    }

    #[test]
    fn test_reset_restarts_counters() {
        let mut cache = SessionCache::new();
        cache.set_next_sender_seq(42);
        cache.incr_next_target_seq();

        let now = Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap();
        cache.reset(now);

        assert_eq!(cache.next_sender_seq(), INITIAL_SEQ_NUM);
        assert_eq!(cache.next_target_seq(), INITIAL_SEQ_NUM);
        assert_eq!(cache.creation_time(), Some(now));
    }

    #[test]
    fn test_counters_can_move_backward() {
        let mut cache = SessionCache::new();
        cache.set_next_sender_seq(10);
        cache.set_next_sender_seq(3);
        assert_eq!(cache.incr_next_sender_seq(), Some(4));
        assert_eq!(cache.next_sender_seq(), 4);
    }

    #[test]
    fn test_incr_at_max_leaves_counter_unchanged() {
        let mut cache = SessionCache::new();
        cache.set_next_sender_seq(u64::MAX);
        cache.set_next_target_seq(u64::MAX);

        assert_eq!(cache.incr_next_sender_seq(), None);
        assert_eq!(cache.incr_next_target_seq(), None);
        assert_eq!(cache.next_sender_seq(), u64::MAX);
        assert_eq!(cache.next_target_seq(), u64::MAX);
    }
}

//! Time sources.
//!
//! The store never reads the clock directly; it is handed a [`TimeSource`]
//! at construction so tests can pin the creation time of a reset.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Supplies the current UTC time.
pub trait TimeSource: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable time source for tests and replays.
#[derive(Debug)]
pub struct MockTimeSource {
    time: Mutex<DateTime<Utc>>,
}

impl MockTimeSource {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Mutex::new(time),
        }
    }

    /// Create a source pinned to a Unix timestamp in milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        let time = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
        Self::new(time)
    }

    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.time.lock() = time;
    }

    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock();
        *time += by;
    }
}

impl Default for MockTimeSource {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::default())
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_mock_time_source_is_settable() {
        let source = MockTimeSource::default();
        assert_eq!(source.now().timestamp(), 0);

        let pinned = Utc.with_ymd_and_hms(2010, 1, 2, 3, 4, 5).unwrap();
        source.set_time(pinned);
        assert_eq!(source.now(), pinned);

        source.advance(Duration::seconds(10));
        assert_eq!(source.now(), pinned + Duration::seconds(10));
    }

    #[test]
    fn test_mock_from_millis() {
        let source = MockTimeSource::from_millis(1_000);
        assert_eq!(source.now().timestamp(), 1);
    }

    #[test]
    fn test_system_time_source_moves_forward() {
        let before = Utc::now();
        let now = SystemTimeSource.now();
        assert!(now >= before);
    }
}

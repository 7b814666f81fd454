//! Console session log.

use std::io::{self, Write};
use std::sync::Arc;

use tracing::warn;

use fixstore_core::config::ScreenLogConfig;
use fixstore_core::{SessionId, SystemTimeSource, TimeSource, UtcTimestamp, YesNo};

use crate::{Log, LogFactory, LogFlags, Result};

/// Writes one line per enabled notification:
/// `<20240101-08:00:00, FIX.4.2:A->B, incoming> (8=FIX.4.2...)`.
pub struct ScreenLog {
    session_id: SessionId,
    flags: LogFlags,
    out: Box<dyn Write + Send>,
    time_source: Arc<dyn TimeSource>,
}

impl ScreenLog {
    pub fn new(
        session_id: SessionId,
        flags: LogFlags,
        out: Box<dyn Write + Send>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            session_id,
            flags,
            out,
            time_source,
        }
    }

    pub fn stdout(session_id: SessionId, flags: LogFlags) -> Self {
        Self::new(
            session_id,
            flags,
            Box::new(io::stdout()),
            Arc::new(SystemTimeSource),
        )
    }

    pub fn flags(&self) -> LogFlags {
        self.flags
    }

    fn write_line(&mut self, category: &str, text: &str) {
        let time = UtcTimestamp::encode(&self.time_source.now());
        let result = writeln!(
            self.out,
            "<{}, {}, {}> ({})",
            time, self.session_id, category, text
        )
        .and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!(session = %self.session_id, error = %e, "Failed to write screen log");
        }
    }
}

impl Log for ScreenLog {
    fn on_incoming(&mut self, message: &str) {
        if self.flags.incoming {
            self.write_line("incoming", message);
        }
    }

    fn on_outgoing(&mut self, message: &str) {
        if self.flags.outgoing {
            self.write_line("outgoing", message);
        }
    }

    fn on_event(&mut self, text: &str) {
        if self.flags.events {
            self.write_line("event", text);
        }
    }
}

/// Builds [`ScreenLog`]s writing to stdout.
///
/// Categories come either from explicit switches, all off by default, or from
/// a [`ScreenLogConfig`], where an unset category is on. Per-session overrides
/// take precedence over the top-level `LogIncoming`/`LogOutgoing`/`LogEvents`
/// values.
#[derive(Debug, Clone, Default)]
pub struct ScreenLogFactory {
    flags: LogFlags,
    settings: Option<ScreenLogConfig>,
}

impl ScreenLogFactory {
    /// Explicit control of each category.
    pub fn new(incoming: bool, outgoing: bool, events: bool) -> Self {
        Self {
            flags: LogFlags::new(incoming, outgoing, events),
            settings: None,
        }
    }

    pub fn from_config(config: &ScreenLogConfig) -> Self {
        let settings = config.clone();
        let enabled = |value: Option<YesNo>| value.unwrap_or(YesNo::YES).is_yes();
        let flags = LogFlags::new(
            enabled(settings.log_incoming),
            enabled(settings.log_outgoing),
            enabled(settings.log_events),
        );
        Self {
            flags,
            settings: Some(settings),
        }
    }

    /// Categories enabled for one session.
    pub fn flags_for(&self, session_id: &SessionId) -> LogFlags {
        let mut flags = self.flags;
        let overrides = self
            .settings
            .as_ref()
            .and_then(|s| s.sessions.get(&session_id.file_stem()));
        if let Some(overrides) = overrides {
            if let Some(value) = overrides.log_incoming {
                flags.incoming = value.is_yes();
            }
            if let Some(value) = overrides.log_outgoing {
                flags.outgoing = value.is_yes();
            }
            if let Some(value) = overrides.log_events {
                flags.events = value.is_yes();
            }
        }
        flags
    }
}

impl LogFactory for ScreenLogFactory {
    fn create(&self, session_id: &SessionId) -> Result<Box<dyn Log>> {
        Ok(Box::new(ScreenLog::stdout(
            session_id.clone(),
            self.flags_for(session_id),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fixstore_core::config::LogOverrides;
    use fixstore_core::MockTimeSource;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn session_id() -> SessionId {
        SessionId::new("FIX.4.2", "BANZAI", "EXEC")
    }

    fn screen_log(flags: LogFlags) -> (ScreenLog, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let clock = Arc::new(MockTimeSource::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        ));
        let log = ScreenLog::new(session_id(), flags, Box::new(buffer.clone()), clock);
        (log, buffer)
    }

    #[test]
    fn test_line_format() {
        let (mut log, buffer) = screen_log(LogFlags::ALL);
        log.on_incoming("8=FIX.4.2");
        assert_eq!(
            buffer.contents(),
            "<20240101-08:00:00, FIX.4.2:BANZAI->EXEC, incoming> (8=FIX.4.2)\n"
        );
    }

    #[test]
    fn test_disabled_categories_are_silent() {
        let (mut log, buffer) = screen_log(LogFlags::new(false, true, false));
        log.on_incoming("in");
        log.on_outgoing("out");
        log.on_event("event");

        let contents = buffer.contents();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("outgoing> (out)"));
    }

    #[test]
    fn test_explicit_factory_defaults_to_nothing() {
        let factory = ScreenLogFactory::default();
        assert_eq!(factory.flags_for(&session_id()), LogFlags::default());

        let factory = ScreenLogFactory::new(true, false, true);
        assert_eq!(
            factory.flags_for(&session_id()),
            LogFlags::new(true, false, true)
        );
    }

    #[test]
    fn test_settings_enable_unset_categories() {
        let factory = ScreenLogFactory::from_config(&ScreenLogConfig::default());
        assert_eq!(
            factory.flags_for(&session_id()),
            LogFlags::new(true, true, true)
        );

        let settings = ScreenLogConfig {
            log_incoming: Some(YesNo::NO),
            ..Default::default()
        };
        let factory = ScreenLogFactory::from_config(&settings);
        assert_eq!(
            factory.flags_for(&session_id()),
            LogFlags::new(false, true, true)
        );
    }

    #[test]
    fn test_settings_overrides_per_session() {
        let mut settings = ScreenLogConfig {
            log_events: Some(YesNo::NO),
            ..Default::default()
        };
        settings.sessions.insert(
            "FIX.4.2-BANZAI-EXEC".to_string(),
            LogOverrides {
                log_outgoing: Some(YesNo::NO),
                log_events: Some(YesNo::YES),
                ..Default::default()
            },
        );
        let factory = ScreenLogFactory::from_config(&settings);

        assert_eq!(
            factory.flags_for(&session_id()),
            LogFlags::new(true, false, true)
        );
        let other = SessionId::new("FIX.4.4", "X", "Y");
        assert_eq!(factory.flags_for(&other), LogFlags::new(true, true, false));
    }
}

//! Append-only activity log.
//!
//! Lines look like `2024-03-05 02:17:09 PM - operator loaded camera stream`,
//! timestamped in the configured zone. Every line is also sent to the
//! logger at info level.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, FixedOffset, Local, Utc};

use crate::config::ActivityConfig;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

/// Format one activity line for `at`, in `offset` or local time.
pub fn format_line(at: DateTime<Utc>, offset: Option<FixedOffset>, message: &str) -> String {
    let stamp = match offset {
        Some(offset) => at.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string(),
        None => at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
    };
    format!("{} - {}", stamp, message)
}

/// Shared activity sink; safe to use from every stream thread.
pub struct ActivityLog {
    offset: Option<FixedOffset>,
    writer: Option<Mutex<Box<dyn Write + Send>>>,
}

impl std::fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityLog")
            .field("offset", &self.offset)
            .field("has_writer", &self.writer.is_some())
            .finish()
    }
}

impl ActivityLog {
    /// Open the log described by `config`, appending to its file if one is set.
    pub fn open(config: &ActivityConfig) -> io::Result<Self> {
        let offset = config.utc_offset_minutes.and_then(|minutes| {
            let offset = minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt);
            if offset.is_none() {
                log::warn!("Ignoring invalid activity UTC offset of {} minutes", minutes);
            }
            offset
        });

        let writer = match &config.path {
            Some(path) => Some(Mutex::new(Self::append_to(path)?)),
            None => None,
        };
        Ok(Self { offset, writer })
    }

    fn append_to(path: &Path) -> io::Result<Box<dyn Write + Send>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Box::new(file))
    }

    /// Log only to the logger.
    pub fn disabled() -> Self {
        Self {
            offset: None,
            writer: None,
        }
    }

    /// Log to an arbitrary writer.
    pub fn with_writer(writer: Box<dyn Write + Send>, offset: Option<FixedOffset>) -> Self {
        Self {
            offset,
            writer: Some(Mutex::new(writer)),
        }
    }

    /// Record one event. Write failures are logged, never returned.
    pub fn record(&self, message: &str) {
        let line = format_line(Utc::now(), self.offset, message);
        log::info!("{}", line);

        if let Some(writer) = &self.writer {
            let mut writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
                log::warn!("Failed to write activity log: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Writer that shares its buffer with the test.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_format_line_uses_twelve_hour_clock() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 19, 17, 9).unwrap();
        let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(
            format_line(at, Some(eastern), "operator loaded camera stream"),
            "2024-03-05 02:17:09 PM - operator loaded camera stream"
        );
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(
            format_line(at, Some(utc), "x"),
            "2024-03-05 07:17:09 PM - x"
        );
    }

    #[test]
    fn test_format_line_crosses_midnight() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        let eastern = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(format_line(at, Some(eastern), "m"), "2023-12-31 09:00:00 PM - m");
    }

    #[test]
    fn test_record_appends_lines() {
        let buffer = SharedBuffer::default();
        let log = ActivityLog::with_writer(Box::new(buffer.clone()), FixedOffset::east_opt(0));
        log.record("one");
        log.record("two");
        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - one"));
        assert!(lines[1].ends_with(" - two"));
    }

    #[test]
    fn test_open_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("activity_log.txt");
        let config = ActivityConfig {
            path: Some(path.clone()),
            utc_offset_minutes: Some(-300),
            ..ActivityConfig::default()
        };

        ActivityLog::open(&config).unwrap().record("first");
        ActivityLog::open(&config).unwrap().record("second");

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains(" - first\n"));
        assert!(text.contains(" - second\n"));
    }

    #[test]
    fn test_invalid_offset_falls_back_to_local() {
        let config = ActivityConfig {
            utc_offset_minutes: Some(100_000),
            ..ActivityConfig::default()
        };
        let log = ActivityLog::open(&config).unwrap();
        assert!(log.offset.is_none());
    }
}

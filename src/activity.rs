//! Operator-facing activity log.
//!
//! Scans and the scheduler report what happened through [`ActivityLog`].
//! Logging never fails from the caller's point of view.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use crate::db::{insert_system_log, Database};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Success,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget sink for activity lines.
pub trait ActivityLog: Send + Sync {
    fn log(&self, level: LogLevel, source: &str, message: &str);

    fn info(&self, source: &str, message: &str) {
        self.log(LogLevel::Info, source, message);
    }

    fn warn(&self, source: &str, message: &str) {
        self.log(LogLevel::Warn, source, message);
    }

    fn error(&self, source: &str, message: &str) {
        self.log(LogLevel::Error, source, message);
    }

    fn success(&self, source: &str, message: &str) {
        self.log(LogLevel::Success, source, message);
    }
}

fn trace_line(level: LogLevel, source: &str, message: &str) {
    match level {
        LogLevel::Info | LogLevel::Success => info!(level = %level, source, "{message}"),
        LogLevel::Warn => warn!(level = %level, source, "{message}"),
        LogLevel::Error => error!(level = %level, source, "{message}"),
    }
}

/// A single activity line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLine {
    pub level: LogLevel,
    pub source: String,
    pub message: String,
}

/// Lines waiting for the writer before new ones are dropped.
pub const ACTIVITY_QUEUE_CAPACITY: usize = 256;

/// Queues lines for the `system_logs` table and mirrors them to tracing.
///
/// Lines are stored by the paired [`ActivityWriter`], which stops once every
/// clone of this log has been dropped.
#[derive(Debug, Clone)]
pub struct DbActivityLog {
    tx: mpsc::Sender<ActivityLine>,
}

/// Create a database-backed log and the writer that drains it.
#[must_use]
pub fn db_activity_log(db: Database) -> (DbActivityLog, ActivityWriter) {
    let (tx, rx) = mpsc::channel(ACTIVITY_QUEUE_CAPACITY);
    (DbActivityLog { tx }, ActivityWriter { db, rx })
}

impl ActivityLog for DbActivityLog {
    fn log(&self, level: LogLevel, source: &str, message: &str) {
        trace_line(level, source, message);

        let line = ActivityLine {
            level,
            source: source.to_string(),
            message: message.to_string(),
        };
        match self.tx.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(line)) => {
                warn!(source = %line.source, "Activity queue full, line not stored");
            }
            Err(TrySendError::Closed(line)) => {
                warn!(source = %line.source, "Activity writer stopped, line not stored");
            }
        }
    }
}

/// Stores queued activity lines.
pub struct ActivityWriter {
    db: Database,
    rx: mpsc::Receiver<ActivityLine>,
}

impl ActivityWriter {
    /// Run until every [`DbActivityLog`] is dropped and the queue is empty.
    /// Returns the number of lines stored.
    pub async fn run(mut self) -> usize {
        debug!("Activity writer started");
        let mut stored = 0;

        while let Some(line) = self.rx.recv().await {
            match insert_system_log(
                self.db.pool(),
                line.level.as_str(),
                &line.source,
                &line.message,
            )
            .await
            {
                Ok(_) => stored += 1,
                Err(e) => warn!(source = %line.source, "Failed to store activity line: {e:#}"),
            }
        }

        debug!(stored, "Activity writer stopped");
        stored
    }
}

/// Keeps lines in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryActivityLog {
    lines: Arc<Mutex<Vec<ActivityLine>>>,
}

impl MemoryActivityLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<ActivityLine> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has(&self, level: LogLevel, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|line| line.level == level && line.message.contains(needle))
    }
}

impl ActivityLog for MemoryActivityLog {
    fn log(&self, level: LogLevel, source: &str, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(ActivityLine {
                level,
                source: source.to_string(),
                message: message.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Warn.as_str(), "WARN");
        assert_eq!(LogLevel::Error.as_str(), "ERROR");
        assert_eq!(LogLevel::Success.to_string(), "SUCCESS");
    }

    #[test]
    fn test_memory_log_helpers() {
        let log = MemoryActivityLog::new();
        log.info("SCANNER", "Scan started");
        log.success("WATCHLIST", "Saved 3 posts");

        let lines = log.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].source, "SCANNER");
        assert!(log.has(LogLevel::Success, "3 posts"));
        assert!(!log.has(LogLevel::Error, "3 posts"));
    }
}

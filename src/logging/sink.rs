//! Destinations for composed log records.
//!
//! # Responsibilities
//! - Decide cheaply whether a logger/level pair is enabled
//! - Deliver one composed multi-line message per call
//!
//! # Design Decisions
//! - [`TracingSink`] is the default and routes through `tracing`, so the
//!   application's subscriber decides where records end up
//! - [`RecordingSink`] keeps records in memory for assertions

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::Level;

/// Target of every record emitted by [`TracingSink`].
pub const LOG_TARGET: &str = "courier::logging";

/// Seam between the logging filters and a logging facility.
pub trait LogSink: Send + Sync {
    fn enabled(&self, logger: &str, level: Level) -> bool;

    fn log(&self, logger: &str, level: Level, message: &str);
}

/// Emits records as `tracing` events under [`LOG_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn enabled(&self, _logger: &str, level: Level) -> bool {
        match level {
            Level::TRACE => tracing::enabled!(target: LOG_TARGET, Level::TRACE),
            Level::DEBUG => tracing::enabled!(target: LOG_TARGET, Level::DEBUG),
            Level::INFO => tracing::enabled!(target: LOG_TARGET, Level::INFO),
            Level::WARN => tracing::enabled!(target: LOG_TARGET, Level::WARN),
            _ => tracing::enabled!(target: LOG_TARGET, Level::ERROR),
        }
    }

    fn log(&self, logger: &str, level: Level, message: &str) {
        match level {
            Level::TRACE => tracing::trace!(target: LOG_TARGET, logger, "{}", message),
            Level::DEBUG => tracing::debug!(target: LOG_TARGET, logger, "{}", message),
            Level::INFO => tracing::info!(target: LOG_TARGET, logger, "{}", message),
            Level::WARN => tracing::warn!(target: LOG_TARGET, logger, "{}", message),
            _ => tracing::error!(target: LOG_TARGET, logger, "{}", message),
        }
    }
}

/// A record captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub logger: String,
    pub level: Level,
    pub message: String,
}

/// In-memory sink, records kept in call order.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    max_level: Level,
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    /// A sink with every level enabled.
    pub fn new() -> Self {
        Self::with_max_level(Level::TRACE)
    }

    /// A sink that accepts `max_level` and anything more severe.
    pub fn with_max_level(max_level: Level) -> Self {
        Self {
            max_level,
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.message.clone()).collect()
    }
}

impl LogSink for RecordingSink {
    fn enabled(&self, _logger: &str, level: Level) -> bool {
        level <= self.max_level
    }

    fn log(&self, logger: &str, level: Level, message: &str) {
        self.lock().push(LogRecord {
            logger: logger.to_string(),
            level,
            message: message.to_string(),
        });
    }
}

#[derive(Debug, Error)]
#[error("unknown log level `{0}`")]
pub struct InvalidLevel(pub String);

/// Parse a level name.
///
/// Accepts `tracing` names and `FINEST`, `FINER`, `FINE`, `CONFIG`, `INFO`,
/// `WARNING`, `SEVERE`, case-insensitively.
pub fn parse_level(name: &str) -> Result<Level, InvalidLevel> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "FINEST" | "FINER" | "ALL" => Ok(Level::TRACE),
        "DEBUG" | "FINE" => Ok(Level::DEBUG),
        "INFO" | "CONFIG" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" | "SEVERE" => Ok(Level::ERROR),
        _ => Err(InvalidLevel(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_level_vocabularies() {
        assert_eq!(parse_level("fine").unwrap(), Level::DEBUG);
        assert_eq!(parse_level("FINEST").unwrap(), Level::TRACE);
        assert_eq!(parse_level("Warning").unwrap(), Level::WARN);
        assert_eq!(parse_level("SEVERE").unwrap(), Level::ERROR);
        assert_eq!(parse_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_level("trace").unwrap(), Level::TRACE);
        assert!(parse_level("verbose").is_err());
    }

    #[test]
    fn recording_sink_honours_max_level() {
        let sink = RecordingSink::with_max_level(Level::INFO);
        assert!(sink.enabled("x", Level::WARN));
        assert!(sink.enabled("x", Level::INFO));
        assert!(!sink.enabled("x", Level::DEBUG));

        sink.log("x", Level::INFO, "first");
        sink.log("y", Level::WARN, "second");
        assert_eq!(sink.messages(), ["first", "second"]);
        assert_eq!(sink.records()[1].logger, "y");
    }

    #[tracing_test::traced_test]
    #[test]
    fn tracing_sink_emits_events() {
        let sink = TracingSink;
        assert!(sink.enabled("courier::logging", Level::DEBUG));
        sink.log("courier::logging", Level::DEBUG, "1 * Sending client request");
        assert!(logs_contain("1 * Sending client request"));
    }
}

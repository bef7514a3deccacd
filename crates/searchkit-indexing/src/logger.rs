//! Leveled logging with structured context.
//!
//! Agents report through a [`Logger`] so that embedding applications can
//! route pipeline messages wherever they like. [`TracingLogger`] is the
//! default and forwards to `tracing`; without a subscriber installed it
//! emits nothing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

/// Structured key/value context attached to a log record.
pub type LogContext = BTreeMap<String, Value>;

/// Build a [`LogContext`] from key/value pairs.
pub fn log_context<const N: usize>(pairs: [(&str, Value); N]) -> LogContext {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Critical => "critical",
        };
        write!(f, "{}", name)
    }
}

/// Leveled logger accepting a message and structured context.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext);

    fn debug(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Debug, message, context);
    }

    fn info(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Info, message, context);
    }

    fn notice(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Notice, message, context);
    }

    fn warning(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Warning, message, context);
    }

    fn critical(&self, message: &str, context: &LogContext) {
        self.log(LogLevel::Critical, message, context);
    }
}

/// Forwards records to `tracing` with the context as a JSON field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        let context = serde_json::to_string(context).unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(context = %context, "{}", message),
            LogLevel::Info | LogLevel::Notice => {
                tracing::info!(severity = %level, context = %context, "{}", message)
            }
            LogLevel::Warning => tracing::warn!(context = %context, "{}", message),
            LogLevel::Critical => tracing::error!(context = %context, "{}", message),
        }
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _level: LogLevel, _message: &str, _context: &LogContext) {}
}

/// A captured log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub context: LogContext,
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records logged at exactly `level`.
    pub fn records_at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .collect()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.records_at(level).len()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogRecord {
                level,
                message: message.to_string(),
                context: context.clone(),
            });
    }
}

//! # Log sink capability.
//!
//! [`LogSink`] is the only thing the core needs from the logging stack: it
//! accepts a level and an already-rendered line.
//!
//! - [`TracingSink`] forwards to the `tracing` macros (target `lividpenguin`).
//! - [`MemorySink`] keeps every line in memory; used by tests and tooling.
//!
//! Any other sink (syslog forwarder, ring buffer, ...) only has to implement
//! [`LogSink::log`].

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Severity of one log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Lowercase name, as printed by the console formatter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for rendered log lines.
///
/// ### Implementation requirements
/// - Must not block for long; it is called from the reactor thread.
/// - Must not panic.
pub trait LogSink: Send + Sync + 'static {
    /// Emits one line at `level`.
    fn log(&self, level: Level, line: &str);

    fn debug(&self, line: &str) {
        self.log(Level::Debug, line);
    }

    fn info(&self, line: &str) {
        self.log(Level::Info, line);
    }

    fn warn(&self, line: &str) {
        self.log(Level::Warn, line);
    }

    fn error(&self, line: &str) {
        self.log(Level::Error, line);
    }
}

/// Forwards lines to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, line: &str) {
        match level {
            Level::Debug => tracing::debug!(target: "lividpenguin", "{line}"),
            Level::Info => tracing::info!(target: "lividpenguin", "{line}"),
            Level::Warn => tracing::warn!(target: "lividpenguin", "{line}"),
            Level::Error => tracing::error!(target: "lividpenguin", "{line}"),
        }
    }
}

/// In-memory collector.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemorySink {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything logged so far, in order.
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the lines logged at `level`.
    pub fn at(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, line)| line)
            .collect()
    }

    /// Returns true if any line equals `line` exactly.
    pub fn contains_line(&self, line: &str) -> bool {
        self.lines().iter().any(|(_, l)| l == line)
    }

    /// Returns true if any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, l)| l.contains(needle))
    }

    /// Drops everything collected so far.
    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: Level, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, line.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leveled_helpers_route_to_log() {
        let sink = MemorySink::new();
        sink.debug("a");
        sink.info("b");
        sink.warn("c");
        sink.error("d");

        assert_eq!(
            sink.lines(),
            vec![
                (Level::Debug, "a".to_string()),
                (Level::Info, "b".to_string()),
                (Level::Warn, "c".to_string()),
                (Level::Error, "d".to_string()),
            ]
        );
        assert_eq!(sink.at(Level::Warn), vec!["c".to_string()]);
    }

    #[test]
    fn test_memory_sink_queries() {
        let sink = MemorySink::new();
        sink.info("server listening");
        assert!(sink.contains("listening"));
        assert!(sink.contains_line("server listening"));
        assert!(!sink.contains_line("server"));

        sink.clear();
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_level_names() {
        assert_eq!(Level::Warn.to_string(), "warn");
        assert!(Level::Debug < Level::Error);
    }
}

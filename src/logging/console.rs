//! # Console formatter and subscriber setup.
//!
//! [`ConsoleFormat`] renders `tracing` events as
//!
//! ```text
//! 2024-05-01 12:00:00.123 |  info |   server | ---- |            | ---...--- | recover complete
//! ```
//!
//! i.e. local timestamp with milliseconds, lowercase level right-justified to
//! five columns, then the event message. [`init`] installs it as the global
//! subscriber, writing either to stdout (foreground) or to a log file
//! (background).

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;

use crate::config::LogLevel;

/// `tracing-subscriber` event formatter: `<timestamp> | <level> | <message>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleFormat;

impl ConsoleFormat {
    fn level_name(level: &Level) -> &'static str {
        match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        }
    }
}

impl<S, N> FormatEvent<S, N> for ConsoleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = Self::level_name(event.metadata().level());
        write!(writer, "{now} | {level:>5} | ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Where the subscriber writes.
#[derive(Debug, Clone)]
pub enum LogTarget {
    /// Standard output (foreground mode).
    Stdout,
    /// Append to a file (background mode).
    File(PathBuf),
}

/// Installs [`ConsoleFormat`] as the global `tracing` subscriber.
///
/// Fails if the log file cannot be opened or a global subscriber is already set.
pub fn init(level: LogLevel, target: LogTarget) -> anyhow::Result<()> {
    let writer = match target {
        LogTarget::Stdout => BoxMakeWriter::new(io::stdout),
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
    };

    tracing_subscriber::fmt()
        .event_format(ConsoleFormat)
        .with_max_level(level.as_filter())
        .with_writer(writer)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;

    #[test]
    fn test_console_format_renders_level_column_and_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.log");
        let file = File::create(&path).unwrap();

        let subscriber = tracing_subscriber::fmt()
            .event_format(ConsoleFormat)
            .with_max_level(LogLevel::Info.as_filter())
            .with_writer(Mutex::new(file))
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("recover complete");
            tracing::warn!("hello");
            tracing::debug!("filtered out");
        });

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" |  info | recover complete"));
        assert!(lines[1].ends_with(" |  warn | hello"));
        assert_eq!(lines[0].find(" | "), Some(23));
    }
}

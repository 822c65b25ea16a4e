//! Logging: line format, sinks, and the console subscriber.
//!
//! ## Contents
//! - [`format_line`], [`Category`] the fixed-format line shared by server and connections
//! - [`LogSink`], [`Level`] the capability the core logs through
//! - [`TracingSink`], [`MemorySink`] stock sinks
//! - [`ConsoleFormat`], [`init`] the `tracing-subscriber` setup used by the binary
//!
//! ## Flow
//! ```text
//! Server / Connection
//!     └─► format_line(category, conn_id, message)
//!             └─► LogSink::log(level, line)
//!                     ├─► TracingSink ─► tracing ─► ConsoleFormat ─► stdout | log file
//!                     └─► MemorySink  (tests)
//! ```

mod console;
mod format;
mod sink;

pub use console::{ConsoleFormat, LogTarget, init};
pub use format::{Category, SEPARATOR, format_line};
pub use sink::{Level, LogSink, MemorySink, TracingSink};

//! # Fixed-format log lines.
//!
//! Every line the server and its connections emit goes through [`format_line`]:
//!
//! ```text
//!   socket | ---- |          1 | --------------------------------- | new socket created (127.0.0.1:53122)
//!       rx | ---> |          1 | --------------------------------- | hello
//!   server | ---- |            | --------------------------------- | recover complete
//! ```
//!
//! - category right-justified to 8 columns
//! - direction glyph: `--->` inbound (`rx`), `<---` outbound (`tx`), `----` otherwise
//! - connection id right-justified to 10 columns, blank for server-level lines
//!
//! The function is pure: the same inputs always render the same bytes.

use std::fmt;

/// Visual separator logged around faults and at the start of recovery.
pub const SEPARATOR: &str = "--------------------------------";

/// Filler column between the connection id and the message.
const RULE: &str = "---------------------------------";

/// Category token of a log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category<'a> {
    /// Inbound traffic.
    Rx,
    /// Outbound traffic.
    Tx,
    /// Connection lifecycle.
    Socket,
    /// Run-loop lifecycle.
    Server,
    /// Any other token.
    Other(&'a str),
}

impl<'a> Category<'a> {
    /// Returns the token printed in the category column.
    pub fn as_str(&self) -> &'a str {
        match self {
            Category::Rx => "rx",
            Category::Tx => "tx",
            Category::Socket => "socket",
            Category::Server => "server",
            Category::Other(token) => token,
        }
    }

    /// Returns the direction glyph.
    pub fn glyph(&self) -> &'static str {
        match self {
            Category::Rx => "--->",
            Category::Tx => "<---",
            _ => "----",
        }
    }
}

impl<'a> From<&'a str> for Category<'a> {
    fn from(token: &'a str) -> Self {
        match token {
            "rx" => Category::Rx,
            "tx" => Category::Tx,
            "socket" => Category::Socket,
            "server" => Category::Server,
            other => Category::Other(other),
        }
    }
}

impl fmt::Display for Category<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders one log line. `conn` is `None` for server-level messages.
///
/// # Example
/// ```
/// use lividpenguin::logging::{Category, format_line};
///
/// let line = format_line(Category::Rx, Some(7), "ping");
/// assert_eq!(
///     line,
///     "      rx | ---> |          7 | --------------------------------- | ping"
/// );
/// ```
pub fn format_line(category: Category<'_>, conn: Option<u64>, message: &str) -> String {
    let id = conn.map(|id| id.to_string()).unwrap_or_default();
    format!(
        "{:>8} | {} | {:>10} | {RULE} | {message}",
        category.as_str(),
        category.glyph(),
        id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_by_category() {
        assert_eq!(Category::from("rx").glyph(), "--->");
        assert_eq!(Category::from("tx").glyph(), "<---");
        for token in ["socket", "server", "anything", ""] {
            assert_eq!(Category::from(token).glyph(), "----", "token {token:?}");
        }
    }

    #[test]
    fn test_connection_line_layout() {
        let line = format_line(Category::Socket, Some(1), "disconnected");
        assert_eq!(
            line,
            "  socket | ---- |          1 | --------------------------------- | disconnected"
        );
    }

    #[test]
    fn test_server_line_has_blank_id() {
        let line = format_line(Category::Server, None, "recover complete");
        assert_eq!(
            line,
            "  server | ---- |            | --------------------------------- | recover complete"
        );
    }

    #[test]
    fn test_outbound_line() {
        let line = format_line(Category::Tx, Some(42), "pong");
        assert!(line.starts_with("      tx | <--- |         42 | "));
        assert!(line.ends_with(" | pong"));
    }

    #[test]
    fn test_long_values_are_not_truncated() {
        let line = format_line(Category::Other("handshake"), Some(12_345_678_901), "x");
        assert!(line.starts_with("handshake | ---- | 12345678901 | "));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let a = format_line(Category::Rx, Some(3), "same input");
        let b = format_line(Category::Rx, Some(3), "same input");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_separator_and_rule_widths() {
        assert_eq!(SEPARATOR.len(), 32);
        assert!(SEPARATOR.chars().all(|c| c == '-'));
        assert_eq!(RULE.len(), 33);
    }
}

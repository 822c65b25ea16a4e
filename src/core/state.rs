//! # Run-loop states.
//!
//! ```text
//! Idle ──► Recovering ──► Listening ──► ShuttingDown ──► Terminated
//!              ▲              │
//!              │              ▼
//!         BackingOff ◄──── Crashed ──(fatal)──► Terminated
//! ```

use std::fmt;

/// State of the server run-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Built, not started.
    Idle,
    /// (Re)creating the listener; entered on every start and after every backoff.
    Recovering,
    /// Accepting connections; heartbeat armed.
    Listening,
    /// A fault unwound the loop.
    Crashed,
    /// Blocking pause before the next recovery.
    BackingOff,
    /// Stop requested; tearing down.
    ShuttingDown,
    /// Final state.
    Terminated,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Recovering => "recovering",
            RunState::Listening => "listening",
            RunState::Crashed => "crashed",
            RunState::BackingOff => "backing-off",
            RunState::ShuttingDown => "shutting-down",
            RunState::Terminated => "terminated",
        }
    }

    /// Returns true if the run-loop can move from `self` to `next`.
    pub fn can_enter(&self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Recovering)
                | (Recovering, Listening)
                | (Recovering, Crashed)
                | (Listening, Crashed)
                | (Crashed, BackingOff)
                | (BackingOff, Recovering)
                | (Idle | Recovering | Listening | Crashed | BackingOff, ShuttingDown)
                | (Crashed | ShuttingDown, Terminated)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! # Run-loop events.
//!
//! [`EventKind`] classifies what happened; [`Event`] carries the optional
//! details (new state, bound address, connection id, backoff delay, reason).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use lividpenguin::{Event, EventKind, RunState};
//!
//! let ev = Event::state(RunState::BackingOff)
//!     .with_delay(Duration::from_secs(12))
//!     .with_reason("bind_failed");
//!
//! assert_eq!(ev.kind, EventKind::StateChanged);
//! assert_eq!(ev.state, Some(RunState::BackingOff));
//! assert_eq!(ev.delay, Some(Duration::from_secs(12)));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::core::RunState;

/// Classification of run-loop events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The run-loop entered a new state.
    ///
    /// Sets:
    /// - `state`: the new state
    /// - `addr`, `epoch`: for `Listening`
    /// - `delay`: for `BackingOff`
    /// - `reason`: fault label for `Crashed` / `BackingOff`
    StateChanged,

    /// A socket was accepted and identified.
    ///
    /// Sets:
    /// - `conn`: connection id
    /// - `addr`: peer address
    /// - `epoch`: listening epoch
    ConnectionOpened,

    /// An identified connection finished (either side closed it).
    ///
    /// Sets:
    /// - `conn`: connection id
    /// - `epoch`: listening epoch
    ConnectionClosed,

    /// A socket was accepted but its peer could not be resolved; it was closed.
    PeerUnresolved,

    /// The heartbeat file was touched.
    HeartbeatTouched,
}

/// Run-loop event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Sequence number assigned by the [`Bus`](super::Bus) on publish.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// New state (for `StateChanged`).
    pub state: Option<RunState>,
    /// Bound listener address or peer address.
    pub addr: Option<SocketAddr>,
    /// Listening epoch (starts at 1).
    pub epoch: Option<u64>,
    /// Connection id.
    pub conn: Option<u64>,
    /// Backoff delay.
    pub delay: Option<Duration>,
    /// Human-readable reason (fault labels, etc.).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates an event of the given kind with the current timestamp.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            state: None,
            addr: None,
            epoch: None,
            conn: None,
            delay: None,
            reason: None,
        }
    }

    /// Shorthand for a `StateChanged` event.
    pub fn state(state: RunState) -> Self {
        let mut ev = Self::new(EventKind::StateChanged);
        ev.state = Some(state);
        ev
    }

    #[inline]
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = Some(addr);
        self
    }

    #[inline]
    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = Some(epoch);
        self
    }

    #[inline]
    pub fn with_conn(mut self, id: u64) -> Self {
        self.conn = Some(id);
        self
    }

    #[inline]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns true for `StateChanged` into `state`.
    #[inline]
    pub fn is_state(&self, state: RunState) -> bool {
        self.kind == EventKind::StateChanged && self.state == Some(state)
    }
}

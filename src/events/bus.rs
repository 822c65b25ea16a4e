//! # Event bus for run-loop events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] and stamps every published event
//! with a sequence number that increases monotonically per bus.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits; it may be called from the reactor thread.
//! - **Bounded capacity**: slow receivers get `RecvError::Lagged(n)` and skip the oldest items.
//! - **No persistence**: events published with no receiver attached are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use super::event::Event;

/// Default ring buffer size.
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcast channel for run-loop events.
///
/// Cheap to clone; all clones share one channel and one sequence counter.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
    seq: Arc<AtomicU64>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stamps `ev` with the next sequence number and sends it to all receivers.
    pub fn publish(&self, mut ev: Event) {
        ev.seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

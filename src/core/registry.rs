//! # Connection registry.
//!
//! Assigns sequence ids to identified connections and keeps the handles of
//! the ones still open in the current listening epoch.
//!
//! ## Rules
//! - Ids start at 1 after every [`reset`](ConnectionRegistry::reset) and increase by one
//!   per identified connection; no gaps, no reuse within an epoch.
//! - Connections whose peer cannot be resolved never call [`next_id`](ConnectionRegistry::next_id).
//! - `reset` also starts a new epoch and forgets the previous epoch's handles;
//!   late removals from an old epoch are ignored.
//!
//! The registry is owned by one [`Server`](crate::Server) and shared with its
//! connection tasks through an `Arc`; nothing here is process-global.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::connection::ConnectionHandle;

/// Id counter plus the table of live connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    issued: AtomicU64,
    epoch: AtomicU64,
    live: Mutex<HashMap<u64, ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry in epoch 0 (nothing listening yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the id counter to zero, forgets live handles and starts a new
    /// epoch. Returns the new epoch number (1 for the first listener).
    pub fn reset(&self) -> u64 {
        let mut live = self.table();
        live.clear();
        self.issued.store(0, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Claims the next connection id.
    pub fn next_id(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of ids issued in the current epoch.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Current epoch number.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Sorted ids of connections still open in the current epoch.
    pub fn live(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.table().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the handle of an open connection.
    pub fn get(&self, id: u64) -> Option<ConnectionHandle> {
        self.table().get(&id).cloned()
    }

    /// Asks connection `id` to close as stale. Returns false if it is not open.
    pub fn mark_stale(&self, id: u64) -> bool {
        self.get(id).is_some_and(|h| h.mark_stale())
    }

    pub(crate) fn insert(&self, handle: ConnectionHandle) {
        if handle.epoch() != self.epoch() {
            return;
        }
        self.table().insert(handle.id(), handle);
    }

    pub(crate) fn remove(&self, id: u64, epoch: u64) {
        let mut live = self.table();
        if live.get(&id).is_some_and(|h| h.epoch() == epoch) {
            live.remove(&id);
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u64, ConnectionHandle>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::core::connection::CloseReason;

    fn handle(id: u64, epoch: u64) -> (ConnectionHandle, mpsc::UnboundedReceiver<CloseReason>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ConnectionHandle::new(id, epoch, "127.0.0.1:5000".parse().unwrap(), tx),
            rx,
        )
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let registry = ConnectionRegistry::new();
        registry.reset();
        let ids: Vec<u64> = (0..5).map(|_| registry.next_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(registry.issued(), 5);
    }

    #[test]
    fn test_reset_restarts_at_one_and_bumps_epoch() {
        let registry = ConnectionRegistry::new();
        assert_eq!(registry.reset(), 1);
        for _ in 0..41 {
            registry.next_id();
        }
        assert_eq!(registry.reset(), 2);
        assert_eq!(registry.issued(), 0);
        assert_eq!(registry.next_id(), 1);
    }

    #[test]
    fn test_live_table_tracks_open_connections() {
        let registry = ConnectionRegistry::new();
        let epoch = registry.reset();
        let (a, _rx_a) = handle(1, epoch);
        let (b, _rx_b) = handle(2, epoch);
        registry.insert(a);
        registry.insert(b);
        assert_eq!(registry.live(), vec![1, 2]);

        registry.remove(1, epoch);
        assert_eq!(registry.live(), vec![2]);
        assert!(registry.get(1).is_none());
    }

    #[test]
    fn test_stale_removal_from_old_epoch_is_ignored() {
        let registry = ConnectionRegistry::new();
        let old = registry.reset();
        let (stale, _rx_old) = handle(1, old);
        registry.insert(stale);

        let new = registry.reset();
        assert!(registry.live().is_empty());
        let (fresh, _rx_new) = handle(1, new);
        registry.insert(fresh);

        registry.remove(1, old);
        assert_eq!(registry.live(), vec![1]);
    }

    #[test]
    fn test_handles_from_old_epoch_are_not_inserted() {
        let registry = ConnectionRegistry::new();
        let old = registry.reset();
        registry.reset();
        let (late, _rx) = handle(3, old);
        registry.insert(late);
        assert!(registry.live().is_empty());
    }

    #[test]
    fn test_mark_stale_sends_close_request() {
        let registry = ConnectionRegistry::new();
        let epoch = registry.reset();
        let (h, mut rx) = handle(1, epoch);
        registry.insert(h);

        assert!(registry.mark_stale(1));
        assert!(!registry.mark_stale(99));
        assert!(matches!(rx.try_recv(), Ok(CloseReason::Stale)));
    }
}

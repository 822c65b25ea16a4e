//! Run-loop events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Server` (state transitions, heartbeat), connection tasks (open/close).
//! - **Consumers**: anything holding a [`ServerHandle`](crate::ServerHandle) via `subscribe()`;
//!   the end-to-end tests use it to learn the ephemeral port and to wait for restarts.

mod bus;
mod event;

pub use bus::{Bus, DEFAULT_CAPACITY};
pub use event::{Event, EventKind};

//! Runtime core: the run-loop and the connections it accepts.
//!
//! The public API from this module is [`Server`] (plus its builder and handle),
//! the [`ConnectionRegistry`] it owns and the per-socket [`Connection`].
//!
//! Internal modules:
//! - [`server`]: run-loop state machine, crash/backoff/restart;
//! - [`connection`]: one accepted socket, its log lines and close paths;
//! - [`registry`]: connection ids per epoch and live handles;
//! - [`heartbeat`]: periodic mtime refresh of the PID file;
//! - [`state`]: run-loop states and allowed transitions;
//! - [`builder`]: optional collaborators (sink, classifier, bus size).

mod builder;
mod connection;
mod heartbeat;
mod registry;
mod server;
mod state;

pub use builder::ServerBuilder;
pub use connection::{CloseReason, Connection, ConnectionHandle};
pub use heartbeat::Heartbeat;
pub use registry::ConnectionRegistry;
pub use server::{Server, ServerHandle};
pub use state::RunState;

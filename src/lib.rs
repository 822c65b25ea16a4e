//! # lividpenguin
//!
//! **lividpenguin** is a long-running TCP listening daemon. It accepts inbound
//! connections, logs their traffic and lifecycle in a fixed human-readable
//! format, and keeps itself alive across internal faults by restarting its
//! own event loop after a randomized backoff.
//!
//! No protocol is spoken: received bytes are logged, never parsed or answered.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   lividpenguin-server (binary)
//!     ├─ Cli::load()  ──► ServerConfig
//!     ├─ logging::init(ConsoleFormat, stdout | log file)
//!     └─ ServerLifecycle
//!          ├─ PidFile (already-running check, write, remove)
//!          ├─ signals: SIGINT/SIGTERM/SIGQUIT ─► stop, SIGHUP ─► restart
//!          └─ Server::run()
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Server (run-loop)                                                │
//! │  - ConnectionRegistry (ids per epoch, live handles)               │
//! │  - Heartbeat (PID file mtime)                                     │
//! │  - FaultClassifier + BackoffWindow (restart policy)               │
//! │  - Bus (broadcast events)                                         │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌────────────┐     ┌────────────┐     ┌────────────┐
//!   │ Connection │     │ Connection │     │ Connection │
//!   │   id = 1   │     │   id = 2   │     │   id = N   │
//!   └─────┬──────┘     └─────┬──────┘     └─────┬──────┘
//!         └──────── format_line ──► LogSink ◄───┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Idle ──► Recovering ──► Listening ──► ShuttingDown ──► Terminated
//!              ▲              │
//!              │              ▼
//!         BackingOff ◄──── Crashed ──(fatal)──► Terminated
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Run-loop**      | Listen, accept, heartbeat; crash, back off and restart.      | [`Server`], [`ServerHandle`], [`RunState`] |
//! | **Connections**   | Peer identity, per-epoch ids, intentional-close tracking.    | [`Connection`], [`ConnectionRegistry`]     |
//! | **Logging**       | Fixed-format lines, pluggable sinks, console subscriber.     | [`format_line`], [`LogSink`]               |
//! | **Policies**      | Which faults restart and how long to pause.                  | [`FaultClassifier`], [`BackoffWindow`]     |
//! | **Lifecycle**     | PID file, signals, blocking or background start.             | [`Lifecycle`], [`ServerLifecycle`]         |
//! | **Events**        | Broadcast of state transitions and connection activity.      | [`Event`], [`EventKind`], [`Bus`]          |
//! | **Configuration** | Defaults, TOML file and command-line flags.                  | [`ServerConfig`], [`Cli`]                  |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use lividpenguin::{Lifecycle, MemorySink, Server, ServerConfig, ServerLifecycle};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = ServerConfig::default();
//!     cfg.address = "127.0.0.1".into();
//!     cfg.port = 4000;
//!
//!     let server = Server::builder(cfg)
//!         .with_sink(Arc::new(MemorySink::new()))
//!         .build();
//!     let lifecycle = ServerLifecycle::new(server);
//!     lifecycle.ensure_not_running()?;
//!
//!     let _signals = lifecycle.listen_for_signals();
//!     lifecycle.start(true).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
mod core;
mod error;
pub mod events;
pub mod lifecycle;
pub mod logging;
mod policies;

// ---- Public re-exports ----

pub use cli::{Cli, FileConfig};
pub use config::{DAEMON_NAME, LogLevel, ServerConfig};
pub use core::{
    CloseReason, Connection, ConnectionHandle, ConnectionRegistry, Heartbeat, RunState, Server,
    ServerBuilder, ServerHandle,
};
pub use error::{ConfigError, LifecycleError, ServerError};
pub use events::{Bus, Event, EventKind};
pub use lifecycle::{Lifecycle, PidFile, ServerLifecycle, Signal};
pub use logging::{Category, Level, LogSink, MemorySink, TracingSink, format_line};
pub use policies::{BackoffWindow, DefaultClassifier, FaultClass, FaultClassifier};

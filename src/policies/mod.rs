//! Restart policies.
//!
//! This module groups the knobs that control **whether** the run-loop restarts
//! after a fault and **how long** it pauses first.
//!
//! ## Contents
//! - [`FaultClassifier`] maps a fault to recoverable / fatal
//! - [`BackoffWindow`]   uniform window the restart pause is sampled from
//!
//! ## Quick wiring
//! ```text
//! Server { classifier: Arc<dyn FaultClassifier>, cfg.backoff: BackoffWindow }
//!      └─► core::server::Server::run uses:
//!           - classifier.classify(&fault) to decide restart / terminate
//!           - backoff.sample() to size the blocking pause
//! ```
//!
//! ## Defaults
//! - [`DefaultClassifier`]: I/O and operator restarts recoverable, config errors and panics fatal.
//! - `BackoffWindow::default()` → `10s..20s`.

mod backoff;
mod classify;

pub use backoff::BackoffWindow;
pub use classify::{DefaultClassifier, FaultClass, FaultClassifier};

//! # OS signal handling.
//!
//! Provides [`wait_for_signal`], an async helper that completes when the
//! process receives a signal the daemon reacts to.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal) → [`Signal::Shutdown`]
//! - `SIGTERM` (default kill signal) → [`Signal::Shutdown`]
//! - `SIGQUIT` (quit signal) → [`Signal::Shutdown`]
//! - `SIGHUP` (reload) → [`Signal::Restart`]
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`] → [`Signal::Shutdown`]

/// What a received signal asks the daemon to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Stop gracefully.
    Shutdown,
    /// Force the run-loop through crash/backoff/restart.
    Restart,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Shutdown => "shutdown",
            Signal::Restart => "restart",
        }
    }
}

/// Waits for the next signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Err` if signal registration fails.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let received = tokio::select! {
        _ = tokio::signal::ctrl_c() => Signal::Shutdown,
        _ = sigint.recv()  => Signal::Shutdown,
        _ = sigterm.recv() => Signal::Shutdown,
        _ = sigquit.recv() => Signal::Shutdown,
        _ = sighup.recv()  => Signal::Restart,
    };
    Ok(received)
}

/// Waits for the next signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Err` if signal registration fails.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<Signal> {
    tokio::signal::ctrl_c().await?;
    Ok(Signal::Shutdown)
}

//! # Heartbeat file.
//!
//! While the server is listening, the PID file doubles as a liveness signal:
//! its modification time is refreshed once per period. A supervisor that sees
//! a stale mtime can assume the reactor is wedged.
//!
//! ## Rules
//! - The first touch happens one full period after the listener is up.
//! - Touching a missing file recreates it empty; the PID content is written by
//!   the lifecycle layer, not here.
//! - A failed touch is a fault of the current epoch.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Periodically refreshed file.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    path: PathBuf,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sets the file's modification time to now, creating it if needed.
    pub fn touch(&self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.set_modified(SystemTime::now())
    }

    /// Timer whose first tick fires one period from now.
    pub fn ticker(&self) -> Interval {
        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

//! # Backoff window for run-loop restarts.
//!
//! [`BackoffWindow`] controls how long the server pauses after a recoverable
//! fault before it listens again. The pause is sampled uniformly from
//! `[min, max)`, so a fleet of daemons hitting the same fault does not come
//! back in lockstep.
//!
//! Unlike a growing exponential backoff, every restart samples from the same
//! window: the loop never gives up, and the pause never grows unbounded.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use lividpenguin::BackoffWindow;
//!
//! let window = BackoffWindow::new(Duration::from_secs(10), Duration::from_secs(20));
//!
//! let delay = window.sample();
//! assert!(delay >= Duration::from_secs(10));
//! assert!(delay < Duration::from_secs(20));
//! ```

use std::time::Duration;

use rand::Rng;

/// Uniform backoff window `[min, max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffWindow {
    /// Shortest pause (inclusive).
    pub min: Duration,
    /// Longest pause (exclusive).
    pub max: Duration,
}

impl Default for BackoffWindow {
    /// Returns a window of `10s..20s`.
    fn default() -> Self {
        Self {
            min: Duration::from_secs(10),
            max: Duration::from_secs(20),
        }
    }
}

impl BackoffWindow {
    /// Creates a window; the bounds are not reordered.
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Samples a pause uniformly from `[min, max)` at millisecond resolution.
    ///
    /// # Notes
    /// - If `max <= min` the window is degenerate and `min` is returned.
    /// - Sub-millisecond windows collapse to `min`.
    pub fn sample(&self) -> Duration {
        let min_ms = self.min.as_millis().min(u128::from(u64::MAX)) as u64;
        let max_ms = self.max.as_millis().min(u128::from(u64::MAX)) as u64;
        if max_ms <= min_ms {
            return self.min;
        }

        let mut rng = rand::rng();
        Duration::from_millis(rng.random_range(min_ms..max_ms))
    }
}

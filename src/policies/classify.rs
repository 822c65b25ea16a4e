//! # Fault classification.
//!
//! [`FaultClassifier`] maps a [`ServerError`] to a [`FaultClass`], which tells
//! the run-loop whether to back off and restart or to terminate.
//!
//! - [`FaultClass::Recoverable`] the loop logs, sleeps for a sampled backoff and listens again.
//! - [`FaultClass::Fatal`] the loop logs and returns the fault; the process exits non-zero.
//!
//! ## Default classification
//! ```text
//! Bind / Accept / LocalAddr / Heartbeat  (I/O)      → Recoverable
//! RestartRequested                       (operator) → Recoverable
//! InvalidAddress                         (config)   → Fatal
//! Panicked                               (bug)      → Fatal
//! ```
//!
//! Closures can be used as classifiers:
//! ```rust
//! use lividpenguin::{FaultClass, FaultClassifier, ServerError};
//!
//! let never_restart = |_: &ServerError| FaultClass::Fatal;
//! let err = ServerError::RestartRequested { reason: "test".into() };
//! assert_eq!(never_restart.classify(&err), FaultClass::Fatal);
//! ```

use crate::error::ServerError;

/// Outcome of classifying a run-loop fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultClass {
    /// Transient; back off and restart.
    Recoverable,
    /// Not worth retrying; terminate.
    Fatal,
}

/// Decides whether a run-loop fault is retried.
pub trait FaultClassifier: Send + Sync + 'static {
    /// Classifies one fault.
    fn classify(&self, fault: &ServerError) -> FaultClass;
}

impl<F> FaultClassifier for F
where
    F: Fn(&ServerError) -> FaultClass + Send + Sync + 'static,
{
    fn classify(&self, fault: &ServerError) -> FaultClass {
        self(fault)
    }
}

/// Default policy: I/O faults and operator restarts are recoverable,
/// configuration errors and panics are fatal.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultClassifier;

impl FaultClassifier for DefaultClassifier {
    fn classify(&self, fault: &ServerError) -> FaultClass {
        match fault {
            ServerError::Bind { .. }
            | ServerError::LocalAddr(_)
            | ServerError::Accept(_)
            | ServerError::Heartbeat { .. }
            | ServerError::RestartRequested { .. } => FaultClass::Recoverable,
            ServerError::InvalidAddress { .. } | ServerError::Panicked { .. } => FaultClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    fn io_err() -> io::Error {
        io::Error::new(io::ErrorKind::AddrInUse, "in use")
    }

    #[test]
    fn test_io_faults_are_recoverable() {
        let faults = [
            ServerError::Bind {
                addr: "127.0.0.1:80".parse().unwrap(),
                source: io_err(),
            },
            ServerError::LocalAddr(io_err()),
            ServerError::Accept(io_err()),
            ServerError::Heartbeat {
                path: "/nope/x.pid".into(),
                source: io_err(),
            },
        ];
        for fault in &faults {
            assert_eq!(DefaultClassifier.classify(fault), FaultClass::Recoverable, "{fault}");
        }
    }

    #[test]
    fn test_operator_restart_is_recoverable() {
        let fault = ServerError::RestartRequested { reason: "SIGHUP".into() };
        assert_eq!(DefaultClassifier.classify(&fault), FaultClass::Recoverable);
    }

    #[test]
    fn test_config_and_panic_faults_are_fatal() {
        let bad_addr = ServerError::InvalidAddress { address: "???".into() };
        let panic = ServerError::Panicked { message: "index out of bounds".into() };
        assert_eq!(DefaultClassifier.classify(&bad_addr), FaultClass::Fatal);
        assert_eq!(DefaultClassifier.classify(&panic), FaultClass::Fatal);
    }
}

//! Error types used by the run-loop, the configuration loader and the lifecycle adapter.
//!
//! This module defines three enums:
//!
//! - [`ServerError`]: faults raised inside the run-loop (bind, accept, heartbeat, ...).
//! - [`ConfigError`]: invalid settings or an unreadable configuration file.
//! - [`LifecycleError`]: failures at the boundary with the process supervisor.
//!
//! Each type provides `as_label` for short stable names in logs. Whether a
//! [`ServerError`] is retried is decided by a [`FaultClassifier`](crate::FaultClassifier),
//! not by the error itself.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// # Faults raised inside the server run-loop.
///
/// Any of these unwinds the current listening epoch. The configured
/// [`FaultClassifier`](crate::FaultClassifier) then decides between
/// backoff-and-restart and termination.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured listen address is not an IP literal (or `localhost`).
    #[error("invalid listen address {address:?}")]
    InvalidAddress {
        /// Address string as configured.
        address: String,
    },

    /// Binding or listening on the socket failed.
    #[error("unable to listen on {addr}")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The bound socket could not report its local address.
    #[error("unable to read local address of listener")]
    LocalAddr(#[source] io::Error),

    /// Accepting an inbound connection failed.
    #[error("accept failed")]
    Accept(#[source] io::Error),

    /// Refreshing the heartbeat file failed.
    #[error("unable to touch heartbeat file {path:?}")]
    Heartbeat {
        /// Heartbeat file path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// An operator asked the loop to restart (e.g. `SIGHUP`).
    #[error("restart requested: {reason}")]
    RestartRequested {
        /// Who asked and why.
        reason: String,
    },

    /// Code inside the loop panicked.
    #[error("run-loop panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },
}

impl ServerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use lividpenguin::ServerError;
    ///
    /// let err = ServerError::RestartRequested { reason: "SIGHUP".into() };
    /// assert_eq!(err.as_label(), "restart_requested");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ServerError::InvalidAddress { .. } => "invalid_address",
            ServerError::Bind { .. } => "bind_failed",
            ServerError::LocalAddr(_) => "local_addr_failed",
            ServerError::Accept(_) => "accept_failed",
            ServerError::Heartbeat { .. } => "heartbeat_failed",
            ServerError::RestartRequested { .. } => "restart_requested",
            ServerError::Panicked { .. } => "panicked",
        }
    }

    /// Returns the I/O error at the root of this fault, if there is one.
    pub fn io_source(&self) -> Option<&io::Error> {
        match self {
            ServerError::Bind { source, .. } | ServerError::Heartbeat { source, .. } => Some(source),
            ServerError::LocalAddr(source) | ServerError::Accept(source) => Some(source),
            _ => None,
        }
    }
}

/// # Errors produced while building a [`ServerConfig`](crate::ServerConfig).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Listen address is neither an IP literal nor `localhost`.
    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),

    /// Port outside `1..=65535` in a configuration file.
    #[error("invalid port {0}; expected 1-65535")]
    InvalidPort(i64),

    /// Backoff window with `min > max`.
    #[error("invalid backoff window: min {min_secs}s is greater than max {max_secs}s")]
    InvalidBackoff {
        /// Lower bound in seconds.
        min_secs: u64,
        /// Upper bound in seconds.
        max_secs: u64,
    },

    /// Heartbeat interval of zero.
    #[error("heartbeat interval must be greater than zero")]
    ZeroHeartbeat,

    /// Configuration file could not be read.
    #[error("unable to read config file {path:?}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Configuration file is not valid TOML for this schema.
    #[error("unable to parse config file {path:?}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::InvalidAddress(_) => "config_invalid_address",
            ConfigError::InvalidPort(_) => "config_invalid_port",
            ConfigError::InvalidBackoff { .. } => "config_invalid_backoff",
            ConfigError::ZeroHeartbeat => "config_zero_heartbeat",
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
        }
    }
}

/// # Errors at the boundary with the process supervisor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A previous instance is still alive according to its PID file.
    #[error("Already running; pid: {} (pid {pid})", path.display())]
    AlreadyRunning {
        /// Process id found in the file.
        pid: u32,
        /// PID file path.
        path: PathBuf,
    },

    /// `start` was called more than once.
    #[error("server already started")]
    AlreadyStarted,

    /// The PID file could not be written.
    #[error("unable to write pid file {path:?}")]
    PidFile {
        /// PID file path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The run-loop hit a fault classified as fatal.
    #[error("server terminated: {0}")]
    Fatal(#[from] ServerError),

    /// The background run-loop task could not be joined.
    #[error("run-loop task failed: {0}")]
    Join(String),
}

impl LifecycleError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LifecycleError::AlreadyRunning { .. } => "already_running",
            LifecycleError::AlreadyStarted => "already_started",
            LifecycleError::PidFile { .. } => "pid_file",
            LifecycleError::Fatal(_) => "fatal",
            LifecycleError::Join(_) => "join_failed",
        }
    }
}

//! # Server configuration.
//!
//! Provides [`ServerConfig`], the settings consumed by the run-loop, and
//! [`LogLevel`], the minimum verbosity of the log output.
//!
//! The config is produced by the command-line layer (see [`crate::cli`]) and
//! is read-only to the core: address and port are fixed for the lifetime of
//! one [`Server`](crate::Server). Changing them means building a new one.
//!
//! ## Sentinel values
//! - `port = 0` → ephemeral port chosen by the OS (accepted by the core, rejected by the CLI)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use tracing::level_filters::LevelFilter;

use crate::error::ConfigError;
use crate::policies::BackoffWindow;

/// Name of the daemon, used to build the PID file name and in log targets.
pub const DAEMON_NAME: &str = "lividpenguin-server";

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 42690;

/// Default listen address.
pub const DEFAULT_ADDRESS: &str = "0.0.0.0";

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(60);

/// Minimum log level; ordered `Debug < Info < Warn`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Everything, including per-connection lifecycle lines.
    #[default]
    Debug,
    /// Server lifecycle and disconnects.
    Info,
    /// Received payloads and faults only.
    Warn,
}

impl LogLevel {
    /// Parses `debug`, `info` or `warn` (case-insensitive). Anything else maps to `Info`.
    ///
    /// # Example
    /// ```
    /// use lividpenguin::LogLevel;
    ///
    /// assert_eq!(LogLevel::parse_lossy("WARN"), LogLevel::Warn);
    /// assert_eq!(LogLevel::parse_lossy("verbose"), LogLevel::Info);
    /// ```
    pub fn parse_lossy(level: &str) -> Self {
        match level.trim().to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            _ => LogLevel::Info,
        }
    }

    /// Returns the matching `tracing` filter.
    #[inline]
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
        }
    }
}

/// Settings for one server instance.
///
/// ## Field semantics
/// - `address`: listen address, an IP literal or `localhost`
/// - `port`: listen port (`0` = ephemeral)
/// - `pid_path`: directory holding the PID/heartbeat file
/// - `log_level`: minimum level emitted by the binary's subscriber
/// - `foreground`: stay attached to the terminal instead of detaching
/// - `heartbeat_interval`: period between heartbeat file touches
/// - `backoff`: window the post-crash pause is sampled from
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address.
    pub address: String,
    /// Listen port.
    pub port: u16,
    /// Directory of the PID/heartbeat file.
    pub pid_path: PathBuf,
    /// Minimum log level.
    pub log_level: LogLevel,
    /// Run attached to the terminal.
    pub foreground: bool,
    /// Heartbeat period while listening.
    pub heartbeat_interval: Duration,
    /// Backoff window after a recoverable fault.
    pub backoff: BackoffWindow,
}

impl ServerConfig {
    /// Path of the PID/heartbeat file: `<pid_path>/<daemon-name>.<port>.pid`.
    ///
    /// # Example
    /// ```
    /// use lividpenguin::ServerConfig;
    ///
    /// let mut cfg = ServerConfig::default();
    /// cfg.pid_path = "/run/lp".into();
    /// cfg.port = 4000;
    /// assert_eq!(cfg.pid_file().to_str(), Some("/run/lp/lividpenguin-server.4000.pid"));
    /// ```
    pub fn pid_file(&self) -> PathBuf {
        self.pid_path.join(format!("{DAEMON_NAME}.{}.pid", self.port))
    }

    /// Path of the log file written in background mode.
    pub fn log_file(&self) -> PathBuf {
        self.pid_path.join(format!("{DAEMON_NAME}.{}.log", self.port))
    }

    /// Resolves `address:port` into a socket address without touching DNS.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.address.eq_ignore_ascii_case("localhost") {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.address
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidAddress(self.address.clone()))?
        };
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Checks cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::ZeroHeartbeat);
        }
        if self.backoff.min > self.backoff.max {
            return Err(ConfigError::InvalidBackoff {
                min_secs: self.backoff.min.as_secs(),
                max_secs: self.backoff.max.as_secs(),
            });
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    /// Default configuration:
    ///
    /// - `address = 0.0.0.0`, `port = 42690`
    /// - `pid_path = <system temp dir>`
    /// - `log_level = Debug`, `foreground = false`
    /// - `heartbeat_interval = 60s`
    /// - `backoff = 10s..20s`
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            pid_path: std::env::temp_dir(),
            log_level: LogLevel::default(),
            foreground: false,
            heartbeat_interval: DEFAULT_HEARTBEAT,
            backoff: BackoffWindow::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert_eq!(LogLevel::Warn.as_filter(), LevelFilter::WARN);
    }

    #[test]
    fn test_parse_lossy_defaults_to_info() {
        assert_eq!(LogLevel::parse_lossy("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse_lossy(" Info "), LogLevel::Info);
        assert_eq!(LogLevel::parse_lossy("error"), LogLevel::Info);
        assert_eq!(LogLevel::parse_lossy(""), LogLevel::Info);
    }

    #[test]
    fn test_listen_addr_accepts_ip_literals_and_localhost() {
        let mut cfg = ServerConfig {
            port: 9000,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.listen_addr().unwrap(), "0.0.0.0:9000".parse().unwrap());

        cfg.address = "::1".into();
        assert_eq!(cfg.listen_addr().unwrap(), "[::1]:9000".parse().unwrap());

        cfg.address = "LocalHost".into();
        assert_eq!(cfg.listen_addr().unwrap(), "127.0.0.1:9000".parse().unwrap());

        cfg.address = "example.invalid".into();
        assert!(matches!(cfg.listen_addr(), Err(ConfigError::InvalidAddress(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut cfg = ServerConfig::default();
        cfg.backoff = BackoffWindow::new(Duration::from_secs(20), Duration::from_secs(10));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidBackoff { min_secs: 20, max_secs: 10 })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_heartbeat() {
        let cfg = ServerConfig {
            heartbeat_interval: Duration::ZERO,
            ..ServerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroHeartbeat)));
    }

    #[test]
    fn test_file_names_include_port() {
        let cfg = ServerConfig {
            pid_path: PathBuf::from("/tmp/lp"),
            port: 1234,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.pid_file(), PathBuf::from("/tmp/lp/lividpenguin-server.1234.pid"));
        assert_eq!(cfg.log_file(), PathBuf::from("/tmp/lp/lividpenguin-server.1234.log"));
    }
}

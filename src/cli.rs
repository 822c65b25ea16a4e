//! # Command line and configuration file.
//!
//! Settings are layered; later layers win:
//!
//! ```text
//! ServerConfig::default()  ──►  --config FILE (TOML)  ──►  command-line flags  ──►  validate()
//! ```
//!
//! ## Configuration file
//! ```toml
//! address = "127.0.0.1"
//! port = 42690
//! pid_path = "/var/run/lividpenguin"
//! log_level = "info"          # debug | info | warn, anything else → info
//! foreground = false
//! heartbeat_interval_secs = 60
//! backoff_min_secs = 10
//! backoff_max_secs = 20
//! ```
//! Unknown keys are rejected.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::config::{LogLevel, ServerConfig};
use crate::error::ConfigError;

/// Command-line flags of `lividpenguin-server`.
#[derive(Parser, Debug, Default)]
#[command(name = "lividpenguin-server")]
#[command(version)]
#[command(about = "TCP listening daemon that logs inbound traffic and restarts itself on faults", long_about = None)]
pub struct Cli {
    /// PATH to store PID file
    #[arg(short = 'p', long = "pid-path", value_name = "PATH")]
    pub pid_path: Option<PathBuf>,

    /// Do not fork, run in foreground mode
    #[arg(short = 'f', long)]
    pub foreground: bool,

    /// Logging verbosity level; [debug, info, warn]
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Listen on specified address (default: 0.0.0.0)
    #[arg(short = 'A', long, value_name = "HOST")]
    pub address: Option<String>,

    /// Accept connections on specified port number (default: 42690)
    #[arg(short = 'P', long, value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Load settings from a TOML file; flags override it
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Set by the parent when re-executing itself in the background
    #[arg(long, hide = true)]
    pub detached: bool,
}

/// Optional settings read from a configuration file.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub address: Option<String>,
    pub port: Option<i64>,
    pub pid_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub foreground: Option<bool>,
    pub heartbeat_interval_secs: Option<u64>,
    pub backoff_min_secs: Option<u64>,
    pub backoff_max_secs: Option<u64>,
}

impl FileConfig {
    /// Reads and parses `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlays the values present in the file onto `cfg`.
    pub fn apply(self, cfg: &mut ServerConfig) -> Result<(), ConfigError> {
        if let Some(address) = self.address {
            cfg.address = address;
        }
        if let Some(port) = self.port {
            cfg.port = u16::try_from(port)
                .ok()
                .filter(|p| *p != 0)
                .ok_or(ConfigError::InvalidPort(port))?;
        }
        if let Some(pid_path) = self.pid_path {
            cfg.pid_path = pid_path;
        }
        if let Some(level) = self.log_level {
            cfg.log_level = LogLevel::parse_lossy(&level);
        }
        if let Some(foreground) = self.foreground {
            cfg.foreground = foreground;
        }
        if let Some(secs) = self.heartbeat_interval_secs {
            cfg.heartbeat_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.backoff_min_secs {
            cfg.backoff.min = Duration::from_secs(secs);
        }
        if let Some(secs) = self.backoff_max_secs {
            cfg.backoff.max = Duration::from_secs(secs);
        }
        Ok(())
    }
}

impl Cli {
    /// Builds the effective configuration: defaults, then the file, then flags.
    pub fn load(&self) -> Result<ServerConfig, ConfigError> {
        let mut cfg = ServerConfig::default();
        if let Some(path) = &self.config {
            FileConfig::load(path)?.apply(&mut cfg)?;
        }
        self.apply(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply(&self, cfg: &mut ServerConfig) {
        if let Some(address) = &self.address {
            cfg.address = address.clone();
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(pid_path) = &self.pid_path {
            cfg.pid_path = pid_path.clone();
        }
        if let Some(level) = &self.log_level {
            cfg.log_level = LogLevel::parse_lossy(level);
        }
        if self.foreground {
            cfg.foreground = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_ADDRESS, DEFAULT_PORT};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("lividpenguin-server").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let cfg = parse(&[]).load().unwrap();
        assert_eq!(cfg.address, DEFAULT_ADDRESS);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert!(!cfg.foreground);
    }

    #[test]
    fn test_short_flags() {
        let cli = parse(&["-A", "127.0.0.1", "-P", "4000", "-p", "/tmp/lp", "-f", "-l", "warn"]);
        let cfg = cli.load().unwrap();
        assert_eq!(cfg.address, "127.0.0.1");
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.pid_path, PathBuf::from("/tmp/lp"));
        assert!(cfg.foreground);
        assert_eq!(cfg.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_unknown_log_level_maps_to_info() {
        let cfg = parse(&["--log-level", "verbose"]).load().unwrap();
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn test_port_zero_and_garbage_are_rejected() {
        let argv = |port: &'static str| ["lividpenguin-server", "-P", port];
        assert!(Cli::try_parse_from(argv("0")).is_err());
        assert!(Cli::try_parse_from(argv("65536")).is_err());
        assert!(Cli::try_parse_from(argv("http")).is_err());
        assert!(Cli::try_parse_from(argv("65535")).is_ok());
    }

    #[test]
    fn test_flags_override_file_which_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(
            &path,
            r#"
address = "10.1.2.3"
port = 5000
log_level = "info"
heartbeat_interval_secs = 5
backoff_min_secs = 1
backoff_max_secs = 2
"#,
        )
        .unwrap();

        let cli = parse(&["-c", path.to_str().unwrap(), "-P", "6000"]);
        let cfg = cli.load().unwrap();
        assert_eq!(cfg.address, "10.1.2.3");
        assert_eq!(cfg.port, 6000);
        assert_eq!(cfg.log_level, LogLevel::Info);
        assert_eq!(cfg.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(cfg.backoff.min, Duration::from_secs(1));
        assert_eq!(cfg.backoff.max, Duration::from_secs(2));
    }

    #[test]
    fn test_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.toml");
        assert!(matches!(FileConfig::load(&missing), Err(ConfigError::Read { .. })));

        let unknown = dir.path().join("unknown.toml");
        fs::write(&unknown, "colour = \"blue\"\n").unwrap();
        assert!(matches!(FileConfig::load(&unknown), Err(ConfigError::Parse { .. })));

        let mut cfg = ServerConfig::default();
        let bad_port = FileConfig {
            port: Some(70000),
            ..FileConfig::default()
        };
        assert!(matches!(
            bad_port.apply(&mut cfg),
            Err(ConfigError::InvalidPort(70000))
        ));
    }

    #[test]
    fn test_inverted_backoff_in_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        fs::write(&path, "backoff_min_secs = 30\nbackoff_max_secs = 5\n").unwrap();

        let err = parse(&["--config", path.to_str().unwrap()]).load().unwrap_err();
        assert_eq!(err.as_label(), "config_invalid_backoff");
    }
}

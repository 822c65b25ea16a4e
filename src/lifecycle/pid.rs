//! # PID file.
//!
//! `<pid_path>/<daemon-name>.<port>.pid` holds the decimal process id of the
//! running instance. The same file is the heartbeat the run-loop touches.
//!
//! ## Liveness
//! - unix: the recorded pid is checked with `kill(pid, 0)`; `EPERM` still counts as alive.
//! - elsewhere: the file counts as alive while its mtime is younger than three heartbeat periods.
//!
//! A missing, empty or unparsable file means "not running".

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
#[cfg(not(unix))]
use std::time::{Duration, SystemTime};

use crate::config::ServerConfig;

/// Handle to one PID file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
    #[cfg(not(unix))]
    max_age: Duration,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            #[cfg(not(unix))]
            max_age: crate::config::DEFAULT_HEARTBEAT * 3,
        }
    }

    /// PID file of the instance configured by `cfg`.
    pub fn for_config(cfg: &ServerConfig) -> Self {
        #[cfg(unix)]
        {
            Self::new(cfg.pid_file())
        }
        #[cfg(not(unix))]
        {
            Self {
                path: cfg.pid_file(),
                max_age: cfg.heartbeat_interval * 3,
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `pid`, creating the parent directory if needed.
    pub fn write(&self, pid: u32) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{pid}\n"))
    }

    /// Reads the recorded pid; `None` if the file is missing or garbage.
    pub fn read(&self) -> io::Result<Option<u32>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.trim().parse().ok()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Returns the pid of a live previous instance, if any.
    ///
    /// The current process never counts as a previous instance.
    pub fn alive_pid(&self) -> Option<u32> {
        let pid = self.read().ok().flatten()?;
        if pid == 0 || pid == std::process::id() {
            return None;
        }
        self.pid_alive(pid).then_some(pid)
    }

    /// Is a previous instance alive per its PID record?
    pub fn is_alive(&self) -> bool {
        self.alive_pid().is_some()
    }

    /// Deletes the file; a missing file is not an error.
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    #[cfg(unix)]
    fn pid_alive(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
    }

    #[cfg(not(unix))]
    fn pid_alive(&self, _pid: u32) -> bool {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
            .is_some_and(|age| age < self.max_age)
    }
}

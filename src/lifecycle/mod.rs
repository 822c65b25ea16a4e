//! # Lifecycle adapter: the boundary with a process supervisor.
//!
//! ```text
//! supervisor / binary                     ServerLifecycle                    Server
//! ───────────────────                     ───────────────                    ──────
//! ensure_not_running() ──► PidFile::alive_pid() ──► Err(AlreadyRunning) ──► exit 1
//! listen_for_signals() ──► SIGINT/TERM/QUIT ──► stop() ──► handle.shutdown()
//!                          SIGHUP            ──────────────► handle.restart("SIGHUP")
//! start(blocking)      ──► PidFile::write(own pid)
//!                          ├─ blocking:  run() on the caller's task ──► finish ──► result
//!                          └─ otherwise: spawn run() ──► finish on exit; wait() joins it
//! ```
//!
//! ## Rules
//! - The PID file is removed exactly once, however many times `stop()` is called.
//! - `start` can be called once per adapter; a second call fails with `AlreadyStarted`.
//! - A fatal fault surfaces as [`LifecycleError::Fatal`]; the binary exits with status 1.

mod pid;
mod signals;

pub use pid::PidFile;
pub use signals::{Signal, wait_for_signal};

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::config::DAEMON_NAME;
use crate::core::{Server, ServerHandle};
use crate::error::{LifecycleError, ServerError};

/// Contract a process supervisor drives.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Path of the PID/heartbeat file.
    fn pid_file(&self) -> &Path;

    /// Starts the run-loop. With `blocking` the call returns only when the loop does.
    async fn start(&self, blocking: bool) -> Result<(), LifecycleError>;

    /// Requests a graceful stop. Idempotent.
    fn stop(&self);

    /// Liveness check: true while the run-loop has been started and not finished.
    fn is_running(&self) -> bool;
}

/// [`Lifecycle`] implementation around one [`Server`].
pub struct ServerLifecycle {
    name: String,
    pid: PidFile,
    handle: ServerHandle,
    server: Mutex<Option<Server>>,
    running: tokio::sync::Mutex<Option<JoinHandle<Result<(), ServerError>>>>,
    started: AtomicBool,
    finished: Arc<AtomicBool>,
}

impl ServerLifecycle {
    pub fn new(server: Server) -> Self {
        let name = format!("{DAEMON_NAME}[{}]", server.config().port);
        let pid = PidFile::for_config(server.config());
        Self {
            name,
            pid,
            handle: server.handle(),
            server: Mutex::new(Some(server)),
            running: tokio::sync::Mutex::new(None),
            started: AtomicBool::new(false),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    pub fn pid(&self) -> &PidFile {
        &self.pid
    }

    /// Fails if a previous instance is alive per the PID file.
    pub fn ensure_not_running(&self) -> Result<(), LifecycleError> {
        match self.pid.alive_pid() {
            Some(pid) => Err(LifecycleError::AlreadyRunning {
                pid,
                path: self.pid.path().to_path_buf(),
            }),
            None => Ok(()),
        }
    }

    /// Routes OS signals to the server until a shutdown signal arrives.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let handle = self.handle.clone();
        let name = self.name.clone();
        tokio::spawn(async move {
            loop {
                match wait_for_signal().await {
                    Ok(Signal::Restart) => {
                        tracing::info!(daemon = %name, "SIGHUP received, restarting run-loop");
                        if !handle.restart("SIGHUP") {
                            break;
                        }
                    }
                    Ok(Signal::Shutdown) => {
                        tracing::info!(daemon = %name, "stop signal received");
                        handle.shutdown();
                        break;
                    }
                    Err(err) => {
                        tracing::warn!(daemon = %name, error = %err, "unable to install signal handlers");
                        break;
                    }
                }
            }
        })
    }

    /// Joins a run-loop started with `start(false)`.
    pub async fn wait(&self) -> Result<(), LifecycleError> {
        let Some(task) = self.running.lock().await.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result.map_err(LifecycleError::Fatal),
            Err(err) => {
                finish(&self.name, &self.pid, &self.finished);
                Err(LifecycleError::Join(err.to_string()))
            }
        }
    }

    fn take_server(&self) -> Option<Server> {
        self.server
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[async_trait]
impl Lifecycle for ServerLifecycle {
    fn name(&self) -> &str {
        &self.name
    }

    fn pid_file(&self) -> &Path {
        self.pid.path()
    }

    async fn start(&self, blocking: bool) -> Result<(), LifecycleError> {
        let server = self.take_server().ok_or(LifecycleError::AlreadyStarted)?;
        self.pid
            .write(std::process::id())
            .map_err(|source| LifecycleError::PidFile {
                path: self.pid.path().to_path_buf(),
                source,
            })?;
        self.started.store(true, Ordering::SeqCst);

        if blocking {
            let result = server.run().await;
            finish(&self.name, &self.pid, &self.finished);
            return result.map_err(LifecycleError::Fatal);
        }

        let name = self.name.clone();
        let pid = self.pid.clone();
        let finished = Arc::clone(&self.finished);
        let task = tokio::spawn(async move {
            let result = server.run().await;
            finish(&name, &pid, &finished);
            result
        });
        *self.running.lock().await = Some(task);
        Ok(())
    }

    fn stop(&self) {
        self.handle.shutdown();
    }

    fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.finished.load(Ordering::SeqCst)
    }
}

/// Shutdown path of the adapter; runs once.
fn finish(name: &str, pid: &PidFile, finished: &AtomicBool) {
    if finished.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Err(err) = pid.remove() {
        tracing::warn!(daemon = %name, path = ?pid.path(), error = %err, "unable to remove pid file");
    }
    tracing::info!(daemon = %name, "stopped");
}

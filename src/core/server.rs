//! # Server run-loop.
//!
//! [`Server`] owns the listening socket, the heartbeat timer and the
//! crash/backoff/restart policy. One call to [`Server::run`] drives any number
//! of listening epochs until a stop request or a fatal fault.
//!
//! ## Architecture
//! ```text
//! run()
//!  └─► loop
//!       ├─ shutdown requested? ───────────────────────────────► break
//!       ├─ Recovering: separator + "recovering..."
//!       ├─ listen_epoch()  (wrapped in catch_unwind)
//!       │     ├─ registry.reset()  → epoch N, ids restart at 1
//!       │     ├─ bind address:port → "server listening for connections on: ..."
//!       │     ├─ heartbeat ticker armed → "recover complete" → Listening
//!       │     └─ select! {
//!       │          shutdown.cancelled()  → Ok(())
//!       │          control: Restart      → Err(RestartRequested)
//!       │          listener.accept()     → Connection::accept → spawn serve()
//!       │          ticker.tick()         → heartbeat.touch()
//!       │        }
//!       │        on exit: cancel epoch token, join connection tasks
//!       ├─ Ok(())  ─────────────────────────────────────────────► break
//!       └─ Err(fault) / panic
//!             ├─ separator, "EXCEPTION: ...", "exception trace: ..."*, separator ─► Crashed
//!             ├─ classifier → Fatal? ─► error line ─► Terminated ─► return Err(fault)
//!             ├─ shutdown requested? ─► break
//!             └─ BackingOff: sample delay, "sleeping for ~X seconds before restart",
//!                            blocking sleep ─► next iteration
//!
//! after loop: ShuttingDown ─► "event reactor has shutdown" ─► Terminated ─► Ok(())
//! ```
//!
//! ## Rules
//! - The backoff sleep blocks the whole thread the loop runs on; nothing else on a
//!   single-threaded reactor makes progress while it lasts.
//! - Stop is observed at every select point and before and after each backoff; the
//!   shutdown path runs once and never re-enters the crash cycle.
//! - Every live connection of an epoch is closed by the server when the epoch ends.
//! - A panicking connection task is logged against its id, leaves the registry and
//!   still publishes `ConnectionClosed`; the epoch keeps listening.
//! - Each state transition is published on the [`Bus`].

use std::error::Error as _;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::builder::ServerBuilder;
use super::connection::{Connection, ConnectionHandle};
use super::heartbeat::Heartbeat;
use super::registry::ConnectionRegistry;
use super::state::RunState;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::events::{Bus, Event, EventKind};
use crate::logging::{Category, Level, LogSink, SEPARATOR, format_line};
use crate::policies::{FaultClass, FaultClassifier};

/// Requests delivered to a running loop through its [`ServerHandle`].
#[derive(Debug)]
pub(crate) enum Control {
    Restart(String),
}

/// The run-loop.
pub struct Server {
    cfg: ServerConfig,
    sink: Arc<dyn LogSink>,
    registry: Arc<ConnectionRegistry>,
    classifier: Arc<dyn FaultClassifier>,
    heartbeat: Heartbeat,
    bus: Bus,
    shutdown: CancellationToken,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    state: RunState,
}

/// Cloneable remote control for a [`Server`].
#[derive(Clone, Debug)]
pub struct ServerHandle {
    shutdown: CancellationToken,
    control: mpsc::UnboundedSender<Control>,
    bus: Bus,
    registry: Arc<ConnectionRegistry>,
}

impl ServerHandle {
    /// Requests a graceful stop. Safe to call any number of times, from any state.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Forces the current epoch through the crash/backoff path.
    ///
    /// Returns false once the loop has exited.
    pub fn restart(&self, reason: impl Into<String>) -> bool {
        self.control.send(Control::Restart(reason.into())).is_ok()
    }

    /// Subscribes to run-loop events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Closes connection `id` of the current epoch as stale.
    pub fn mark_stale(&self, id: u64) -> bool {
        self.registry.mark_stale(id)
    }
}

impl Server {
    /// Starts building a server for `cfg`.
    pub fn builder(cfg: ServerConfig) -> ServerBuilder {
        ServerBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: ServerConfig,
        sink: Arc<dyn LogSink>,
        classifier: Arc<dyn FaultClassifier>,
        bus: Bus,
    ) -> Self {
        let heartbeat = Heartbeat::new(cfg.pid_file(), cfg.heartbeat_interval);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Self {
            cfg,
            sink,
            registry: Arc::new(ConnectionRegistry::new()),
            classifier,
            heartbeat,
            bus,
            shutdown: CancellationToken::new(),
            control_tx,
            control_rx,
            state: RunState::Idle,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.cfg
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.shutdown.clone(),
            control: self.control_tx.clone(),
            bus: self.bus.clone(),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Runs until stopped or until a fault is classified as fatal.
    ///
    /// Recoverable faults never surface here: they are logged, slept on and
    /// retried. The returned error is the fatal fault.
    pub async fn run(mut self) -> Result<(), ServerError> {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            self.enter(Event::state(RunState::Recovering));

            let fault = match AssertUnwindSafe(self.listen_epoch()).catch_unwind().await {
                Ok(Ok(())) => break,
                Ok(Err(fault)) => fault,
                Err(payload) => ServerError::Panicked {
                    message: panic_message(&*payload),
                },
            };

            self.log_fault(&fault);
            self.enter(Event::state(RunState::Crashed).with_reason(fault.as_label()));

            if self.classifier.classify(&fault) == FaultClass::Fatal {
                self.server_line(
                    Level::Error,
                    &format!("unrecoverable fault, terminating: {fault}"),
                );
                self.enter(Event::state(RunState::Terminated).with_reason(fault.as_label()));
                return Err(fault);
            }
            if self.shutdown.is_cancelled() {
                break;
            }

            let delay = self.cfg.backoff.sample();
            self.server_line(
                Level::Info,
                &format!("sleeping for ~{:.1} seconds before restart", delay.as_secs_f64()),
            );
            self.enter(
                Event::state(RunState::BackingOff)
                    .with_delay(delay)
                    .with_reason(fault.as_label()),
            );
            std::thread::sleep(delay);
        }

        self.enter(Event::state(RunState::ShuttingDown));
        self.server_line(Level::Info, "event reactor has shutdown");
        self.enter(Event::state(RunState::Terminated));
        Ok(())
    }

    /// One listening epoch. `Ok` only on a stop request.
    async fn listen_epoch(&mut self) -> Result<(), ServerError> {
        while self.control_rx.try_recv().is_ok() {}

        self.server_line(Level::Info, SEPARATOR);
        self.server_line(Level::Info, "recovering...");

        let epoch = self.registry.reset();
        let addr = self
            .cfg
            .listen_addr()
            .map_err(|_| ServerError::InvalidAddress {
                address: self.cfg.address.clone(),
            })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local = listener.local_addr().map_err(ServerError::LocalAddr)?;
        self.server_line(
            Level::Info,
            &format!(
                "server listening for connections on: {}:{}",
                self.cfg.address,
                local.port()
            ),
        );

        let conns = self.shutdown.child_token();
        let mut tasks = JoinSet::new();
        let mut ticker = self.heartbeat.ticker();
        self.enter(
            Event::state(RunState::Listening)
                .with_addr(local)
                .with_epoch(epoch),
        );
        self.server_line(Level::Info, "recover complete");

        let result = loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break Ok(()),
                Some(Control::Restart(reason)) = self.control_rx.recv() => {
                    break Err(ServerError::RestartRequested { reason });
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => self.open(stream, epoch, &conns, &mut tasks),
                    Err(err) => break Err(ServerError::Accept(err)),
                },
                _ = ticker.tick() => {
                    if let Err(source) = self.heartbeat.touch() {
                        break Err(ServerError::Heartbeat {
                            path: self.heartbeat.path().to_path_buf(),
                            source,
                        });
                    }
                    self.bus.publish(Event::new(EventKind::HeartbeatTouched).with_epoch(epoch));
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        };

        drop(listener);
        conns.cancel();
        while tasks.join_next().await.is_some() {}
        result
    }

    fn open(
        &self,
        stream: TcpStream,
        epoch: u64,
        conns: &CancellationToken,
        tasks: &mut JoinSet<()>,
    ) {
        let Some(conn) =
            Connection::accept(stream.peer_addr(), &self.registry, Arc::clone(&self.sink))
        else {
            drop(stream);
            self.bus.publish(Event::new(EventKind::PeerUnresolved).with_epoch(epoch));
            return;
        };

        let (id, peer) = (conn.id(), conn.peer());
        let (tx, rx) = mpsc::unbounded_channel();
        self.registry.insert(ConnectionHandle::new(id, epoch, peer, tx));
        self.bus.publish(
            Event::new(EventKind::ConnectionOpened)
                .with_conn(id)
                .with_addr(peer)
                .with_epoch(epoch),
        );

        let registry = Arc::clone(&self.registry);
        let sink = Arc::clone(&self.sink);
        let bus = self.bus.clone();
        let token = conns.clone();
        tasks.spawn(async move {
            let served = AssertUnwindSafe(conn.serve(stream, rx, token))
                .catch_unwind()
                .await;
            let mut closed = Event::new(EventKind::ConnectionClosed)
                .with_conn(id)
                .with_epoch(epoch);
            if let Err(payload) = served {
                let message = format!("connection task panicked: {}", panic_message(&*payload));
                sink.error(&format_line(Category::Socket, Some(id), &message));
                closed = closed.with_reason("panicked");
            }
            registry.remove(id, epoch);
            bus.publish(closed);
        });
    }

    fn log_fault(&self, fault: &ServerError) {
        self.server_line(Level::Info, SEPARATOR);
        self.server_line(Level::Warn, &format!("EXCEPTION: {} - {fault}", fault.as_label()));
        let mut cause = fault.source();
        while let Some(err) = cause {
            self.server_line(Level::Warn, &format!("exception trace: {err}"));
            cause = err.source();
        }
        self.server_line(Level::Info, SEPARATOR);
    }

    fn server_line(&self, level: Level, message: &str) {
        self.sink.log(level, &format_line(Category::Server, None, message));
    }

    fn enter(&mut self, ev: Event) {
        if let Some(next) = ev.state {
            debug_assert!(
                self.state.can_enter(next),
                "invalid transition {} -> {next}",
                self.state
            );
            tracing::trace!(from = %self.state, to = %next, "run-loop state");
            self.state = next;
        }
        self.bus.publish(ev);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::logging::MemorySink;
    use crate::policies::BackoffWindow;

    /// Panics on every inbound payload line.
    struct PanicOnPayload(MemorySink);

    impl LogSink for PanicOnPayload {
        fn log(&self, level: Level, line: &str) {
            if line.contains("| ---> |") {
                panic!("sink refused payload");
            }
            self.0.log(level, line);
        }
    }

    /// Records log lines and, in between, the state events already published.
    #[derive(Default)]
    struct Journal {
        events: Mutex<Option<broadcast::Receiver<Event>>>,
        entries: Mutex<Vec<String>>,
    }

    impl LogSink for Journal {
        fn log(&self, _level: Level, line: &str) {
            let mut entries = self.entries.lock().unwrap();
            if let Some(rx) = self.events.lock().unwrap().as_mut() {
                while let Ok(ev) = rx.try_recv() {
                    if let Some(state) = ev.state {
                        entries.push(format!("<{state:?}>"));
                    }
                }
            }
            entries.push(line.to_string());
        }
    }

    async fn wait_for(
        events: &mut broadcast::Receiver<Event>,
        pred: impl Fn(&Event) -> bool,
    ) -> Event {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Ok(ev) if pred(&ev) => return ev,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    fn test_config(dir: &std::path::Path) -> ServerConfig {
        ServerConfig {
            address: "127.0.0.1".into(),
            port: 0,
            pid_path: dir.to_path_buf(),
            heartbeat_interval: Duration::from_secs(3600),
            backoff: BackoffWindow::new(Duration::from_millis(5), Duration::from_millis(10)),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }

    #[tokio::test]
    async fn test_shutdown_before_start_skips_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let server = Server::builder(test_config(dir.path()))
            .with_sink(sink.clone())
            .build();
        let handle = server.handle();
        handle.shutdown();

        server.run().await.unwrap();
        assert!(!sink.contains("recovering..."));
        assert!(sink.contains("event reactor has shutdown"));
    }

    #[tokio::test]
    async fn test_invalid_address_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let mut cfg = test_config(dir.path());
        cfg.address = "not-an-ip".into();
        let server = Server::builder(cfg).with_sink(sink.clone()).build();

        let err = server.run().await.unwrap_err();
        assert_eq!(err.as_label(), "invalid_address");
        assert!(sink.contains("EXCEPTION: invalid_address"));
        assert_eq!(sink.at(Level::Error).len(), 1);
        assert!(!sink.contains("sleeping for"));
    }

    #[tokio::test]
    async fn test_fault_log_block_shape() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let server = Server::builder(test_config(dir.path()))
            .with_sink(sink.clone())
            .build();

        let fault = ServerError::Heartbeat {
            path: dir.path().join("x.pid"),
            source: std::io::Error::other("disk gone"),
        };
        server.log_fault(&fault);

        let lines = sink.lines();
        let sep = format_line(Category::Server, None, SEPARATOR);
        assert_eq!(lines.first(), Some(&(Level::Info, sep.clone())));
        assert_eq!(lines.last(), Some(&(Level::Info, sep)));
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1].0, Level::Warn);
        assert!(lines[1].1.contains("EXCEPTION: heartbeat_failed - unable to touch heartbeat file"));
        assert_eq!(
            lines[2],
            (
                Level::Warn,
                format_line(Category::Server, None, "exception trace: disk gone")
            )
        );
    }

    #[tokio::test]
    async fn test_fault_is_logged_before_crashed_state() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Arc::new(Journal::default());
        let mut cfg = test_config(dir.path());
        cfg.address = "not-an-ip".into();
        let server = Server::builder(cfg).with_sink(journal.clone()).build();
        *journal.events.lock().unwrap() = Some(server.handle().subscribe());

        server.run().await.unwrap_err();

        let entries = journal.entries.lock().unwrap().clone();
        let position = |needle: &str| entries.iter().position(|e| e.contains(needle)).unwrap();
        let exception = position("EXCEPTION: invalid_address");
        let crashed = position("<Crashed>");
        let fatal = position("unrecoverable fault, terminating");
        assert!(exception < crashed, "{entries:#?}");
        assert!(crashed < fatal, "{entries:#?}");
        assert_eq!(
            entries[crashed - 1],
            format_line(Category::Server, None, SEPARATOR)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_connection_task_is_logged_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(PanicOnPayload(MemorySink::new()));
        let server = Server::builder(test_config(dir.path()))
            .with_sink(sink.clone())
            .build();
        let handle = server.handle();
        let mut events = handle.subscribe();
        let task = tokio::spawn(server.run());

        let listening = wait_for(&mut events, |ev| ev.is_state(RunState::Listening)).await;
        let addr = listening.addr.unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        wait_for(&mut events, |ev| ev.kind == EventKind::ConnectionOpened).await;
        client.write_all(b"hello\n").await.unwrap();

        let closed = wait_for(&mut events, |ev| {
            ev.kind == EventKind::ConnectionClosed && ev.conn == Some(1)
        })
        .await;
        assert_eq!(closed.reason.as_deref(), Some("panicked"));
        assert!(handle.registry().live().is_empty());
        assert!(!handle.mark_stale(1));
        assert_eq!(
            sink.0.at(Level::Error),
            vec![format_line(
                Category::Socket,
                Some(1),
                "connection task panicked: sink refused payload"
            )]
        );

        let _next = TcpStream::connect(addr).await.unwrap();
        let opened = wait_for(&mut events, |ev| ev.kind == EventKind::ConnectionOpened).await;
        assert_eq!(opened.conn, Some(2));

        handle.shutdown();
        task.await.unwrap().unwrap();
        assert!(!sink.0.contains("EXCEPTION"));
    }
}

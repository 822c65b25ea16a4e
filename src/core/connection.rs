//! # Connection: one accepted socket.
//!
//! A [`Connection`] owns the peer identity, the sequence id handed out by the
//! [`ConnectionRegistry`], and the intentional-close flag. It does not speak
//! any protocol: received bytes are logged and dropped.
//!
//! ## Log flow
//! ```text
//! accept ─► peer resolved?  ── no ──► error "unable to fetch ip & port" ─► socket dropped (no id)
//!               │
//!               yes ─► id = registry.next_id() ─► debug "new socket created (ip:port)"
//!                         │
//!     ┌───────────────────┼──────────────────────────┬──────────────────────────┐
//!     ▼                   ▼                          ▼                          ▼
//!  bytes read      remote EOF / read error    close() / stale request     epoch ended
//!  warn rx line    info "disconnected"        debug "server closing..."  debug "server closing..."
//!                                             info "disconnected (closed by server)"
//! ```
//!
//! ## Rules
//! - An unresolved peer is closed before anything else is read from it and is never counted.
//! - The intentional-close flag only changes what is logged, never how the socket is closed.
//! - `close()` is idempotent.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::registry::ConnectionRegistry;
use crate::logging::{Category, Level, LogSink, format_line};

/// Size of the read buffer; larger payloads are logged in several lines.
const READ_BUFFER: usize = 16 * 1024;

/// Why a connection is asked to close from outside its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Plain local close request.
    Requested,
    /// A newer connection supersedes this one.
    Stale,
}

/// Handle to an open connection, kept in the registry.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    epoch: u64,
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<CloseReason>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        id: u64,
        epoch: u64,
        peer: SocketAddr,
        tx: mpsc::UnboundedSender<CloseReason>,
    ) -> Self {
        Self { id, epoch, peer, tx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Asks the connection to close. Returns false if it already finished.
    pub fn close(&self) -> bool {
        self.tx.send(CloseReason::Requested).is_ok()
    }

    /// Tells the connection it is stale; it logs that and closes.
    pub fn mark_stale(&self) -> bool {
        self.tx.send(CloseReason::Stale).is_ok()
    }
}

/// One identified socket.
pub struct Connection {
    id: u64,
    peer: SocketAddr,
    intentionally_closed: bool,
    sink: Arc<dyn LogSink>,
}

impl Connection {
    /// Identifies a freshly accepted socket.
    ///
    /// `peer` is the result of asking the socket for its remote address. On
    /// failure an error line is logged and `None` is returned without
    /// touching the registry; the caller must drop the socket.
    pub fn accept(
        peer: io::Result<SocketAddr>,
        registry: &ConnectionRegistry,
        sink: Arc<dyn LogSink>,
    ) -> Option<Self> {
        match peer {
            Err(err) => {
                sink.error(&format_line(
                    Category::Socket,
                    None,
                    "new socket created, but unable to fetch ip & port, closing connection...",
                ));
                sink.debug(&format_line(
                    Category::Socket,
                    None,
                    &format!("peer lookup failed: {err}"),
                ));
                None
            }
            Ok(peer) => {
                let conn = Self {
                    id: registry.next_id(),
                    peer,
                    intentionally_closed: false,
                    sink,
                };
                conn.log(
                    Level::Debug,
                    Category::Socket,
                    &format!("new socket created ({}:{})", conn.peer_ip(), conn.peer_port()),
                );
                Some(conn)
            }
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn peer_ip(&self) -> String {
        self.peer.ip().to_string()
    }

    pub fn peer_port(&self) -> u16 {
        self.peer.port()
    }

    pub fn is_intentionally_closed(&self) -> bool {
        self.intentionally_closed
    }

    /// Logs a received payload, minus one trailing line terminator.
    pub fn on_data(&self, data: &[u8]) {
        let text = String::from_utf8_lossy(data);
        self.log(Level::Warn, Category::Rx, chomp(&text));
    }

    /// Logs that the remote end went away.
    pub fn on_remote_close(&self) {
        self.log(Level::Info, Category::Socket, "disconnected");
    }

    /// Marks the connection as closed by us. The caller releases the socket.
    pub fn close(&mut self) {
        if self.intentionally_closed {
            return;
        }
        self.intentionally_closed = true;
        self.log(Level::Debug, Category::Socket, "server closing connection...");
    }

    /// Closes the connection because a newer one supersedes it.
    pub fn connection_stale(&mut self) {
        self.log(Level::Debug, Category::Socket, "connection is stale.");
        self.close();
    }

    /// Drives the socket until either side closes it.
    ///
    /// Exits on remote EOF, a read error, a request from `requests`, or
    /// cancellation of `epoch` (the listener that accepted it went away).
    pub async fn serve<S>(
        mut self,
        mut stream: S,
        mut requests: mpsc::UnboundedReceiver<CloseReason>,
        epoch: CancellationToken,
    ) where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; READ_BUFFER];
        loop {
            tokio::select! {
                read = stream.read(&mut buf) => match read {
                    Ok(0) => {
                        self.on_remote_close();
                        return;
                    }
                    Ok(n) => self.on_data(&buf[..n]),
                    Err(err) => {
                        self.log(Level::Info, Category::Socket, &format!("read failed: {err}"));
                        self.on_remote_close();
                        return;
                    }
                },
                Some(reason) = requests.recv() => {
                    match reason {
                        CloseReason::Stale => self.connection_stale(),
                        CloseReason::Requested => self.close(),
                    }
                    break;
                }
                _ = epoch.cancelled() => {
                    self.close();
                    break;
                }
            }
        }

        let _ = stream.shutdown().await;
        drop(stream);
        self.log(Level::Info, Category::Socket, "disconnected (closed by server)");
    }

    fn log(&self, level: Level, category: Category<'_>, message: &str) {
        self.sink.log(level, &format_line(category, Some(self.id), message));
    }
}

/// Strips one trailing `\n`, `\r\n` or `\r`.
fn chomp(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .or_else(|| text.strip_suffix('\r'))
        .unwrap_or(text)
}

//! Per-connection handle shared between the reader task, the writer task and
//! every broadcaster that holds a reference through the session registry.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

use crate::error::ChatError;

/// Registry-assigned identity of one accepted connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Items consumed by the writer task, in order
#[derive(Debug, PartialEq, Eq)]
pub enum Outbound {
    Line(String),
    Close,
}

/// Handle to a live client connection.
///
/// Lines queued through [`Connection::send`] are written by a single writer
/// task, so lines from concurrent senders never interleave. [`Connection::close`]
/// queues a close marker behind pending lines and wakes the reader.
///
/// The outbound queue is bounded: a peer that stops reading until the queue
/// fills is closed rather than buffered without limit.
pub struct Connection {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    outbound: mpsc::Sender<Outbound>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl Connection {
    pub fn new(id: ConnectionId, peer: Option<SocketAddr>, outbound: mpsc::Sender<Outbound>) -> Self {
        Connection {
            id,
            peer,
            outbound,
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Queue one line for delivery without waiting. Fails once the connection
    /// is closed or the writer has gone away; a full queue closes the
    /// connection and fails with [`ChatError::QueueFull`].
    pub fn send(&self, line: impl Into<String>) -> Result<(), ChatError> {
        if self.is_closed() {
            return Err(ChatError::ConnectionClosed);
        }
        match self.outbound.try_send(Outbound::Line(line.into())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("{} is not reading; outbound queue full, closing", self.id);
                self.close();
                Err(ChatError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(ChatError::ConnectionClosed),
        }
    }

    /// Close the connection. Returns `false` when it was already closed.
    ///
    /// Best-effort: if the writer is gone or its queue is full the close
    /// marker is dropped and the connection task aborts the writer instead.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        trace!("{} closing", self.id);
        let _ = self.outbound.try_send(Outbound::Close);
        self.close_signal.notify_one();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once [`Connection::close`] has been called.
    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.close_signal.notified().await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Drain the outbound queue into `writer`, one newline-terminated line at a time.
///
/// Stops on the close marker, on a write failure (which also closes the
/// connection so the reader unblocks) or when every sender is gone.
pub async fn write_loop<W>(mut writer: W, mut rx: mpsc::Receiver<Outbound>, conn: Arc<Connection>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Line(mut line) => {
                line.push('\n');
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    debug!("{} write failed: {}", conn.id(), e);
                    conn.close();
                    break;
                }
            }
            Outbound::Close => break,
        }
    }
    // Shutdown failure is ignored; the peer may already be gone.
    let _ = writer.shutdown().await;
}

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::ServerConfig;
use crate::error::ChatError;
use crate::metrics;
use super::broadcast::{broadcast_to_all, BroadcastReport};
use super::connection::{write_loop, Connection};
use super::events::{LoggingEvents, ServerEvents};
use super::protocol::{Inbound, Outcome, ProtocolHandler};
use super::session::SessionRegistry;

/// How long `close` waits for connection tasks to leave the registry
const CLOSE_GRACE: Duration = Duration::from_secs(5);
/// How long a finished connection waits for its writer to flush
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// Everything a connection task needs; cloned into each spawned task
#[derive(Clone)]
struct ConnectionContext {
    registry: Arc<SessionRegistry>,
    handler: ProtocolHandler,
    events: Arc<dyn ServerEvents>,
    max_line_len: usize,
    outbound_queue: usize,
}

struct ListenerState {
    port: u16,
    accept_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl ListenerState {
    fn is_listening(&self) -> bool {
        self.accept_task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }
}

/// Relay server: owns the listening socket state and the session registry.
///
/// Listening and connected clients are independent: [`ChatServer::stop_listening`]
/// only stops accepting, while [`ChatServer::close`] also drops every client.
pub struct ChatServer {
    host: String,
    ctx: ConnectionContext,
    listener: Mutex<ListenerState>,
}

impl ChatServer {
    /// Create a server that reports lifecycle events to the log
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_events(config, Arc::new(LoggingEvents))
    }

    pub fn with_events(config: &ServerConfig, events: Arc<dyn ServerEvents>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        ChatServer {
            host: config.host.clone(),
            ctx: ConnectionContext {
                handler: ProtocolHandler::new(registry.clone()),
                registry,
                events,
                max_line_len: config.max_line_len.max(1),
                outbound_queue: config.outbound_queue.max(1),
            },
            listener: Mutex::new(ListenerState { port: config.port, accept_task: None, local_addr: None }),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.ctx.registry
    }

    /// Bind the configured host/port and start accepting connections.
    /// Returns the bound address (useful when the port is 0).
    pub async fn listen(&self) -> Result<SocketAddr, ChatError> {
        let mut state = self.listener.lock().await;
        if state.is_listening() {
            return Err(ChatError::AlreadyListening);
        }
        let listener = TcpListener::bind((self.host.as_str(), state.port)).await?;
        let addr = listener.local_addr()?;
        state.accept_task = Some(tokio::spawn(accept_loop(listener, self.ctx.clone())));
        state.local_addr = Some(addr);
        self.ctx.events.server_started(addr);
        Ok(addr)
    }

    /// Stop accepting new connections; existing clients stay connected.
    /// Returns `false` if the server was not listening.
    pub async fn stop_listening(&self) -> bool {
        let mut state = self.listener.lock().await;
        let was_listening = state.is_listening();
        if let Some(task) = state.accept_task.take() {
            // Aborting drops the TcpListener; spawned connection tasks are unaffected.
            task.abort();
            let _ = task.await;
        }
        state.local_addr = None;
        if was_listening {
            self.ctx.events.server_stopped();
        }
        was_listening
    }

    /// Stop listening, close every client connection and wait for the
    /// connection tasks to leave the registry.
    pub async fn close(&self) {
        self.stop_listening().await;
        let closed = self.ctx.registry.close_all();
        debug!("close: {} connections signalled", closed);
        if timeout(CLOSE_GRACE, self.ctx.registry.wait_until_empty()).await.is_err() {
            warn!(
                "close: {} connections still registered after {:?}",
                self.ctx.registry.connection_count(),
                CLOSE_GRACE
            );
        }
        info!("Relay counters at close: {:?}", metrics::snapshot());
        self.ctx.events.server_closed();
    }

    pub async fn is_listening(&self) -> bool {
        self.listener.lock().await.is_listening()
    }

    pub async fn port(&self) -> u16 {
        self.listener.lock().await.port
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.local_addr
    }

    /// Change the port used by the next [`ChatServer::listen`]. Only allowed
    /// while not listening and with no connected clients.
    pub async fn set_port(&self, port: u16) -> Result<(), ChatError> {
        let mut state = self.listener.lock().await;
        if state.is_listening() || self.number_of_clients() > 0 {
            return Err(ChatError::NotAllowedWhileActive("setport"));
        }
        state.port = port;
        Ok(())
    }

    pub fn number_of_clients(&self) -> usize {
        self.ctx.registry.connection_count()
    }

    pub fn send_to_all_clients(&self, line: &str) -> BroadcastReport {
        broadcast_to_all(&self.ctx.registry, line)
    }
}

async fn accept_loop(listener: TcpListener, ctx: ConnectionContext) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                metrics::inc_connections_accepted();
                // No await between accept and attach: aborting this loop never
                // leaves an accepted connection outside the registry.
                accept_connection(stream, peer, &ctx);
            }
            Err(e) => {
                warn!("Accept failed: {}", e);
                // Back off so a persistent error (e.g. fd exhaustion) does not spin.
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

/// Register a freshly accepted stream and spawn its writer and reader tasks
fn accept_connection(stream: TcpStream, peer: SocketAddr, ctx: &ConnectionContext) {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel(ctx.outbound_queue);
    let conn = Arc::new(Connection::new(ctx.registry.next_connection_id(), Some(peer), tx));

    ctx.registry.attach(conn.clone());
    ctx.events.client_connected(conn.id(), conn.peer());

    let writer = tokio::spawn(write_loop(write_half, rx, conn.clone()));
    tokio::spawn(serve_connection(read_half, conn, writer, ctx.clone()));
}

/// Read lines from one connection until either side closes it.
///
/// Cleanup (registry removal, `client_disconnected`) runs exactly once here,
/// whichever side closed the connection.
async fn serve_connection(
    read_half: OwnedReadHalf,
    conn: Arc<Connection>,
    mut writer: JoinHandle<()>,
    ctx: ConnectionContext,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();
    // One byte past the limit tells an over-long line from one that fits
    let read_limit = ctx.max_line_len as u64 + 1;
    loop {
        buf.clear();
        let mut limited = (&mut reader).take(read_limit);
        let read = tokio::select! {
            biased;
            _ = conn.closed() => break,
            read = limited.read_until(b'\n', &mut buf) => read,
        };
        match read {
            Ok(0) => break,
            Ok(_) if buf.last() != Some(&b'\n') && buf.len() > ctx.max_line_len => {
                ctx.handler.reject_oversized(&conn, buf.len());
                break;
            }
            Ok(_) => {
                if ctx.handler.handle(&conn, Inbound::from_wire(&buf)) == Outcome::Close {
                    break;
                }
            }
            Err(e) => {
                ctx.events.client_exception(conn.id(), &e);
                break;
            }
        }
    }

    conn.close();
    if let Some(session) = ctx.registry.unregister(conn.id()) {
        ctx.events.client_disconnected(&session);
    }
    // Writer flushes queued lines (e.g. a final ERROR) before shutting down,
    // unless the peer stopped reading.
    if timeout(WRITER_GRACE, &mut writer).await.is_err() {
        debug!("{} writer did not finish within {:?}; aborting", conn.id(), WRITER_GRACE);
        writer.abort();
    }
}

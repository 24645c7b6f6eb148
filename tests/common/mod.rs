#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relaychat::config::ServerConfig;
use relaychat::relay::{ChatServer, ConnectionId, ServerEvents, Session};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub const WAIT: Duration = Duration::from_secs(3);

pub fn loopback_config() -> ServerConfig {
    ServerConfig { host: "127.0.0.1".into(), port: 0, ..ServerConfig::default() }
}

/// Records lifecycle events as short strings
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<String>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ServerEvents for RecordingEvents {
    fn server_started(&self, _addr: SocketAddr) { self.push("started".into()); }
    fn server_stopped(&self) { self.push("stopped".into()); }
    fn server_closed(&self) { self.push("closed".into()); }
    fn client_connected(&self, id: ConnectionId, _peer: Option<SocketAddr>) {
        self.push(format!("connected {}", id));
    }
    fn client_disconnected(&self, session: &Session) {
        let login_id = session.login_id.as_deref().unwrap_or("-");
        self.push(format!("disconnected {} {}", session.connection.id(), login_id));
    }
    fn client_exception(&self, id: ConnectionId, error: &io::Error) {
        self.push(format!("exception {} {}", id, error));
    }
}

pub async fn start_server() -> (Arc<ChatServer>, SocketAddr, Arc<RecordingEvents>) {
    start_server_with(loopback_config()).await
}

pub async fn start_server_with(config: ServerConfig) -> (Arc<ChatServer>, SocketAddr, Arc<RecordingEvents>) {
    let events = Arc::new(RecordingEvents::default());
    let server = Arc::new(ChatServer::with_events(&config, events.clone()));
    let addr = server.listen().await.expect("listen");
    (server, addr, events)
}

/// Raw line client speaking the wire protocol directly
pub struct LineClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl LineClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read, writer) = stream.into_split();
        LineClient { lines: BufReader::new(read).lines(), writer }
    }

    pub async fn login(addr: SocketAddr, id: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(&format!("#login {}", id)).await;
        assert_eq!(client.recv().await.as_deref(), Some(format!("{} has logged on.", id).as_str()));
        client
    }

    pub async fn send(&mut self, line: &str) {
        self.writer.write_all(format!("{}\n", line).as_bytes()).await.expect("send");
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("send raw");
    }

    /// Next line, or `None` on EOF. Panics if nothing arrives in time.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap_or(None)
    }
}

/// Poll `check` until it holds or the wait budget runs out
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

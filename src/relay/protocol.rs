//! Login-gated relay protocol.
//!
//! Every connection starts unauthenticated. Its first line must be
//! `#login <id>`; anything else closes it. After login, every line is
//! relayed to all connections as `<id>> <line>`, and a second `#login`
//! closes it. Violations never affect other connections.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::ChatError;
use crate::metrics;
use super::broadcast::broadcast_to_all;
use super::connection::Connection;
use super::session::SessionRegistry;

const LOGIN_PREFIX: &str = "#login";

/// One frame read from a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    /// Payload that is not UTF-8 text; ignored by the handler
    Binary(Vec<u8>),
}

impl Inbound {
    /// Build a frame from raw wire bytes, stripping the line terminator.
    pub fn from_wire(raw: &[u8]) -> Self {
        let mut end = raw.len();
        if end > 0 && raw[end - 1] == b'\n' {
            end -= 1;
        }
        if end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
        match std::str::from_utf8(&raw[..end]) {
            Ok(s) => Inbound::Text(s.to_string()),
            Err(_) => Inbound::Binary(raw[..end].to_vec()),
        }
    }
}

/// Whether the connection survives the line just handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Close,
}

/// Fatal protocol errors, rendered as the line sent before disconnecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    MissingLoginId,
    LoginRequired,
    AlreadyLoggedIn,
    LineTooLong,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Violation::MissingLoginId => "ERROR: missing login id; disconnecting.",
            Violation::LoginRequired => "ERROR: first message must be #login <id>; disconnecting.",
            Violation::AlreadyLoggedIn => "ERROR: already logged in; connection will close.",
            Violation::LineTooLong => "ERROR: line too long; disconnecting.",
        };
        f.write_str(text)
    }
}

/// Recognise a login line. Returns the trimmed identifier (possibly empty)
/// for `#login` alone or `#login` followed by whitespace.
pub fn parse_login(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(LOGIN_PREFIX)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

pub fn logged_on_line(login_id: &str) -> String {
    format!("{} has logged on.", login_id)
}

pub fn chat_line(login_id: &str, message: &str) -> String {
    format!("{}> {}", login_id, message)
}

/// Per-line decision logic for server connections
#[derive(Debug, Clone)]
pub struct ProtocolHandler {
    registry: Arc<SessionRegistry>,
}

impl ProtocolHandler {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        ProtocolHandler { registry }
    }

    /// Handle one frame from `conn`. Lines of a single connection must be
    /// fed in arrival order from a single task.
    pub fn handle(&self, conn: &Connection, frame: Inbound) -> Outcome {
        let line = match frame {
            Inbound::Text(line) => line,
            Inbound::Binary(bytes) => {
                debug!("{} sent {} non-text bytes; ignored", conn.id(), bytes.len());
                return Outcome::Continue;
            }
        };
        if conn.is_closed() {
            return Outcome::Close;
        }

        let current = self.registry.lookup(conn.id());
        debug!(
            "Message received: {} from {}",
            line,
            current.as_deref().unwrap_or("unauthenticated")
        );

        match (current, parse_login(&line)) {
            (None, Some("")) => self.reject(conn, Violation::MissingLoginId),
            (None, Some(login_id)) => match self.registry.register(conn.id(), login_id) {
                Ok(()) => {
                    metrics::inc_logins();
                    let announce = logged_on_line(login_id);
                    info!("{}", announce);
                    broadcast_to_all(&self.registry, &announce);
                    Outcome::Continue
                }
                Err(ChatError::AlreadyLoggedIn) => self.reject(conn, Violation::AlreadyLoggedIn),
                Err(e) => {
                    debug!("{} login aborted: {}", conn.id(), e);
                    conn.close();
                    Outcome::Close
                }
            },
            (None, None) => self.reject(conn, Violation::LoginRequired),
            (Some(_), Some(_)) => self.reject(conn, Violation::AlreadyLoggedIn),
            (Some(login_id), None) => {
                let tagged = chat_line(&login_id, &line);
                info!("[MSG] {}", tagged);
                metrics::inc_messages_relayed();
                broadcast_to_all(&self.registry, &tagged);
                Outcome::Continue
            }
        }
    }

    /// Refuse a line longer than the configured limit, whatever the
    /// connection's login state.
    pub fn reject_oversized(&self, conn: &Connection, len: usize) -> Outcome {
        debug!("{} sent a line of at least {} bytes", conn.id(), len);
        self.reject(conn, Violation::LineTooLong)
    }

    fn reject(&self, conn: &Connection, violation: Violation) -> Outcome {
        warn!("{} protocol violation: {:?}", conn.id(), violation);
        metrics::inc_protocol_violations();
        // Best-effort: the peer may already be gone.
        let _ = conn.send(violation.to_string());
        conn.close();
        Outcome::Close
    }
}

//! Server lifecycle callbacks.
//!
//! The server calls these at fixed points; every method has a no-op default
//! so implementors only override what they observe. Calls are made from
//! connection and accept tasks and must not block.

use std::io;
use std::net::SocketAddr;

use log::{debug, info, warn};

use super::connection::ConnectionId;
use super::session::Session;

pub trait ServerEvents: Send + Sync {
    /// The accept loop is running on `addr`
    fn server_started(&self, _addr: SocketAddr) {}

    /// The accept loop was stopped; existing connections are untouched
    fn server_stopped(&self) {}

    /// The server closed: no accept loop and every connection closed
    fn server_closed(&self) {}

    fn client_connected(&self, _id: ConnectionId, _peer: Option<SocketAddr>) {}

    /// Fired exactly once per connection with the session it held, after it
    /// left the registry.
    fn client_disconnected(&self, _session: &Session) {}

    /// A read failed; `client_disconnected` follows
    fn client_exception(&self, _id: ConnectionId, _error: &io::Error) {}
}

/// Default event sink: reports lifecycle changes through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEvents;

impl ServerEvents for LoggingEvents {
    fn server_started(&self, addr: SocketAddr) {
        info!("Server listening for connections on port {}", addr.port());
    }

    fn server_stopped(&self) {
        info!("Server has stopped listening for connections.");
    }

    fn server_closed(&self) {
        info!("Server closed.");
    }

    fn client_connected(&self, id: ConnectionId, peer: Option<SocketAddr>) {
        match peer {
            Some(peer) => info!("A new client has connected to the server ({} from {}).", id, peer),
            None => info!("A new client has connected to the server ({}).", id),
        }
    }

    fn client_disconnected(&self, session: &Session) {
        let conn = &session.connection;
        match session.login_id.as_deref() {
            Some(login_id) => info!("{} has disconnected.", login_id),
            None => info!("A client has disconnected ({}).", conn.id()),
        }
        debug!(
            "{} from {} was connected for {}s",
            conn.id(),
            conn.peer().map(|p| p.to_string()).unwrap_or_else(|| "unknown peer".to_string()),
            session.connected_for().num_seconds()
        );
    }

    fn client_exception(&self, id: ConnectionId, error: &io::Error) {
        warn!("[CLIENT ERROR] {} -> {}", id, error);
    }
}

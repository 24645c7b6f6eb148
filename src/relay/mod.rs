//! Relay server module
//!
//! This module contains the server side of relaychat:
//! - Connection handles and the per-connection writer
//! - Session registry (live connections and their login ids)
//! - Login-gated protocol handling and broadcast fan-out
//! - Listening state, accept loop and the operator console

pub mod broadcast;
pub mod commands;
pub mod connection;
pub mod console;
pub mod events;
pub mod protocol;
pub mod server;
pub mod session;

pub use broadcast::{broadcast_to_all, BroadcastReport};
pub use connection::{Connection, ConnectionId};
pub use console::{ConsoleAction, ServerConsole};
pub use events::{LoggingEvents, ServerEvents};
pub use protocol::{Inbound, Outcome, ProtocolHandler};
pub use server::ChatServer;
pub use session::{Session, SessionRegistry};

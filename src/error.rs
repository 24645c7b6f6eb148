//! Error types shared by the relay server and the client

use thiserror::Error;

/// Typed failures raised by the session registry, server and client
#[derive(Error, Debug)]
pub enum ChatError {
    /// The connection already carries a login identifier
    #[error("already logged in")]
    AlreadyLoggedIn,

    /// `#login` arrived without an identifier
    #[error("missing login id")]
    MissingLoginId,

    /// The connection has been closed (locally or by the peer)
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer stopped reading and its outbound queue filled up
    #[error("outbound queue full")]
    QueueFull,

    /// `listen` was called while the accept loop is running
    #[error("server already listening")]
    AlreadyListening,

    /// Operation only permitted while the server or client is idle
    #[error("{0} only allowed when closed")]
    NotAllowedWhileActive(&'static str),

    /// A port argument that is not an integer in range
    #[error("port must be an integer.")]
    InvalidPort(String),

    /// Client has no open connection to the server
    #[error("not connected")]
    NotConnected,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use tokio::sync::watch;

use crate::error::ChatError;
use super::connection::{Connection, ConnectionId};

/// A live connection and the login identifier it authenticated with
#[derive(Debug, Clone)]
pub struct Session {
    pub connection: Arc<Connection>,
    pub login_id: Option<String>,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn new(connection: Arc<Connection>) -> Self {
        Session {
            connection,
            login_id: None,
            connected_at: Utc::now(),
        }
    }

    /// Check if the connection has completed `#login`
    pub fn is_logged_in(&self) -> bool {
        self.login_id.is_some()
    }

    /// Time since the connection was accepted
    pub fn connected_for(&self) -> Duration {
        Utc::now().signed_duration_since(self.connected_at)
    }
}

/// Shared table of live connections, built once per server and handed to
/// every connection task.
///
/// All access goes through one mutex; the lock is never held across an
/// `.await`, and sends made under it only enqueue. The live count is
/// published on a watch channel so shutdown can wait for the table to drain.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ConnectionId, Session>>,
    next_id: AtomicU64,
    live: watch::Sender<usize>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (live, _) = watch::channel(0);
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            live,
        }
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Session>> {
        // Every mutation is a single insert/remove, so a poisoned map is still consistent.
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a freshly accepted, unauthenticated connection to the live set
    pub fn attach(&self, connection: Arc<Connection>) {
        let id = connection.id();
        let mut sessions = self.lock();
        sessions.insert(id, Session::new(connection));
        self.live.send_replace(sessions.len());
        drop(sessions);
        debug!("{} attached", id);
    }

    /// Bind `login_id` to the connection. Set-if-absent: a second login on
    /// the same connection fails even when two attempts race.
    pub fn register(&self, id: ConnectionId, login_id: &str) -> Result<(), ChatError> {
        if login_id.is_empty() {
            return Err(ChatError::MissingLoginId);
        }
        let mut sessions = self.lock();
        let session = sessions.get_mut(&id).ok_or(ChatError::ConnectionClosed)?;
        if session.login_id.is_some() {
            return Err(ChatError::AlreadyLoggedIn);
        }
        session.login_id = Some(login_id.to_string());
        info!("{} logged in as {}", id, login_id);
        Ok(())
    }

    pub fn lookup(&self, id: ConnectionId) -> Option<String> {
        self.lock().get(&id).and_then(|s| s.login_id.clone())
    }

    /// Remove every trace of the connection. Idempotent; returns the removed
    /// session the first time.
    pub fn unregister(&self, id: ConnectionId) -> Option<Session> {
        let mut sessions = self.lock();
        let removed = sessions.remove(&id);
        if removed.is_some() {
            self.live.send_replace(sessions.len());
        }
        removed
    }

    pub fn connection_count(&self) -> usize {
        self.lock().len()
    }

    pub fn logged_in_count(&self) -> usize {
        self.lock().values().filter(|s| s.is_logged_in()).count()
    }

    /// Run `f` on every live connection while holding the registry lock, so
    /// no connection can be attached or removed mid-iteration.
    pub fn for_each_connection<F>(&self, mut f: F)
    where
        F: FnMut(&Connection),
    {
        for session in self.lock().values() {
            f(&session.connection);
        }
    }

    /// Close every live connection. Each connection task unregisters itself.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        self.for_each_connection(|conn| {
            if conn.close() {
                closed += 1;
            }
        });
        closed
    }

    /// Resolves once no connection is registered
    pub async fn wait_until_empty(&self) {
        let mut live = self.live.subscribe();
        // The sender lives in `self`, so `wait_for` only ends when the predicate holds.
        let _ = live.wait_for(|count| *count == 0).await;
    }
}

//! Process-wide relay counters.
//! Logged when the server closes; cheap enough to bump on every line.
use std::sync::atomic::{AtomicU64, Ordering};

static CONNECTIONS_ACCEPTED: AtomicU64 = AtomicU64::new(0);
static LOGINS: AtomicU64 = AtomicU64::new(0);
static MESSAGES_RELAYED: AtomicU64 = AtomicU64::new(0);
static PROTOCOL_VIOLATIONS: AtomicU64 = AtomicU64::new(0);
static SEND_FAILURES: AtomicU64 = AtomicU64::new(0);

pub fn inc_connections_accepted() { CONNECTIONS_ACCEPTED.fetch_add(1, Ordering::Relaxed); }
pub fn inc_logins() { LOGINS.fetch_add(1, Ordering::Relaxed); }
pub fn inc_messages_relayed() { MESSAGES_RELAYED.fetch_add(1, Ordering::Relaxed); }
pub fn inc_protocol_violations() { PROTOCOL_VIOLATIONS.fetch_add(1, Ordering::Relaxed); }
pub fn add_send_failures(n: u64) { SEND_FAILURES.fetch_add(n, Ordering::Relaxed); }

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub connections_accepted: u64,
    pub logins: u64,
    pub messages_relayed: u64,
    pub protocol_violations: u64,
    pub send_failures: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        connections_accepted: CONNECTIONS_ACCEPTED.load(Ordering::Relaxed),
        logins: LOGINS.load(Ordering::Relaxed),
        messages_relayed: MESSAGES_RELAYED.load(Ordering::Relaxed),
        protocol_violations: PROTOCOL_VIOLATIONS.load(Ordering::Relaxed),
        send_failures: SEND_FAILURES.load(Ordering::Relaxed),
    }
}

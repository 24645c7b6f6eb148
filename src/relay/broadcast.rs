use log::{debug, trace};

use crate::metrics;
use super::session::SessionRegistry;

/// Outcome of one fan-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Queue `line` on every live connection, logged in or not.
///
/// Best-effort: a recipient whose send fails is skipped and counted, and
/// never stops delivery to the others. A recipient whose queue is full gets
/// closed by the failed send; cleanup is left to its own connection task.
pub fn broadcast_to_all(registry: &SessionRegistry, line: &str) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    registry.for_each_connection(|conn| match conn.send(line) {
        Ok(()) => report.delivered += 1,
        Err(e) => {
            debug!("broadcast to {} skipped: {}", conn.id(), e);
            report.failed += 1;
        }
    });
    if report.failed > 0 {
        metrics::add_send_failures(report.failed as u64);
    }
    trace!("broadcast '{}' delivered={} failed={}", line, report.delivered, report.failed);
    report
}

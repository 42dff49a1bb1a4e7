//! Periodic status lines and JSON snapshots.

use anyhow::Result;

use mocopi_receiver::{Receiver, ReceiverStats, Transport};

/// Log one status line: binding, counters since the previous line, and the
/// latest stream metadata.
pub fn log_status<T: Transport>(receiver: &Receiver<T>, previous: &mut ReceiverStats) {
    let stats = receiver.stats();
    let metadata = receiver.metadata();
    tracing::info!(
        port = ?receiver.port(),
        accepted = stats.accepted - previous.accepted,
        rejected = stats.rejected - previous.rejected,
        bytes = stats.bytes - previous.bytes,
        stream = %metadata,
        "receiver status"
    );

    let linked = receiver
        .bones()
        .iter()
        .filter(|b| b.parent().is_some())
        .count();
    tracing::debug!(linked, root = ?receiver.skeleton().global_position(0), "skeleton");

    *previous = stats;
}

/// One JSON document per line.
pub fn snapshot_line<T: Transport>(receiver: &Receiver<T>) -> Result<String> {
    Ok(serde_json::to_string(&receiver.snapshot())?)
}

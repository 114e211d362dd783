//! Per-subscriber keep-alive comments and dead-sink detection.

use std::sync::Arc;
use std::time::Duration;

use herald_core::{Frame, SinkError};
use metrics::counter;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::subscriber::Subscriber;
use crate::metrics::SSE_HEARTBEATS_TOTAL;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// A heartbeat write failed; the subscriber should be dropped.
    WriteFailed(SinkError),
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Write `: heartbeat` to `subscriber` every `interval` until cancelled or
/// a write fails.
///
/// The first heartbeat goes out one full `interval` after the call. Each
/// write is bounded by `write_timeout` and abandoned on cancellation.
pub async fn run_heartbeat(
    subscriber: Arc<Subscriber>,
    interval: Duration,
    write_timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let frame = Frame::heartbeat();
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
            _ = ticker.tick() => {}
        }

        let written = tokio::select! {
            biased;
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
            result = subscriber.deliver(&frame, write_timeout) => result,
        };
        match written {
            Ok(()) => {
                counter!(SSE_HEARTBEATS_TOTAL).increment(1);
                trace!(subscriber = %subscriber.id(), "heartbeat sent");
            }
            Err(e) => return HeartbeatResult::WriteFailed(e),
        }
    }
}

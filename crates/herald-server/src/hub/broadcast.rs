//! Fan-out of one encoded frame to every registered subscriber.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use herald_core::{DeliveryError, Event, Frame, Result, SinkError, encode};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::registry::SubscriberRegistry;
use super::subscriber::{CloseReason, Subscriber};
use crate::metrics::{SSE_BROADCASTS_TOTAL, SSE_DELIVERY_FAILURES_TOTAL, SSE_FRAMES_DELIVERED_TOTAL};

/// Encodes events and writes them to a registry snapshot.
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    write_timeout: Duration,
    cancel: CancellationToken,
}

/// Result of writing to one subscriber.
enum Outcome {
    Delivered,
    Failed(DeliveryError),
    Aborted,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`. Writes in flight are abandoned
    /// once `cancel` fires.
    pub fn new(
        registry: Arc<SubscriberRegistry>,
        write_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            write_timeout,
            cancel,
        }
    }

    /// Encode `event` once and write it to every current subscriber.
    ///
    /// Returns the number of subscribers the frame was attempted against.
    /// Fails only if the event cannot be encoded, in which case nothing is
    /// written.
    pub async fn broadcast(&self, event: &Event) -> Result<usize> {
        let frame = encode(event)?;
        Ok(self.dispatch(&frame).await)
    }

    /// Write an already-encoded frame to every current subscriber.
    ///
    /// Subscribers whose write fails are removed once the whole pass has
    /// completed.
    pub async fn dispatch(&self, frame: &Frame) -> usize {
        let targets = self.registry.snapshot();
        let attempted = targets.len();
        counter!(SSE_BROADCASTS_TOTAL).increment(1);
        if targets.is_empty() {
            debug!("broadcast with no subscribers");
            return 0;
        }

        let outcomes = join_all(targets.iter().map(|s| self.write_one(s, frame))).await;

        let mut delivered = 0_u64;
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Delivered => delivered += 1,
                Outcome::Failed(err) => {
                    warn!(
                        subscriber = %err.subscriber,
                        error = %err.source,
                        "delivery failed, dropping subscriber"
                    );
                    counter!(SSE_DELIVERY_FAILURES_TOTAL, "error" => err.source.kind())
                        .increment(1);
                    failed.push(err.subscriber);
                }
                Outcome::Aborted => {}
            }
        }
        counter!(SSE_FRAMES_DELIVERED_TOTAL).increment(delivered);

        for id in &failed {
            let _ = self.registry.remove(id, CloseReason::WriteFailed);
        }

        debug!(
            attempted,
            delivered,
            failed = failed.len(),
            bytes = frame.len(),
            "broadcast dispatched"
        );
        attempted
    }

    async fn write_one(&self, subscriber: &Arc<Subscriber>, frame: &Frame) -> Outcome {
        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Outcome::Aborted,
            result = subscriber.deliver(frame, self.write_timeout) => result,
        };
        match result {
            Ok(()) => Outcome::Delivered,
            // Already closed by a concurrent removal or shutdown.
            Err(SinkError::Closed) if subscriber.is_closed() => Outcome::Aborted,
            Err(source) => Outcome::Failed(DeliveryError {
                subscriber: subscriber.id().clone(),
                source,
            }),
        }
    }
}

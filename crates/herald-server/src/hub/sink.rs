//! Write-only output sinks behind each subscriber.

use async_trait::async_trait;
use bytes::Bytes;
use herald_core::{Frame, SinkError};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// Destination for encoded frames.
///
/// Implementations must be cheap to call concurrently; the hub never holds a
/// registry lock while calling into a sink.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    /// Write one frame.
    async fn write(&self, frame: Frame) -> Result<(), SinkError>;

    /// Close the sink. Idempotent.
    fn close(&self);

    /// Resolves once the peer has gone away or the sink was closed.
    async fn closed(&self);
}

/// Body stream handed to the HTTP layer for one subscriber.
pub type SseStream = ReceiverStream<Bytes>;

/// Sink backed by a bounded channel drained by the HTTP response body.
///
/// A full queue fails fast with [`SinkError::Full`] instead of blocking the
/// dispatcher; a dropped body surfaces as [`SinkError::Closed`].
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
    shut: CancellationToken,
}

/// Create a sink and the stream that drains it.
pub fn channel(capacity: usize) -> (ChannelSink, SseStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sink = ChannelSink {
        tx: Mutex::new(Some(tx)),
        shut: CancellationToken::new(),
    };
    (sink, ReceiverStream::new(rx))
}

impl ChannelSink {
    fn sender(&self) -> Option<mpsc::Sender<Bytes>> {
        self.tx.lock().clone()
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn write(&self, frame: Frame) -> Result<(), SinkError> {
        let Some(tx) = self.sender() else {
            return Err(SinkError::Closed);
        };
        match tx.try_send(frame.into_bytes()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SinkError::Full),
            Err(TrySendError::Closed(_)) => Err(SinkError::Closed),
        }
    }

    fn close(&self) {
        // dropping the last sender ends the body stream
        drop(self.tx.lock().take());
        self.shut.cancel();
    }

    async fn closed(&self) {
        let Some(tx) = self.sender() else {
            return;
        };
        tokio::select! {
            () = tx.closed() => {}
            () = self.shut.cancelled() => {}
        }
    }
}

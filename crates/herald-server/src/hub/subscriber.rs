//! Subscriber state: one connected stream consumer.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use herald_core::{Frame, SinkError, SubscriberId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::sink::EventSink;

const CONNECTING: u8 = 0;
const ACTIVE: u8 = 1;
const CLOSED: u8 = 2;

/// Lifecycle state. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriberState {
    /// Handshake in progress, not yet registered.
    Connecting,
    /// Registered and receiving frames.
    Active,
    /// Terminal.
    Closed,
}

/// Why a subscriber was closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer disconnected.
    PeerClosed,
    /// A broadcast write failed.
    WriteFailed,
    /// A heartbeat write failed.
    HeartbeatFailed,
    /// The hub is shutting down.
    Shutdown,
}

impl CloseReason {
    /// Stable label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::WriteFailed => "write_failed",
            Self::HeartbeatFailed => "heartbeat_failed",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered output sink plus the handles that keep it alive.
///
/// The cancellation token is shared by the subscriber's heartbeat and
/// disconnect watcher; [`Subscriber::close`] cancels it, so no timer
/// outlives its subscriber.
pub struct Subscriber {
    id: SubscriberId,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    state: AtomicU8,
    connected_at: Instant,
    frames_delivered: AtomicU64,
    write_failures: AtomicU64,
}

impl Subscriber {
    /// Create a subscriber in the `Connecting` state.
    pub fn new(id: SubscriberId, sink: Arc<dyn EventSink>, cancel: CancellationToken) -> Self {
        Self {
            id,
            sink,
            cancel,
            state: AtomicU8::new(CONNECTING),
            connected_at: Instant::now(),
            frames_delivered: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
        }
    }

    /// Subscriber ID.
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubscriberState {
        match self.state.load(Ordering::Acquire) {
            CONNECTING => SubscriberState::Connecting,
            ACTIVE => SubscriberState::Active,
            _ => SubscriberState::Closed,
        }
    }

    /// Whether the subscriber reached the terminal state.
    pub fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }

    /// `Connecting -> Active`. Returns `false` if the subscriber was already
    /// activated or closed.
    pub(crate) fn activate(&self) -> bool {
        self.state
            .compare_exchange(CONNECTING, ACTIVE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Token cancelled when this subscriber closes.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Write one frame, bounded by `timeout`.
    pub async fn deliver(&self, frame: &Frame, timeout: Duration) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        let result = match tokio::time::timeout(timeout, self.sink.write(frame.clone())).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::TimedOut),
        };
        let counter = if result.is_ok() {
            &self.frames_delivered
        } else {
            &self.write_failures
        };
        let _ = counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Resolves when the peer disconnects or the sink is closed.
    pub async fn peer_closed(&self) {
        self.sink.closed().await;
    }

    /// Move to `Closed`: cancel the heartbeat and watcher, close the sink.
    ///
    /// Idempotent. Returns `true` only for the call that performed the
    /// transition.
    pub fn close(&self, reason: CloseReason) -> bool {
        if self.state.swap(CLOSED, Ordering::AcqRel) == CLOSED {
            return false;
        }
        self.cancel.cancel();
        self.sink.close();
        debug!(
            subscriber = %self.id,
            reason = reason.as_str(),
            frames = self.frames_delivered(),
            failures = self.write_failures(),
            age = ?self.age(),
            "subscriber closed"
        );
        true
    }

    /// Frames successfully written so far.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Relaxed)
    }

    /// Writes that failed or timed out.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Time since the subscriber was created.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("frames_delivered", &self.frames_delivered())
            .finish_non_exhaustive()
    }
}

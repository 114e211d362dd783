//! In-memory sinks for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use herald_core::{Frame, SinkError};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::sink::EventSink;

/// Records every frame; can be switched to fail.
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<Frame>>,
    failing: AtomicBool,
    closed: CancellationToken,
    peer: CancellationToken,
}

impl RecordingSink {
    /// A sink whose writes always fail.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail();
        sink
    }

    /// Make every subsequent write fail.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Simulate the peer going away.
    pub fn disconnect(&self) {
        self.peer.cancel();
    }

    /// Frames written so far.
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }

    /// Frames written so far, as text.
    pub fn texts(&self) -> Vec<String> {
        self.frames
            .lock()
            .iter()
            .map(|f| f.as_text().into_owned())
            .collect()
    }

    /// Whether `close()` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn write(&self, frame: Frame) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Io("broken pipe".into()));
        }
        if self.closed.is_cancelled() || self.peer.is_cancelled() {
            return Err(SinkError::Closed);
        }
        self.frames.lock().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.closed.cancel();
    }

    async fn closed(&self) {
        tokio::select! {
            () = self.closed.cancelled() => {}
            () = self.peer.cancelled() => {}
        }
    }
}

/// A sink whose writes never complete, optionally after letting a few
/// through.
#[derive(Default)]
pub struct StallingSink {
    passthrough: AtomicUsize,
    closed: CancellationToken,
}

impl StallingSink {
    /// Accept `n` writes, then stall.
    pub fn after(n: usize) -> Self {
        Self {
            passthrough: AtomicUsize::new(n),
            closed: CancellationToken::new(),
        }
    }

    /// Whether `close()` was called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl EventSink for StallingSink {
    async fn write(&self, _frame: Frame) -> Result<(), SinkError> {
        let admitted = self
            .passthrough
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if admitted {
            return Ok(());
        }
        std::future::pending().await
    }

    fn close(&self) {
        self.closed.cancel();
    }

    async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

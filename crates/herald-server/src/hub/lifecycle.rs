//! Hub entry points: subscribe, publish, status and shutdown.
//!
//! [`HubController`] is the only place subscribers are created. Each
//! subscriber gets two tracked tasks, a heartbeat and a disconnect watcher,
//! both bound to a child of the hub's root cancellation token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use futures::future::join_all;
use herald_core::{Event, Frame, HubError, Result, SubscriberId, encode};
use metrics::counter;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::broadcast::Broadcaster;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::registry::SubscriberRegistry;
use super::sink::EventSink;
use super::subscriber::{CloseReason, Subscriber};
use crate::config::HubConfig;
use crate::metrics::{SSE_DISCONNECTIONS_TOTAL, SSE_SUBSCRIBERS_TOTAL};
use crate::status::{HubStatus, hub_status};

/// What [`HubController::on_shutdown`] did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Subscribers registered when shutdown began.
    pub subscribers: usize,
    /// Subscribers that accepted the shutdown notice.
    pub notified: usize,
    /// Whether the grace period ran out before everything settled.
    pub timed_out: bool,
}

/// Owns the registry, dispatcher and per-subscriber tasks.
pub struct HubController {
    config: HubConfig,
    registry: Arc<SubscriberRegistry>,
    broadcaster: Broadcaster,
    tasks: TaskTracker,
    shutdown: CancellationToken,
    closing: AtomicBool,
    started_at: Instant,
}

impl HubController {
    /// Create an idle hub.
    pub fn new(config: HubConfig) -> Self {
        let registry = Arc::new(SubscriberRegistry::new());
        let shutdown = CancellationToken::new();
        let broadcaster = Broadcaster::new(
            Arc::clone(&registry),
            config.write_timeout,
            shutdown.clone(),
        );
        Self {
            config,
            registry,
            broadcaster,
            tasks: TaskTracker::new(),
            shutdown,
            closing: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    /// Hub tuning in effect.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// The live subscriber registry.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Whether [`on_shutdown`](Self::on_shutdown) has started.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Heartbeat and watcher tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Accept a new subscriber on an already-opened sink.
    ///
    /// Writes the `: connected` comment, registers the subscriber, and starts
    /// its heartbeat and disconnect watcher. Fails with
    /// [`HubError::Handshake`] during shutdown or if the first write fails;
    /// the registry is left untouched in either case.
    pub async fn on_subscribe(&self, sink: Arc<dyn EventSink>) -> Result<Arc<Subscriber>> {
        if self.is_closing() {
            sink.close();
            return Err(HubError::Handshake("hub is shutting down".into()));
        }

        let subscriber = Arc::new(Subscriber::new(
            SubscriberId::new(),
            sink,
            self.shutdown.child_token(),
        ));

        if let Err(e) = subscriber
            .deliver(&Frame::connected(), self.config.write_timeout)
            .await
        {
            let _ = subscriber.close(CloseReason::WriteFailed);
            return Err(HubError::Handshake(e.to_string()));
        }

        self.registry.add(Arc::clone(&subscriber))?;

        // Shutdown may have drained the registry between the check above and
        // the insert.
        if self.is_closing() {
            let _ = self.registry.remove(subscriber.id(), CloseReason::Shutdown);
            let _ = subscriber.close(CloseReason::Shutdown);
            return Err(HubError::Handshake("hub is shutting down".into()));
        }

        self.spawn_heartbeat(&subscriber);
        self.spawn_watcher(&subscriber);

        counter!(SSE_SUBSCRIBERS_TOTAL).increment(1);
        info!(
            subscriber = %subscriber.id(),
            subscribers = self.registry.size(),
            "subscriber connected"
        );
        Ok(subscriber)
    }

    fn spawn_heartbeat(&self, subscriber: &Arc<Subscriber>) {
        let registry = Arc::clone(&self.registry);
        let subscriber = Arc::clone(subscriber);
        let interval = self.config.heartbeat_interval;
        let write_timeout = self.config.write_timeout;
        let _ = self.tasks.spawn(async move {
            let id = subscriber.id().clone();
            let cancel = subscriber.cancel_token();
            match run_heartbeat(subscriber, interval, write_timeout, cancel).await {
                HeartbeatResult::WriteFailed(error) => {
                    warn!(subscriber = %id, %error, "heartbeat failed, dropping subscriber");
                    let _ = registry.remove(&id, CloseReason::HeartbeatFailed);
                }
                HeartbeatResult::Cancelled => {
                    debug!(subscriber = %id, "heartbeat stopped");
                }
            }
        });
    }

    fn spawn_watcher(&self, subscriber: &Arc<Subscriber>) {
        let registry = Arc::clone(&self.registry);
        let subscriber = Arc::clone(subscriber);
        let _ = self.tasks.spawn(async move {
            let cancel = subscriber.cancel_token();
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = subscriber.peer_closed() => {
                    if registry.remove(subscriber.id(), CloseReason::PeerClosed) {
                        info!(
                            subscriber = %subscriber.id(),
                            subscribers = registry.size(),
                            "subscriber disconnected"
                        );
                    }
                }
            }
        });
    }

    /// Broadcast `event` to every current subscriber.
    ///
    /// Returns the number of subscribers the frame was attempted against.
    pub async fn publish(&self, event: &Event) -> Result<usize> {
        self.broadcaster.broadcast(event).await
    }

    /// Current subscriber count and uptime.
    pub fn status(&self) -> HubStatus {
        hub_status(self.started_at, self.registry.size())
    }

    /// Notify and close every subscriber, then stop all hub tasks.
    ///
    /// Cancels heartbeats and in-flight broadcast writes, writes the
    /// `shutdown` event to each subscriber (errors ignored), closes every
    /// sink and clears the registry. The whole sequence is bounded by the
    /// configured shutdown grace period. Only the first call does any work.
    pub async fn on_shutdown(&self) -> ShutdownReport {
        if self.closing.swap(true, Ordering::AcqRel) {
            return ShutdownReport::default();
        }
        let deadline = time::Instant::now() + self.config.shutdown_grace;

        self.shutdown.cancel();
        let subscribers = self.registry.drain();
        let mut report = ShutdownReport {
            subscribers: subscribers.len(),
            ..ShutdownReport::default()
        };
        info!(subscribers = report.subscribers, "hub shutting down");

        let frame = match encode(&Event::shutdown()) {
            Ok(frame) => Some(frame),
            Err(error) => {
                warn!(%error, "failed to encode shutdown notice");
                None
            }
        };

        let notified = AtomicUsize::new(0);
        let notify_all = join_all(subscribers.iter().map(|subscriber| {
            let frame = frame.as_ref();
            let notified = &notified;
            async move {
                if let Some(frame) = frame {
                    if subscriber
                        .deliver(frame, self.config.write_timeout)
                        .await
                        .is_ok()
                    {
                        let _ = notified.fetch_add(1, Ordering::Relaxed);
                    }
                }
                let _ = subscriber.close(CloseReason::Shutdown);
            }
        }));
        if time::timeout_at(deadline, notify_all).await.is_err() {
            warn!("shutdown notice did not reach every subscriber in time");
            report.timed_out = true;
        }
        report.notified = notified.load(Ordering::Relaxed);

        for subscriber in &subscribers {
            let _ = subscriber.close(CloseReason::Shutdown);
        }
        counter!(SSE_DISCONNECTIONS_TOTAL, "reason" => CloseReason::Shutdown.as_str())
            .increment(subscribers.len() as u64);

        let _ = self.tasks.close();
        if time::timeout_at(deadline, self.tasks.wait()).await.is_err() {
            warn!(remaining = self.tasks.len(), "hub tasks still running after grace period");
            report.timed_out = true;
        }

        info!(
            subscribers = report.subscribers,
            notified = report.notified,
            timed_out = report.timed_out,
            "hub shut down"
        );
        report
    }
}

//! Concurrency-safe set of active subscribers.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use herald_core::{HubError, Result, SubscriberId};
use metrics::{counter, gauge};

use super::subscriber::{CloseReason, Subscriber};
use crate::metrics::{SSE_DISCONNECTIONS_TOTAL, SSE_SUBSCRIBERS_ACTIVE};

/// Registry of connected subscribers, keyed by ID.
///
/// Backed by a sharded map: an entry is either fully visible or absent, and
/// [`snapshot`](Self::snapshot) never observes a partial insert. No shard
/// lock is held while a caller writes to a sink.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: DashMap<SubscriberId, Arc<Subscriber>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, moving it from `Connecting` to `Active`.
    ///
    /// Fails with [`HubError::DuplicateSubscriber`] if the ID is already
    /// present or the subscriber was registered before.
    pub fn add(&self, subscriber: Arc<Subscriber>) -> Result<()> {
        match self.subscribers.entry(subscriber.id().clone()) {
            Entry::Occupied(_) => Err(HubError::DuplicateSubscriber(subscriber.id().clone())),
            Entry::Vacant(slot) => {
                if !subscriber.activate() {
                    return Err(HubError::DuplicateSubscriber(subscriber.id().clone()));
                }
                let _ = slot.insert(subscriber);
                gauge!(SSE_SUBSCRIBERS_ACTIVE).increment(1.0);
                Ok(())
            }
        }
    }

    /// Remove a subscriber and close it. Idempotent.
    ///
    /// Returns `true` if the subscriber was present.
    pub fn remove(&self, id: &SubscriberId, reason: CloseReason) -> bool {
        let Some((_, subscriber)) = self.subscribers.remove(id) else {
            return false;
        };
        gauge!(SSE_SUBSCRIBERS_ACTIVE).decrement(1.0);
        counter!(SSE_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
        let _ = subscriber.close(reason);
        true
    }

    /// Point-in-time copy of all current subscribers.
    pub fn snapshot(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Remove every subscriber without closing it, returning them.
    pub fn drain(&self) -> Vec<Arc<Subscriber>> {
        let ids: Vec<SubscriberId> = self.subscribers.iter().map(|e| e.key().clone()).collect();
        let drained: Vec<Arc<Subscriber>> = ids
            .iter()
            .filter_map(|id| self.subscribers.remove(id).map(|(_, s)| s))
            .collect();
        gauge!(SSE_SUBSCRIBERS_ACTIVE).decrement(drained.len() as f64);
        drained
    }

    /// Whether the ID is registered.
    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    /// Current subscriber count.
    pub fn size(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

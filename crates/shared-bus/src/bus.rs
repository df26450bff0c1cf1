//! # Event Bus
//!
//! The publishing and subscription sides of the bus.
//!
//! Each subscriber owns a bounded `mpsc` queue. Publish walks the matching
//! subscribers and `try_send`s; a full queue drops the event for that
//! subscriber and flips the aggregate `accepted` flag to `false`. The bus
//! never blocks a publisher.

use crate::events::{ChainEvent, EventFilter, EventKind};
use crate::DEFAULT_SUBSCRIBER_BUFFER;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct SubscriberEntry {
    sender: mpsc::Sender<ChainEvent>,
    kinds: HashSet<EventKind>,
    filter: EventFilter,
}

impl SubscriberEntry {
    fn wants(&self, event: &ChainEvent) -> bool {
        self.kinds.contains(&event.kind()) && self.filter.matches(event)
    }
}

#[derive(Default)]
struct BusInner {
    subscribers: RwLock<HashMap<String, SubscriberEntry>>,
}

/// In-process event bus with bounded per-subscriber queues.
///
/// Cloning is cheap; all clones publish into the same subscriber set.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Returns `true` when every matching subscriber accepted the event.
    /// A full or closed subscriber queue yields `false`; the event is still
    /// delivered to the remaining subscribers.
    pub fn publish(&self, event: &ChainEvent) -> bool {
        let mut accepted = true;
        let mut dead: Vec<String> = Vec::new();

        {
            let subscribers = self.inner.subscribers.read();
            for (id, entry) in subscribers.iter() {
                if !entry.wants(event) {
                    continue;
                }
                match entry.sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(
                            subscriber = %id,
                            kind = ?event.kind(),
                            "Subscriber queue full, event dropped"
                        );
                        accepted = false;
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dead.push(id.clone());
                        accepted = false;
                    }
                }
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.inner.subscribers.write();
            for id in dead {
                subscribers.remove(&id);
                debug!(subscriber = %id, "Removed closed subscriber");
            }
        }

        accepted
    }

    /// Subscribe to the given event kinds.
    ///
    /// A subscriber id that is already registered is replaced; the previous
    /// subscription's receiver closes.
    #[must_use]
    pub fn subscribe(
        &self,
        id: impl Into<String>,
        kinds: impl IntoIterator<Item = EventKind>,
        filter: EventFilter,
        buffer: usize,
    ) -> Subscription {
        let id = id.into();
        let buffer = if buffer == 0 {
            DEFAULT_SUBSCRIBER_BUFFER
        } else {
            buffer
        };
        let (sender, receiver) = mpsc::channel(buffer);

        let entry = SubscriberEntry {
            sender,
            kinds: kinds.into_iter().collect(),
            filter,
        };

        {
            let mut subscribers = self.inner.subscribers.write();
            subscribers.insert(id.clone(), entry);
        }
        debug!(subscriber = %id, "New subscription created");

        Subscription {
            id,
            receiver,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber by id. Idempotent.
    pub fn unsubscribe(&self, id: &str) {
        let removed = self.inner.subscribers.write().remove(id).is_some();
        if removed {
            debug!(subscriber = %id, "Subscription removed");
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }
}

/// A subscription handle for receiving events.
///
/// Dropping the handle unsubscribes automatically.
pub struct Subscription {
    id: String,
    receiver: mpsc::Receiver<ChainEvent>,
    inner: std::sync::Weak<BusInner>,
}

impl Subscription {
    /// Receive the next event.
    ///
    /// Returns `None` once unsubscribed and the queue is drained.
    pub async fn recv(&mut self) -> Option<ChainEvent> {
        self.receiver.recv().await
    }

    /// Try to receive without waiting.
    pub fn try_recv(&mut self) -> Option<ChainEvent> {
        self.receiver.try_recv().ok()
    }

    /// The subscriber id this handle was registered under.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Unsubscribe explicitly. Idempotent.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.subscribers.write().remove(&self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
        debug!(subscriber = %self.id, "Subscription dropped");
    }
}

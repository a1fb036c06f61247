//! Event Bus
//!
//! Typed fan-out of backend events keyed by `(EventKind, session id)`.
//! Subscriptions are structural handles: dropping one removes its handler,
//! and no delivery reaches the handler after the removal returns.

use dashmap::DashMap;
use log::{debug, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::types::{EventKind, ServerEvent};

/// Handler invoked for each matching event
pub type EventHandler = Box<dyn Fn(&ServerEvent) + Send + Sync>;

/// Subscription key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey {
    pub kind: EventKind,
    pub session_id: String,
}

impl SubscriptionKey {
    pub fn new(kind: EventKind, session_id: impl Into<String>) -> Self {
        Self {
            kind,
            session_id: session_id.into(),
        }
    }
}

struct Slot {
    id: u64,
    // `None` once unsubscribed. Held for the duration of a delivery.
    handler: Mutex<Option<EventHandler>>,
}

type SlotTable = DashMap<SubscriptionKey, Vec<Arc<Slot>>>;

/// Typed event bus
#[derive(Clone, Default)]
pub struct EventBus {
    slots: Arc<SlotTable>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind of one session.
    ///
    /// Handlers must not drop their own subscription from inside the handler.
    pub fn subscribe<F>(&self, kind: EventKind, session_id: &str, handler: F) -> Subscription
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let key = SubscriptionKey::new(kind, session_id);
        let slot = Arc::new(Slot {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            handler: Mutex::new(Some(Box::new(handler))),
        });

        self.slots
            .entry(key.clone())
            .or_default()
            .push(slot.clone());

        debug!("Subscribed #{} to {} for session {}", slot.id, kind, session_id);

        Subscription {
            table: Arc::downgrade(&self.slots),
            key,
            slot: Some(slot),
        }
    }

    /// Deliver an event to every handler registered for its key.
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: &ServerEvent) -> usize {
        let key = SubscriptionKey::new(event.kind(), event.session_id());

        // Copy the slot list out so handlers may subscribe without
        // contending on the table shard.
        let targets: Vec<Arc<Slot>> = match self.slots.get(&key) {
            Some(entry) => entry.value().clone(),
            None => {
                trace!("No subscribers for {} on {}", key.kind, key.session_id);
                return 0;
            }
        };

        let mut delivered = 0;
        for slot in targets {
            let guard = slot.handler.lock();
            if let Some(handler) = guard.as_ref() {
                handler(event);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of live handlers for a key
    pub fn subscriber_count(&self, kind: EventKind, session_id: &str) -> usize {
        self.slots
            .get(&SubscriptionKey::new(kind, session_id))
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    /// Total number of live handlers
    pub fn total_subscribers(&self) -> usize {
        self.slots.iter().map(|entry| entry.len()).sum()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("keys", &self.slots.len())
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

/// Handle for a registered handler; unsubscribes on drop
pub struct Subscription {
    table: Weak<SlotTable>,
    key: SubscriptionKey,
    slot: Option<Arc<Slot>>,
}

impl Subscription {
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Remove the handler. Waits for an in-progress delivery to the same
    /// handler to finish; no delivery happens after this returns.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };

        if let Some(table) = self.table.upgrade() {
            let emptied = match table.get_mut(&self.key) {
                Some(mut entry) => {
                    entry.retain(|s| s.id != slot.id);
                    entry.is_empty()
                }
                None => false,
            };
            if emptied {
                table.remove_if(&self.key, |_, slots| slots.is_empty());
            }
        }

        slot.handler.lock().take();
        debug!(
            "Unsubscribed #{} from {} for session {}",
            slot.id, self.key.kind, self.key.session_id
        );
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("active", &self.slot.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn start(session_id: &str) -> ServerEvent {
        ServerEvent::CompactStart {
            session_id: session_id.to_string(),
        }
    }

    #[test]
    fn test_delivery_is_keyed_by_kind_and_session() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let _sub = bus.subscribe(EventKind::CompactStart, "a", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(&start("a")), 1);
        assert_eq!(bus.publish(&start("b")), 0);
        assert_eq!(
            bus.publish(&ServerEvent::StreamEnd {
                session_id: "a".to_string()
            }),
            0
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let sub = bus.subscribe(EventKind::CompactStart, "a", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.subscriber_count(EventKind::CompactStart, "a"), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(EventKind::CompactStart, "a"), 0);
        assert_eq!(bus.total_subscribers(), 0);
        assert_eq!(bus.publish(&start("a")), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_per_key_order_is_preserved() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _sub = bus.subscribe(EventKind::Error, "a", move |event| {
            if let ServerEvent::Error { message, .. } = event {
                sink.lock().push(message.clone());
            }
        });

        for n in 0..5 {
            bus.publish(&ServerEvent::Error {
                session_id: "a".to_string(),
                message: n.to_string(),
            });
        }

        assert_eq!(*seen.lock(), vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_unsubscribe_waits_for_inflight_delivery() {
        let bus = EventBus::new();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let sub = bus.subscribe(EventKind::CompactStart, "a", move |_| {
            let _ = entered_tx.send(());
            let _ = release_rx.lock().recv();
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let publisher = {
            let bus = bus.clone();
            std::thread::spawn(move || bus.publish(&start("a")))
        };
        entered_rx.recv().unwrap();

        let unsubscriber = std::thread::spawn(move || sub.unsubscribe());
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!unsubscriber.is_finished());

        release_tx.send(()).unwrap();
        unsubscriber.join().unwrap();
        assert_eq!(publisher.join().unwrap(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(bus.publish(&start("a")), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}

//! Synchronous in-game event bus.
//!
//! Subscribers are passive: they receive every published event (or every
//! event of one type) by reference and cannot change game state. Handlers
//! run inside the game's write lock, so they must never call back into the
//! engine. Anything that needs to re-enter the engine should use the
//! asynchronous notification channel instead.

use std::sync::Arc;

use crate::core::SubscriptionId;

use super::event::{Event, EventType};

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    filter: Option<EventType>,
    handler: Handler,
}

/// Per-game publish/subscribe bus.
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use mtg_rules::events::{Event, EventBus, EventType};
///
/// let mut bus = EventBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// bus.subscribe_typed(EventType::SpellCast, move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.publish(&Event::new(EventType::SpellCast));
/// bus.publish(&Event::new(EventType::ChangeStep));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u32,
    published: u64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event.
    pub fn subscribe(
        &mut self,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.add(None, Arc::new(handler))
    }

    /// Receive events of one type.
    pub fn subscribe_typed(
        &mut self,
        event_type: EventType,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.add(Some(event_type), Arc::new(handler))
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Deliver an event to every matching subscriber, in subscription order.
    pub fn publish(&mut self, event: &Event) {
        self.published += 1;

        let mut delivered = 0;
        for sub in &self.subscriptions {
            if sub.filter.map_or(true, |t| t == event.event_type) {
                (sub.handler)(event);
                delivered += 1;
            }
        }

        if delivered == 0 {
            tracing::trace!(event_type = ?event.event_type, "no subscribers for event");
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Total events published through this bus.
    #[must_use]
    pub fn published_count(&self) -> u64 {
        self.published
    }

    fn add(&mut self, filter: Option<EventType>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId::new(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, filter, handler });
        id
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("published", &self.published)
            .finish()
    }
}

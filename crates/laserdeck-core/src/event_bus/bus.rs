//! Event Bus implementation.
//!
//! The bus is an owned value: the application builds one, wraps it in an
//! `Arc` and hands clones to the channels and to the front end.

use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{AppEvent, EventCategory};
use crate::types::{thread_safe_rw_map, DataCallback, ThreadSafeRwMap};

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

/// Filter to receive only specific event types
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Receive all events.
    #[default]
    All,
    /// Receive events matching any of these categories.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    /// Filter for a single category
    pub fn only(category: EventCategory) -> Self {
        EventFilter::Categories(vec![category])
    }

    /// Check if an event matches this filter
    pub fn matches(&self, event: &AppEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

/// Configuration for the event bus
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for broadcast.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Central event bus shared by the channels and the front end
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
    handlers: ThreadSafeRwMap<SubscriptionId, (EventFilter, DataCallback<AppEvent>)>,
    config: EventBusConfig,
}

impl EventBus {
    /// Create a new event bus with default configuration
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a new event bus with custom configuration
    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            handlers: thread_safe_rw_map(),
            config,
        }
    }

    /// Publish an event to handlers and async receivers
    ///
    /// Returns how many handlers and receivers saw the event. Publishing with
    /// nobody listening is normal (no front end attached) and returns 0.
    pub fn publish(&self, event: AppEvent) -> usize {
        tracing::trace!("event: {}", event.description());

        let mut delivered = 0;
        {
            let handlers = self.handlers.read();
            for (filter, handler) in handlers.values() {
                if filter.matches(&event) {
                    handler(event.clone());
                    delivered += 1;
                }
            }
        }

        delivered + self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe with a synchronous handler
    ///
    /// The handler runs on the publishing task and must return quickly.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(AppEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.write().insert(id, (filter, Box::new(handler)));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Get a receiver for polling events from a tokio task
    pub fn receiver(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Unsubscribe a handler
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.handlers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Get the number of synchronous handlers
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Get the current configuration
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::events::{ConnectionEvent, Notice, NoticeLevel, PageAction};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn connected() -> AppEvent {
        AppEvent::Connection(ConnectionEvent::Connected { attempt: 1 })
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let bus = EventBus::new();

        let id = bus.subscribe(EventFilter::All, |_| {});
        assert_eq!(bus.subscriber_count(), 1);

        assert!(bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_publish_without_listeners_is_harmless() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(connected()), 0);
    }

    #[test]
    fn test_event_filtering() {
        let bus = EventBus::new();
        let notices = Arc::new(AtomicUsize::new(0));
        let pages = Arc::new(AtomicUsize::new(0));

        let n = notices.clone();
        bus.subscribe(EventFilter::only(EventCategory::Notice), move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        });
        let p = pages.clone();
        bus.subscribe(EventFilter::only(EventCategory::Page), move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(AppEvent::Notice(Notice::new(NoticeLevel::Error, "x")));
        bus.publish(AppEvent::Page(PageAction::Refresh));
        bus.publish(connected());

        assert_eq!(notices.load(Ordering::SeqCst), 1);
        assert_eq!(pages.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_small_capacity_lags_slow_receivers() {
        let bus = EventBus::with_config(EventBusConfig {
            channel_capacity: 2,
        });
        let mut receiver = bus.receiver();

        for _ in 0..5 {
            bus.publish(connected());
        }
        assert!(matches!(
            receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(3))
        ));
        assert_eq!(receiver.try_recv().unwrap(), connected());
    }

    #[tokio::test]
    async fn test_async_receiver() {
        let bus = EventBus::new();
        let mut receiver = bus.receiver();

        assert_eq!(bus.publish(connected()), 1);
        assert_eq!(receiver.recv().await.unwrap(), connected());
    }
}

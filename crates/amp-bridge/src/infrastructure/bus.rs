//! In-process publish/subscribe bus.
//!
//! The bus carries JSON payloads tagged with a topic name in two directions:
//!
//! ```text
//!            publish_inbound()                 subscribe_inbound()
//! panels ───────────────────────► [ inbound ] ─────────────────────► BusAdapter
//!
//!            subscribe_ui()                    send_to_ui()
//! panels ◄─────────────────────── [ outbound ] ◄──────────────────── BusAdapter
//! ```
//!
//! Both directions are `tokio::sync::broadcast` channels, so every subscriber
//! sees every event.  That is exactly the delivery model the panels expect:
//! responses are broadcast and each panel filters by its own client id.
//!
//! A subscriber that falls more than `capacity` events behind loses the
//! oldest ones and is told how many via `RecvError::Lagged`.

use serde_json::Value;
use tokio::sync::broadcast;

/// Topic for UI lifecycle notifications shared by all extensions.
pub const GENERAL_TOPIC: &str = "general";

/// Default per-direction channel capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// One message on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct BusEvent {
    pub topic: String,
    pub payload: Value,
}

impl BusEvent {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }
}

/// Handle to the bus.  Clones share the same channels.
#[derive(Debug, Clone)]
pub struct MessageBus {
    inbound: broadcast::Sender<BusEvent>,
    outbound: broadcast::Sender<BusEvent>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        let (inbound, _) = broadcast::channel(capacity);
        let (outbound, _) = broadcast::channel(capacity);
        Self { inbound, outbound }
    }

    /// Publishes a panel → server event.  Returns how many subscribers saw it.
    pub fn publish_inbound(&self, topic: impl Into<String>, payload: Value) -> usize {
        self.inbound.send(BusEvent::new(topic, payload)).unwrap_or(0)
    }

    pub fn subscribe_inbound(&self) -> broadcast::Receiver<BusEvent> {
        self.inbound.subscribe()
    }

    /// Publishes a server → panels event.  Returns how many panels saw it.
    ///
    /// Having no panel connected is normal; the event is simply dropped.
    pub fn send_to_ui(&self, topic: impl Into<String>, payload: Value) -> usize {
        self.outbound.send(BusEvent::new(topic, payload)).unwrap_or(0)
    }

    pub fn subscribe_ui(&self) -> broadcast::Receiver<BusEvent> {
        self.outbound.subscribe()
    }

    /// Number of live outbound subscriptions (one per connected panel).
    pub fn ui_subscriber_count(&self) -> usize {
        self.outbound.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_send_without_subscribers_is_not_an_error() {
        let bus = MessageBus::default();
        assert_eq!(bus.send_to_ui("akai_amp", json!({})), 0);
        assert_eq!(bus.publish_inbound("akai_amp", json!({})), 0);
    }

    #[test]
    fn test_every_ui_subscriber_receives_each_event() {
        // Arrange: two panels
        let bus = MessageBus::default();
        let mut a = bus.subscribe_ui();
        let mut b = bus.subscribe_ui();

        // Act
        let delivered = bus.send_to_ui("akai_amp", json!({"kind": "Completion"}));

        // Assert
        assert_eq!(delivered, 2);
        assert_eq!(a.try_recv().unwrap().payload["kind"], "Completion");
        assert_eq!(b.try_recv().unwrap().topic, "akai_amp");
    }

    #[test]
    fn test_directions_are_independent() {
        let bus = MessageBus::default();
        let mut inbound = bus.subscribe_inbound();
        let mut ui = bus.subscribe_ui();

        bus.publish_inbound(GENERAL_TOPIC, json!({"header": "activatedExtension"}));

        assert_eq!(inbound.try_recv().unwrap().topic, GENERAL_TOPIC);
        assert!(matches!(ui.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_clones_share_channels() {
        let bus = MessageBus::default();
        let clone = bus.clone();
        let mut rx = bus.subscribe_ui();

        clone.send_to_ui("akai_amp", json!(1));

        assert_eq!(rx.try_recv().unwrap().payload, json!(1));
    }

    #[test]
    fn test_ui_subscriber_count_tracks_dropped_receivers() {
        let bus = MessageBus::default();
        let rx = bus.subscribe_ui();
        assert_eq!(bus.ui_subscriber_count(), 1);

        drop(rx);

        assert_eq!(bus.ui_subscriber_count(), 0);
    }

    #[test]
    fn test_slow_subscriber_is_told_it_lagged() {
        let bus = MessageBus::new(2);
        let mut rx = bus.subscribe_ui();
        for i in 0..5 {
            bus.send_to_ui("akai_amp", json!(i));
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Lagged(3))));
    }
}

//! # Event Bus
//!
//! Fan-out of membership counts, peer-list deltas, and chat/system
//! messages to local subscribers (§4.8/§6). Transport to wherever those
//! subscribers live — an SSE stream, a WebSocket, a test harness — is not
//! this engine's concern; it only guarantees the payload shapes below and
//! a non-blocking publish.
//!
//! Built on [`tokio::sync::broadcast`]: multi-producer, multi-consumer,
//! with a bounded per-subscriber buffer. A slow subscriber that falls
//! behind the buffer size starts missing the oldest messages rather than
//! ever blocking the engine loop — exactly the "drop-oldest on overflow"
//! behavior the design notes call for.

use serde::Serialize;
use tokio::sync::broadcast;

/// One peer entry as exposed to local subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct PeerView {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

/// Diagnostics as exposed in a membership-change payload — a plain,
/// serializable mirror of [`crate::gossip::diagnostics::DiagnosticsSnapshot`].
pub type DiagnosticsView = crate::gossip::diagnostics::DiagnosticsSnapshot;

/// The payloads the Event Bus delivers to local subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// Emitted whenever the membership view changes: a peer admitted,
    /// evicted, or the direct-connection count changes.
    Membership {
        count: usize,
        direct: usize,
        #[serde(rename = "totalUnique")]
        total_unique: usize,
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        screenname: Option<String>,
        peers: Vec<PeerView>,
        diagnostics: DiagnosticsView,
    },
    /// A chat message, local or relayed.
    Chat {
        #[serde(rename = "type")]
        kind: ChatEventKind,
        sender: String,
        content: String,
        timestamp: i64,
    },
    /// An engine-originated system notice (e.g. "peer X joined").
    System {
        #[serde(rename = "type")]
        kind: SystemEventKind,
        content: String,
        timestamp: i64,
    },
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum ChatEventKind {
    #[serde(rename = "CHAT")]
    Chat,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum SystemEventKind {
    #[serde(rename = "SYSTEM")]
    System,
}

/// Bound on the broadcast channel's internal buffer. Past this many
/// unconsumed events, a lagging subscriber starts dropping the oldest —
/// `tokio::sync::broadcast`'s native behavior, which is exactly what we
/// want here.
const EVENT_BUS_CAPACITY: usize = 256;

/// Multi-producer, multi-consumer fan-out of engine events.
pub struct EventBus {
    sender: broadcast::Sender<EventPayload>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the event stream. Each subscriber gets its own
    /// bounded queue; a subscriber that never polls simply starts
    /// missing old events rather than stalling publishers.
    pub fn subscribe(&self) -> broadcast::Receiver<EventPayload> {
        self.sender.subscribe()
    }

    /// Publish an event. Never blocks; if there are no subscribers the
    /// event is simply dropped (`send` returning an error in that case is
    /// expected and not logged as a failure).
    pub fn publish(&self, event: EventPayload) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gossip::diagnostics::Diagnostics;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(EventPayload::System {
            kind: SystemEventKind::System,
            content: "peer joined".to_string(),
            timestamp: 1,
        });

        let received = rx.recv().await.unwrap();
        match received {
            EventPayload::System { content, .. } => assert_eq!(content, "peer joined"),
            _ => panic!("expected a system event"),
        }
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(EventPayload::System {
            kind: SystemEventKind::System,
            content: "no one is listening".to_string(),
            timestamp: 1,
        });
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_the_event() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(EventPayload::Chat {
            kind: ChatEventKind::Chat,
            sender: "abc".to_string(),
            content: "hi".to_string(),
            timestamp: 1,
        });

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[test]
    fn membership_payload_serializes_with_expected_shape() {
        let diag = Diagnostics::new().snapshot();
        let payload = EventPayload::Membership {
            count: 3,
            direct: 2,
            total_unique: 3,
            id: "abc".to_string(),
            screenname: None,
            peers: vec![PeerView {
                id: "def".to_string(),
                ip: Some("1.2.3.4".to_string()),
                lat: None,
                lng: None,
            }],
            diagnostics: diag,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["count"], 3);
        assert_eq!(json["totalUnique"], 3);
        assert!(json.get("screenname").is_none());
    }
}

//! Fire-and-forget broadcast notifier for real-time UI consumers.
//!
//! Settlement code publishes into an unbounded mpsc queue; a forwarder
//! task fans events out through a tokio broadcast channel. The queue
//! decouples ledger mutation from notification delivery - a slow or
//! absent consumer can never affect financial correctness.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastKind {
    StatusChange,
    Settlement,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastEvent {
    pub match_id: Uuid,
    pub kind: BroadcastKind,
    pub payload: serde_json::Value,
}

/// Publisher handle held by the settlement engine
pub struct Broadcaster {
    queue: mpsc::UnboundedSender<BroadcastEvent>,
}

/// Subscriber handle held by outward-facing consumers (websockets etc.)
#[derive(Clone)]
pub struct BroadcastHub {
    fanout: broadcast::Sender<BroadcastEvent>,
}

impl BroadcastHub {
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.fanout.subscribe()
    }
}

impl Broadcaster {
    /// Spawn the forwarder and return the publisher/subscriber pair
    pub fn start(capacity: usize) -> (Arc<Self>, BroadcastHub, JoinHandle<()>) {
        let (queue, mut rx) = mpsc::unbounded_channel::<BroadcastEvent>();
        let (fanout, _) = broadcast::channel(capacity);
        let hub = BroadcastHub {
            fanout: fanout.clone(),
        };

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                // No receivers subscribed is normal; best-effort only
                let _ = fanout.send(event);
            }
        });

        (Arc::new(Self { queue }), hub, handle)
    }

    /// Enqueue an event; never fails the caller
    pub fn publish(&self, event: BroadcastEvent) {
        if self.queue.send(event).is_err() {
            debug!("broadcast forwarder stopped, dropping event");
        }
    }

    pub fn status_change(&self, match_id: Uuid, payload: serde_json::Value) {
        self.publish(BroadcastEvent {
            match_id,
            kind: BroadcastKind::StatusChange,
            payload,
        });
    }

    pub fn settlement(&self, match_id: Uuid, payload: serde_json::Value) {
        self.publish(BroadcastEvent {
            match_id,
            kind: BroadcastKind::Settlement,
            payload,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let (broadcaster, hub, _handle) = Broadcaster::start(16);
        let mut rx = hub.subscribe();

        let match_id = Uuid::new_v4();
        broadcaster.settlement(match_id, serde_json::json!({ "resolved": 3 }));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.match_id, match_id);
        assert_eq!(event.kind, BroadcastKind::Settlement);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let (broadcaster, _hub, _handle) = Broadcaster::start(16);
        // Nothing to assert beyond "does not panic or error"
        broadcaster.status_change(Uuid::new_v4(), serde_json::json!({}));
    }
}

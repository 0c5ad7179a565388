//! Application event system for SSE broadcasting.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events so that late-joining clients can catch up.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::StreamId;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventCategory
// ---------------------------------------------------------------------------

/// Audience category for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    /// Admin-only events (stream lifecycle).
    Admin,
    /// User-facing events (playback must restart).
    User,
}

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
///
/// Field names are camelCase on the wire because the player-side connection
/// layer consumes them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// The player must restart playback at `start_time` seconds.
    StreamReset {
        #[serde(rename = "startTime")]
        start_time: f64,
        #[serde(rename = "streamId")]
        stream_id: StreamId,
    },
    StreamRegistered {
        #[serde(rename = "streamId")]
        stream_id: StreamId,
    },
    StreamClosed {
        #[serde(rename = "streamId")]
        stream_id: StreamId,
    },
}

impl EventPayload {
    /// Topic name, identical to the serialized `type` tag.
    pub fn topic(&self) -> &'static str {
        match self {
            EventPayload::StreamReset { .. } => "stream_reset",
            EventPayload::StreamRegistered { .. } => "stream_registered",
            EventPayload::StreamClosed { .. } => "stream_closed",
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped, categorised event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Audience category.
    pub category: EventCategory,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(category: EventCategory, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            category,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn broadcast(&self, category: EventCategory, payload: EventPayload) {
        let event = Event::new(category, payload);

        // Store in ring buffer regardless of subscriber count.
        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // Ignore send errors (no subscribers).
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }

    /// Number of currently connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let stream_id = StreamId::from("s1");
        bus.broadcast(
            EventCategory::User,
            EventPayload::StreamReset {
                start_time: 42.5,
                stream_id: stream_id.clone(),
            },
        );

        let event = rx.try_recv().unwrap();
        assert_eq!(event.category, EventCategory::User);
        match &event.payload {
            EventPayload::StreamReset {
                start_time,
                stream_id: received,
            } => {
                assert_eq!(*start_time, 42.5);
                assert_eq!(*received, stream_id);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn stream_reset_wire_format() {
        let payload = EventPayload::StreamReset {
            start_time: 42.5,
            stream_id: StreamId::from("play_1"),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "stream_reset", "startTime": 42.5, "streamId": "play_1"})
        );
        assert_eq!(payload.topic(), "stream_reset");
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);

        for _ in 0..150 {
            bus.broadcast(
                EventCategory::Admin,
                EventPayload::StreamRegistered {
                    stream_id: StreamId::new(),
                },
            );
        }

        let recent = bus.recent_events(200);
        assert_eq!(recent.len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::new(16);
        let id = StreamId::from("s1");

        bus.broadcast(
            EventCategory::Admin,
            EventPayload::StreamRegistered { stream_id: id.clone() },
        );
        bus.broadcast(
            EventCategory::Admin,
            EventPayload::StreamClosed { stream_id: id },
        );

        let recent = bus.recent_events(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].payload.topic(), "stream_closed");
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.broadcast(
            EventCategory::Admin,
            EventPayload::StreamClosed {
                stream_id: StreamId::new(),
            },
        );
        assert_eq!(bus.recent_events(10).len(), 1);
    }

    #[test]
    fn event_serde_roundtrip() {
        let event = Event::new(
            EventCategory::Admin,
            EventPayload::StreamRegistered {
                stream_id: StreamId::from("s2"),
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert_eq!(back.payload, event.payload);
    }
}

//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Ingestion publishes one [`SourcePayloadEvent`] per observation; the rule
//! engine subscribes and evaluates each event against the cached rules of
//! its source. Share the bus via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use triggerflow_core::types::DbId;

// ---------------------------------------------------------------------------
// SourcePayloadEvent
// ---------------------------------------------------------------------------

/// A payload observed for one source, e.g. a normalized weather reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePayloadEvent {
    pub source_id: DbId,

    /// Flat JSON object read by trigger evaluators.
    pub payload: serde_json::Value,

    /// When the payload was observed (UTC).
    pub received_at: DateTime<Utc>,
}

impl SourcePayloadEvent {
    pub fn new(source_id: DbId, payload: serde_json::Value) -> Self {
        Self {
            source_id,
            payload,
            received_at: Utc::now(),
        }
    }

    /// Override the observation time (e.g. with the upstream timestamp).
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use triggerflow_events::bus::{EventBus, SourcePayloadEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(SourcePayloadEvent::new(7, serde_json::json!({"temp": 21.5})));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<SourcePayloadEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Returns the number of
    /// receivers the event reached (zero when nobody is listening).
    pub fn publish(&self, event: SourcePayloadEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SourcePayloadEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

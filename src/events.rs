//! Engine event bus.
//!
//! Every state change the outside world cares about is published here:
//! settlement triggers and the WebSocket subscription feeds both consume the
//! same stream. Settlement must never rely on receiving an event exactly once;
//! idempotence is structural (see `game::settlement`).

use crate::game::types::{Outcome, Wager};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    OutcomePublished { outcome: Outcome },
    WagerPlaced { wager: Wager },
    WagerSettled { wager: Wager },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Dropped silently when nobody is subscribed.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

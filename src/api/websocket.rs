//! WebSocket subscription feeds.
//!
//! One endpoint serves both client views: the per-track outcome history feed
//! and the per-user "my bets" feed. Filters come from query parameters; a
//! connection receives only the engine events its filters admit.

use crate::events::{EngineEvent, EventBus};
use crate::game::types::Track;
use crate::metrics::MetricsRegistry;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Subscription filters, taken from query parameters.
///
/// With `user_id` set, only that user's wager events pass (outcome events
/// carry no user and are excluded). With only `track` set, the connection is
/// a public feed of that track.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsSubscription {
    #[serde(default)]
    pub track: Option<Track>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl WsSubscription {
    fn matches(&self, event: &EngineEvent) -> bool {
        let (track, user) = match event {
            EngineEvent::OutcomePublished { outcome } => (outcome.track, None),
            EngineEvent::WagerPlaced { wager } | EngineEvent::WagerSettled { wager } => {
                (wager.track, Some(wager.user_id.as_str()))
            }
        };

        if let Some(wanted) = self.track {
            if wanted != track {
                return false;
            }
        }
        if let Some(wanted) = &self.user_id {
            if user != Some(wanted.as_str()) {
                return false;
            }
        }
        true
    }
}

/// WebSocket connection manager.
pub struct WebSocketManager {
    events: EventBus,
    metrics: Arc<MetricsRegistry>,
}

impl WebSocketManager {
    pub fn new(events: EventBus, metrics: Arc<MetricsRegistry>) -> Self {
        Self { events, metrics }
    }

    /// Handle one upgraded connection until the client disconnects.
    pub async fn handle_connection(&self, socket: WebSocket, subscription: WsSubscription) {
        let active = self
            .metrics
            .websocket_connections_active
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        info!(?subscription, active, "websocket client connected");

        let (mut sender, mut receiver) = socket.split();
        let mut events = BroadcastStream::new(self.events.subscribe());
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(event)) => {
                        if !subscription.matches(&event) {
                            continue;
                        }
                        let Ok(text) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!(skipped, "websocket client lagged behind the event feed");
                    }
                    None => break,
                },
                _ = heartbeat.tick() => {
                    let text = serde_json::json!({
                        "type": "heartbeat",
                        "timestamp": crate::game::period::now_ms(),
                    })
                    .to_string();
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }

        let remaining = self
            .metrics
            .websocket_connections_active
            .fetch_sub(1, Ordering::SeqCst)
            - 1;
        debug!(remaining, "websocket client disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::{Outcome, Selection, Wager};

    fn outcome_event(track: Track) -> EngineEvent {
        EngineEvent::OutcomePublished {
            outcome: Outcome::from_number(track, 1, 3),
        }
    }

    fn wager_event(track: Track, user_id: &str) -> EngineEvent {
        EngineEvent::WagerPlaced {
            wager: Wager::pending(user_id, track, 1, Selection::Digit(3), 10.0, 0),
        }
    }

    #[test]
    fn test_unfiltered_subscription_sees_everything() {
        let sub = WsSubscription::default();
        assert!(sub.matches(&outcome_event(Track::Sec30)));
        assert!(sub.matches(&wager_event(Track::Min5, "alice")));
    }

    #[test]
    fn test_track_filter() {
        let sub = WsSubscription {
            track: Some(Track::Min1),
            user_id: None,
        };
        assert!(sub.matches(&outcome_event(Track::Min1)));
        assert!(!sub.matches(&outcome_event(Track::Sec30)));
    }

    #[test]
    fn test_user_filter_excludes_outcomes_and_other_users() {
        let sub = WsSubscription {
            track: None,
            user_id: Some("alice".to_string()),
        };
        assert!(sub.matches(&wager_event(Track::Sec30, "alice")));
        assert!(!sub.matches(&wager_event(Track::Sec30, "bob")));
        assert!(!sub.matches(&outcome_event(Track::Sec30)));
    }

    #[test]
    fn test_combined_filters() {
        let sub = WsSubscription {
            track: Some(Track::Min3),
            user_id: Some("alice".to_string()),
        };
        assert!(sub.matches(&wager_event(Track::Min3, "alice")));
        assert!(!sub.matches(&wager_event(Track::Min1, "alice")));
    }
}

//! Route definitions.
//!
//! Maps URLs to handlers with type-safe routing.

use super::{
    handlers::*,
    websocket::WsSubscription,
};
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check (high priority)
        .route("/health", get(health_handler))
        // Round clock and outcome history
        .route("/clock/:track", get(clock_handler))
        .route("/results/:track", get(results_handler))
        // Wagers
        .route("/bets", post(place_bet_handler))
        .route("/bets/:user_id", get(my_bets_handler))
        .route("/settle/:track", post(settle_handler))
        // Accounts and the deposit-approval credit hook
        .route("/account/:user_id", get(account_handler))
        .route("/account/:user_id/deposit", post(deposit_handler))
        .route("/account/:user_id/withdrawable", get(withdrawable_handler))
        // Operator override knob
        .route(
            "/admin/override",
            get(get_override_handler).put(put_override_handler),
        )
        // Bonus wheel
        .route("/wheel/:user_id/spin", post(spin_handler))
        // WebSocket subscription feed
        .route("/ws", get(websocket_upgrade_handler))
        // Metrics endpoint for Prometheus
        .route("/metrics", get(metrics_handler))
        // Attach shared state
        .with_state(state)
}

async fn websocket_upgrade_handler(
    ws: WebSocketUpgrade,
    Query(subscription): Query<WsSubscription>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let manager = state.websocket_manager.clone();
    ws.on_upgrade(move |socket| async move {
        manager.handle_connection(socket, subscription).await;
    })
}

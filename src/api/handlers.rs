//! Request handlers.

use super::{errors::ApiError, middleware::RequestId, models::*, websocket::WebSocketManager};
use crate::config::WingoConfig;
use crate::events::EventBus;
use crate::game::account::AccountLedger;
use crate::game::period;
use crate::game::settlement::{SettlementEngine, SettlementReport, SettlementTrigger};
use crate::game::types::{GameSettings, Track, Wager};
use crate::game::wager::WagerLedger;
use crate::game::wheel::{BonusWheel, SpinResult};
use crate::metrics::MetricsRegistry;
use crate::store::{ResultStore, SettingsStore, WagerStore};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use std::str::FromStr;
use std::sync::Arc;

const MAX_HISTORY_LIMIT: usize = 100;

/// Shared application state.
pub struct AppState {
    pub config: WingoConfig,
    pub wager_ledger: WagerLedger,
    pub settlement: Arc<SettlementEngine>,
    pub accounts: AccountLedger,
    pub wheel: BonusWheel,
    pub results: Arc<dyn ResultStore>,
    pub wagers: Arc<dyn WagerStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub events: EventBus,
    pub metrics: Arc<MetricsRegistry>,
    pub websocket_manager: Arc<WebSocketManager>,
    pub version: String,
}

fn parse_track(request_id: &RequestId, raw: &str) -> Result<Track, ApiError> {
    Track::from_str(raw).map_err(|_| {
        ApiError::bad_request(
            request_id.0.clone(),
            format!("unknown track '{}'. Use 30s, 1min, 3min or 5min", raw),
        )
    })
}

/// Health check handler - minimal response time.
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
    })
}

/// Current period and remaining time for one track.
/// GET /clock/:track
pub async fn clock_handler(
    Extension(request_id): Extension<RequestId>,
    Path(track): Path<String>,
) -> Result<Json<period::PeriodSnapshot>, ApiError> {
    let track = parse_track(&request_id, &track)?;
    Ok(Json(period::snapshot(track, period::now_ms())))
}

/// Outcome history for one track, newest first.
/// GET /results/:track?limit={n}
pub async fn results_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(track): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<crate::game::types::Outcome>>, ApiError> {
    let track = parse_track(&request_id, &track)?;
    let limit = params
        .limit
        .unwrap_or(state.config.game.history_limit)
        .min(MAX_HISTORY_LIMIT);

    let outcomes = state
        .results
        .recent_outcomes(track, limit)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(outcomes))
}

/// Place a wager on the currently open period of a track.
/// POST /bets
pub async fn place_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaceBetRequest>,
) -> Result<Json<Wager>, ApiError> {
    let wager = state
        .wager_ledger
        .place_wager(
            &request.user_id,
            request.track,
            request.selection,
            request.amount,
            period::now_ms(),
        )
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(wager))
}

/// A user's wager history, newest first.
/// GET /bets/:user_id
pub async fn my_bets_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<Wager>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(state.config.game.history_limit)
        .min(MAX_HISTORY_LIMIT);

    let mut wagers = state
        .wagers
        .wagers_for_user(&user_id)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    wagers.truncate(limit);
    Ok(Json(wagers))
}

/// Explicit settlement trigger for one track.
/// POST /settle/:track
pub async fn settle_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(track): Path<String>,
) -> Result<Json<SettlementReport>, ApiError> {
    let track = parse_track(&request_id, &track)?;
    let report = state
        .settlement
        .settle(track, SettlementTrigger::Manual)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(report))
}

/// GET /account/:user_id
pub async fn account_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .accounts
        .account(&user_id)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(account.into()))
}

/// Turnover-linked credit, called by the deposit workflow when a deposit is
/// approved (and by bonus grants).
/// POST /account/:user_id/deposit
pub async fn deposit_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(request): Json<CreditRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .accounts
        .credit_turnover_linked(&user_id, request.amount)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(account.into()))
}

/// The withdrawal gate consumed by the manual payout workflow.
/// GET /account/:user_id/withdrawable
pub async fn withdrawable_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<WithdrawableResponse>, ApiError> {
    let account = state
        .accounts
        .account(&user_id)
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(WithdrawableResponse {
        user_id,
        can_withdraw: account.can_withdraw(),
        turnover_remaining: account.turnover_remaining(),
    }))
}

/// GET /admin/override
pub async fn get_override_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<OverrideView>, ApiError> {
    let settings = state
        .settings
        .get_settings()
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(OverrideView { settings }))
}

/// Set the operator override for the next draws of one targeted track.
/// PUT /admin/override
pub async fn put_override_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(view): Json<OverrideView>,
) -> Result<Json<OverrideView>, ApiError> {
    let settings: GameSettings = view.settings;
    state
        .settings
        .put_settings(settings.clone())
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(OverrideView { settings }))
}

/// POST /wheel/:user_id/spin
pub async fn spin_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<SpinResult>, ApiError> {
    let result = state
        .wheel
        .spin(&user_id, period::now_ms())
        .await
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(result))
}

/// Prometheus metrics endpoint.
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics.to_prometheus_format()
}

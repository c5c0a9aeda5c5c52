//! Wingo server binary: wires the in-memory document store, the round
//! scheduler and the API surface together.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use wingo::api::{ApiServer, AppState};
use wingo::api::websocket::WebSocketManager;
use wingo::config::WingoConfig;
use wingo::events::EventBus;
use wingo::game::{
    AccountLedger, BonusWheel, OutcomeGenerator, SettlementEngine, WagerLedger,
};
use wingo::metrics::MetricsRegistry;
use wingo::scheduler::RoundScheduler;
use wingo::store::MemoryStore;

#[derive(Debug, Parser)]
#[command(name = "wingo", about = "Round-based prediction game engine")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the API bind port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the API bind host.
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => WingoConfig::load(path)?,
        None => WingoConfig::default(),
    };
    if let Some(port) = cli.port {
        config.api.port = port;
    }
    if let Some(host) = cli.host {
        config.api.host = host;
    }
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.monitoring.log_filter)
                }),
        )
        .init();

    info!("🎲 Wingo round engine starting");

    let store = Arc::new(MemoryStore::new());
    let events = EventBus::new(config.game.event_bus_capacity);
    let metrics = Arc::new(MetricsRegistry::new());

    let accounts = AccountLedger::new(store.clone());
    let generator = Arc::new(OutcomeGenerator::new(
        store.clone(),
        store.clone(),
        events.clone(),
        metrics.clone(),
    ));
    let settlement = Arc::new(SettlementEngine::new(
        store.clone(),
        store.clone(),
        accounts.clone(),
        events.clone(),
        metrics.clone(),
    ));
    let wager_ledger = WagerLedger::new(
        store.clone(),
        accounts.clone(),
        events.clone(),
        metrics.clone(),
        config.game.bet_grace_window_secs,
    );
    let wheel = BonusWheel::new(accounts.clone());

    let scheduler = Arc::new(RoundScheduler::new(
        generator,
        settlement.clone(),
        events.clone(),
        &config.game,
    ));
    let handles = scheduler.spawn();
    info!(tasks = handles.len(), "round scheduler running");

    let websocket_manager = Arc::new(WebSocketManager::new(events.clone(), metrics.clone()));
    let state = Arc::new(AppState {
        wager_ledger,
        settlement,
        accounts,
        wheel,
        results: store.clone(),
        wagers: store.clone(),
        settings: store,
        events,
        metrics,
        websocket_manager,
        version: env!("CARGO_PKG_VERSION").to_string(),
        config: config.clone(),
    });

    ApiServer::new(config.api, state).run().await
}

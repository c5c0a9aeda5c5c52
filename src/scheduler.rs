//! Background round driving.
//!
//! One 1-second ticker per duration track detects period rollover, generates
//! the outcome for the period that just closed and runs a settlement pass.
//! A reactive loop settles on wager/outcome events and a coarse poll sweeps
//! every track as the retry path for wagers whose settlement failed. None of
//! these triggers need to fire exactly once: generation and settlement are
//! idempotent, so overlapping triggers are harmless.

use crate::config::GameConfig;
use crate::errors::EngineResult;
use crate::events::{EngineEvent, EventBus};
use crate::game::outcome::OutcomeGenerator;
use crate::game::period;
use crate::game::settlement::{SettlementEngine, SettlementTrigger};
use crate::game::types::Track;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct RoundScheduler {
    generator: Arc<OutcomeGenerator>,
    settlement: Arc<SettlementEngine>,
    events: EventBus,
    poll_interval: Duration,
}

impl RoundScheduler {
    pub fn new(
        generator: Arc<OutcomeGenerator>,
        settlement: Arc<SettlementEngine>,
        events: EventBus,
        config: &GameConfig,
    ) -> Self {
        Self {
            generator,
            settlement,
            events,
            poll_interval: Duration::from_secs(config.settle_poll_interval_secs),
        }
    }

    /// Spawn all background loops: one ticker per track, the reactive
    /// settlement listener and the settlement poll.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(Track::ALL.len() + 2);
        for track in Track::ALL {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                scheduler.track_loop(track).await;
            }));
        }

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.reactive_loop().await;
        }));

        let scheduler = self;
        handles.push(tokio::spawn(async move {
            scheduler.poll_loop().await;
        }));

        handles
    }

    async fn track_loop(&self, track: Track) {
        info!(%track, "round ticker started");
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut last_period = period::period_id(track, period::now_ms());

        loop {
            ticker.tick().await;
            let now_ms = period::now_ms();
            let current = period::period_id(track, now_ms);
            if current == last_period {
                continue;
            }

            // Every period between the last observed one and now has closed;
            // normally that is exactly one.
            for closed in last_period..current {
                if let Err(err) = self.generator.generate_if_absent(track, closed, now_ms).await {
                    warn!(%track, period_id = closed, error = %err, "outcome generation failed");
                }
            }
            last_period = current;

            self.settle(track, SettlementTrigger::NewOutcome).await;
        }
    }

    /// Settle reactively on engine events. Settled-wager events are not
    /// triggers; reacting to them would feed settlement its own output.
    async fn reactive_loop(&self) {
        let mut rx = self.events.subscribe();
        loop {
            match rx.recv().await {
                Ok(EngineEvent::WagerPlaced { wager }) => {
                    self.settle(wager.track, SettlementTrigger::NewWager).await;
                }
                Ok(EngineEvent::OutcomePublished { outcome }) => {
                    self.settle(outcome.track, SettlementTrigger::NewOutcome)
                        .await;
                }
                Ok(EngineEvent::WagerSettled { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "settlement listener lagged, poll loop covers the gap");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    async fn poll_loop(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            for track in Track::ALL {
                self.settle(track, SettlementTrigger::Poll).await;
            }
        }
    }

    async fn settle(&self, track: Track, trigger: SettlementTrigger) {
        if let Err(err) = self.settle_checked(track, trigger).await {
            warn!(%track, %trigger, error = %err, "settlement pass failed");
        }
    }

    async fn settle_checked(&self, track: Track, trigger: SettlementTrigger) -> EngineResult<()> {
        self.settlement.settle(track, trigger).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::account::AccountLedger;
    use crate::game::types::{Selection, Track, Wager};
    use crate::metrics::MetricsRegistry;
    use crate::store::{MemoryStore, ResultStore, WagerStore};
    use crate::game::types::Outcome;

    #[tokio::test]
    async fn test_reactive_loop_settles_on_outcome_event() {
        let store = Arc::new(MemoryStore::new());
        let events = EventBus::new(64);
        let metrics = Arc::new(MetricsRegistry::new());
        let accounts = AccountLedger::new(store.clone());
        accounts.credit_turnover_linked("u1", 100.0).await.unwrap();

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
            metrics,
        ));
        let scheduler = Arc::new(RoundScheduler::new(
            generator,
            settlement,
            events.clone(),
            &GameConfig::default(),
        ));

        // A matured pending wager and its published outcome.
        let wager = Wager::pending("u1", Track::Sec30, 77, Selection::Digit(3), 50.0, 1_000);
        store.insert_wager(&wager).await.unwrap();
        let outcome = Outcome::from_number(Track::Sec30, 77, 3);
        store.insert_outcome(&outcome).await.unwrap();

        let handle = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.reactive_loop().await })
        };
        // Let the listener subscribe before the event fires.
        tokio::time::sleep(Duration::from_millis(50)).await;
        events.publish(EngineEvent::OutcomePublished { outcome });

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(store.pending_wagers(Track::Sec30).await.unwrap().is_empty());
        let account = accounts.account("u1").await.unwrap();
        assert_eq!(account.balance, 100.0 + 450.0);
    }
}
